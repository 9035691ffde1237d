use serde::Serialize;
use crate::cartesian_grid::CartesianGrid;
use crate::error::{Error, Result};




/**
 * Plain description of a structured grid, as handed to an external writer.
 */
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct GridDescription {
    pub origin: Vec<f64>,
    pub cell_size: Vec<f64>,
    pub cell_counts: Vec<usize>,
}

impl<const D: usize> From<&CartesianGrid<D>> for GridDescription {
    fn from(grid: &CartesianGrid<D>) -> Self {
        Self {
            origin: grid.origin().to_vec(),
            cell_size: grid.cell_size().to_vec(),
            cell_counts: grid.cell_counts().to_vec(),
        }
    }
}




/**
 * A field on the cells of a single structured grid: `values` holds
 * `components` numbers per cell, cells in row-major order.
 */
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct CellField {
    pub name: String,
    pub grid: GridDescription,
    pub components: usize,
    pub component_names: Vec<String>,
    pub values: Vec<f64>,
}




/**
 * One cell of a composite (overlap-free) view of a hierarchy.
 */
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct CompositeCell {
    pub level: usize,
    pub lower: Vec<f64>,
    pub cell_size: Vec<f64>,
}




/**
 * A field on the most refined cells of a hierarchy, with each physical
 * region appearing exactly once.
 */
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct CompositeField {
    pub name: String,
    pub components: usize,
    pub cells: Vec<CompositeCell>,
    pub values: Vec<f64>,
}

impl CompositeField {


    /**
     * Return the total volume covered by the composite cells.
     */
    pub fn covered_measure(&self) -> f64 {
        self.cells.iter().map(|c| c.cell_size.iter().product::<f64>()).sum()
    }
}




/**
 * Encode any export record as CBOR.
 */
pub fn to_cbor<T: Serialize>(value: &T) -> Result<Vec<u8>> {
    let mut buffer = Vec::new();
    ciborium::ser::into_writer(value, &mut buffer).map_err(|e| Error::Encode(e.to_string()))?;
    Ok(buffer)
}




/**
 * Encode any export record as MessagePack.
 */
pub fn to_msgpack<T: Serialize>(value: &T) -> Result<Vec<u8>> {
    rmp_serde::to_vec_named(value).map_err(|e| Error::Encode(e.to_string()))
}
