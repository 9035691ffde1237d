use crate::error::{Error, Result};
use crate::index_box::{Index, IndexBox};




/**
 * Dense storage for one field on one grid node: the node's interior cells
 * surrounded by `ghost` layers on every side, with `components` values per
 * cell. Cells are addressed by local indexes, where the interior spans `0 ..
 * shape[d]` and ghost cells have indexes in `-ghost .. 0` and `shape[d] ..
 * shape[d] + ghost`. The backing buffer is row-major over the ghosted index
 * space, with the components of a cell stored contiguously.
 */
#[derive(Clone, Debug, PartialEq)]
pub struct PatchData<const D: usize> {
    interior: IndexBox<D>,
    ghost: usize,
    components: usize,
    data: Vec<f64>,
}




// ============================================================================
impl<const D: usize> PatchData<D> {


    /**
     * Allocate zero-filled storage for a node with the given interior cell
     * counts.
     */
    pub fn zeros(shape: [usize; D], ghost: usize, components: usize) -> Self {
        let interior = IndexBox::from_shape(shape);
        let len = interior.extend_all(ghost).number_of_cells() * components;

        Self {
            interior,
            ghost,
            components,
            data: vec![0.0; len],
        }
    }


    /**
     * Allocate storage whose interior cells are given by a closure, and whose
     * ghost cells are zero.
     */
    pub fn from_function<F>(shape: [usize; D], ghost: usize, components: usize, f: F) -> Self
    where
        F: Fn(Index<D>, &mut [f64])
    {
        let mut patch = Self::zeros(shape, ghost, components);

        for index in patch.interior.iter() {
            f(index, patch.get_slice_mut(index));
        }
        patch
    }

    pub fn shape(&self) -> [usize; D] {
        self.interior.shape()
    }

    pub fn ghost(&self) -> usize {
        self.ghost
    }

    pub fn components(&self) -> usize {
        self.components
    }


    /**
     * Return the local index space of the interior cells.
     */
    pub fn interior(&self) -> IndexBox<D> {
        self.interior
    }


    /**
     * Return the local index space of all cells, ghosts included.
     */
    pub fn index_space(&self) -> IndexBox<D> {
        self.interior.extend_all(self.ghost)
    }


    /**
     * Return the whole backing buffer, ghost cells included.
     */
    pub fn data(&self) -> &[f64] {
        &self.data
    }

    pub fn data_mut(&mut self) -> &mut [f64] {
        &mut self.data
    }


    /**
     * Return the components stored for a cell. Panics if the index is outside
     * the ghosted index space.
     */
    pub fn get_slice(&self, index: Index<D>) -> &[f64] {
        let start = self.offset(index);
        &self.data[start..start + self.components]
    }

    pub fn get_slice_mut(&mut self, index: Index<D>) -> &mut [f64] {
        let start = self.offset(index);
        &mut self.data[start..start + self.components]
    }


    /**
     * Return a copy of the interior values in row-major order.
     */
    pub fn interior_values(&self) -> Vec<f64> {
        self.values_in(&self.interior)
    }


    /**
     * Return a copy of the values of the cells in a local region, which must
     * lie inside the ghosted index space.
     */
    pub fn values_in(&self, region: &IndexBox<D>) -> Vec<f64> {
        region.iter().flat_map(|index| self.get_slice(index).iter().copied()).collect()
    }


    /**
     * Overwrite the interior values from a row-major buffer.
     */
    pub fn set_interior(&mut self, values: &[f64]) -> Result<()> {
        let expected = self.interior.number_of_cells() * self.components;

        if values.len() != expected {
            return Err(Error::StructuralMismatch(format!(
                "expected {} interior values, got {}", expected, values.len())))
        }
        for (index, chunk) in self.interior.iter().zip(values.chunks_exact(self.components.max(1))) {
            self.get_slice_mut(index).copy_from_slice(chunk);
        }
        Ok(())
    }


    /**
     * Return an iterator over the local indexes of the ghost cells.
     */
    pub fn ghost_cells(&self) -> impl Iterator<Item = Index<D>> + '_ {
        self.index_space().iter().filter(move |&index| !self.interior.contains(index))
    }

    fn offset(&self, index: Index<D>) -> usize {
        let space = self.index_space();

        if !space.contains(index) {
            panic!("index {:?} out of range on patch data {}", index, space);
        }
        space.row_major_offset(index) * self.components
    }
}




// ============================================================================
#[cfg(test)]
mod test {

    use super::PatchData;

    #[test]
    fn storage_includes_ghost_layers() {
        let p = PatchData::<2>::zeros([3, 4], 2, 3);
        assert_eq!(p.data().len(), 7 * 8 * 3);
        assert_eq!(p.ghost_cells().count(), 7 * 8 - 3 * 4);
        assert_eq!(p.get_slice([-2, -2]).len(), 3);
    }

    #[test]
    fn interior_values_skip_ghosts() {
        let mut p = PatchData::<1>::from_function([4], 1, 1, |i, x| x[0] = i[0] as f64 + 10.0);
        assert_eq!(p.interior_values(), vec![10.0, 11.0, 12.0, 13.0]);
        assert_eq!(p.data(), &[0.0, 10.0, 11.0, 12.0, 13.0, 0.0]);

        p.set_interior(&[1.0, 2.0, 3.0, 4.0]).unwrap();
        assert_eq!(p.get_slice([3]), &[4.0]);
        assert!(p.set_interior(&[1.0]).is_err());
    }

    #[test]
    #[should_panic]
    fn access_beyond_the_ghost_zone_panics() {
        let p = PatchData::<1>::zeros([4], 1, 1);
        p.get_slice([5]);
    }
}
