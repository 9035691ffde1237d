use crate::error::{Error, Result};
use crate::index_box::{check_dimension, check_factors, Factors, Index, IndexBox};




/**
 * A single structured, uniformly spaced grid: a number of nodes on each axis,
 * the physical position of the first node, and the cell size on each axis.
 * The grid has `node_counts[d] - 1` cells on axis `d`.
 */
#[derive(Clone, Debug, PartialEq)]
pub struct CartesianGrid<const D: usize> {
    node_counts: [usize; D],
    origin: [f64; D],
    cell_size: [f64; D],
}




// ============================================================================
impl<const D: usize> CartesianGrid<D> {


    /**
     * Create a grid from per-axis node counts, an origin, and a cell size.
     * Every node count must be at least 1 and every cell size positive.
     */
    pub fn new(node_counts: [usize; D], origin: [f64; D], cell_size: [f64; D]) -> Result<Self> {
        check_dimension::<D>()?;

        for axis in 0..D {
            if node_counts[axis] == 0 {
                return Err(Error::InvalidRange(format!("grid has no nodes on axis {}", axis)))
            }
            if !(cell_size[axis] > 0.0 && cell_size[axis].is_finite()) {
                return Err(Error::InvalidRange(format!(
                    "cell size {} on axis {} is not positive", cell_size[axis], axis)))
            }
        }
        Ok(Self { node_counts, origin, cell_size })
    }


    /**
     * Create a grid from per-axis cell counts rather than node counts.
     */
    pub fn from_cell_counts(cell_counts: [usize; D], origin: [f64; D], cell_size: [f64; D]) -> Result<Self> {
        let mut node_counts = cell_counts;

        for n in node_counts.iter_mut() {
            *n += 1;
        }
        Self::new(node_counts, origin, cell_size)
    }

    pub fn node_counts(&self) -> [usize; D] {
        self.node_counts
    }

    pub fn origin(&self) -> [f64; D] {
        self.origin
    }

    pub fn cell_size(&self) -> [f64; D] {
        self.cell_size
    }


    /**
     * Return the number of cells on each axis.
     */
    pub fn cell_counts(&self) -> [usize; D] {
        let mut counts = self.node_counts;

        for n in counts.iter_mut() {
            *n -= 1;
        }
        counts
    }


    /**
     * Return the index space of this grid's cells, starting at zero.
     */
    pub fn cell_box(&self) -> IndexBox<D> {
        IndexBox::from_shape(self.cell_counts())
    }

    pub fn number_of_cells(&self) -> usize {
        self.cell_counts().iter().product()
    }

    pub fn number_of_nodes(&self) -> usize {
        self.node_counts.iter().product()
    }


    /**
     * Return the grid obtained by splitting every cell into `factors[d]`
     * cells along axis `d`. The physical extent is unchanged.
     */
    pub fn refine_with_factor(&self, factors: &Factors<D>) -> Result<Self> {
        check_factors(factors)?;

        let mut cells = self.cell_counts();
        let mut cell_size = self.cell_size;

        for axis in 0..D {
            cells[axis] *= factors[axis] as usize;
            cell_size[axis] /= factors[axis] as f64;
        }
        Self::from_cell_counts(cells, self.origin, cell_size)
    }


    /**
     * Return this grid scaled by a positive factor about the given point.
     */
    pub fn scale(&self, center: [f64; D], factor: f64) -> Result<Self> {
        if !(factor > 0.0 && factor.is_finite()) {
            return Err(Error::InvalidRange(format!("scale factor {} is not positive", factor)))
        }
        let mut origin = self.origin;
        let mut cell_size = self.cell_size;

        for axis in 0..D {
            origin[axis] = center[axis] + (origin[axis] - center[axis]) * factor;
            cell_size[axis] *= factor;
        }
        Ok(Self { node_counts: self.node_counts, origin, cell_size })
    }


    /**
     * Return this grid shifted by the given vector.
     */
    pub fn translate(&self, vector: [f64; D]) -> Self {
        let mut origin = self.origin;

        for axis in 0..D {
            origin[axis] += vector[axis];
        }
        Self { node_counts: self.node_counts, origin, cell_size: self.cell_size }
    }


    /**
     * Return the grid grown by `ghost` cells on both sides of every axis.
     */
    pub fn build_with_ghost(&self, ghost: usize) -> Self {
        let mut node_counts = self.node_counts;
        let mut origin = self.origin;

        for axis in 0..D {
            node_counts[axis] += 2 * ghost;
            origin[axis] -= ghost as f64 * self.cell_size[axis];
        }
        Self { node_counts, origin, cell_size: self.cell_size }
    }


    /**
     * Return a grid with a single cell covering the same physical region.
     */
    pub fn as_single_cell(&self) -> Self {
        let cells = self.cell_counts();
        let mut cell_size = self.cell_size;

        for axis in 0..D {
            cell_size[axis] *= cells[axis].max(1) as f64;
        }
        Self { node_counts: [2; D], origin: self.origin, cell_size }
    }


    /**
     * Return the structured sub-part of this grid covering the given cells.
     */
    pub fn sub_grid(&self, cells: &IndexBox<D>) -> Result<Self> {
        if !self.cell_box().contains_box(cells) {
            return Err(Error::OutOfRange(format!(
                "box {} is not inside the grid cells {}", cells, self.cell_box())))
        }
        let mut origin = self.origin;
        let shape = cells.shape();

        for axis in 0..D {
            origin[axis] += cells.lo()[axis] as f64 * self.cell_size[axis];
        }
        Self::from_cell_counts(shape, origin, self.cell_size)
    }


    /**
     * Return the lower and upper physical corners of the grid.
     */
    pub fn bounding_box(&self) -> ([f64; D], [f64; D]) {
        let cells = self.cell_counts();
        let mut upper = self.origin;

        for axis in 0..D {
            upper[axis] += cells[axis] as f64 * self.cell_size[axis];
        }
        (self.origin, upper)
    }


    /**
     * Return the physical position of the lower corner of a cell.
     */
    pub fn cell_lower_corner(&self, index: Index<D>) -> [f64; D] {
        let mut x = self.origin;

        for axis in 0..D {
            x[axis] += index[axis] as f64 * self.cell_size[axis];
        }
        x
    }


    /**
     * Return the physical position of the center of a cell.
     */
    pub fn cell_center(&self, index: Index<D>) -> [f64; D] {
        let mut x = self.cell_lower_corner(index);

        for axis in 0..D {
            x[axis] += 0.5 * self.cell_size[axis];
        }
        x
    }


    /**
     * Return the index of the cell containing the given point, or `None` if
     * the point lies outside the grid. Cells are half-open: a point on the
     * upper boundary of the grid is outside.
     */
    pub fn cell_containing_point(&self, point: [f64; D]) -> Option<Index<D>> {
        let cells = self.cell_counts();
        let mut index = [0; D];

        for axis in 0..D {
            let x = ((point[axis] - self.origin[axis]) / self.cell_size[axis]).floor();

            if !(x >= 0.0 && x < cells[axis] as f64) {
                return None
            }
            index[axis] = x as i64;
        }
        Some(index)
    }


    /**
     * Return the volume (length, area) shared by every cell of the grid.
     */
    pub fn measure_of_any_cell(&self) -> f64 {
        self.cell_size.iter().product()
    }
}




// ============================================================================
#[cfg(test)]
mod test {

    use super::*;

    fn grid() -> CartesianGrid<2> {
        CartesianGrid::new([6, 6], [0.0, 0.0], [1.0, 1.0]).unwrap()
    }

    #[test]
    fn cell_counts_are_one_less_than_node_counts() {
        assert_eq!(grid().cell_counts(), [5, 5]);
        assert_eq!(grid().number_of_cells(), 25);
        assert_eq!(grid().number_of_nodes(), 36);
        assert!(CartesianGrid::new([0], [0.0], [1.0]).is_err());
        assert!(CartesianGrid::new([3], [0.0], [0.0]).is_err());
    }

    #[test]
    fn refinement_keeps_the_physical_extent() {
        let fine = grid().refine_with_factor(&[2, 4]).unwrap();
        assert_eq!(fine.cell_counts(), [10, 20]);
        assert_eq!(fine.cell_size(), [0.5, 0.25]);
        assert_eq!(fine.bounding_box(), grid().bounding_box());
        assert!(grid().refine_with_factor(&[0, 1]).is_err());
    }

    #[test]
    fn ghost_grid_moves_the_origin() {
        let g = grid().build_with_ghost(2);
        assert_eq!(g.cell_counts(), [9, 9]);
        assert_eq!(g.origin(), [-2.0, -2.0]);
    }

    #[test]
    fn sub_grid_and_single_cell() {
        let sub = grid().sub_grid(&IndexBox::new([1, 0], [4, 3]).unwrap()).unwrap();
        assert_eq!(sub.origin(), [1.0, 0.0]);
        assert_eq!(sub.cell_counts(), [3, 3]);

        let single = sub.as_single_cell();
        assert_eq!(single.number_of_cells(), 1);
        assert_eq!(single.measure_of_any_cell(), 9.0);
        assert!(grid().sub_grid(&IndexBox::new([3, 3], [6, 4]).unwrap()).is_err());
    }

    #[test]
    fn locates_cells_by_position() {
        let g = grid().translate([1.0, 0.0]).scale([1.0, 0.0], 0.5).unwrap();
        assert_eq!(g.cell_size(), [0.5, 0.5]);
        assert_eq!(g.cell_containing_point([1.75, 0.2]), Some([1, 0]));
        assert_eq!(g.cell_containing_point([0.9, 0.2]), None);
        assert_eq!(g.cell_containing_point([3.5, 0.2]), None);
        assert_eq!(g.cell_center([0, 1]), [1.25, 0.75]);
    }
}
