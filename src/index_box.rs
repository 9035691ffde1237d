use core::fmt;
use core::ops::Range;
use crate::error::{Error, Result};




/**
 * A multi-dimensional index into a Cartesian index space.
 */
pub type Index<const D: usize> = [i64; D];




/**
 * Per-axis integer refinement factors. Each entry must be at least 1.
 */
pub type Factors<const D: usize> = [i64; D];




/**
 * Fail unless `D` is one of the supported dimensionalities (1, 2, or 3).
 */
pub fn check_dimension<const D: usize>() -> Result<()> {
    if D == 0 || D > 3 {
        Err(Error::StructuralMismatch(format!("dimension {} is not supported (1, 2, or 3)", D)))
    } else {
        Ok(())
    }
}




/**
 * Fail unless every refinement factor is at least 1.
 */
pub fn check_factors<const D: usize>(factors: &Factors<D>) -> Result<()> {
    if factors.iter().any(|&f| f < 1) {
        Err(Error::InvalidFactor(factors.to_vec()))
    } else {
        Ok(())
    }
}




/**
 * Integer division rounding towards negative infinity. The divisor must be
 * positive.
 */
pub fn div_floor(a: i64, b: i64) -> i64 {
    a.div_euclid(b)
}




/**
 * Integer division rounding towards positive infinity. The divisor must be
 * positive.
 */
pub fn div_ceil(a: i64, b: i64) -> i64 {
    -(-a).div_euclid(b)
}




/**
 * Greatest common divisor of two positive integers.
 */
pub fn gcd(a: i64, b: i64) -> i64 {
    if b == 0 { a } else { gcd(b, a % b) }
}




/**
 * Represents a rectangular region in a discrete index space: a half-open
 * range `lo[d] .. hi[d]` on each axis. An axis with `lo == hi` makes the box
 * empty. Boxes are plain values; every operation returns a new box.
 */
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct IndexBox<const D: usize> {
    lo: [i64; D],
    hi: [i64; D],
}




// ============================================================================
impl<const D: usize> IndexBox<D> {


    /**
     * Create a box from its lower (inclusive) and upper (exclusive) corners.
     * Fails with `InvalidRange` if `lo > hi` on any axis.
     */
    pub fn new(lo: [i64; D], hi: [i64; D]) -> Result<Self> {
        check_dimension::<D>()?;

        for axis in 0..D {
            if lo[axis] > hi[axis] {
                return Err(Error::InvalidRange(format!(
                    "lo {} exceeds hi {} on axis {}", lo[axis], hi[axis], axis)))
            }
        }
        Ok(Self { lo, hi })
    }


    /**
     * Create a box from one `Range` per axis.
     */
    pub fn from_ranges(ranges: [Range<i64>; D]) -> Result<Self> {
        let mut lo = [0; D];
        let mut hi = [0; D];

        for (axis, r) in ranges.iter().enumerate() {
            lo[axis] = r.start;
            hi[axis] = r.end;
        }
        Self::new(lo, hi)
    }


    /**
     * Create a box starting at the origin with the given number of cells on
     * each axis.
     */
    pub fn from_shape(shape: [usize; D]) -> Self {
        let mut hi = [0; D];

        for axis in 0..D {
            hi[axis] = shape[axis] as i64;
        }
        Self { lo: [0; D], hi }
    }


    /**
     * Return a box with no cells, located at the origin.
     */
    pub fn empty() -> Self {
        Self { lo: [0; D], hi: [0; D] }
    }

    pub fn dim(&self) -> usize {
        D
    }


    /**
     * Return the minimum index (inclusive).
     */
    pub fn lo(&self) -> [i64; D] {
        self.lo
    }


    /**
     * Return the maximum index (exclusive).
     */
    pub fn hi(&self) -> [i64; D] {
        self.hi
    }


    /**
     * Return the index range on one axis.
     */
    pub fn axis(&self, axis: usize) -> Range<i64> {
        self.lo[axis]..self.hi[axis]
    }


    /**
     * Return the number of cells on each axis.
     */
    pub fn shape(&self) -> [usize; D] {
        let mut shape = [0; D];

        for axis in 0..D {
            shape[axis] = (self.hi[axis] - self.lo[axis]) as usize;
        }
        shape
    }


    /**
     * Return the number of cells in this box.
     */
    pub fn number_of_cells(&self) -> usize {
        self.shape().iter().product()
    }


    /**
     * Return the number of nodes (cell vertices) spanned by this box.
     */
    pub fn number_of_nodes(&self) -> usize {
        self.shape().iter().map(|n| n + 1).product()
    }


    pub fn is_empty(&self) -> bool {
        (0..D).any(|axis| self.lo[axis] == self.hi[axis])
    }


    /**
     * Determine whether this box contains the given index.
     */
    pub fn contains(&self, index: Index<D>) -> bool {
        (0..D).all(|axis| self.lo[axis] <= index[axis] && index[axis] < self.hi[axis])
    }


    /**
     * Determine whether another box is a subset of this one.
     */
    pub fn contains_box(&self, other: &Self) -> bool {
        (0..D).all(|axis| other.lo[axis] >= self.lo[axis] && other.hi[axis] <= self.hi[axis])
    }


    /**
     * Determine whether the two boxes share at least one cell. Boxes that
     * only touch end-to-end do not intersect.
     */
    pub fn intersects(&self, other: &Self) -> bool {
        (0..D).all(|axis| {
            self.lo[axis].max(other.lo[axis]) < self.hi[axis].min(other.hi[axis])
        })
    }


    /**
     * Return the cells shared by two boxes, or `None` if they do not
     * intersect.
     */
    pub fn intersect(&self, other: &Self) -> Option<Self> {
        if !self.intersects(other) {
            return None
        }
        let mut lo = [0; D];
        let mut hi = [0; D];

        for axis in 0..D {
            lo[axis] = self.lo[axis].max(other.lo[axis]);
            hi[axis] = self.hi[axis].min(other.hi[axis]);
        }
        Some(Self { lo, hi })
    }


    /**
     * Return the smallest box containing both boxes.
     */
    pub fn hull(&self, other: &Self) -> Self {
        let mut lo = [0; D];
        let mut hi = [0; D];

        for axis in 0..D {
            lo[axis] = self.lo[axis].min(other.lo[axis]);
            hi[axis] = self.hi[axis].max(other.hi[axis]);
        }
        Self { lo, hi }
    }


    /**
     * Shift this box by the given offset.
     */
    pub fn translate(&self, offset: Index<D>) -> Self {
        let mut lo = self.lo;
        let mut hi = self.hi;

        for axis in 0..D {
            lo[axis] += offset[axis];
            hi[axis] += offset[axis];
        }
        Self { lo, hi }
    }


    /**
     * Expand this box by the given number of cells on each side of every
     * axis.
     */
    pub fn extend_all(&self, delta: usize) -> Self {
        let d = delta as i64;
        let mut lo = self.lo;
        let mut hi = self.hi;

        for axis in 0..D {
            lo[axis] -= d;
            hi[axis] += d;
        }
        Self { lo, hi }
    }


    /**
     * Map this box into an index space refined by the given factors.
     */
    pub fn refine(&self, factors: &Factors<D>) -> Self {
        let mut lo = self.lo;
        let mut hi = self.hi;

        for axis in 0..D {
            lo[axis] *= factors[axis];
            hi[axis] *= factors[axis];
        }
        Self { lo, hi }
    }


    /**
     * Map this box into an index space coarsened by the given factors,
     * rounding outward so the result covers every coarse cell touched by
     * this box.
     */
    pub fn coarsen_outward(&self, factors: &Factors<D>) -> Self {
        let mut lo = self.lo;
        let mut hi = self.hi;

        for axis in 0..D {
            lo[axis] = div_floor(lo[axis], factors[axis]);
            hi[axis] = div_ceil(hi[axis], factors[axis]);
        }
        Self { lo, hi }
    }


    /**
     * Map this box into an index space coarsened by the given factors. Fails
     * with `InvalidRange` unless both corners are aligned with the coarse
     * cells.
     */
    pub fn coarsen_exact(&self, factors: &Factors<D>) -> Result<Self> {
        for axis in 0..D {
            if self.lo[axis] % factors[axis] != 0 || self.hi[axis] % factors[axis] != 0 {
                return Err(Error::InvalidRange(format!(
                    "box {} is not aligned with factor {} on axis {}", self, factors[axis], axis)))
            }
        }
        Ok(self.coarsen_outward(factors))
    }


    /**
     * Re-express this box, given relative to `parent`'s lower corner, in the
     * index space `parent` itself is expressed in. Both boxes count cells at
     * the same resolution. This is exact integer translation.
     */
    pub fn change_reference_to_global(&self, parent: &Self) -> Self {
        self.translate(parent.lo)
    }


    /**
     * Inverse of `change_reference_to_global`: re-express a box given in the
     * same index space as `parent` relative to `parent`'s lower corner.
     */
    pub fn change_reference_from_global(&self, parent: &Self) -> Self {
        let mut offset = parent.lo;

        for o in offset.iter_mut() {
            *o = -*o;
        }
        self.translate(offset)
    }


    /**
     * Return the linear offset for the given index, in a row-major memory
     * buffer aligned with the start of this box.
     */
    pub fn row_major_offset(&self, index: Index<D>) -> usize {
        let mut offset = 0;

        for axis in 0..D {
            let n = (self.hi[axis] - self.lo[axis]) as usize;
            offset = offset * n + (index[axis] - self.lo[axis]) as usize;
        }
        offset
    }


    /**
     * Return an iterator which traverses the box in row-major order (C-like;
     * the final index increases fastest).
     */
    pub fn iter(&self) -> IndexIter<D> {
        IndexIter {
            space: *self,
            next: if self.is_empty() { None } else { Some(self.lo) },
        }
    }
}




// ============================================================================
impl<const D: usize> fmt::Display for IndexBox<D> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[")?;
        for axis in 0..D {
            if axis > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{}..{}", self.lo[axis], self.hi[axis])?;
        }
        write!(f, ")")
    }
}




/**
 * Row-major iterator over the indexes of an `IndexBox`.
 */
pub struct IndexIter<const D: usize> {
    space: IndexBox<D>,
    next: Option<Index<D>>,
}

impl<const D: usize> Iterator for IndexIter<D> {
    type Item = Index<D>;

    fn next(&mut self) -> Option<Self::Item> {
        let current = self.next?;
        let mut index = current;
        let mut axis = D;

        self.next = loop {
            if axis == 0 {
                break None
            }
            axis -= 1;
            index[axis] += 1;

            if index[axis] < self.space.hi[axis] {
                break Some(index)
            }
            index[axis] = self.space.lo[axis];
        };
        Some(current)
    }
}




/**
 * The location of a grid node relative to the root: its cells, expressed in
 * the root's index space refined by the cumulative factors from the root to
 * that node. The root itself has unit factors.
 */
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct GlobalPosition<const D: usize> {
    pub cells: IndexBox<D>,
    pub factors: Factors<D>,
}




// ============================================================================
impl<const D: usize> GlobalPosition<D> {


    /**
     * The position of a root grid with the given cells.
     */
    pub fn root(cells: IndexBox<D>) -> Self {
        Self { cells, factors: [1; D] }
    }


    /**
     * Compose this (parent) position with a child box expressed in the
     * parent's local cell indexes and the child's refinement factors.
     */
    pub fn child(&self, box_in_parent: &IndexBox<D>, factors: &Factors<D>) -> Self {
        let mut cumulative = self.factors;

        for axis in 0..D {
            cumulative[axis] *= factors[axis];
        }
        Self {
            cells: box_in_parent.change_reference_to_global(&self.cells).refine(factors),
            factors: cumulative,
        }
    }


    /**
     * Inverse of `child`: recover the child's box in this node's local cell
     * indexes, and its factors relative to this node. Fails with
     * `InvalidRange` if the child is not aligned with this node's cells.
     */
    pub fn relative(&self, child: &Self) -> Result<(IndexBox<D>, Factors<D>)> {
        let mut factors = [1; D];

        for axis in 0..D {
            if child.factors[axis] % self.factors[axis] != 0 {
                return Err(Error::InvalidRange(format!(
                    "factor {} is not a multiple of {} on axis {}",
                    child.factors[axis],
                    self.factors[axis],
                    axis)))
            }
            factors[axis] = child.factors[axis] / self.factors[axis];
        }
        let cells = child.cells.coarsen_exact(&factors)?.change_reference_from_global(&self.cells);
        Ok((cells, factors))
    }


    /**
     * Return the local index of a cell given in global coordinates at this
     * position's resolution.
     */
    pub fn to_local(&self, global: Index<D>) -> Index<D> {
        let mut local = global;

        for axis in 0..D {
            local[axis] -= self.cells.lo[axis];
        }
        local
    }


    /**
     * Return the global index of a local cell index.
     */
    pub fn to_global(&self, local: Index<D>) -> Index<D> {
        let mut global = local;

        for axis in 0..D {
            global[axis] += self.cells.lo[axis];
        }
        global
    }
}




// ============================================================================
#[cfg(test)]
mod test {

    use super::*;

    #[test]
    fn rejects_inverted_range() {
        assert!(matches!(IndexBox::new([0, 4], [3, 2]), Err(Error::InvalidRange(_))));
        assert!(IndexBox::new([2], [2]).unwrap().is_empty());
        assert!(IndexBox::<3>::empty().is_empty());
        assert_eq!(IndexBox::<3>::empty().dim(), 3);
    }

    #[test]
    fn counts_cells_and_nodes() {
        let b = IndexBox::new([1, 0], [4, 3]).unwrap();
        assert_eq!(b.shape(), [3, 3]);
        assert_eq!(b.number_of_cells(), 9);
        assert_eq!(b.number_of_nodes(), 16);
        assert!(b.contains([3, 2]));
        assert!(!b.contains([4, 2]));
    }

    #[test]
    fn intersection_of_touching_boxes_is_none() {
        let a = IndexBox::new([0, 0], [2, 2]).unwrap();
        let b = IndexBox::new([2, 0], [4, 2]).unwrap();
        let c = IndexBox::new([1, 1], [3, 5]).unwrap();
        assert!(a.intersect(&b).is_none());
        assert_eq!(a.intersect(&c), Some(IndexBox::new([1, 1], [2, 2]).unwrap()));
        assert_eq!(a.hull(&b), IndexBox::new([0, 0], [4, 2]).unwrap());
    }

    #[test]
    fn iteration_is_row_major() {
        let b = IndexBox::new([0, 5], [2, 7]).unwrap();
        let indexes: Vec<_> = b.iter().collect();
        assert_eq!(indexes, vec![[0, 5], [0, 6], [1, 5], [1, 6]]);

        for (n, index) in b.iter().enumerate() {
            assert_eq!(b.row_major_offset(index), n);
        }
        assert_eq!(IndexBox::new([0, 0], [0, 3]).unwrap().iter().count(), 0);
    }

    #[test]
    fn coarsening_rounds_outward_for_negative_indexes() {
        let b = IndexBox::new([-3], [5]).unwrap();
        assert_eq!(b.coarsen_outward(&[2]), IndexBox::new([-2], [3]).unwrap());
        assert!(b.coarsen_exact(&[2]).is_err());
        assert_eq!(b.refine(&[2]).coarsen_exact(&[2]).unwrap(), b);
    }

    #[test]
    fn change_of_reference_round_trips() {
        let parent = IndexBox::new([3, 7], [9, 12]).unwrap();
        let child = IndexBox::new([1, 0], [4, 2]).unwrap();
        let global = child.change_reference_to_global(&parent);
        assert_eq!(global, IndexBox::new([4, 7], [7, 9]).unwrap());
        assert_eq!(global.change_reference_from_global(&parent), child);
    }

    #[test]
    fn positions_compose_through_a_factor_chain() {
        let root = GlobalPosition::root(IndexBox::from_shape([5, 5]));
        let b1 = IndexBox::new([1, 0], [4, 3]).unwrap();
        let b2 = IndexBox::new([2, 1], [5, 6]).unwrap();
        let p1 = root.child(&b1, &[2, 3]);
        let p2 = p1.child(&b2, &[4, 1]);

        assert_eq!(p1.cells, IndexBox::new([2, 0], [8, 9]).unwrap());
        assert_eq!(p2.factors, [8, 3]);
        assert_eq!(p2.cells, IndexBox::new([16, 1], [28, 6]).unwrap());
        assert_eq!(p1.relative(&p2).unwrap(), (b2, [4, 1]));
        assert_eq!(root.relative(&p1).unwrap(), (b1, [2, 3]));
        assert!(root.relative(&p2).is_err());
    }
}
