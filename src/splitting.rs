use std::collections::VecDeque;
use serde::{Deserialize, Serialize};
use crate::error::{Error, Result};
use crate::index_box::{Index, IndexBox};




/**
 * Tuning parameters for building patches from a refinement criterion.
 */
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BoxSplittingOptions {
    /// A box is accepted as-is once this fraction of its cells are flagged.
    pub efficiency: f64,
    /// Below this fraction of flagged cells a box is simply halved.
    pub efficiency_snd: f64,
    /// Cuts never leave a part narrower than this many cells.
    pub min_cell_direction: usize,
    /// Boxes with at least this many cells are split further.
    pub max_cells: usize,
}

impl Default for BoxSplittingOptions {
    fn default() -> Self {
        Self {
            efficiency: 0.5,
            efficiency_snd: 0.5,
            min_cell_direction: 2,
            max_cells: 1000,
        }
    }
}




/**
 * A candidate box, already shrunk to the bounding box of its flagged cells.
 */
#[derive(Clone, Copy, Debug)]
struct Candidate<const D: usize> {
    part: IndexBox<D>,
    flagged: usize,
}

impl<const D: usize> Candidate<D> {
    fn efficiency(&self) -> f64 {
        self.flagged as f64 / self.part.number_of_cells() as f64
    }
}




/**
 * A boolean flag per cell of a grid, stored in row-major order.
 */
struct Criterion<'a, const D: usize> {
    cells: IndexBox<D>,
    flags: &'a [bool],
}




// ============================================================================
impl<'a, const D: usize> Criterion<'a, D> {

    fn is_flagged(&self, index: Index<D>) -> bool {
        self.flags[self.cells.row_major_offset(index)]
    }

    fn minimal_part(&self, part: &IndexBox<D>) -> Option<Candidate<D>> {
        let mut hull: Option<IndexBox<D>> = None;
        let mut flagged = 0;

        for index in part.iter().filter(|&i| self.is_flagged(i)) {
            let mut hi = index;

            for h in hi.iter_mut() {
                *h += 1;
            }
            let cell = IndexBox::new(index, hi).ok()?;
            hull = Some(hull.map_or(cell, |h| h.hull(&cell)));
            flagged += 1;
        }
        hull.map(|part| Candidate { part, flagged })
    }


    /**
     * Return the number of flagged cells in each slab of a box perpendicular
     * to the given axis.
     */
    fn signature(&self, part: &IndexBox<D>, axis: usize) -> Vec<i64> {
        let lo = part.lo()[axis];
        let mut signature = vec![0; part.shape()[axis]];

        for index in part.iter().filter(|&i| self.is_flagged(i)) {
            signature[(index[axis] - lo) as usize] += 1;
        }
        signature
    }
}




/**
 * Return the relative cut positions on an axis of the given length which
 * leave at least `min_width` cells on each side.
 */
fn allowed_cuts(len: usize, min_width: usize) -> core::ops::RangeInclusive<usize> {
    let m = min_width.max(1);

    if len < 2 * m {
        1..=0
    } else {
        m..=len - m
    }
}

fn distance_to_center(cut: usize, len: usize) -> f64 {
    (cut as f64 - 0.5 * len as f64).abs()
}


/**
 * Cut through an empty slab, the one closest to the middle of the first axis
 * that has any.
 */
fn find_hole<const D: usize>(
    criterion: &Criterion<D>,
    candidate: &Candidate<D>,
    options: &BoxSplittingOptions) -> Option<(usize, i64)>
{
    for axis in 0..D {
        let signature = criterion.signature(&candidate.part, axis);
        let len = signature.len();

        let best = allowed_cuts(len, options.min_cell_direction)
            .filter(|&r| signature[r] == 0)
            .min_by(|&a, &b| distance_to_center(a, len).total_cmp(&distance_to_center(b, len)));

        if let Some(r) = best {
            return Some((axis, candidate.part.lo()[axis] + r as i64))
        }
    }
    None
}


/**
 * Cut where the second derivative of the signature changes sign most
 * sharply, over all axes. Ties go to the longer axis, then to the cut
 * closest to the middle.
 */
fn find_inflection<const D: usize>(
    criterion: &Criterion<D>,
    candidate: &Candidate<D>,
    options: &BoxSplittingOptions) -> Option<(usize, i64)>
{
    let mut best: Option<(i64, usize, usize, usize)> = None;

    for axis in 0..D {
        let signature = criterion.signature(&candidate.part, axis);
        let len = signature.len();

        if len < 4 {
            continue
        }
        let d2: Vec<i64> = signature.windows(3).map(|w| w[0] - 2 * w[1] + w[2]).collect();
        let cuts = allowed_cuts(len, options.min_cell_direction);

        for j in 0..d2.len() - 1 {
            let r = j + 2;
            let strength = (d2[j + 1] - d2[j]).abs();

            if d2[j] * d2[j + 1] > 0 || strength == 0 || !cuts.contains(&r) {
                continue
            }
            let better = match best {
                None => true,
                Some((s, a, c, l)) => {
                    strength > s || (strength == s && (
                        (a != axis && len > l) ||
                        (a == axis && distance_to_center(r, len) < distance_to_center(c, l))))
                }
            };
            if better {
                best = Some((strength, axis, r, len));
            }
        }
    }
    best.map(|(_, axis, r, _)| (axis, candidate.part.lo()[axis] + r as i64))
}


/**
 * Halve a sparse box along its widest axis, or dissect a dense but oversized
 * box where the two halves are most evenly efficient.
 */
fn halve_or_dissect<const D: usize>(
    criterion: &Criterion<D>,
    candidate: &Candidate<D>,
    options: &BoxSplittingOptions) -> Option<(usize, i64)>
{
    let shape = candidate.part.shape();
    let axis = (0..D).fold(0, |widest, a| if shape[a] > shape[widest] { a } else { widest });
    let len = shape[axis];
    let lo = candidate.part.lo()[axis];
    let cuts = allowed_cuts(len, options.min_cell_direction);

    if cuts.is_empty() {
        return None
    }
    if candidate.efficiency() <= options.efficiency_snd {
        return Some((axis, lo + (len / 2) as i64))
    }
    if candidate.part.number_of_cells() <= options.max_cells {
        return None
    }
    let balance = |r: usize| {
        let (left, right) = match split_at(&candidate.part, axis, lo + r as i64) {
            Ok(halves) => halves,
            Err(_) => return f64::INFINITY,
        };
        let e0 = criterion.minimal_part(&left).map_or(0.0, |c| c.efficiency());
        let e1 = criterion.minimal_part(&right).map_or(0.0, |c| c.efficiency());

        if e0.min(e1) == 0.0 { f64::INFINITY } else { e0.max(e1) / e0.min(e1) }
    };
    cuts.min_by(|&a, &b| {
        balance(a)
            .total_cmp(&balance(b))
            .then(distance_to_center(a, len).total_cmp(&distance_to_center(b, len)))
    })
    .map(|r| (axis, lo + r as i64))
}

fn split_at<const D: usize>(part: &IndexBox<D>, axis: usize, place: i64) -> Result<(IndexBox<D>, IndexBox<D>)> {
    let mut left_hi = part.hi();
    let mut right_lo = part.lo();

    left_hi[axis] = place;
    right_lo[axis] = place;

    Ok((IndexBox::new(part.lo(), left_hi)?, IndexBox::new(right_lo, part.hi())?))
}




/**
 * Cover the flagged cells of a grid with disjoint boxes by recursive
 * bisection. The criterion is row-major over a grid of the given shape. The
 * boxes are returned in the order they were accepted.
 */
pub fn split_criterion<const D: usize>(
    shape: [usize; D],
    flags: &[bool],
    options: &BoxSplittingOptions) -> Result<Vec<IndexBox<D>>>
{
    let cells = IndexBox::from_shape(shape);

    if flags.len() != cells.number_of_cells() {
        return Err(Error::StructuralMismatch(format!(
            "criterion has {} values for {} cells", flags.len(), cells.number_of_cells())))
    }
    let criterion = Criterion { cells, flags };
    let mut pending: VecDeque<_> = criterion.minimal_part(&cells).into_iter().collect();
    let mut accepted = Vec::new();

    while let Some(candidate) = pending.pop_front() {
        if candidate.efficiency() >= options.efficiency && candidate.part.number_of_cells() < options.max_cells {
            accepted.push(candidate.part);
            continue
        }
        let cut = find_hole(&criterion, &candidate, options)
            .or_else(|| find_inflection(&criterion, &candidate, options))
            .or_else(|| halve_or_dissect(&criterion, &candidate, options));

        match cut {
            Some((axis, place)) => {
                let (left, right) = split_at(&candidate.part, axis, place)?;
                pending.extend(criterion.minimal_part(&left));
                pending.extend(criterion.minimal_part(&right));
            }
            None => accepted.push(candidate.part),
        }
    }
    Ok(accepted)
}




// ============================================================================
#[cfg(test)]
mod test {

    use super::*;

    fn boxed(lo: [i64; 2], hi: [i64; 2]) -> IndexBox<2> {
        IndexBox::new(lo, hi).unwrap()
    }

    fn flags<F: Fn([i64; 2]) -> bool>(shape: [usize; 2], f: F) -> Vec<bool> {
        IndexBox::from_shape(shape).iter().map(f).collect()
    }

    #[test]
    fn dense_region_becomes_its_bounding_box() {
        let crit = flags([8, 8], |i| (2..5).contains(&i[0]) && (3..7).contains(&i[1]));
        let boxes = split_criterion([8, 8], &crit, &BoxSplittingOptions::default()).unwrap();
        assert_eq!(boxes, vec![boxed([2, 3], [5, 7])]);
    }

    #[test]
    fn empty_slab_separates_two_regions() {
        let crit = flags([10, 4], |i| i[0] < 2 || i[0] >= 8);
        let boxes = split_criterion([10, 4], &crit, &BoxSplittingOptions::default()).unwrap();
        assert_eq!(boxes, vec![boxed([0, 0], [2, 4]), boxed([8, 0], [10, 4])]);
    }

    #[test]
    fn l_shape_is_cut_at_the_inflection() {
        let crit = flags([8, 8], |i| i[0] < 2 || i[1] < 2);
        let boxes = split_criterion([8, 8], &crit, &BoxSplittingOptions::default()).unwrap();
        assert_eq!(boxes, vec![boxed([0, 0], [2, 8]), boxed([2, 0], [8, 2])]);
    }

    #[test]
    fn oversized_boxes_are_dissected() {
        let options = BoxSplittingOptions { max_cells: 40, ..Default::default() };
        let crit = flags([12, 6], |_| true);
        let boxes = split_criterion([12, 6], &crit, &options).unwrap();

        assert!(boxes.len() >= 2);
        assert!(boxes.iter().all(|b| b.number_of_cells() < 40));
        assert_eq!(boxes.iter().map(|b| b.number_of_cells()).sum::<usize>(), 72);
    }

    #[test]
    fn nothing_flagged_gives_no_boxes() {
        let boxes = split_criterion([4, 4], &[false; 16], &BoxSplittingOptions::default()).unwrap();
        assert!(boxes.is_empty());
        assert!(split_criterion([4, 4], &[false; 15], &BoxSplittingOptions::default()).is_err());
    }
}
