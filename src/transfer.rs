//! Transfer operators between the arrays of nested grid nodes.
//!
//! Coarse-to-fine transfer is injection: a fine cell takes the value of the
//! coarse cell containing it. Fine-to-coarse transfer is condensation: a coarse
//! cell receives the sum (extensive fields) or the mean (intensive fields) of
//! the fine cells it contains. With integer factors a coarse cell always
//! contains exactly `Π factors[d]` fine cells, so both operators are exact.

use serde::{Deserialize, Serialize};
use crate::error::{Error, Result};
use crate::index_box::{check_factors, div_floor, gcd, Factors, GlobalPosition, Index, IndexBox};
use crate::patch::PatchData;




/**
 * How a field condenses from fine cells onto a coarse cell.
 */
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Nature {
    /// A totalizable quantity (mass, energy): fine values are summed.
    Extensive,
    /// A density or mean quantity (temperature): fine values are averaged.
    IntensiveMaximum,
}

impl Default for Nature {
    fn default() -> Self {
        Nature::Extensive
    }
}




// ============================================================================
fn check_components<const D: usize>(a: &PatchData<D>, b: &PatchData<D>) -> Result<()> {
    if a.components() != b.components() {
        Err(Error::StructuralMismatch(format!(
            "{} components versus {} components", a.components(), b.components())))
    } else {
        Ok(())
    }
}

fn check_fine_shape<const D: usize>(
    coarse: &PatchData<D>,
    fine: &PatchData<D>,
    fine_box_in_coarse: &IndexBox<D>,
    factors: &Factors<D>) -> Result<()>
{
    check_factors(factors)?;
    check_components(coarse, fine)?;

    if !coarse.interior().contains_box(fine_box_in_coarse) {
        return Err(Error::OutOfRange(format!(
            "fine box {} is not inside the coarse cells {}", fine_box_in_coarse, coarse.interior())))
    }
    if fine_box_in_coarse.refine(factors).shape() != fine.shape() {
        return Err(Error::StructuralMismatch(format!(
            "fine data has shape {:?} but box {} refined by {:?} has shape {:?}",
            fine.shape(),
            fine_box_in_coarse,
            factors,
            fine_box_in_coarse.refine(factors).shape())))
    }
    Ok(())
}


/**
 * Return the coarse cell containing a fine cell. Both are local indexes; the
 * fine one may lie in the ghost zone.
 */
fn coarse_cell_of<const D: usize>(fine: Index<D>, fine_box_in_coarse: &IndexBox<D>, factors: &Factors<D>) -> Index<D> {
    let mut coarse = fine;
    let lo = fine_box_in_coarse.lo();

    for axis in 0..D {
        coarse[axis] = lo[axis] + div_floor(fine[axis], factors[axis]);
    }
    coarse
}

fn inject<const D: usize, I>(
    coarse: &PatchData<D>,
    fine: &mut PatchData<D>,
    fine_box_in_coarse: &IndexBox<D>,
    factors: &Factors<D>,
    cells: I) -> usize
where
    I: IntoIterator<Item = Index<D>>
{
    let space = coarse.index_space();
    let mut count = 0;

    for f in cells {
        let c = coarse_cell_of(f, fine_box_in_coarse, factors);

        if space.contains(c) {
            fine.get_slice_mut(f).copy_from_slice(coarse.get_slice(c));
            count += 1;
        }
    }
    count
}


/**
 * Fill the interior of `fine` by injection from `coarse`. `fine` refines the
 * cells `fine_box_in_coarse` of `coarse` by `factors`.
 */
pub fn spread_coarse_to_fine<const D: usize>(
    coarse: &PatchData<D>,
    fine: &mut PatchData<D>,
    fine_box_in_coarse: &IndexBox<D>,
    factors: &Factors<D>) -> Result<()>
{
    check_fine_shape(coarse, fine, fine_box_in_coarse, factors)?;
    let cells = fine.interior();
    inject(coarse, fine, fine_box_in_coarse, factors, cells.iter());
    Ok(())
}


/**
 * Fill the interior and ghost cells of `fine` by injection from `coarse`.
 * Fine ghost cells take the value of the coarse cell (interior or ghost)
 * geometrically containing them; those falling outside the coarse ghost zone
 * are left untouched. Returns the number of fine cells written.
 */
pub fn spread_coarse_to_fine_ghost<const D: usize>(
    coarse: &PatchData<D>,
    fine: &mut PatchData<D>,
    fine_box_in_coarse: &IndexBox<D>,
    factors: &Factors<D>) -> Result<usize>
{
    check_fine_shape(coarse, fine, fine_box_in_coarse, factors)?;
    let cells = fine.index_space();
    Ok(inject(coarse, fine, fine_box_in_coarse, factors, cells.iter()))
}


/**
 * Like `spread_coarse_to_fine_ghost`, but only the ghost cells of `fine` are
 * written; its interior is left as is.
 */
pub fn spread_coarse_to_fine_ghost_zone<const D: usize>(
    coarse: &PatchData<D>,
    fine: &mut PatchData<D>,
    fine_box_in_coarse: &IndexBox<D>,
    factors: &Factors<D>) -> Result<usize>
{
    check_fine_shape(coarse, fine, fine_box_in_coarse, factors)?;
    let cells: Vec<_> = fine.ghost_cells().collect();
    Ok(inject(coarse, fine, fine_box_in_coarse, factors, cells))
}


/**
 * Overwrite the coarse cells `fine_box_in_coarse` with the condensation of
 * the interior of `fine`: for each component, the sum of the `Π factors[d]`
 * fine values inside each coarse cell, divided by that count for intensive
 * fields.
 */
pub fn condense_fine_to_coarse<const D: usize>(
    coarse: &mut PatchData<D>,
    fine: &PatchData<D>,
    fine_box_in_coarse: &IndexBox<D>,
    factors: &Factors<D>,
    nature: Nature) -> Result<()>
{
    check_fine_shape(coarse, fine, fine_box_in_coarse, factors)?;

    let block = IndexBox::from_shape(factors.map(|f| f as usize));
    let divisor = divisor_for(nature, &block);
    let lo = fine_box_in_coarse.lo();
    let mut sum = vec![0.0; fine.components()];

    for c in fine_box_in_coarse.iter() {
        let mut first = c;

        for axis in 0..D {
            first[axis] = (c[axis] - lo[axis]) * factors[axis];
        }
        accumulate(fine, &block.translate(first), &mut sum);

        for (y, s) in coarse.get_slice_mut(c).iter_mut().zip(&sum) {
            *y = s / divisor;
        }
    }
    Ok(())
}

fn divisor_for<const D: usize>(nature: Nature, block: &IndexBox<D>) -> f64 {
    match nature {
        Nature::Extensive => 1.0,
        Nature::IntensiveMaximum => block.number_of_cells() as f64,
    }
}

fn accumulate<const D: usize>(data: &PatchData<D>, cells: &IndexBox<D>, sum: &mut [f64]) {
    sum.iter_mut().for_each(|s| *s = 0.0);

    for index in cells.iter() {
        for (acc, x) in sum.iter_mut().zip(data.get_slice(index)) {
            *acc += x;
        }
    }
}




/**
 * Return the local indexes of ghost cells lying outside the interior on at
 * least two axes, for a node of the given interior shape. These are the
 * cells diagonal neighbors are seen through.
 */
pub fn compute_corners_ghost<const D: usize>(shape: [usize; D], ghost: usize) -> Vec<Index<D>> {
    ghost_cells_by_outside_axes(shape, ghost, |n| n >= 2)
}


/**
 * Return the local indexes of ghost cells lying outside the interior on
 * exactly one axis.
 */
pub fn compute_faces_ghost<const D: usize>(shape: [usize; D], ghost: usize) -> Vec<Index<D>> {
    ghost_cells_by_outside_axes(shape, ghost, |n| n == 1)
}

fn ghost_cells_by_outside_axes<const D: usize, F>(shape: [usize; D], ghost: usize, keep: F) -> Vec<Index<D>>
where
    F: Fn(usize) -> bool
{
    let interior = IndexBox::from_shape(shape);

    interior
        .extend_all(ghost)
        .iter()
        .filter(|&index| {
            let outside = (0..D).filter(|&a| !interior.axis(a).contains(&index[a])).count();
            keep(outside)
        })
        .collect()
}


/**
 * Return the finest resolution both factors are multiples of: their per-axis
 * greatest common divisor.
 */
pub fn common_resolution<const D: usize>(a: &Factors<D>, b: &Factors<D>) -> Factors<D> {
    let mut common = [1; D];

    for axis in 0..D {
        common[axis] = gcd(a[axis], b[axis]);
    }
    common
}


/**
 * Fill cells of `dst` from the valid region of `src`, where both nodes are
 * located by their positions relative to the root. Each destination cell is
 * taken to the resolution `through` (cumulative factors that divide those of
 * both nodes); the source cells filling that cell are condensed according to
 * `nature` and the result is injected. A destination cell is skipped unless
 * its whole source block lies inside `src_valid` (in `src` local indexes).
 * Returns the number of destination cells written.
 *
 * `src_valid` and every destination cell must lie inside the ghosted storage
 * of their arrays, otherwise `Error::OutOfRange` is returned and nothing is
 * written.
 */
pub fn project_cells<const D: usize>(
    src: &PatchData<D>,
    src_position: &GlobalPosition<D>,
    src_valid: &IndexBox<D>,
    dst: &mut PatchData<D>,
    dst_position: &GlobalPosition<D>,
    dst_cells: &[Index<D>],
    through: &Factors<D>,
    nature: Nature) -> Result<usize>
{
    check_components(src, dst)?;
    check_factors(through)?;

    if !src.index_space().contains_box(src_valid) {
        return Err(Error::OutOfRange(format!(
            "source region {} is outside the storage {}",
            src_valid,
            src.index_space())))
    }
    if let Some(d) = dst_cells.iter().find(|&&d| !dst.index_space().contains(d)) {
        return Err(Error::OutOfRange(format!(
            "destination cell {:?} is outside the storage {}",
            d,
            dst.index_space())))
    }
    let mut src_ratio = [1; D];
    let mut dst_ratio = [1; D];

    for axis in 0..D {
        if src_position.factors[axis] % through[axis] != 0 || dst_position.factors[axis] % through[axis] != 0 {
            return Err(Error::InvalidFactor(through.to_vec()))
        }
        src_ratio[axis] = src_position.factors[axis] / through[axis];
        dst_ratio[axis] = dst_position.factors[axis] / through[axis];
    }
    let block = IndexBox::from_shape(src_ratio.map(|r| r as usize));
    let divisor = divisor_for(nature, &block);
    let mut sum = vec![0.0; src.components()];
    let mut count = 0;

    for &d in dst_cells {
        let global = dst_position.to_global(d);
        let mut first = [0; D];

        for axis in 0..D {
            first[axis] = div_floor(global[axis], dst_ratio[axis]) * src_ratio[axis];
        }
        let sources = block.translate(src_position.to_local(first));

        if !src_valid.contains_box(&sources) {
            continue
        }
        if block.number_of_cells() == 1 {
            dst.get_slice_mut(d).copy_from_slice(src.get_slice(sources.lo()));
        } else {
            accumulate(src, &sources, &mut sum);

            for (y, s) in dst.get_slice_mut(d).iter_mut().zip(&sum) {
                *y = s / divisor;
            }
        }
        count += 1;
    }
    Ok(count)
}
