use log::info;
use crate::attribute::AmrAttribute;
use crate::cartesian_grid::CartesianGrid;
use crate::error::{Error, Result};
use crate::index_box::{GlobalPosition, Index};
use crate::transfer::{common_resolution, project_cells};
use crate::tree::MeshTree;




fn same_domain<const D: usize>(a: &CartesianGrid<D>, b: &CartesianGrid<D>) -> bool {
    let close = |x: f64, y: f64| (x - y).abs() <= 1e-12 * x.abs().max(y.abs()).max(1.0);

    a.node_counts() == b.node_counts() &&
    (0..D).all(|axis| close(a.origin()[axis], b.origin()[axis]) && close(a.cell_size()[axis], b.cell_size()[axis]))
}




// ============================================================================
impl<'a, const D: usize> AmrAttribute<'a, D> {


    /**
     * Resample this attribute onto another tree over the same root grid.
     * Each interior cell of the new attribute is filled from the nodes of
     * this attribute's tree covering it, coarsest level first, so a cell
     * ends up with the finest data fully covering it: injected where the
     * source is coarser, condensed where it is finer. Ghost cells of the
     * result are zero.
     */
    pub fn project_to<'b>(&self, other: &'b MeshTree<D>) -> Result<AmrAttribute<'b, D>> {
        let source = self.storage()?;

        if !same_domain(self.tree.grid(self.tree.root())?, other.grid(other.root())?) {
            return Err(Error::StructuralMismatch("the trees do not share a root grid".into()))
        }
        let mut result = AmrAttribute::with_fields(other, self.fields.clone(), self.ghost)?;
        result.alloc()?;

        let mut sources: Vec<_> = self.tree
            .all_nodes()
            .into_iter()
            .map(|n| Ok((self.tree.level(n)?, n, self.tree.position_relative_to_root(n)?)))
            .collect::<Result<Vec<(usize, _, GlobalPosition<D>)>>>()?;

        sources.sort_by_key(|(level, _, _)| *level);

        let mut written = 0;

        for dst in other.all_nodes() {
            let dst_position = other.position_relative_to_root(dst)?;
            let dst_footprint = dst_position.cells.coarsen_outward(&dst_position.factors);
            let targets = result.storage_mut()?.get_mut(&dst).ok_or(Error::UnknownNode(dst.index()))?;
            let cells: Vec<Index<D>> = other.grid(dst)?.cell_box().iter().collect();

            for (_, src, src_position) in &sources {
                if !dst_footprint.intersects(&src_position.cells.coarsen_outward(&src_position.factors)) {
                    continue
                }
                let arrays = source.get(src).ok_or(Error::UnknownNode(src.index()))?;
                let through = common_resolution(&src_position.factors, &dst_position.factors);

                for ((field, s), t) in self.fields.iter().zip(arrays).zip(targets.iter_mut()) {
                    written += project_cells(s, src_position, &s.interior(), t, &dst_position, &cells, &through, field.nature)?;
                }
            }
        }
        info!("projected {} fields from {} nodes onto {} nodes ({} values written)",
            self.fields.len(),
            sources.len(),
            other.all_nodes().len(),
            written);

        Ok(result)
    }
}




// ============================================================================
#[cfg(test)]
mod test {

    use super::*;
    use crate::index_box::IndexBox;
    use crate::transfer::Nature;

    fn line() -> MeshTree<1> {
        MeshTree::new(CartesianGrid::from_cell_counts([4], [0.0], [1.0]).unwrap())
    }

    #[test]
    fn projection_onto_a_differently_refined_tree() {
        let mut a = line();
        let pa = a.add_patch(a.root(), IndexBox::new([1], [3]).unwrap(), [2]).unwrap();

        let mut b = line();
        let pb = b.add_patch(b.root(), IndexBox::new([0], [2]).unwrap(), [4]).unwrap();

        let mut att = AmrAttribute::new(&a, &[("u", 1)], 1).unwrap();
        att.spill_natures(&[Nature::IntensiveMaximum]).unwrap();
        att.alloc().unwrap();
        att.set_field_interior(a.root(), "u", &[1.0, 2.0, 3.0, 4.0]).unwrap();
        att.set_field_interior(pa, "u", &[10.0, 20.0, 30.0, 40.0]).unwrap();

        let projected = att.project_to(&b).unwrap();

        assert_eq!(projected.nature("u").unwrap(), Nature::IntensiveMaximum);
        assert_eq!(projected.get_field_on(b.root(), "u").unwrap(), vec![1.0, 15.0, 35.0, 4.0]);
        assert_eq!(projected.get_field_on(pb, "u").unwrap(), vec![1.0, 1.0, 1.0, 1.0, 10.0, 10.0, 20.0, 20.0]);
    }

    #[test]
    fn projection_onto_the_same_layout_keeps_synchronized_data() {
        let mut a = line();
        let pa = a.add_patch(a.root(), IndexBox::new([1], [3]).unwrap(), [2]).unwrap();
        let b = a.clone();

        let mut att = AmrAttribute::new(&a, &[("u", 1)], 2).unwrap();
        att.spill_natures(&[Nature::IntensiveMaximum]).unwrap();
        att.alloc().unwrap();
        att.set_field_interior(pa, "u", &[2.0, 4.0, 6.0, 8.0]).unwrap();
        att.synchronize_fine_to_coarse().unwrap();

        let projected = att.project_to(&b).unwrap();

        for node in a.all_nodes() {
            assert_eq!(projected.get_field_on(node, "u").unwrap(), att.get_field_on(node, "u").unwrap());
        }
    }

    #[test]
    fn projection_requires_the_same_root_grid() {
        let a = line();
        let b = MeshTree::new(CartesianGrid::from_cell_counts([5], [0.0], [1.0]).unwrap());
        let mut att = AmrAttribute::new(&a, &[("u", 1)], 1).unwrap();

        assert!(matches!(att.project_to(&b), Err(Error::UnallocatedAttribute)));
        att.alloc().unwrap();
        assert!(matches!(att.project_to(&b), Err(Error::StructuralMismatch(_))));
    }
}
