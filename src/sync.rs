use log::{debug, warn};
use crate::attribute::{AmrAttribute, FieldDescriptor};
use crate::error::{Error, Result};
use crate::index_box::{GlobalPosition, Index, IndexBox};
use crate::patch::PatchData;
use crate::transfer::{
    compute_corners_ghost,
    compute_faces_ghost,
    condense_fine_to_coarse,
    project_cells,
    spread_coarse_to_fine_ghost,
    spread_coarse_to_fine_ghost_zone,
};
use crate::tree::NodeId;




/**
 * Return the root cells touched by a node grown by `ghost` of its own cells.
 */
fn footprint_in_root<const D: usize>(position: &GlobalPosition<D>, ghost: usize) -> IndexBox<D> {
    position.cells.extend_all(ghost).coarsen_outward(&position.factors)
}




// ============================================================================
impl<'a, const D: usize> AmrAttribute<'a, D> {


    /**
     * Run an operation on the arrays of two distinct nodes, the first
     * mutably. The destination arrays are taken out of storage for the
     * duration of the call.
     */
    fn with_pair<F>(&mut self, dst: NodeId, src: NodeId, mut op: F) -> Result<usize>
    where
        F: FnMut(&[FieldDescriptor], &mut [PatchData<D>], &[PatchData<D>]) -> Result<usize>
    {
        if dst == src {
            return Ok(0)
        }
        let fields = &self.fields;
        let storage = self.storage.as_mut().ok_or(Error::UnallocatedAttribute)?;
        let mut target = storage.remove(&dst).ok_or(Error::UnknownNode(dst.index()))?;

        let result = match storage.get(&src) {
            Some(source) => op(fields, &mut target, source),
            None => Err(Error::UnknownNode(src.index())),
        };
        storage.insert(dst, target);
        result
    }

    fn condense_into_father(&mut self, node: NodeId) -> Result<()> {
        let tree = self.tree;
        let grid_node = tree.node(node)?;

        let father = match grid_node.parent() {
            Some(father) => father,
            None => return Ok(()),
        };
        let cells = grid_node.patch_box();
        let factors = grid_node.factors();

        self.with_pair(father, node, |fields, coarse, fine| {
            for (n, field) in fields.iter().enumerate() {
                condense_fine_to_coarse(&mut coarse[n], &fine[n], &cells, &factors, field.nature)?;
            }
            Ok(0)
        })?;
        Ok(())
    }

    fn spread_from_father(&mut self, node: NodeId, ghost_zone_only: bool) -> Result<usize> {
        let tree = self.tree;
        let grid_node = tree.node(node)?;

        let father = match grid_node.parent() {
            Some(father) => father,
            None => return Ok(0),
        };
        let cells = grid_node.patch_box();
        let factors = grid_node.factors();

        self.with_pair(node, father, |_, fine, coarse| {
            let mut written = 0;
            let mut missed = 0;

            for (f, c) in fine.iter_mut().zip(coarse) {
                let (n, expected) = if ghost_zone_only {
                    let ghost_cells = f.index_space().number_of_cells() - f.interior().number_of_cells();
                    (spread_coarse_to_fine_ghost_zone(c, f, &cells, &factors)?, ghost_cells)
                } else {
                    (spread_coarse_to_fine_ghost(c, f, &cells, &factors)?, f.index_space().number_of_cells())
                };
                written += n;
                missed += expected - n;
            }
            if missed > 0 {
                warn!("{} cells of node {} lie beyond the ghost zone of its father and were not filled", missed, node);
            }
            Ok(written)
        })
    }


    /**
     * Overwrite the ghost cells of `dst` (faces first, then corners) that lie
     * inside the interior of `src`. Nodes at the same resolution copy cells
     * directly; otherwise the source is condensed to the resolution of the
     * nearest common ancestor of both nodes and injected from there. Returns
     * the number of values written.
     */
    fn fill_ghosts_from(&mut self, dst: NodeId, src: NodeId) -> Result<usize> {
        let tree = self.tree;
        let ghost = self.ghost;
        let dst_position = tree.position_relative_to_root(dst)?;
        let src_position = tree.position_relative_to_root(src)?;

        if ghost == 0 || !footprint_in_root(&dst_position, ghost).intersects(&footprint_in_root(&src_position, 0)) {
            return Ok(0)
        }
        let through = if src_position.factors == dst_position.factors {
            dst_position.factors
        } else {
            tree.position_relative_to_root(tree.common_ancestor(dst, src)?)?.factors
        };
        let shape = tree.grid(dst)?.cell_counts();
        let cells: Vec<Index<D>> = compute_faces_ghost(shape, ghost)
            .into_iter()
            .chain(compute_corners_ghost(shape, ghost))
            .collect();

        self.with_pair(dst, src, |fields, target, source| {
            let mut written = 0;

            for (n, field) in fields.iter().enumerate() {
                written += project_cells(
                    &source[n],
                    &src_position,
                    &source[n].interior(),
                    &mut target[n],
                    &dst_position,
                    &cells,
                    &through,
                    field.nature)?;
            }
            Ok(written)
        })
    }


    /**
     * Fill the ghost cells of every node at a level from the interiors of
     * the other nodes at that level and at the level above, the latter
     * first. Sources are visited in depth-first order, so where two sources
     * cover the same ghost cell the later one wins.
     */
    fn exchange_at_level(&mut self, level: usize) -> Result<usize> {
        if level == 0 {
            return Ok(0)
        }
        let tree = self.tree;
        let nodes = tree.nodes_at_level(level);
        let uncles = tree.nodes_at_level(level - 1);
        let mut written = 0;

        for &node in &nodes {
            let father = tree.father(node)?;

            for &uncle in uncles.iter().filter(|&&u| Some(u) != father) {
                written += self.fill_ghosts_from(node, uncle)?;
            }
            for &other in &nodes {
                written += self.fill_ghosts_from(node, other)?;
            }
        }
        Ok(written)
    }


    /**
     * Overwrite, from the finest level upward, the interior cells of every
     * node covered by a patch with the condensation of that patch.
     */
    pub fn synchronize_fine_to_coarse(&mut self) -> Result<()> {
        self.storage()?;

        for node in self.tree.all_nodes().into_iter().rev() {
            self.condense_into_father(node)?;
        }
        debug!("synchronized fine to coarse over {} levels", self.tree.max_number_of_levels());
        Ok(())
    }


    /**
     * Condense every level from `fine` down to `coarse`, one level at a
     * time, so that the coarse level sees the data of level `fine`. Requires
     * `fine > coarse`.
     */
    pub fn synchronize_fine_to_coarse_between(&mut self, fine: usize, coarse: usize) -> Result<()> {
        if fine <= coarse {
            return Err(Error::InvalidRange(format!(
                "fine to coarse synchronization from level {} to level {}", fine, coarse)))
        }
        self.storage()?;

        for level in (coarse + 1..=fine).rev() {
            for node in self.tree.nodes_at_level(level) {
                self.condense_into_father(node)?;
            }
        }
        debug!("synchronized fine to coarse from level {} to level {}", fine, coarse);
        Ok(())
    }


    /**
     * Overwrite every patch, interior and ghost cells, by injection from its
     * father, from the root downward.
     */
    pub fn synchronize_coarse_to_fine(&mut self) -> Result<()> {
        self.storage()?;
        let mut written = 0;

        for node in self.tree.all_nodes() {
            written += self.spread_from_father(node, false)?;
        }
        debug!("synchronized coarse to fine ({} values)", written);
        Ok(())
    }


    /**
     * Spread every level from `coarse` down to `fine`, one level at a time.
     * Requires `coarse < fine`.
     */
    pub fn synchronize_coarse_to_fine_between(&mut self, coarse: usize, fine: usize) -> Result<()> {
        if coarse >= fine {
            return Err(Error::InvalidRange(format!(
                "coarse to fine synchronization from level {} to level {}", coarse, fine)))
        }
        self.storage()?;
        let mut written = 0;

        for level in coarse + 1..=fine {
            for node in self.tree.nodes_at_level(level) {
                written += self.spread_from_father(node, false)?;
            }
        }
        debug!("synchronized coarse to fine from level {} to level {} ({} values)", coarse, fine, written);
        Ok(())
    }


    /**
     * Like `synchronize_coarse_to_fine`, but only ghost cells are written.
     */
    pub fn synchronize_coarse_to_fine_only_in_ghost_zone(&mut self) -> Result<()> {
        self.storage()?;
        let mut written = 0;

        for node in self.tree.all_nodes() {
            written += self.spread_from_father(node, true)?;
        }
        debug!("synchronized coarse to fine ghost zones ({} values)", written);
        Ok(())
    }


    /**
     * Fill the ghost cells of every patch from the interiors of neighboring
     * patches at the same level and at the level above.
     */
    pub fn synchronize_fine_each_other_in_ghost_zone(&mut self) -> Result<()> {
        self.storage()?;
        let mut written = 0;

        for level in 1..self.tree.max_number_of_levels() {
            written += self.exchange_at_level(level)?;
        }
        debug!("exchanged ghost zones between patches ({} values)", written);
        Ok(())
    }


    /**
     * Make every ghost zone of the hierarchy consistent, level by level from
     * the root: first spread from the father, then exchange with neighbors.
     */
    pub fn synchronize_all_ghost_zones(&mut self) -> Result<()> {
        self.storage()?;

        for level in 1..self.tree.max_number_of_levels() {
            for node in self.tree.nodes_at_level(level) {
                self.spread_from_father(node, true)?;
            }
            self.exchange_at_level(level)?;
        }
        debug!("synchronized all ghost zones over {} levels", self.tree.max_number_of_levels());
        Ok(())
    }


    /**
     * Fill the ghost cells of the direct children of a node: spread from the
     * node, then exchange between the children in insertion order.
     */
    pub fn synchronize_all_ghost_zones_of_direct_children_of(&mut self, node: NodeId) -> Result<()> {
        self.storage()?;
        let children = self.tree.children(node)?.to_vec();

        for &child in &children {
            self.spread_from_father(child, true)?;
        }
        for &child in &children {
            for &sibling in &children {
                self.fill_ghosts_from(child, sibling)?;
            }
        }
        debug!("synchronized ghost zones of the {} children of node {}", children.len(), node);
        Ok(())
    }


    /**
     * Fill the ghost cells of every node at a level. Each ghost cell first
     * takes the value spread from the father, then the interior value of
     * every other node at that level or above covering it, coarsest level
     * first. A ghost cell thus ends up with the finest interior data
     * available, even where the father's own ghost cells are stale.
     */
    pub fn synchronize_all_ghost_zones_at_a_specified_level(&mut self, level: usize) -> Result<()> {
        self.storage()?;
        let tree = self.tree;

        for node in tree.nodes_at_level(level) {
            self.spread_from_father(node, true)?;

            for source_level in 0..=level {
                for source in tree.nodes_at_level(source_level) {
                    self.fill_ghosts_from(node, source)?;
                }
            }
        }
        debug!("synchronized ghost zones at level {}", level);
        Ok(())
    }


    /**
     * Fill the ghost cells of every node at a level from its father and its
     * siblings only.
     */
    pub fn synchronize_all_ghost_zones_at_a_specified_level_using_only_father(&mut self, level: usize) -> Result<()> {
        self.storage()?;

        if level == 0 {
            return Ok(())
        }
        for father in self.tree.nodes_at_level(level - 1) {
            self.synchronize_all_ghost_zones_of_direct_children_of(father)?;
        }
        Ok(())
    }
}
