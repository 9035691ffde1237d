use core::fmt;
use log::{debug, info};
use crate::cartesian_grid::CartesianGrid;
use crate::error::{Error, Result};
use crate::index_box::{check_factors, Factors, GlobalPosition, Index, IndexBox};
use crate::splitting::{split_criterion, BoxSplittingOptions};




/**
 * Identifier of a grid node in a `MeshTree`. The arena slot of a removed node
 * is reused by later patches, but under a new generation, so an identifier
 * of a removed node is reported as unknown rather than aliasing a newer node.
 */
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId {
    index: usize,
    generation: u64,
}

impl NodeId {
    pub fn index(self) -> usize {
        self.index
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.generation == 0 {
            write!(f, "#{}", self.index)
        } else {
            write!(f, "#{}.{}", self.index, self.generation)
        }
    }
}




/**
 * One node of the refinement tree. The root and the patches are the same
 * kind of node: the root has no parent, unit factors, and a box equal to its
 * own cells.
 */
#[derive(Clone, Debug, PartialEq)]
pub struct GridNode<const D: usize> {
    parent: Option<NodeId>,
    cells_in_parent: IndexBox<D>,
    factors: Factors<D>,
    grid: CartesianGrid<D>,
    children: Vec<NodeId>,
    level: usize,
}




// ============================================================================
impl<const D: usize> GridNode<D> {

    pub fn parent(&self) -> Option<NodeId> {
        self.parent
    }


    /**
     * Return the cells this node covers, in the parent's local cell indexes.
     */
    pub fn patch_box(&self) -> IndexBox<D> {
        self.cells_in_parent
    }


    /**
     * Return the refinement factors of this node relative to its parent.
     */
    pub fn factors(&self) -> Factors<D> {
        self.factors
    }

    pub fn grid(&self) -> &CartesianGrid<D> {
        &self.grid
    }

    pub fn children(&self) -> &[NodeId] {
        &self.children
    }


    /**
     * Return the nesting depth of this node; the root is at level 0.
     */
    pub fn level(&self) -> usize {
        self.level
    }

    pub fn is_root(&self) -> bool {
        self.parent.is_none()
    }
}




#[derive(Clone, Debug, PartialEq)]
struct Slot<const D: usize> {
    generation: u64,
    node: Option<GridNode<D>>,
}




/**
 * A hierarchy of nested rectangular structured grids. Nodes live in an arena
 * and refer to one another by `NodeId`. A patch's box is expressed in its
 * parent's cell indexes, lies inside the parent's cells, and does not
 * intersect any sibling's box. Siblings are kept in insertion order.
 *
 * Slots freed by `remove_patch` are recycled, so regridding the same region
 * over and over keeps the arena at the size of the largest layout seen.
 */
#[derive(Clone, Debug, PartialEq)]
pub struct MeshTree<const D: usize> {
    nodes: Vec<Slot<D>>,
    vacant: Vec<usize>,
}




// ============================================================================
impl<const D: usize> MeshTree<D> {


    /**
     * Create a tree made only of the given root grid.
     */
    pub fn new(grid: CartesianGrid<D>) -> Self {
        let cells = grid.cell_box();
        let root = GridNode {
            parent: None,
            cells_in_parent: cells,
            factors: [1; D],
            grid,
            children: Vec::new(),
            level: 0,
        };
        Self {
            nodes: vec![Slot { generation: 0, node: Some(root) }],
            vacant: Vec::new(),
        }
    }

    pub fn root(&self) -> NodeId {
        NodeId { index: 0, generation: 0 }
    }

    pub fn contains_node(&self, id: NodeId) -> bool {
        self.node(id).is_ok()
    }


    /**
     * Return the number of arena slots, live or awaiting reuse.
     */
    pub fn number_of_slots(&self) -> usize {
        self.nodes.len()
    }


    /**
     * Return the node with the given identifier.
     */
    pub fn node(&self, id: NodeId) -> Result<&GridNode<D>> {
        self.nodes
            .get(id.index)
            .filter(|slot| slot.generation == id.generation)
            .and_then(|slot| slot.node.as_ref())
            .ok_or(Error::UnknownNode(id.index))
    }

    fn node_mut(&mut self, id: NodeId) -> Result<&mut GridNode<D>> {
        self.nodes
            .get_mut(id.index)
            .filter(|slot| slot.generation == id.generation)
            .and_then(|slot| slot.node.as_mut())
            .ok_or(Error::UnknownNode(id.index))
    }

    pub fn grid(&self, id: NodeId) -> Result<&CartesianGrid<D>> {
        Ok(self.node(id)?.grid())
    }

    pub fn level(&self, id: NodeId) -> Result<usize> {
        Ok(self.node(id)?.level)
    }

    pub fn children(&self, id: NodeId) -> Result<&[NodeId]> {
        Ok(self.node(id)?.children())
    }

    pub fn father(&self, id: NodeId) -> Result<Option<NodeId>> {
        Ok(self.node(id)?.parent)
    }


    /**
     * Return the cells a node refines, in its parent's cell indexes. For the
     * root these are its own cells.
     */
    pub fn patch_box(&self, id: NodeId) -> Result<IndexBox<D>> {
        Ok(self.node(id)?.patch_box())
    }

    pub fn factors(&self, id: NodeId) -> Result<Factors<D>> {
        Ok(self.node(id)?.factors())
    }


    /**
     * Return the root of the tree the given node belongs to.
     */
    pub fn god_father(&self, id: NodeId) -> Result<NodeId> {
        let mut current = id;

        while let Some(parent) = self.node(current)?.parent {
            current = parent;
        }
        Ok(current)
    }

    pub fn number_of_patches(&self, id: NodeId) -> Result<usize> {
        Ok(self.node(id)?.children.len())
    }


    /**
     * Return the `index`-th direct child of a node, in insertion order.
     */
    pub fn patch(&self, id: NodeId, index: usize) -> Result<NodeId> {
        let children = self.children(id)?;

        children.get(index).copied().ok_or_else(|| Error::OutOfRange(format!(
            "patch index {} on node {} which has {} patches", index, id, children.len())))
    }


    /**
     * Add a patch refining the given cells of a node by per-axis factors.
     * The box must be non-empty, lie inside the node's cells, and not
     * intersect any existing sibling. On failure the tree is unchanged.
     */
    pub fn add_patch(&mut self, parent: NodeId, cells: IndexBox<D>, factors: Factors<D>) -> Result<NodeId> {
        let node = self.node(parent)?;

        check_factors(&factors)?;

        if cells.is_empty() {
            return Err(Error::InvalidRange(format!("patch box {} is empty", cells)))
        }
        if !node.grid.cell_box().contains_box(&cells) {
            return Err(Error::OutOfRange(format!(
                "patch box {} is not inside the cells {} of node {}",
                cells,
                node.grid.cell_box(),
                parent)))
        }
        for (n, &sibling) in node.children.iter().enumerate() {
            let existing = self.node(sibling)?.cells_in_parent;

            if existing.intersects(&cells) {
                return Err(Error::Overlap {
                    new: cells.to_string(),
                    sibling: n,
                    existing: existing.to_string(),
                })
            }
        }
        let grid = node.grid.sub_grid(&cells)?.refine_with_factor(&factors)?;
        let node = GridNode {
            parent: Some(parent),
            cells_in_parent: cells,
            factors,
            grid,
            children: Vec::new(),
            level: node.level + 1,
        };
        let id = match self.vacant.pop() {
            Some(index) => {
                let slot = &mut self.nodes[index];
                slot.node = Some(node);
                NodeId { index, generation: slot.generation }
            }
            None => {
                self.nodes.push(Slot { generation: 0, node: Some(node) });
                NodeId { index: self.nodes.len() - 1, generation: 0 }
            }
        };
        self.node_mut(parent)?.children.push(id);

        debug!("add patch {} under {}: box {} factors {:?}", id, parent, cells, factors);
        Ok(id)
    }


    /**
     * Remove the `index`-th direct child of a node, with its whole sub-tree.
     */
    pub fn remove_patch(&mut self, parent: NodeId, index: usize) -> Result<()> {
        let id = self.patch(parent, index)?;
        let doomed = self.descendants(id)?;

        self.node_mut(parent)?.children.remove(index);

        for n in &doomed {
            let slot = &mut self.nodes[n.index];
            slot.node = None;
            slot.generation += 1;
            self.vacant.push(n.index);
        }
        debug!("remove patch {} under {} ({} nodes)", id, parent, doomed.len());
        Ok(())
    }


    /**
     * Remove every patch of a node.
     */
    pub fn remove_all_patches(&mut self, parent: NodeId) -> Result<()> {
        while self.number_of_patches(parent)? > 0 {
            self.remove_patch(parent, 0)?;
        }
        Ok(())
    }


    /**
     * Return the node's cells in the root index space refined by the
     * cumulative factors from the root, along with those factors.
     */
    pub fn position_relative_to_root(&self, id: NodeId) -> Result<GlobalPosition<D>> {
        let mut chain = Vec::new();
        let mut current = id;

        while let Some(parent) = self.node(current)?.parent {
            chain.push(current);
            current = parent;
        }
        let mut position = GlobalPosition::root(self.node(current)?.grid.cell_box());

        for n in chain.iter().rev() {
            let node = self.node(*n)?;
            position = position.child(&node.cells_in_parent, &node.factors);
        }
        Ok(position)
    }


    /**
     * Return the deepest node having both `a` and `b` among its descendants
     * (a node counts as its own descendant).
     */
    pub fn common_ancestor(&self, a: NodeId, b: NodeId) -> Result<NodeId> {
        let mut lineage = vec![a];
        let mut current = a;

        while let Some(parent) = self.node(current)?.parent {
            lineage.push(parent);
            current = parent;
        }
        let mut current = b;

        while !lineage.contains(&current) {
            current = self.node(current)?.parent.ok_or(Error::UnknownNode(b.index))?;
        }
        Ok(current)
    }


    /**
     * Return the node and all of its descendants in depth-first pre-order.
     */
    pub fn descendants(&self, id: NodeId) -> Result<Vec<NodeId>> {
        let mut result = Vec::new();
        let mut stack = vec![id];

        while let Some(n) = stack.pop() {
            result.push(n);
            stack.extend(self.node(n)?.children.iter().rev());
        }
        Ok(result)
    }


    /**
     * Return every node of the tree in depth-first pre-order.
     */
    pub fn all_nodes(&self) -> Vec<NodeId> {
        self.descendants(self.root()).unwrap_or_default()
    }


    /**
     * Return the nodes at the given nesting depth, in depth-first order.
     */
    pub fn nodes_at_level(&self, level: usize) -> Vec<NodeId> {
        self.all_nodes()
            .into_iter()
            .filter(|&n| self.node(n).map_or(false, |node| node.level == level))
            .collect()
    }


    /**
     * Return the number of levels of the sub-tree rooted at a node; a node
     * without patches has one level.
     */
    pub fn max_number_of_levels_relative_to(&self, id: NodeId) -> Result<usize> {
        let mut deepest = 0;

        for &child in self.children(id)? {
            deepest = deepest.max(self.max_number_of_levels_relative_to(child)?);
        }
        Ok(deepest + 1)
    }

    pub fn max_number_of_levels(&self) -> usize {
        self.max_number_of_levels_relative_to(self.root()).unwrap_or(1)
    }

    pub fn number_of_cells_at_current_level(&self, id: NodeId) -> Result<usize> {
        Ok(self.grid(id)?.number_of_cells())
    }


    /**
     * Return the number of cells of a node and all its descendants, counting
     * coarse cells covered by patches as well.
     */
    pub fn number_of_cells_recursive_with_overlap(&self, id: NodeId) -> Result<usize> {
        let mut count = 0;

        for n in self.descendants(id)? {
            count += self.number_of_cells_at_current_level(n)?;
        }
        Ok(count)
    }


    /**
     * Return the number of cells of the composite mesh rooted at a node, in
     * which every patch replaces the coarse cells it covers.
     */
    pub fn number_of_cells_recursive_without_overlap(&self, id: NodeId) -> Result<usize> {
        let mut count = self.number_of_cells_at_current_level(id)?;

        for &child in self.children(id)? {
            count -= self.number_of_overlapped_cells_for_father(child)?;
            count += self.number_of_cells_recursive_without_overlap(child)?;
        }
        Ok(count)
    }


    /**
     * Return the number of parent cells covered by a patch.
     */
    pub fn number_of_overlapped_cells_for_father(&self, id: NodeId) -> Result<usize> {
        let node = self.node(id)?;

        if node.is_root() {
            Ok(0)
        } else {
            Ok(node.cells_in_parent.number_of_cells())
        }
    }


    /**
     * Return the parent cells touched by a patch grown by `ghost` of its own
     * cells on every side.
     */
    pub fn neighborhood_in_father(&self, id: NodeId, ghost: usize) -> Result<IndexBox<D>> {
        let node = self.node(id)?;
        let f = node.factors;

        Ok(node.cells_in_parent.refine(&f).extend_all(ghost).coarsen_outward(&f))
    }


    /**
     * Determine whether patch `j` of a node intersects the neighborhood of
     * patch `i` of width `ghost` (counted in patch `i`'s cells).
     */
    pub fn is_patch_in_neighborhood_of(&self, parent: NodeId, i: usize, j: usize, ghost: usize) -> Result<bool> {
        let pi = self.patch(parent, i)?;
        let pj = self.patch(parent, j)?;

        if pi == pj {
            return Ok(false)
        }
        Ok(self.neighborhood_in_father(pi, ghost)?.intersects(&self.node(pj)?.cells_in_parent))
    }


    /**
     * Return the siblings of a patch lying in its neighborhood of width
     * `ghost`, in insertion order.
     */
    pub fn find_patches_in_neighborhood_of(&self, id: NodeId, ghost: usize) -> Result<Vec<NodeId>> {
        let parent = match self.father(id)? {
            Some(parent) => parent,
            None => return Ok(Vec::new()),
        };
        let around = self.neighborhood_in_father(id, ghost)?;
        let mut result = Vec::new();

        for &sibling in self.children(parent)? {
            if sibling != id && around.intersects(&self.node(sibling)?.cells_in_parent) {
                result.push(sibling)
            }
        }
        Ok(result)
    }


    /**
     * Return one single-cell grid per direct child of a node, covering the
     * child's physical extent.
     */
    pub fn build_envelope_mesh(&self, id: NodeId) -> Result<Vec<CartesianGrid<D>>> {
        self.children(id)?
            .iter()
            .map(|&child| Ok(self.grid(child)?.as_single_cell()))
            .collect()
    }


    /**
     * Return one single-cell grid per patch of the whole tree, in
     * depth-first order.
     */
    pub fn build_envelope_mesh_recursive(&self) -> Result<Vec<CartesianGrid<D>>> {
        self.all_nodes()
            .into_iter()
            .skip(1)
            .map(|n| Ok(self.grid(n)?.as_single_cell()))
            .collect()
    }


    /**
     * Return the local indexes of a node's cells not covered by any of its
     * direct children, in row-major order.
     */
    pub fn uncovered_cells(&self, id: NodeId) -> Result<Vec<Index<D>>> {
        let boxes = self.children(id)?
            .iter()
            .map(|&c| Ok(self.node(c)?.cells_in_parent))
            .collect::<Result<Vec<_>>>()?;

        Ok(self.grid(id)?
            .cell_box()
            .iter()
            .filter(|&index| !boxes.iter().any(|b| b.contains(index)))
            .collect())
    }


    /**
     * Replace the patches of a node with boxes covering the flagged cells of
     * a per-cell criterion (row-major over the node's cells), each refined by
     * the given factors. Returns the new patches.
     */
    pub fn create_patches_from_criterion(
        &mut self,
        id: NodeId,
        options: &BoxSplittingOptions,
        criterion: &[bool],
        factors: Factors<D>) -> Result<Vec<NodeId>>
    {
        check_factors(&factors)?;

        let boxes = split_criterion(self.grid(id)?.cell_counts(), criterion, options)?;
        self.remove_all_patches(id)?;

        let patches = boxes
            .into_iter()
            .map(|b| self.add_patch(id, b, factors))
            .collect::<Result<Vec<_>>>()?;

        info!("created {} patches on node {} from {} flagged cells",
            patches.len(),
            id,
            criterion.iter().filter(|&&c| c).count());

        Ok(patches)
    }
}




// ============================================================================
#[cfg(test)]
mod test {

    use super::*;

    fn boxed<const D: usize>(lo: [i64; D], hi: [i64; D]) -> IndexBox<D> {
        IndexBox::new(lo, hi).unwrap()
    }

    fn tree_2d() -> MeshTree<2> {
        MeshTree::new(CartesianGrid::from_cell_counts([5, 5], [0.0, 0.0], [1.0, 1.0]).unwrap())
    }

    #[test]
    fn patch_grid_is_derived_from_box_and_factors() {
        let mut tree = tree_2d();
        let p = tree.add_patch(tree.root(), boxed([1, 0], [4, 3]), [2, 2]).unwrap();
        let grid = tree.grid(p).unwrap();
        assert_eq!(grid.node_counts(), [7, 7]);
        assert_eq!(grid.cell_size(), [0.5, 0.5]);
        assert_eq!(grid.origin(), [1.0, 0.0]);
        assert_eq!(tree.level(p).unwrap(), 1);
        assert_eq!(tree.god_father(p).unwrap(), tree.root());
    }

    #[test]
    fn failed_insertions_leave_the_tree_unchanged() {
        let mut tree = tree_2d();
        tree.add_patch(tree.root(), boxed([1, 0], [4, 3]), [2, 2]).unwrap();
        let snapshot = tree.clone();

        assert!(matches!(
            tree.add_patch(tree.root(), boxed([3, 2], [6, 4]), [2, 2]),
            Err(Error::OutOfRange(_))));
        assert_eq!(tree, snapshot);

        assert!(matches!(
            tree.add_patch(tree.root(), boxed([3, 2], [5, 4]), [2, 2]),
            Err(Error::Overlap { sibling: 0, .. })));
        assert_eq!(tree, snapshot);

        assert!(matches!(
            tree.add_patch(tree.root(), boxed([4, 4], [5, 5]), [0, 2]),
            Err(Error::InvalidFactor(_))));
        assert_eq!(tree, snapshot);

        tree.add_patch(tree.root(), boxed([4, 0], [5, 3]), [2, 2]).unwrap();
        assert_ne!(tree, snapshot);
    }

    #[test]
    fn removing_a_patch_removes_its_sub_tree() {
        let mut tree = tree_2d();
        let a = tree.add_patch(tree.root(), boxed([0, 0], [2, 2]), [2, 2]).unwrap();
        let b = tree.add_patch(tree.root(), boxed([3, 3], [5, 5]), [2, 2]).unwrap();
        let aa = tree.add_patch(a, boxed([1, 1], [3, 3]), [2, 2]).unwrap();

        assert_eq!(tree.max_number_of_levels(), 3);
        tree.remove_patch(tree.root(), 0).unwrap();

        assert!(!tree.contains_node(a));
        assert!(!tree.contains_node(aa));
        assert!(matches!(tree.node(aa), Err(Error::UnknownNode(_))));
        assert_eq!(tree.patch(tree.root(), 0).unwrap(), b);
        assert_eq!(tree.max_number_of_levels(), 2);
        assert!(tree.remove_patch(tree.root(), 1).is_err());

        tree.remove_all_patches(tree.root()).unwrap();
        assert_eq!(tree.all_nodes(), vec![tree.root()]);
    }

    #[test]
    fn regridding_reuses_slots_without_aliasing_old_ids() {
        let mut tree = tree_2d();
        let cells = tree.grid(tree.root()).unwrap().cell_box();
        let criterion: Vec<bool> = cells.iter().map(|i| i[0] < 2 || i[1] >= 3).collect();
        let options = BoxSplittingOptions::default();

        let first = tree.create_patches_from_criterion(tree.root(), &options, &criterion, [2, 2]).unwrap();
        let slots = tree.number_of_slots();
        assert!(!first.is_empty());
        assert_eq!(slots, 1 + first.len());

        for _ in 0..10 {
            tree.create_patches_from_criterion(tree.root(), &options, &criterion, [2, 2]).unwrap();
        }
        assert_eq!(tree.number_of_slots(), slots);

        let last = tree.children(tree.root()).unwrap().to_vec();
        assert_eq!(last.len(), first.len());

        for (old, new) in first.iter().zip(&last) {
            assert_ne!(old, new);
            assert!(!tree.contains_node(*old));
            assert!(matches!(tree.add_patch(*old, boxed([0, 0], [1, 1]), [2, 2]), Err(Error::UnknownNode(_))));
            assert!(tree.contains_node(*new));
        }
    }

    #[test]
    fn common_ancestor_is_the_deepest_shared_node() {
        let mut tree = tree_2d();
        let a = tree.add_patch(tree.root(), boxed([0, 0], [2, 2]), [2, 2]).unwrap();
        let b = tree.add_patch(tree.root(), boxed([3, 3], [5, 5]), [2, 2]).unwrap();
        let aa = tree.add_patch(a, boxed([0, 0], [2, 2]), [2, 2]).unwrap();
        let ab = tree.add_patch(a, boxed([2, 2], [4, 4]), [3, 3]).unwrap();

        assert_eq!(tree.common_ancestor(aa, ab).unwrap(), a);
        assert_eq!(tree.common_ancestor(aa, a).unwrap(), a);
        assert_eq!(tree.common_ancestor(b, ab).unwrap(), tree.root());
        assert_eq!(tree.common_ancestor(b, b).unwrap(), b);
    }

    #[test]
    fn position_relative_to_root_accumulates_factors() {
        let mut tree = tree_2d();
        let a = tree.add_patch(tree.root(), boxed([1, 0], [4, 3]), [2, 3]).unwrap();
        let b = tree.add_patch(a, boxed([2, 3], [4, 6]), [4, 1]).unwrap();
        let position = tree.position_relative_to_root(b).unwrap();

        assert_eq!(tree.patch_box(b).unwrap(), boxed([2, 3], [4, 6]));
        assert_eq!(tree.factors(b).unwrap(), [4, 1]);
        assert_eq!(position.factors, [8, 3]);
        assert_eq!(position.cells, boxed([16, 3], [24, 6]));
        assert_eq!(tree.grid(b).unwrap().cell_counts(), position.cells.shape());
    }

    #[test]
    fn levels_are_visited_depth_first_in_insertion_order() {
        let mut tree = tree_2d();
        let a = tree.add_patch(tree.root(), boxed([0, 0], [2, 2]), [2, 2]).unwrap();
        let b = tree.add_patch(tree.root(), boxed([3, 3], [5, 5]), [2, 2]).unwrap();
        let bb = tree.add_patch(b, boxed([0, 0], [2, 2]), [2, 2]).unwrap();
        let aa = tree.add_patch(a, boxed([0, 0], [1, 1]), [2, 2]).unwrap();

        assert_eq!(tree.all_nodes(), vec![tree.root(), a, aa, b, bb]);
        assert_eq!(tree.nodes_at_level(1), vec![a, b]);
        assert_eq!(tree.nodes_at_level(2), vec![aa, bb]);
        assert!(tree.nodes_at_level(3).is_empty());
    }

    #[test]
    fn counts_cells_with_and_without_overlap() {
        let mut tree = tree_2d();
        let a = tree.add_patch(tree.root(), boxed([1, 0], [4, 3]), [2, 2]).unwrap();
        tree.add_patch(a, boxed([0, 0], [2, 2]), [3, 3]).unwrap();

        assert_eq!(tree.number_of_cells_recursive_with_overlap(tree.root()).unwrap(), 25 + 36 + 36);
        assert_eq!(tree.number_of_cells_recursive_without_overlap(tree.root()).unwrap(), 25 - 9 + 36 - 4 + 36);
        assert_eq!(tree.number_of_overlapped_cells_for_father(a).unwrap(), 9);
        assert_eq!(tree.uncovered_cells(tree.root()).unwrap().len(), 16);
    }

    #[test]
    fn neighborhood_depends_on_the_ghost_width() {
        let mut tree = MeshTree::new(CartesianGrid::from_cell_counts([20], [0.0], [1.0]).unwrap());
        let root = tree.root();
        let a = tree.add_patch(root, boxed([2], [6]), [4]).unwrap();
        let b = tree.add_patch(root, boxed([6], [8]), [2]).unwrap();
        let c = tree.add_patch(root, boxed([10], [12]), [4]).unwrap();

        assert!(!tree.is_patch_in_neighborhood_of(root, 0, 1, 0).unwrap());
        assert!(tree.is_patch_in_neighborhood_of(root, 0, 1, 1).unwrap());
        assert!(!tree.is_patch_in_neighborhood_of(root, 0, 2, 16).unwrap());
        assert!(tree.is_patch_in_neighborhood_of(root, 0, 2, 17).unwrap());
        assert_eq!(tree.find_patches_in_neighborhood_of(b, 1).unwrap(), vec![a]);
        assert_eq!(tree.find_patches_in_neighborhood_of(b, 5).unwrap(), vec![a, c]);
    }

    #[test]
    fn envelope_has_one_cell_per_patch() {
        let mut tree = tree_2d();
        let a = tree.add_patch(tree.root(), boxed([1, 0], [4, 3]), [2, 2]).unwrap();
        tree.add_patch(a, boxed([0, 0], [2, 2]), [2, 2]).unwrap();

        let envelope = tree.build_envelope_mesh(tree.root()).unwrap();
        assert_eq!(envelope.len(), 1);
        assert_eq!(envelope[0].bounding_box(), ([1.0, 0.0], [4.0, 3.0]));
        assert_eq!(tree.build_envelope_mesh_recursive().unwrap().len(), 2);
    }

    #[test]
    fn patches_from_criterion_cover_every_flagged_cell() {
        let mut tree = MeshTree::new(CartesianGrid::from_cell_counts([10, 10], [0.0, 0.0], [1.0, 1.0]).unwrap());
        let cells = tree.grid(tree.root()).unwrap().cell_box();
        let flagged = |i: [i64; 2]| (i[0] < 3 && i[1] < 3) || (i[0] >= 7 && i[1] >= 6);
        let criterion: Vec<bool> = cells.iter().map(flagged).collect();

        let patches = tree.create_patches_from_criterion(
            tree.root(),
            &BoxSplittingOptions::default(),
            &criterion,
            [2, 2]).unwrap();

        assert_eq!(patches.len(), 2);

        for index in cells.iter().filter(|&i| flagged(i)) {
            assert!(patches.iter().any(|&p| tree.node(p).unwrap().patch_box().contains(index)));
        }
        assert!(tree.create_patches_from_criterion(tree.root(), &BoxSplittingOptions::default(), &[true], [2, 2]).is_err());
    }
}
