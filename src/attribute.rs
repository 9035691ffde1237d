use std::collections::{BTreeMap, HashSet};
use log::info;
use serde::{Deserialize, Serialize};
use crate::error::{Error, Result};
use crate::export::{CellField, CompositeCell, CompositeField, GridDescription};
use crate::index_box::check_dimension;
use crate::patch::PatchData;
use crate::transfer::Nature;
use crate::tree::{MeshTree, NodeId};




/**
 * Declaration of one field carried by an attribute.
 */
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct FieldDescriptor {
    pub name: String,
    pub components: usize,
    #[serde(default)]
    pub nature: Nature,
    #[serde(default)]
    pub component_names: Vec<String>,
}

impl FieldDescriptor {
    pub fn new(name: &str, components: usize) -> Self {
        Self {
            name: name.to_string(),
            components,
            nature: Nature::default(),
            component_names: Vec::new(),
        }
    }
}




/**
 * Per-cell data for a set of named fields on every node of a `MeshTree`.
 * Each node holds one `PatchData` per field, sized by the node's cells and
 * a ghost width common to the whole attribute.
 *
 * The attribute borrows the tree it is bound to, so the tree's patches
 * cannot be added or removed while the attribute is alive. Storage must be
 * allocated with `alloc` before any field is read or written.
 */
#[derive(Clone, Debug)]
pub struct AmrAttribute<'a, const D: usize> {
    pub(crate) tree: &'a MeshTree<D>,
    pub(crate) ghost: usize,
    pub(crate) fields: Vec<FieldDescriptor>,
    pub(crate) storage: Option<BTreeMap<NodeId, Vec<PatchData<D>>>>,
}




// ============================================================================
impl<'a, const D: usize> AmrAttribute<'a, D> {


    /**
     * Bind a new, unallocated attribute to a tree. Fields are given as
     * (name, number of components) pairs.
     */
    pub fn new(tree: &'a MeshTree<D>, fields: &[(&str, usize)], ghost: usize) -> Result<Self> {
        Self::with_fields(tree, fields.iter().map(|&(n, c)| FieldDescriptor::new(n, c)).collect(), ghost)
    }


    /**
     * Bind a new, unallocated attribute to a tree, from full field
     * declarations.
     */
    pub fn with_fields(tree: &'a MeshTree<D>, fields: Vec<FieldDescriptor>, ghost: usize) -> Result<Self> {
        check_dimension::<D>()?;

        let mut seen = HashSet::new();

        for field in &fields {
            if !seen.insert(field.name.as_str()) {
                return Err(Error::DuplicateField(field.name.clone()))
            }
            if field.components == 0 {
                return Err(Error::StructuralMismatch(format!("field '{}' has no components", field.name)))
            }
            check_component_names(field, &field.component_names)?;
        }
        Ok(Self { tree, ghost, fields, storage: None })
    }

    pub fn tree(&self) -> &'a MeshTree<D> {
        self.tree
    }

    pub fn ghost_width(&self) -> usize {
        self.ghost
    }

    pub fn fields(&self) -> &[FieldDescriptor] {
        &self.fields
    }

    pub fn field_names(&self) -> Vec<&str> {
        self.fields.iter().map(|f| f.name.as_str()).collect()
    }

    pub fn is_allocated(&self) -> bool {
        self.storage.is_some()
    }


    /**
     * Allocate zero-filled storage for every field on every node of the
     * tree. Fails if storage is already allocated.
     */
    pub fn alloc(&mut self) -> Result<()> {
        if self.storage.is_some() {
            return Err(Error::AlreadyAllocated)
        }
        let mut storage = BTreeMap::new();
        let mut values = 0;

        for id in self.tree.all_nodes() {
            let shape = self.tree.grid(id)?.cell_counts();
            let arrays: Vec<_> = self.fields
                .iter()
                .map(|f| PatchData::zeros(shape, self.ghost, f.components))
                .collect();

            values += arrays.iter().map(|a| a.data().len()).sum::<usize>();
            storage.insert(id, arrays);
        }
        info!("allocated {} fields on {} nodes ({} values, ghost width {})",
            self.fields.len(),
            storage.len(),
            values,
            self.ghost);

        self.storage = Some(storage);
        Ok(())
    }


    /**
     * Release all storage. The attribute may be allocated again afterwards.
     */
    pub fn dealloc(&mut self) {
        self.storage = None;
    }


    /**
     * Set the nature of every field, in declaration order.
     */
    pub fn spill_natures(&mut self, natures: &[Nature]) -> Result<()> {
        if natures.len() != self.fields.len() {
            return Err(Error::StructuralMismatch(format!(
                "{} natures given for {} fields", natures.len(), self.fields.len())))
        }
        for (field, &nature) in self.fields.iter_mut().zip(natures) {
            field.nature = nature;
        }
        Ok(())
    }

    pub fn set_nature(&mut self, name: &str, nature: Nature) -> Result<()> {
        let n = self.field_index(name)?;
        self.fields[n].nature = nature;
        Ok(())
    }

    pub fn nature(&self, name: &str) -> Result<Nature> {
        Ok(self.fields[self.field_index(name)?].nature)
    }


    /**
     * Set the component names of every field, in declaration order. Each
     * entry must name every component of its field.
     */
    pub fn spill_info_on_components(&mut self, names: &[Vec<String>]) -> Result<()> {
        if names.len() != self.fields.len() {
            return Err(Error::StructuralMismatch(format!(
                "{} component name lists given for {} fields", names.len(), self.fields.len())))
        }
        for (field, n) in self.fields.iter().zip(names) {
            check_component_names(field, n)?;
        }
        for (field, n) in self.fields.iter_mut().zip(names) {
            field.component_names = n.clone();
        }
        Ok(())
    }

    pub(crate) fn field_index(&self, name: &str) -> Result<usize> {
        self.fields
            .iter()
            .position(|f| f.name == name)
            .ok_or_else(|| Error::UnknownField(name.to_string()))
    }

    pub(crate) fn storage(&self) -> Result<&BTreeMap<NodeId, Vec<PatchData<D>>>> {
        self.storage.as_ref().ok_or(Error::UnallocatedAttribute)
    }

    pub(crate) fn storage_mut(&mut self) -> Result<&mut BTreeMap<NodeId, Vec<PatchData<D>>>> {
        self.storage.as_mut().ok_or(Error::UnallocatedAttribute)
    }


    /**
     * Return the storage of every field on a node, in declaration order.
     */
    pub fn retrieve_fields_on(&self, node: NodeId) -> Result<&[PatchData<D>]> {
        self.storage()?
            .get(&node)
            .map(Vec::as_slice)
            .ok_or(Error::UnknownNode(node.index()))
    }


    /**
     * Return the storage (interior and ghost cells) of a field on a node.
     */
    pub fn field_on(&self, node: NodeId, name: &str) -> Result<&PatchData<D>> {
        let n = self.field_index(name)?;
        Ok(&self.retrieve_fields_on(node)?[n])
    }

    pub fn field_on_mut(&mut self, node: NodeId, name: &str) -> Result<&mut PatchData<D>> {
        let n = self.field_index(name)?;

        self.storage_mut()?
            .get_mut(&node)
            .map(|arrays| &mut arrays[n])
            .ok_or(Error::UnknownNode(node.index()))
    }


    /**
     * Return the interior values of a field on a node, in row-major order
     * matching the node's cell counts.
     */
    pub fn get_field_on(&self, node: NodeId, name: &str) -> Result<Vec<f64>> {
        Ok(self.field_on(node, name)?.interior_values())
    }


    /**
     * Overwrite the interior values of a field on a node.
     */
    pub fn set_field_interior(&mut self, node: NodeId, name: &str, values: &[f64]) -> Result<()> {
        self.field_on_mut(node, name)?.set_interior(values)
    }


    /**
     * Fill the interior of a field on every node from a function of the
     * cell center.
     */
    pub fn fill_interior_with<F>(&mut self, name: &str, f: F) -> Result<()>
    where
        F: Fn([f64; D], &mut [f64])
    {
        let n = self.field_index(name)?;
        let tree = self.tree;

        for (&id, arrays) in self.storage_mut()?.iter_mut() {
            let grid = tree.grid(id)?;
            let data = &mut arrays[n];

            for index in data.interior().iter() {
                f(grid.cell_center(index), data.get_slice_mut(index));
            }
        }
        Ok(())
    }


    /**
     * Return a field on a node together with the description of the grid
     * it lives on, ghost cells included.
     */
    pub fn build_cell_field_on_with_ghost(&self, node: NodeId, name: &str) -> Result<CellField> {
        let data = self.field_on(node, name)?;
        let grid = self.tree.grid(node)?.build_with_ghost(self.ghost);
        self.cell_field(name, GridDescription::from(&grid), data.data().to_vec())
    }


    /**
     * Return a field on a node together with the description of the grid
     * it lives on, interior cells only.
     */
    pub fn build_cell_field_on_without_ghost(&self, node: NodeId, name: &str) -> Result<CellField> {
        let data = self.field_on(node, name)?;
        let grid = self.tree.grid(node)?;
        self.cell_field(name, GridDescription::from(grid), data.interior_values())
    }

    fn cell_field(&self, name: &str, grid: GridDescription, values: Vec<f64>) -> Result<CellField> {
        let field = &self.fields[self.field_index(name)?];

        Ok(CellField {
            name: field.name.clone(),
            grid,
            components: field.components,
            component_names: field.component_names.clone(),
            values,
        })
    }


    /**
     * Return a field on the most refined cells of the sub-tree rooted at a
     * node: each node contributes its cells not covered by its own patches,
     * in depth-first order. Ghost cells are not included.
     */
    pub fn build_cell_field_on_recurse_without_overlap_without_ghost(&self, node: NodeId, name: &str) -> Result<CompositeField> {
        let field = &self.fields[self.field_index(name)?];
        let mut cells = Vec::new();
        let mut values = Vec::new();

        for id in self.tree.descendants(node)? {
            let grid = self.tree.grid(id)?;
            let level = self.tree.level(id)?;
            let data = self.field_on(id, name)?;

            for index in self.tree.uncovered_cells(id)? {
                cells.push(CompositeCell {
                    level,
                    lower: grid.cell_lower_corner(index).to_vec(),
                    cell_size: grid.cell_size().to_vec(),
                });
                values.extend_from_slice(data.get_slice(index));
            }
        }
        Ok(CompositeField {
            name: field.name.clone(),
            components: field.components,
            cells,
            values,
        })
    }


    /**
     * Return a copy of this attribute with its own storage, bound to the
     * same tree.
     */
    pub fn deep_copy(&self) -> Self {
        self.clone()
    }


    /**
     * Fail unless the other attribute has the same ghost width and fields as
     * this one, and is bound to a tree with the same layout.
     */
    pub fn check_compatible_with(&self, other: &AmrAttribute<'_, D>) -> Result<()> {
        if self.ghost != other.ghost {
            return Err(Error::StructuralMismatch(format!(
                "ghost width {} versus {}", self.ghost, other.ghost)))
        }
        let shape = |a: &AmrAttribute<'_, D>| -> Vec<(String, usize)> {
            a.fields.iter().map(|f| (f.name.clone(), f.components)).collect()
        };
        if shape(self) != shape(other) {
            return Err(Error::StructuralMismatch("the attributes declare different fields".into()))
        }
        if !std::ptr::eq(self.tree, other.tree) && self.tree != other.tree {
            return Err(Error::StructuralMismatch("the attributes are bound to different layouts".into()))
        }
        Ok(())
    }


    /**
     * Copy every value of a compatible attribute into this one.
     */
    pub fn copy_from(&mut self, other: &AmrAttribute<'_, D>) -> Result<()> {
        self.check_compatible_with(other)?;
        let source = other.storage()?.clone();
        *self.storage_mut()? = source;
        Ok(())
    }
}

fn check_component_names(field: &FieldDescriptor, names: &[String]) -> Result<()> {
    if !names.is_empty() && names.len() != field.components {
        Err(Error::StructuralMismatch(format!(
            "{} component names for field '{}' with {} components",
            names.len(),
            field.name,
            field.components)))
    } else {
        Ok(())
    }
}




// ============================================================================
#[cfg(test)]
mod test {

    use super::*;
    use crate::cartesian_grid::CartesianGrid;
    use crate::index_box::IndexBox;

    fn tree() -> MeshTree<2> {
        let mut tree = MeshTree::new(CartesianGrid::from_cell_counts([4, 4], [0.0, 0.0], [1.0, 1.0]).unwrap());
        let a = tree.add_patch(tree.root(), IndexBox::new([0, 0], [2, 2]).unwrap(), [2, 2]).unwrap();
        tree.add_patch(a, IndexBox::new([0, 0], [2, 2]).unwrap(), [2, 2]).unwrap();
        tree
    }

    #[test]
    fn fields_must_be_unique_and_non_empty() {
        let tree = tree();
        assert!(matches!(AmrAttribute::new(&tree, &[("rho", 1), ("rho", 2)], 1), Err(Error::DuplicateField(_))));
        assert!(matches!(AmrAttribute::new(&tree, &[("rho", 0)], 1), Err(Error::StructuralMismatch(_))));
    }

    #[test]
    fn access_before_alloc_is_an_error() {
        let tree = tree();
        let mut att = AmrAttribute::new(&tree, &[("rho", 1)], 1).unwrap();
        assert!(matches!(att.get_field_on(tree.root(), "rho"), Err(Error::UnallocatedAttribute)));

        att.alloc().unwrap();
        assert!(matches!(att.alloc(), Err(Error::AlreadyAllocated)));
        assert_eq!(att.get_field_on(tree.root(), "rho").unwrap(), vec![0.0; 16]);
        assert!(matches!(att.get_field_on(tree.root(), "u"), Err(Error::UnknownField(_))));

        att.dealloc();
        assert!(matches!(att.field_on(tree.root(), "rho"), Err(Error::UnallocatedAttribute)));
    }

    #[test]
    fn storage_is_sized_by_cells_and_ghost_width() {
        let tree = tree();
        let mut att = AmrAttribute::new(&tree, &[("rho", 1), ("u", 2)], 2).unwrap();
        att.alloc().unwrap();

        for id in tree.all_nodes() {
            let cells = tree.grid(id).unwrap().cell_counts();
            let fields = att.retrieve_fields_on(id).unwrap();
            assert_eq!(fields[0].data().len(), (cells[0] + 4) * (cells[1] + 4));
            assert_eq!(fields[1].data().len(), 2 * (cells[0] + 4) * (cells[1] + 4));
        }
    }

    #[test]
    fn deep_copy_has_its_own_storage_and_the_same_tree() {
        let tree = tree();
        let mut att = AmrAttribute::new(&tree, &[("rho", 1)], 1).unwrap();
        att.alloc().unwrap();

        let mut copy = att.deep_copy();
        copy.set_field_interior(tree.root(), "rho", &[1.0; 16]).unwrap();

        assert!(std::ptr::eq(copy.tree(), att.tree()));
        assert_eq!(att.get_field_on(tree.root(), "rho").unwrap(), vec![0.0; 16]);

        att.copy_from(&copy).unwrap();
        assert_eq!(att.get_field_on(tree.root(), "rho").unwrap(), vec![1.0; 16]);

        let other = AmrAttribute::new(&tree, &[("rho", 1)], 2).unwrap();
        assert!(matches!(att.copy_from(&other), Err(Error::StructuralMismatch(_))));
    }

    #[test]
    fn natures_and_component_names() {
        let tree = tree();
        let mut att = AmrAttribute::new(&tree, &[("rho", 1), ("u", 2)], 1).unwrap();

        att.spill_natures(&[Nature::IntensiveMaximum, Nature::Extensive]).unwrap();
        assert_eq!(att.nature("rho").unwrap(), Nature::IntensiveMaximum);
        assert!(att.spill_natures(&[Nature::Extensive]).is_err());

        assert!(att.spill_info_on_components(&[vec![], vec!["x".into()]]).is_err());
        att.spill_info_on_components(&[vec!["rho".into()], vec!["ux".into(), "uy".into()]]).unwrap();
        att.alloc().unwrap();

        let field = att.build_cell_field_on_without_ghost(tree.root(), "u").unwrap();
        assert_eq!(field.component_names, vec!["ux", "uy"]);
        assert_eq!(field.values.len(), 32);

        let ghosted = att.build_cell_field_on_with_ghost(tree.root(), "u").unwrap();
        assert_eq!(ghosted.grid.cell_counts, vec![6, 6]);
        assert_eq!(ghosted.grid.origin, vec![-1.0, -1.0]);
        assert_eq!(ghosted.values.len(), 72);
    }

    #[test]
    fn composite_view_covers_the_domain_once() {
        let tree = tree();
        let mut att = AmrAttribute::new(&tree, &[("rho", 1)], 1).unwrap();
        att.alloc().unwrap();
        att.fill_interior_with("rho", |x, v| v[0] = x[0] + x[1]).unwrap();

        let composite = att.build_cell_field_on_recurse_without_overlap_without_ghost(tree.root(), "rho").unwrap();
        assert_eq!(composite.cells.len(), tree.number_of_cells_recursive_without_overlap(tree.root()).unwrap());
        assert_eq!(composite.covered_measure(), 16.0);
        assert_eq!(composite.cells.iter().filter(|c| c.level == 2).count(), 16);
        assert_eq!(composite.values.len(), composite.cells.len());
    }
}
