use std::path::Path;
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use crate::attribute::{AmrAttribute, FieldDescriptor};
use crate::cartesian_grid::CartesianGrid;
use crate::error::{Error, Result};
use crate::index_box::IndexBox;
use crate::tree::{MeshTree, NodeId};




/**
 * Per-field declarations are read from configuration as-is.
 */
pub type FieldConfig = FieldDescriptor;




/**
 * The root grid of a layout. Vectors must have one entry per axis.
 */
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct GridConfig {
    pub node_counts: Vec<usize>,
    pub origin: Vec<f64>,
    pub cell_size: Vec<f64>,
}




/**
 * One patch of a layout. `parent` is the path of child indexes leading from
 * the root to the patch's parent (empty for a direct child of the root);
 * `lo` and `hi` are in the parent's cell indexes.
 */
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PatchConfig {
    #[serde(default)]
    pub parent: Vec<usize>,
    pub lo: Vec<i64>,
    pub hi: Vec<i64>,
    pub factors: Vec<i64>,
}




/**
 * A whole patch layout. Patches are added in the order they are listed, so
 * a patch must come after its parent.
 */
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct LayoutConfig {
    pub root: GridConfig,
    #[serde(default)]
    pub patches: Vec<PatchConfig>,
}




#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AttributeConfig {
    #[serde(default)]
    pub ghost: usize,
    pub fields: Vec<FieldConfig>,
}




/**
 * A layout together with the attribute to allocate on it.
 */
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SetupConfig {
    pub layout: LayoutConfig,
    pub attribute: AttributeConfig,
}




fn to_array<T: Copy, const D: usize>(values: &[T], what: &str) -> Result<[T; D]> {
    <[T; D]>::try_from(values).map_err(|_| Error::StructuralMismatch(format!(
        "{} has {} entries in a {}-dimensional layout", what, values.len(), D)))
}




// ============================================================================
impl LayoutConfig {


    /**
     * Describe the patches of an existing tree, level by level.
     */
    pub fn from_tree<const D: usize>(tree: &MeshTree<D>) -> Result<Self> {
        let grid = tree.grid(tree.root())?;
        let mut patches = Vec::new();

        for id in (1..tree.max_number_of_levels()).flat_map(|level| tree.nodes_at_level(level)) {
            let node = tree.node(id)?;
            let cells = node.patch_box();

            let parent = match node.parent() {
                Some(parent) => parent,
                None => continue,
            };
            patches.push(PatchConfig {
                parent: path_to(tree, parent)?,
                lo: cells.lo().to_vec(),
                hi: cells.hi().to_vec(),
                factors: node.factors().to_vec(),
            });
        }
        Ok(Self {
            root: GridConfig {
                node_counts: grid.node_counts().to_vec(),
                origin: grid.origin().to_vec(),
                cell_size: grid.cell_size().to_vec(),
            },
            patches,
        })
    }
}

fn path_to<const D: usize>(tree: &MeshTree<D>, id: NodeId) -> Result<Vec<usize>> {
    let mut path = Vec::new();
    let mut current = id;

    while let Some(parent) = tree.father(current)? {
        let index = tree
            .children(parent)?
            .iter()
            .position(|&c| c == current)
            .ok_or(Error::UnknownNode(current.index()))?;
        path.push(index);
        current = parent;
    }
    path.reverse();
    Ok(path)
}




// ============================================================================
impl AttributeConfig {
    pub fn from_attribute<const D: usize>(attribute: &AmrAttribute<'_, D>) -> Self {
        Self {
            ghost: attribute.ghost_width(),
            fields: attribute.fields().to_vec(),
        }
    }
}




// ============================================================================
impl<const D: usize> MeshTree<D> {


    /**
     * Build a tree from a layout description. Fails on vectors of the wrong
     * length, on a parent path that does not exist, and on any patch that
     * `add_patch` would reject.
     */
    pub fn from_config(config: &LayoutConfig) -> Result<Self> {
        let root = &config.root;
        let grid = CartesianGrid::new(
            to_array(&root.node_counts, "root node_counts")?,
            to_array(&root.origin, "root origin")?,
            to_array(&root.cell_size, "root cell_size")?)?;

        let mut tree = Self::new(grid);

        for patch in &config.patches {
            let mut parent = tree.root();

            for &i in &patch.parent {
                parent = tree.patch(parent, i)?;
            }
            let cells = IndexBox::new(to_array(&patch.lo, "patch lo")?, to_array(&patch.hi, "patch hi")?)?;
            tree.add_patch(parent, cells, to_array(&patch.factors, "patch factors")?)?;
        }
        Ok(tree)
    }
}




// ============================================================================
impl<'a, const D: usize> AmrAttribute<'a, D> {


    /**
     * Bind a new, unallocated attribute to a tree from its configuration.
     */
    pub fn from_config(tree: &'a MeshTree<D>, config: &AttributeConfig) -> Result<Self> {
        Self::with_fields(tree, config.fields.clone(), config.ghost)
    }
}




/**
 * Parse a configuration record from TOML text.
 */
pub fn load_toml<T: DeserializeOwned>(text: &str) -> Result<T> {
    toml::from_str(text).map_err(|e| Error::Config(e.to_string()))
}


/**
 * Render a configuration record as TOML text.
 */
pub fn save_toml<T: Serialize>(value: &T) -> Result<String> {
    toml::to_string_pretty(value).map_err(|e| Error::Config(e.to_string()))
}

pub fn read_toml_file<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let text = std::fs::read_to_string(path).map_err(|e| Error::Config(format!("{}: {}", path.display(), e)))?;
    load_toml(&text)
}

pub fn write_toml_file<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    std::fs::write(path, save_toml(value)?).map_err(|e| Error::Config(format!("{}: {}", path.display(), e)))
}




// ============================================================================
#[cfg(test)]
mod test {

    use super::*;
    use crate::transfer::Nature;

    const SETUP: &str = r#"
        [layout.root]
        node_counts = [9, 9]
        origin = [0.0, 0.0]
        cell_size = [0.125, 0.125]

        [[layout.patches]]
        lo = [0, 0]
        hi = [4, 4]
        factors = [2, 2]

        [[layout.patches]]
        lo = [4, 0]
        hi = [8, 4]
        factors = [3, 2]

        [[layout.patches]]
        parent = [0]
        lo = [2, 2]
        hi = [6, 6]
        factors = [2, 2]

        [attribute]
        ghost = 2

        [[attribute.fields]]
        name = "density"
        components = 1
        nature = "IntensiveMaximum"

        [[attribute.fields]]
        name = "momentum"
        components = 2
        component_names = ["px", "py"]
    "#;

    #[test]
    fn setup_builds_tree_and_attribute() {
        let setup: SetupConfig = load_toml(SETUP).unwrap();
        let tree = MeshTree::<2>::from_config(&setup.layout).unwrap();

        assert_eq!(tree.number_of_patches(tree.root()).unwrap(), 2);
        assert_eq!(tree.max_number_of_levels(), 3);

        let first = tree.patch(tree.root(), 0).unwrap();
        let grandchild = tree.patch(first, 0).unwrap();
        assert_eq!(tree.grid(grandchild).unwrap().cell_counts(), [8, 8]);

        let att = AmrAttribute::from_config(&tree, &setup.attribute).unwrap();
        assert_eq!(att.ghost_width(), 2);
        assert_eq!(att.field_names(), vec!["density", "momentum"]);
        assert_eq!(att.nature("density").unwrap(), Nature::IntensiveMaximum);
        assert_eq!(att.nature("momentum").unwrap(), Nature::Extensive);
        assert!(!att.is_allocated());
    }

    #[test]
    fn layout_survives_a_trip_through_toml() {
        let setup: SetupConfig = load_toml(SETUP).unwrap();
        let tree = MeshTree::<2>::from_config(&setup.layout).unwrap();
        let layout = LayoutConfig::from_tree(&tree).unwrap();

        assert_eq!(layout, setup.layout);

        let text = save_toml(&layout).unwrap();
        let again = MeshTree::<2>::from_config(&load_toml(&text).unwrap()).unwrap();
        assert_eq!(again, tree);
    }

    #[test]
    fn bad_layouts_are_rejected() {
        let setup: SetupConfig = load_toml(SETUP).unwrap();
        assert!(matches!(MeshTree::<3>::from_config(&setup.layout), Err(Error::StructuralMismatch(_))));

        let mut overlapping = setup.layout.clone();
        overlapping.patches[1].lo = vec![3, 0];
        assert!(matches!(MeshTree::<2>::from_config(&overlapping), Err(Error::Overlap { .. })));

        let mut orphan = setup.layout;
        orphan.patches[2].parent = vec![5];
        assert!(matches!(MeshTree::<2>::from_config(&orphan), Err(Error::OutOfRange(_))));

        assert!(matches!(load_toml::<LayoutConfig>("root = 1"), Err(Error::Config(_))));
    }
}
