//! Patchwork is a block-structured adaptive mesh refinement (AMR) library. A
//! mesh is a tree of rectangular, structured grid patches: each patch refines
//! a box of its parent's cells by an independent integer factor on every
//! axis, and sibling patches never overlap. Per-cell data is held by
//! attributes bound to a tree, one array per node with a uniform layer of
//! ghost cells, and the library keeps those ghost layers consistent between
//! parents and children, between siblings, and across non-adjacent levels.
//! Transfers between levels are exact: injection from coarse to fine, and
//! condensation (a sum or a mean) from fine to coarse.

pub mod attribute;
pub mod cartesian_grid;
pub mod config;
pub mod error;
pub mod export;
pub mod index_box;
pub mod patch;
pub mod projection;
pub mod splitting;
pub mod sync;
pub mod transfer;
pub mod tree;

pub use attribute::{AmrAttribute, FieldDescriptor};
pub use cartesian_grid::CartesianGrid;
pub use error::{Error, Result};
pub use index_box::{Factors, GlobalPosition, Index, IndexBox};
pub use patch::PatchData;
pub use splitting::BoxSplittingOptions;
pub use transfer::Nature;
pub use tree::{GridNode, MeshTree, NodeId};
