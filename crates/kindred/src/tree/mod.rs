//! Family-tree traversals: mini pedigree views, relatives within a degree,
//! and kinship between two people.

mod graph;
mod kinship;
pub mod router;
pub mod service;

pub use graph::{FamilyGraph, Step};
pub use kinship::describe as describe_kinship;
pub use router::tree_router;
pub use service::{
    MiniTree, Relationship, Relative, TreeEdge, TreeError, TreeNode, TreeRole, TreeService,
};
