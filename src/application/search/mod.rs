pub mod action_space;
pub mod tree;

pub use action_space::{ActionSpace, CatalogActions, TransformationActions};
pub use tree::{SearchConfig, SearchNode, SearchOutcome, SearchTree, TreeSearch};
