//! Live folder tree, rebuilt from UID references after both repositories
//! finish loading.

pub mod reconstructor;

pub use reconstructor::{FolderGraph, GraphError, GraphReconstructor, GraphResult};
