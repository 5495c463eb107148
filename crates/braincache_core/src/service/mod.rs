//! Use-case layer over the repositories.
//!
//! # Responsibility
//! - Replace the global shared context with one explicitly wired workspace.
//! - Keep UI collaborators away from repository and migration details.

pub mod workspace;

pub use workspace::{ShutdownReport, Workspace, WorkspaceError, WorkspaceResult};
