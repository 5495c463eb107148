//! Domain model for the folder/file outliner.
//!
//! # Responsibility
//! - Define live entities and the body variants they carry.
//! - Announce mutations through explicit setters, never implicit observers.
//!
//! # Invariants
//! - Every entity is identified by a process-unique `Uid`.
//! - Relationships are held as UIDs; the repositories own the objects.

pub mod body;
pub mod entity;
pub mod file;
pub mod folder;
pub mod uid;
