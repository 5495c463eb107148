//! Shared entity contract.

use crate::model::uid::Uid;
use parking_lot::RwLock;
use std::fmt::{Display, Formatter};
use std::sync::Arc;

/// Live entities are shared between the repository cache, the folder graph
/// and UI collaborators. Repository calls must not be made while holding a
/// guard on the same entity.
pub type Shared<T> = Arc<RwLock<T>>;

pub fn shared<T>(entity: T) -> Shared<T> {
    Arc::new(RwLock::new(entity))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntityKind {
    Folder,
    File,
}

impl EntityKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Folder => "folder",
            Self::File => "file",
        }
    }
}

/// Payload of `EntityChanged`: which entity, never the entity itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct EntityRef {
    pub kind: EntityKind,
    pub uid: Uid,
}

impl EntityRef {
    pub const fn new(kind: EntityKind, uid: Uid) -> Self {
        Self { kind, uid }
    }
}

impl Display for EntityRef {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.kind.as_str(), self.uid)
    }
}

/// Domain object persisted by an `EntityRepository`.
pub trait Entity: Send + Sync + 'static {
    const KIND: EntityKind;

    fn uid(&self) -> Uid;

    fn entity_ref(&self) -> EntityRef {
        EntityRef::new(Self::KIND, self.uid())
    }
}
