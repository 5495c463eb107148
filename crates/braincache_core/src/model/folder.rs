//! Folder domain model.
//!
//! # Responsibility
//! - Hold a folder's title, ordered child UIDs and selection state.
//! - Announce every real state change on the event bus.
//!
//! # Invariants
//! - `selected_file`, when set, is a member of `files`.
//! - Child lists never contain duplicates.
//! - `parent` is a derived back-reference: it is linked during graph
//!   reconstruction and by workspace moves, never persisted, never owning.

use crate::event::{DomainEvent, EventBus};
use crate::model::entity::{Entity, EntityKind};
use crate::model::uid::Uid;
use std::fmt::{Debug, Formatter};

pub const DEFAULT_FOLDER_TITLE: &str = "New Folder";

pub struct Folder {
    pub(crate) uid: Uid,
    pub(crate) title: String,
    pub(crate) files: Vec<Uid>,
    pub(crate) folders: Vec<Uid>,
    pub(crate) selected_file: Option<Uid>,
    pub(crate) is_opened: bool,
    pub(crate) parent: Option<Uid>,
    bus: EventBus,
}

impl Folder {
    /// Creates an empty folder titled `New Folder` with a fresh UID.
    pub fn new(bus: EventBus) -> Self {
        Self::with_uid(Uid::next(), DEFAULT_FOLDER_TITLE, bus)
    }

    pub fn with_uid(uid: Uid, title: impl Into<String>, bus: EventBus) -> Self {
        Self {
            uid,
            title: title.into(),
            files: Vec::new(),
            folders: Vec::new(),
            selected_file: None,
            is_opened: false,
            parent: None,
            bus,
        }
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn files(&self) -> &[Uid] {
        &self.files
    }

    pub fn folders(&self) -> &[Uid] {
        &self.folders
    }

    pub fn selected_file(&self) -> Option<Uid> {
        self.selected_file
    }

    pub fn is_opened(&self) -> bool {
        self.is_opened
    }

    pub fn parent(&self) -> Option<Uid> {
        self.parent
    }

    pub fn contains_file(&self, uid: Uid) -> bool {
        self.files.contains(&uid)
    }

    pub fn contains_folder(&self, uid: Uid) -> bool {
        self.folders.contains(&uid)
    }

    pub fn set_title(&mut self, title: impl Into<String>) {
        let title = title.into();
        if self.title != title {
            self.title = title;
            self.notify_changed();
        }
    }

    pub fn set_opened(&mut self, is_opened: bool) {
        if self.is_opened != is_opened {
            self.is_opened = is_opened;
            self.notify_changed();
        }
    }

    /// Selects a member file, or clears the selection with `None`.
    ///
    /// Returns `false` (and changes nothing) for a file outside this folder.
    pub fn select_file(&mut self, uid: Option<Uid>) -> bool {
        if let Some(uid) = uid {
            if !self.contains_file(uid) {
                return false;
            }
        }
        if self.selected_file != uid {
            self.selected_file = uid;
            self.notify_changed();
        }
        true
    }

    pub fn add_file(&mut self, uid: Uid) {
        if !self.contains_file(uid) {
            self.files.push(uid);
            self.notify_changed();
        }
    }

    /// Removes a child file; a removed selection moves to the previous
    /// sibling, or is cleared when there is none.
    pub fn remove_file(&mut self, uid: Uid) -> bool {
        let Some(index) = self.files.iter().position(|child| *child == uid) else {
            return false;
        };
        self.files.remove(index);
        if self.selected_file == Some(uid) {
            self.selected_file = index.checked_sub(1).map(|previous| self.files[previous]);
        }
        self.notify_changed();
        true
    }

    pub fn add_folder(&mut self, uid: Uid) {
        if uid != self.uid && !self.contains_folder(uid) {
            self.folders.push(uid);
            self.notify_changed();
        }
    }

    pub fn remove_folder(&mut self, uid: Uid) -> bool {
        let Some(index) = self.folders.iter().position(|child| *child == uid) else {
            return false;
        };
        self.folders.remove(index);
        self.notify_changed();
        true
    }

    pub(crate) fn link_parent(&mut self, parent: Option<Uid>) {
        self.parent = parent;
    }

    fn notify_changed(&self) {
        self.bus.publish(DomainEvent::EntityChanged(self.entity_ref()));
    }
}

impl Entity for Folder {
    const KIND: EntityKind = EntityKind::Folder;

    fn uid(&self) -> Uid {
        self.uid
    }
}

impl PartialEq for Folder {
    fn eq(&self, other: &Self) -> bool {
        self.uid == other.uid
            && self.title == other.title
            && self.files == other.files
            && self.folders == other.folders
            && self.selected_file == other.selected_file
            && self.is_opened == other.is_opened
    }
}

impl Debug for Folder {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Folder")
            .field("uid", &self.uid)
            .field("files", &self.files)
            .field("folders", &self.folders)
            .field("selected_file", &self.selected_file)
            .field("is_opened", &self.is_opened)
            .field("parent", &self.parent)
            .finish_non_exhaustive()
    }
}
