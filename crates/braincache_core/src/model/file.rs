//! File domain model.
//!
//! # Invariants
//! - `body` keeps the variant it was created with.
//! - `folder` is a derived back-reference (not persisted in the current
//!   schema generation).

use crate::event::{DomainEvent, EventBus};
use crate::model::body::{FileBody, ListBody, TableBody, TextBody};
use crate::model::entity::{Entity, EntityKind};
use crate::model::uid::Uid;
use std::fmt::{Debug, Formatter};

pub const DEFAULT_FILE_TITLE: &str = "New File";

pub struct File {
    pub(crate) uid: Uid,
    pub(crate) title: String,
    pub(crate) folder: Option<Uid>,
    pub(crate) use_mono_font: bool,
    pub(crate) body: FileBody,
    bus: EventBus,
}

impl File {
    pub fn new_text(bus: EventBus) -> Self {
        Self::with_uid(
            Uid::next(),
            DEFAULT_FILE_TITLE,
            FileBody::Text(TextBody::default()),
            bus,
        )
    }

    pub fn new_table(columns: usize, bus: EventBus) -> Self {
        Self::with_uid(
            Uid::next(),
            DEFAULT_FILE_TITLE,
            FileBody::Table(TableBody::with_columns(columns)),
            bus,
        )
    }

    pub fn new_list(columns: usize, bus: EventBus) -> Self {
        Self::with_uid(
            Uid::next(),
            DEFAULT_FILE_TITLE,
            FileBody::List(ListBody::with_columns(columns)),
            bus,
        )
    }

    pub fn with_uid(uid: Uid, title: impl Into<String>, body: FileBody, bus: EventBus) -> Self {
        Self {
            uid,
            title: title.into(),
            folder: None,
            use_mono_font: false,
            body,
            bus,
        }
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn folder(&self) -> Option<Uid> {
        self.folder
    }

    pub fn use_mono_font(&self) -> bool {
        self.use_mono_font
    }

    pub fn body(&self) -> &FileBody {
        &self.body
    }

    pub fn set_title(&mut self, title: impl Into<String>) {
        let title = title.into();
        if self.title != title {
            self.title = title;
            self.notify_changed();
        }
    }

    pub fn set_use_mono_font(&mut self, use_mono_font: bool) {
        if self.use_mono_font != use_mono_font {
            self.use_mono_font = use_mono_font;
            self.notify_changed();
        }
    }

    /// Applies an in-place body edit and announces it if the body changed.
    ///
    /// A closure that swaps the variant is reverted: the variant is fixed at
    /// creation.
    pub fn edit_body<R>(&mut self, edit: impl FnOnce(&mut FileBody) -> R) -> R {
        let before = self.body.clone();
        let result = edit(&mut self.body);
        if std::mem::discriminant(&before) != std::mem::discriminant(&self.body) {
            log::warn!(
                "event=file_body_edit module=model status=error uid={} error_code=variant_change_rejected",
                self.uid
            );
            self.body = before;
        } else if before != self.body {
            self.notify_changed();
        }
        result
    }

    pub(crate) fn link_folder(&mut self, folder: Option<Uid>) {
        self.folder = folder;
    }

    fn notify_changed(&self) {
        self.bus.publish(DomainEvent::EntityChanged(self.entity_ref()));
    }
}

impl Entity for File {
    const KIND: EntityKind = EntityKind::File;

    fn uid(&self) -> Uid {
        self.uid
    }
}

impl PartialEq for File {
    fn eq(&self, other: &Self) -> bool {
        self.uid == other.uid
            && self.title == other.title
            && self.use_mono_font == other.use_mono_font
            && self.body == other.body
    }
}

impl Debug for File {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("File")
            .field("uid", &self.uid)
            .field("folder", &self.folder)
            .field("use_mono_font", &self.use_mono_font)
            .field("body", &self.body.kind_str())
            .finish_non_exhaustive()
    }
}
