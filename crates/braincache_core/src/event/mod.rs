//! Domain notifications and the coordination context they are delivered on.
//!
//! # Responsibility
//! - Decouple entity mutation from storage via a synchronous event bus.
//! - Provide the single "main" task queue background workers post back to.
//!
//! # Invariants
//! - Bus delivery is synchronous and ordered by subscription.
//! - Background threads never publish directly; they post to `MainQueue`.

pub mod bus;
pub mod queue;

pub use bus::{DomainEvent, EventBus, RepoId, Subscribers, Subscription};
pub use queue::MainQueue;
