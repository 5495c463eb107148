//! Generic JSON-file entity repository with debounced write-back.
//!
//! # Responsibility
//! - Own the in-memory cache and on-disk directory of one entity type.
//! - Load the directory off-thread and hand the result to the main queue.
//! - Coalesce change notifications into one disk write per entity per
//!   debounce window.
//!
//! # Invariants
//! - `has`/`read` reflect `write`/`remove` immediately, before any disk I/O.
//! - At most one timer is scheduled per repository at a time; UIDs added
//!   while it is pending fold into the same batch.
//! - Flushes of one repository never overlap (`flush_gate`), and a flush
//!   serializes the entity state at flush time, not at enqueue time.
//! - `remove` drops the UID from the pending batch, so a removed entity is
//!   never written back.
//! - Deleted records go to the trash; nothing is unlinked.

use crate::event::{DomainEvent, EventBus, MainQueue, RepoId, Subscribers, Subscription};
use crate::model::entity::{shared, Entity, EntityRef, Shared};
use crate::model::uid::Uid;
use crate::repo::fs::{list_records, record_path, Trash};
use crate::repo::serializer::EntitySerializer;
use log::{debug, error, info, warn};
use parking_lot::{Mutex, RwLock};
use std::collections::{BTreeSet, HashMap};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use std::thread;
use std::time::{Duration, Instant};

/// Debounce window used when no other delay is configured.
pub const DEFAULT_FLUSH_DELAY: Duration = Duration::from_millis(3000);

/// Construction parameters for one repository.
#[derive(Debug, Clone)]
pub struct RepositorySettings {
    pub id: RepoId,
    /// Directory holding one `<uid>.<extension>` record per entity.
    pub dir: PathBuf,
    pub extension: String,
    pub flush_delay: Duration,
    pub trash: Trash,
}

/// Outcome of one flush batch.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FlushReport {
    pub written: usize,
    /// Entities whose encode or write failed; they are retried on their next
    /// change.
    pub failed: Vec<Uid>,
}

struct EntityCache<T> {
    by_uid: HashMap<Uid, Shared<T>>,
    ordered: Vec<Shared<T>>,
}

impl<T> Default for EntityCache<T> {
    fn default() -> Self {
        Self {
            by_uid: HashMap::new(),
            ordered: Vec::new(),
        }
    }
}

impl<T> EntityCache<T> {
    /// Inserts or replaces; returns `true` when `uid` was not cached before.
    fn upsert(&mut self, uid: Uid, entity: Shared<T>) -> bool {
        match self.by_uid.insert(uid, Arc::clone(&entity)) {
            Some(previous) => {
                if let Some(slot) = self
                    .ordered
                    .iter_mut()
                    .find(|cached| Arc::ptr_eq(cached, &previous))
                {
                    *slot = entity;
                }
                false
            }
            None => {
                self.ordered.push(entity);
                true
            }
        }
    }

    fn evict(&mut self, uid: Uid) -> Option<Shared<T>> {
        let evicted = self.by_uid.remove(&uid)?;
        self.ordered.retain(|cached| !Arc::ptr_eq(cached, &evicted));
        Some(evicted)
    }
}

#[derive(Default)]
struct PendingWrites {
    uids: BTreeSet<Uid>,
    flush_scheduled: bool,
}

struct RepoInner<T: Entity> {
    id: RepoId,
    dir: PathBuf,
    extension: String,
    flush_delay: Duration,
    trash: Trash,
    serializer: Arc<dyn EntitySerializer<T>>,
    bus: EventBus,
    queue: MainQueue,
    cache: RwLock<EntityCache<T>>,
    pending: Mutex<PendingWrites>,
    flush_gate: Mutex<()>,
    ready: AtomicBool,
    persisted_writes: AtomicU64,
    collection: Subscribers<Vec<Shared<T>>>,
}

/// Single source of truth for all live instances of `T`.
pub struct EntityRepository<T: Entity> {
    inner: Arc<RepoInner<T>>,
    bus_subscription: Subscription,
}

impl<T: Entity> EntityRepository<T> {
    /// Creates the repository and starts observing `EntityChanged` events for
    /// its own entities. Nothing is read until `open` is called.
    pub fn new(
        settings: RepositorySettings,
        serializer: impl EntitySerializer<T> + 'static,
        bus: EventBus,
        queue: MainQueue,
    ) -> Self {
        let inner = Arc::new(RepoInner {
            id: settings.id,
            dir: settings.dir,
            extension: settings.extension,
            flush_delay: settings.flush_delay,
            trash: settings.trash,
            serializer: Arc::new(serializer),
            bus: bus.clone(),
            queue,
            cache: RwLock::new(EntityCache::default()),
            pending: Mutex::new(PendingWrites::default()),
            flush_gate: Mutex::new(()),
            ready: AtomicBool::new(false),
            persisted_writes: AtomicU64::new(0),
            collection: Subscribers::new(),
        });

        let observer: Weak<RepoInner<T>> = Arc::downgrade(&inner);
        let bus_subscription = bus.subscribe(move |event| {
            let DomainEvent::EntityChanged(entity) = event else {
                return;
            };
            if entity.kind != T::KIND {
                return;
            }
            if let Some(inner) = observer.upgrade() {
                if inner.has(entity.uid) {
                    inner.enqueue(entity.uid);
                }
            }
        });

        Self {
            inner,
            bus_subscription,
        }
    }

    pub fn id(&self) -> RepoId {
        self.inner.id
    }

    pub fn dir(&self) -> &Path {
        &self.inner.dir
    }

    /// Starts the asynchronous initial load.
    ///
    /// The directory is created if missing and read on a background thread;
    /// decoded entities are installed on the main queue, which then publishes
    /// `RepositoryReady`. Undecodable records are logged and skipped.
    pub fn open(&self) {
        let inner = &self.inner;
        info!(
            "event=repo_open module=repo status=start repo={} dir={}",
            inner.id,
            inner.dir.display()
        );
        if let Err(err) = fs::create_dir_all(&inner.dir) {
            error!(
                "event=repo_open module=repo status=error repo={} dir={} error_code=create_dir_failed error={}",
                inner.id,
                inner.dir.display(),
                err
            );
        }

        let loader = Arc::clone(inner);
        let spawned = thread::Builder::new()
            .name(format!("braincache-load-{}", inner.id))
            .spawn(move || {
                let started_at = Instant::now();
                let entities = loader.load_from_disk();
                let queue = loader.queue.clone();
                queue.post(move || loader.install_loaded(entities, started_at));
            });

        if let Err(err) = spawned {
            warn!(
                "event=repo_open module=repo status=error repo={} error_code=loader_spawn_failed error={} fallback=inline",
                inner.id, err
            );
            let started_at = Instant::now();
            let entities = inner.load_from_disk();
            let loader = Arc::clone(inner);
            inner
                .queue
                .post(move || loader.install_loaded(entities, started_at));
        }
    }

    pub fn is_ready(&self) -> bool {
        self.inner.ready.load(Ordering::SeqCst)
    }

    pub fn has(&self, uid: Uid) -> bool {
        self.inner.has(uid)
    }

    pub fn read(&self, uid: Uid) -> Option<Shared<T>> {
        self.inner.read(uid)
    }

    /// Snapshot of every cached entity in insertion order.
    pub fn entities(&self) -> Vec<Shared<T>> {
        self.inner.cache.read().ordered.clone()
    }

    pub fn len(&self) -> usize {
        self.inner.cache.read().ordered.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Upserts `entity` and schedules it for debounced persistence.
    ///
    /// `EntityChanged` is published only when the entity is new to the cache.
    pub fn write(&self, entity: Shared<T>) {
        let uid = entity.read().uid();
        let introduced = self.inner.cache.write().upsert(uid, entity);
        if introduced {
            debug!(
                "event=repo_write module=repo status=ok repo={} uid={} introduced=true",
                self.inner.id, uid
            );
            self.inner
                .bus
                .publish(DomainEvent::EntityChanged(EntityRef::new(T::KIND, uid)));
            self.inner.emit_collection();
        }
        self.inner.enqueue(uid);
    }

    /// Moves the entity's record to the trash and evicts it from the cache.
    ///
    /// A failed trash move is logged; the cache entry is evicted regardless.
    /// Returns `false` when `uid` was not cached.
    pub fn remove(&self, uid: Uid) -> bool {
        let inner = &self.inner;
        {
            let _gate = inner.flush_gate.lock();
            if !inner.has(uid) {
                return false;
            }

            let path = record_path(&inner.dir, uid, &inner.extension);
            if path.exists() {
                match inner.trash.move_to_trash(&path) {
                    Ok(target) => info!(
                        "event=record_trash module=repo status=ok repo={} uid={} target={}",
                        inner.id,
                        uid,
                        target.display()
                    ),
                    Err(err) => error!(
                        "event=record_trash module=repo status=error repo={} uid={} error_code=trash_failed error={}",
                        inner.id, uid, err
                    ),
                }
            }

            inner.cache.write().evict(uid);
            inner.pending.lock().uids.remove(&uid);
        }

        info!(
            "event=repo_remove module=repo status=ok repo={} uid={}",
            inner.id, uid
        );
        inner.emit_collection();
        true
    }

    /// Observes the full collection each time it is republished (after the
    /// initial load, first-time writes and removals).
    pub fn subscribe_collection(
        &self,
        handler: impl Fn(&Vec<Shared<T>>) + Send + Sync + 'static,
    ) -> Subscription {
        self.inner.collection.subscribe(handler)
    }

    /// Number of UIDs waiting for the next flush.
    pub fn pending_count(&self) -> usize {
        self.inner.pending.lock().uids.len()
    }

    /// Records written to disk since construction.
    pub fn persisted_writes(&self) -> u64 {
        self.inner.persisted_writes.load(Ordering::SeqCst)
    }

    /// Writes every pending entity now, on the calling thread.
    ///
    /// Intended for shutdown; waits for an in-flight timer flush to finish
    /// first and publishes `RepositoryFlushed` directly.
    pub fn flush_now(&self) -> FlushReport {
        let report = self.inner.flush_pending();
        self.inner
            .bus
            .publish(DomainEvent::RepositoryFlushed(self.inner.id));
        report
    }
}

impl<T: Entity> Drop for EntityRepository<T> {
    fn drop(&mut self) {
        self.bus_subscription.unsubscribe();
        if self.pending_count() > 0 {
            let report = self.inner.flush_pending();
            info!(
                "event=repo_drop_flush module=repo status=ok repo={} written={} failed={}",
                self.inner.id,
                report.written,
                report.failed.len()
            );
        }
    }
}

impl<T: Entity> RepoInner<T> {
    fn has(&self, uid: Uid) -> bool {
        self.cache.read().by_uid.contains_key(&uid)
    }

    fn read(&self, uid: Uid) -> Option<Shared<T>> {
        self.cache.read().by_uid.get(&uid).cloned()
    }

    fn emit_collection(&self) {
        let snapshot = self.cache.read().ordered.clone();
        self.collection.emit(&snapshot);
    }

    fn load_from_disk(&self) -> Vec<T> {
        let paths = match list_records(&self.dir, &self.extension) {
            Ok(paths) => paths,
            Err(err) => {
                error!(
                    "event=repo_load module=repo status=error repo={} dir={} error_code=list_dir_failed error={}",
                    self.id,
                    self.dir.display(),
                    err
                );
                return Vec::new();
            }
        };

        let mut entities = Vec::with_capacity(paths.len());
        for path in paths {
            let decoded = fs::read(&path)
                .map_err(|err| err.to_string())
                .and_then(|bytes| {
                    self.serializer
                        .decode(&bytes)
                        .map_err(|err| err.to_string())
                });
            match decoded {
                Ok(entity) => entities.push(entity),
                Err(err) => warn!(
                    "event=record_decode module=repo status=skip repo={} path={} error={}",
                    self.id,
                    path.display(),
                    err
                ),
            }
        }
        entities
    }

    fn install_loaded(&self, entities: Vec<T>, started_at: Instant) {
        let loaded = entities.len();
        {
            let mut cache = self.cache.write();
            for entity in entities {
                let uid = entity.uid();
                // A write that raced the load wins over the disk copy.
                if !cache.by_uid.contains_key(&uid) {
                    cache.upsert(uid, shared(entity));
                }
            }
        }
        self.ready.store(true, Ordering::SeqCst);
        info!(
            "event=repo_load module=repo status=ok repo={} count={} duration_ms={}",
            self.id,
            loaded,
            started_at.elapsed().as_millis()
        );
        self.emit_collection();
        self.bus.publish(DomainEvent::RepositoryReady(self.id));
    }

    fn enqueue(self: &Arc<Self>, uid: Uid) {
        let schedule = {
            let mut pending = self.pending.lock();
            pending.uids.insert(uid);
            if pending.flush_scheduled {
                false
            } else {
                pending.flush_scheduled = true;
                true
            }
        };
        if schedule {
            self.schedule_flush();
        }
    }

    fn schedule_flush(self: &Arc<Self>) {
        let weak = Arc::downgrade(self);
        let delay = self.flush_delay;
        let spawned = thread::Builder::new()
            .name(format!("braincache-flush-{}", self.id))
            .spawn(move || {
                thread::sleep(delay);
                let Some(inner) = weak.upgrade() else {
                    return;
                };
                inner.flush_pending();
                let bus = inner.bus.clone();
                let id = inner.id;
                inner
                    .queue
                    .post(move || bus.publish(DomainEvent::RepositoryFlushed(id)));
            });

        if let Err(err) = spawned {
            // Leave the UIDs pending; the next change schedules again.
            self.pending.lock().flush_scheduled = false;
            error!(
                "event=repo_flush module=repo status=error repo={} error_code=timer_spawn_failed error={}",
                self.id, err
            );
        }
    }

    fn flush_pending(&self) -> FlushReport {
        let _gate = self.flush_gate.lock();
        let uids = {
            let mut pending = self.pending.lock();
            pending.flush_scheduled = false;
            std::mem::take(&mut pending.uids)
        };

        let mut report = FlushReport::default();
        if uids.is_empty() {
            return report;
        }
        let started_at = Instant::now();
        if let Err(err) = fs::create_dir_all(&self.dir) {
            error!(
                "event=repo_flush module=repo status=error repo={} dir={} error_code=create_dir_failed error={}",
                self.id,
                self.dir.display(),
                err
            );
        }

        for uid in uids {
            let Some(entity) = self.read(uid) else {
                continue;
            };
            match self.persist(uid, &entity) {
                Ok(()) => {
                    report.written += 1;
                    self.persisted_writes.fetch_add(1, Ordering::SeqCst);
                }
                Err(err) => {
                    error!(
                        "event=record_write module=repo status=error repo={} uid={} error={}",
                        self.id, uid, err
                    );
                    report.failed.push(uid);
                }
            }
        }

        info!(
            "event=repo_flush module=repo status=ok repo={} written={} failed={} duration_ms={}",
            self.id,
            report.written,
            report.failed.len(),
            started_at.elapsed().as_millis()
        );
        report
    }

    /// Encodes the current entity state and replaces its record atomically.
    fn persist(&self, uid: Uid, entity: &Shared<T>) -> Result<(), String> {
        let bytes = {
            let guard = entity.read();
            self.serializer
                .encode(&guard)
                .map_err(|err| format!("encode failed: {err}"))?
        };
        let path = record_path(&self.dir, uid, &self.extension);
        let staging = path.with_extension(format!("{}.tmp", self.extension));
        fs::write(&staging, bytes).map_err(|err| format!("write failed: {err}"))?;
        fs::rename(&staging, &path).map_err(|err| format!("rename failed: {err}"))
    }
}
