//! Named, asynchronously loaded, versioned, reference-counted assets.
//!
//! Records live in a generational pool behind a read-write lock; loader
//! closures run on the task scheduler. Pinning an asset yields a [`Lease`]
//! onto the value held *at pin time*: a reload installs a fresh value cell
//! rather than mutating the old one, so existing leases keep observing the
//! pre-reload value until they are dropped.

use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::ops::Deref;
use std::sync::Arc;

use parking_lot::RwLock;
use tracing::{debug, warn};

use crate::core::error::{AssetError, LoaderResult, SchedulerError};
use crate::core::resource_pool::{GenerationalPool, Handle};
use crate::core::task_scheduler::TaskScheduler;

/// Pool role tag for asset records; see [`Handle`].
pub struct AssetsTag;

/// Handle identifying an asset record.
pub type AssetHandle = Handle<AssetsTag>;

/// Lifecycle state of an asset record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssetState {
    /// No record resolves for the handle (never loaded, or unloaded).
    Unloaded,
    /// A loader is in flight; the record has no current value yet (initial
    /// load) or still exposes the previous value to existing leases (reload).
    Loading,
    /// A pass is actively consuming or transforming the asset; pinning is
    /// disallowed until the gate is released.
    Processing,
    /// The current value is available for pinning.
    Loaded,
    /// The most recent loader invocation reported an error.
    Failed,
}

/// Value cell shared between a record and the leases pinned from it.
type ErasedValue = Arc<dyn Any + Send + Sync>;

/// Loader normalized to produce a shared, type-erased cell.
type ErasedLoader = Arc<dyn Fn(&str, AssetHandle) -> LoaderResult<ErasedValue> + Send + Sync>;

/// One record per unique asset name.
struct AssetRecord {
    name: String,
    /// Type identity captured at load time; checked on every typed access.
    type_id: TypeId,
    type_name: &'static str,
    state: AssetState,
    /// Current value cell; swapped (never mutated in place) on reload.
    value: Option<ErasedValue>,
    loader: ErasedLoader,
    failure: Option<String>,
}

/// Record storage plus the name index, guarded by one lock so the two can
/// never disagree.
struct AssetTable {
    records: GenerationalPool<AssetRecord, AssetsTag>,
    by_name: HashMap<String, AssetHandle>,
}

/// A read-capable, reference-counted view onto an asset's value as of the
/// moment it was pinned.
///
/// Cloning a lease is cheap; the underlying value lives until the last lease
/// (and, if it is still current, the record) releases it.
pub struct Lease<T> {
    value: Arc<T>,
}

impl<T> Deref for Lease<T> {
    type Target = T;

    fn deref(&self) -> &T {
        &self.value
    }
}

impl<T> Clone for Lease<T> {
    fn clone(&self) -> Self {
        Self {
            value: Arc::clone(&self.value),
        }
    }
}

/// Asset lease manager: named records, asynchronous population via the task
/// scheduler, and lease-based pinning that survives reloads.
///
/// The manager is cheap to clone; clones share the same record table and
/// scheduler.
#[derive(Clone)]
pub struct AssetManager {
    scheduler: Arc<TaskScheduler>,
    table: Arc<RwLock<AssetTable>>,
}

impl AssetManager {
    /// Create a manager that runs loaders on `scheduler` and defers record
    /// recycling by `frames_in_flight` frames (see
    /// [`AssetManager::process_unloads`]).
    #[must_use]
    pub fn new(scheduler: Arc<TaskScheduler>, frames_in_flight: u64) -> Self {
        Self {
            scheduler,
            table: Arc::new(RwLock::new(AssetTable {
                records: GenerationalPool::new(frames_in_flight),
                by_name: HashMap::new(),
            })),
        }
    }

    /// Cap the number of asset records; exceeding it surfaces
    /// [`crate::core::error::PoolError::OutOfMemory`] from
    /// [`AssetManager::load`].
    #[must_use]
    pub fn with_slot_limit(self, limit: usize) -> Self {
        {
            let mut table = self.table.write();
            let records = std::mem::replace(
                &mut table.records,
                GenerationalPool::new(0),
            );
            table.records = records.with_slot_limit(limit);
        }
        self
    }

    /// Register `name` and dispatch `loader` onto the task scheduler; if a
    /// record for `name` already exists, its handle is returned without
    /// re-dispatching.
    ///
    /// The loader receives the asset name and handle and returns an owned
    /// value; sole-ownership (non-`Clone`) results are accepted. It must be
    /// safe to run on an arbitrary worker thread, may dispatch further
    /// tasks, but must not call [`TaskScheduler::wait_for_all`]. It is
    /// retained for reloads and therefore invoked possibly more than once.
    ///
    /// # Errors
    ///
    /// - [`AssetError::Pool`] if the record pool is exhausted
    /// - [`AssetError::Scheduler`] if the loader could not be dispatched (the
    ///   record is then marked [`AssetState::Failed`])
    pub fn load<T, F>(&self, name: &str, loader: F) -> Result<AssetHandle, AssetError>
    where
        T: Send + Sync + 'static,
        F: Fn(&str, AssetHandle) -> LoaderResult<T> + Send + Sync + 'static,
    {
        if let Some(&handle) = self.table.read().by_name.get(name) {
            return Ok(handle);
        }

        // Normalize the loader output into a shared cell so leases are cheap
        // to duplicate no matter how the value was produced.
        let erased: ErasedLoader = Arc::new(move |name: &str, handle: AssetHandle| {
            loader(name, handle).map(|value| Arc::new(value) as ErasedValue)
        });

        let handle = {
            let mut table = self.table.write();
            // Re-check under the write lock; another thread may have won.
            if let Some(&handle) = table.by_name.get(name) {
                return Ok(handle);
            }
            let handle = table.records.insert(AssetRecord {
                name: name.to_owned(),
                type_id: TypeId::of::<T>(),
                type_name: std::any::type_name::<T>(),
                state: AssetState::Loading,
                value: None,
                loader: erased,
                failure: None,
            })?;
            table.by_name.insert(name.to_owned(), handle);
            handle
        };

        debug!(asset = name, "asset registered, dispatching loader");
        self.dispatch_load(handle).map_err(|error| {
            let mut table = self.table.write();
            if let Some(record) = table.records.get_mut(handle) {
                record.state = AssetState::Failed;
                record.failure = Some(error.to_string());
            }
            AssetError::Scheduler(error)
        })?;
        Ok(handle)
    }

    /// Pin the asset's current value, extending its lifetime for at least
    /// the lease's lifetime, independent of later reloads.
    ///
    /// # Errors
    ///
    /// - [`AssetError::NotLoaded`] unless the record is in
    ///   [`AssetState::Loaded`] (stale handles, in-flight loads, failures,
    ///   and the processing gate all report this)
    /// - [`AssetError::TypeMismatch`] if `T` differs from the type recorded
    ///   at load time
    pub fn pin<T>(&self, handle: AssetHandle) -> Result<Lease<T>, AssetError>
    where
        T: Send + Sync + 'static,
    {
        let table = self.table.read();
        let record = Self::loaded_record::<T>(&table, handle)?;
        let cell = record.value.clone().ok_or(AssetError::NotLoaded)?;
        drop(table);

        cell.downcast::<T>().map_or(
            Err(AssetError::NotLoaded),
            |value| Ok(Lease { value }),
        )
    }

    /// Borrow-scoped access to the current value without lifetime extension;
    /// same state and type checks as [`AssetManager::pin`].
    ///
    /// # Errors
    ///
    /// See [`AssetManager::pin`].
    pub fn with_value<T, R>(
        &self,
        handle: AssetHandle,
        f: impl FnOnce(&T) -> R,
    ) -> Result<R, AssetError>
    where
        T: Send + Sync + 'static,
    {
        let table = self.table.read();
        let record = Self::loaded_record::<T>(&table, handle)?;
        let cell = record.value.as_ref().ok_or(AssetError::NotLoaded)?;
        let value = cell.downcast_ref::<T>().ok_or(AssetError::NotLoaded)?;
        Ok(f(value))
    }

    /// Gate the asset while a pass consumes or transforms it; pinning fails
    /// until [`AssetManager::finish_processing`] releases the gate.
    ///
    /// # Errors
    ///
    /// Returns [`AssetError::NotLoaded`] unless the record is currently
    /// [`AssetState::Loaded`].
    pub fn begin_processing(&self, handle: AssetHandle) -> Result<(), AssetError> {
        self.transition(handle, AssetState::Loaded, AssetState::Processing)
    }

    /// Release the processing gate, returning the record to
    /// [`AssetState::Loaded`].
    ///
    /// # Errors
    ///
    /// Returns [`AssetError::NotLoaded`] unless the record is currently
    /// [`AssetState::Processing`].
    pub fn finish_processing(&self, handle: AssetHandle) -> Result<(), AssetError> {
        self.transition(handle, AssetState::Processing, AssetState::Loaded)
    }

    /// Re-invoke the original loader asynchronously. On completion the new
    /// value is installed as the record's current cell; leases issued before
    /// the reload keep observing the value they pinned.
    ///
    /// # Errors
    ///
    /// - [`AssetError::NotLoaded`] if the handle does not resolve
    /// - [`AssetError::Scheduler`] if the loader could not be dispatched
    pub fn reload(&self, handle: AssetHandle) -> Result<(), AssetError> {
        {
            let mut table = self.table.write();
            let record = table.records.get_mut(handle).ok_or(AssetError::NotLoaded)?;
            record.state = AssetState::Loading;
            debug!(asset = %record.name, "asset reload requested");
        }
        self.dispatch_load(handle)?;
        Ok(())
    }

    /// Logically remove the record now; the slot (and the record's value
    /// cell, unless leases still hold it) is recycled by
    /// [`AssetManager::process_unloads`] once the in-flight window elapses.
    /// The name becomes available for a fresh `load` immediately.
    ///
    /// Returns `false` if the handle does not resolve.
    pub fn unload(&self, handle: AssetHandle, current_frame: u64) -> bool {
        let mut table = self.table.write();
        let Some(record) = table.records.get(handle) else {
            return false;
        };
        let name = record.name.clone();
        table.by_name.remove(&name);
        table.records.remove(handle, current_frame)
    }

    /// Recycle unloaded records whose in-flight window has elapsed; returns
    /// the number recycled.
    pub fn process_unloads(&self, current_frame: u64) -> usize {
        self.table.write().records.process_deletions(current_frame)
    }

    /// Number of unloaded records still awaiting recycling.
    #[must_use]
    pub fn pending_unload_count(&self) -> usize {
        self.table.read().records.pending_deletion_count()
    }

    /// Current lifecycle state; [`AssetState::Unloaded`] when the handle
    /// does not resolve.
    #[must_use]
    pub fn state(&self, handle: AssetHandle) -> AssetState {
        self.table
            .read()
            .records
            .get(handle)
            .map_or(AssetState::Unloaded, |record| record.state)
    }

    /// Failure message from the most recent loader invocation, if any.
    #[must_use]
    pub fn failure(&self, handle: AssetHandle) -> Option<String> {
        self.table
            .read()
            .records
            .get(handle)
            .and_then(|record| record.failure.clone())
    }

    /// Number of live asset records.
    #[must_use]
    pub fn len(&self) -> usize {
        self.table.read().records.used()
    }

    /// Whether no asset records are live.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Resolve a record that must be `Loaded` and hold values of type `T`.
    fn loaded_record<'a, T: 'static>(
        table: &'a AssetTable,
        handle: AssetHandle,
    ) -> Result<&'a AssetRecord, AssetError> {
        let record = table.records.get(handle).ok_or(AssetError::NotLoaded)?;
        if record.state != AssetState::Loaded {
            return Err(AssetError::NotLoaded);
        }
        if record.type_id != TypeId::of::<T>() {
            return Err(AssetError::TypeMismatch {
                requested: std::any::type_name::<T>(),
                stored: record.type_name,
            });
        }
        Ok(record)
    }

    /// Move a record from `from` to `to`, failing with `NotLoaded` if it is
    /// in any other state.
    fn transition(
        &self,
        handle: AssetHandle,
        from: AssetState,
        to: AssetState,
    ) -> Result<(), AssetError> {
        let mut table = self.table.write();
        let record = table.records.get_mut(handle).ok_or(AssetError::NotLoaded)?;
        if record.state != from {
            return Err(AssetError::NotLoaded);
        }
        record.state = to;
        Ok(())
    }

    /// Run the record's loader on the scheduler and install the outcome.
    fn dispatch_load(&self, handle: AssetHandle) -> Result<(), SchedulerError> {
        let table = Arc::clone(&self.table);
        self.scheduler.dispatch(move || {
            let (name, loader) = {
                let guard = table.read();
                let Some(record) = guard.records.get(handle) else {
                    debug!("asset record removed before its loader ran");
                    return;
                };
                (record.name.clone(), Arc::clone(&record.loader))
            };

            let outcome = loader(&name, handle);

            let mut guard = table.write();
            let Some(record) = guard.records.get_mut(handle) else {
                debug!(asset = %name, "asset record removed while its loader ran");
                return;
            };
            match outcome {
                Ok(cell) => {
                    // Swap the cell; leases pinned from the old cell keep it
                    // alive and keep observing the old value.
                    record.value = Some(cell);
                    record.state = AssetState::Loaded;
                    record.failure = None;
                    debug!(asset = %name, "asset loaded");
                }
                Err(error) => {
                    record.state = AssetState::Failed;
                    record.failure = Some(error.to_string());
                    warn!(asset = %name, error = %error, "asset loader failed");
                }
            }
        })
    }
}
