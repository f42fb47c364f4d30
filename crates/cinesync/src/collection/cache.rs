//! Realtime-synchronized collection cache.
//!
//! A cache holds the last full materialization of one table and publishes
//! every new snapshot to its subscribers. Reads come from full re-fetches
//! triggered by the change listener; writes go through the store and are
//! patched into the snapshot as soon as the store confirms them.
//!
//! Snapshot state sits behind a std mutex that is never held across an
//! `.await`. Publishing happens under that mutex, so subscribers observe
//! transitions in the order they were applied.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use std::time::Duration;

use serde_json::Value;
use tokio::sync::broadcast::{self, error::RecvError};
use tokio::task::JoinHandle;

use cinesync_core::store::{
    ChangeEvent, ChangeFeed, FetchError, Filter, Record, RecordId, RemoteStore, WriteError,
    WriteOp,
};

use super::listener;
use super::resource::Resource;

/// An immutable, ordered view of a collection.
pub type Snapshot<T> = Arc<Vec<T>>;

/// Default buffer of the snapshot broadcast channel.
pub const DEFAULT_SNAPSHOT_CAPACITY: usize = 16;

#[derive(Debug, Clone)]
pub struct CacheOptions {
    /// Extra wait after a notification before refreshing, so that bursts
    /// collapse into one refresh. Zero only coalesces what is already queued.
    pub debounce: Duration,
    pub snapshot_capacity: usize,
}

impl Default for CacheOptions {
    fn default() -> Self {
        Self {
            debounce: Duration::ZERO,
            snapshot_capacity: DEFAULT_SNAPSHOT_CAPACITY,
        }
    }
}

struct State<T> {
    snapshot: Snapshot<T>,
    /// Generation of the fetch or local write that produced `snapshot`.
    applied: u64,
    /// Dropped on dispose, which ends every subscriber stream.
    sender: Option<broadcast::Sender<Snapshot<T>>>,
}

pub(crate) struct Inner<R: Resource> {
    resource: R,
    store: Arc<dyn RemoteStore>,
    state: Mutex<State<R::Record>>,
    /// Last generation issued to a refresh or a confirmed local write.
    generation: AtomicU64,
    listener: Mutex<Option<JoinHandle<()>>>,
}

/// Mirror of one table, shared by cloning.
pub struct CollectionCache<R: Resource> {
    inner: Arc<Inner<R>>,
}

impl<R: Resource> Clone for CollectionCache<R> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

fn closed_receiver<T: Clone>() -> broadcast::Receiver<T> {
    let (sender, receiver) = broadcast::channel(1);
    drop(sender);
    receiver
}

/// Copies the keys of `patch` over `target`.
fn overlay(target: &mut Value, patch: Value) {
    match (target, patch) {
        (Value::Object(fields), Value::Object(patch)) => {
            for (column, value) in patch {
                fields.insert(column, value);
            }
        }
        (target, patch) => *target = patch,
    }
}

impl<R: Resource> Inner<R> {
    fn lock(&self) -> MutexGuard<'_, State<R::Record>> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn issue(&self) -> u64 {
        self.generation.fetch_add(1, Ordering::SeqCst) + 1
    }

    fn publish(state: &mut State<R::Record>, generation: u64, records: Vec<R::Record>) {
        state.applied = generation;
        state.snapshot = Arc::new(records);
        if let Some(sender) = &state.sender {
            // No subscribers is fine; the snapshot is still kept.
            let _ = sender.send(state.snapshot.clone());
        }
    }

    /// Current snapshot plus a receiver positioned right after it.
    fn subscribe(&self) -> (Snapshot<R::Record>, broadcast::Receiver<Snapshot<R::Record>>) {
        let state = self.lock();
        let receiver = match &state.sender {
            Some(sender) => sender.subscribe(),
            None => closed_receiver(),
        };
        (state.snapshot.clone(), receiver)
    }

    pub(crate) async fn refresh(&self) -> Result<(), FetchError> {
        let generation = self.issue();
        match self.resource.load(self.store.as_ref()).await {
            Ok(records) => {
                self.apply_fetch(generation, records);
                Ok(())
            }
            Err(e) => {
                let err = FetchError::from_store(R::TABLE, &e);
                tracing::warn!(
                    table = R::TABLE,
                    error = %err,
                    "Refresh failed, keeping previous snapshot"
                );
                Err(err)
            }
        }
    }

    fn apply_fetch(&self, generation: u64, records: Vec<R::Record>) {
        let mut state = self.lock();
        if state.sender.is_none() {
            return;
        }
        // Failed refreshes never advance `applied`.
        if generation <= state.applied {
            tracing::debug!(
                table = R::TABLE,
                generation,
                applied = state.applied,
                "Discarding stale refresh"
            );
            return;
        }
        tracing::debug!(table = R::TABLE, count = records.len(), "Snapshot refreshed");
        Self::publish(&mut state, generation, records);
    }

    /// Applies a store-confirmed write to the snapshot and publishes it.
    fn apply_local(&self, mutate: impl FnOnce(&mut Vec<R::Record>)) {
        let mut state = self.lock();
        if state.sender.is_none() {
            return;
        }
        let generation = self.issue();
        let mut records = state.snapshot.as_ref().clone();
        mutate(&mut records);
        Self::publish(&mut state, generation, records);
    }

    /// Merges a returned row into the record at `id`. A record missing from
    /// the snapshot is decoded as-is and the snapshot is left untouched.
    fn merge_local(&self, id: RecordId, returned: Value) -> Result<R::Record, serde_json::Error> {
        let mut state = self.lock();
        let Some(position) = state.snapshot.iter().position(|r| r.id() == id) else {
            let mut record: R::Record = serde_json::from_value(returned)?;
            self.resource.annotate(&mut record);
            return Ok(record);
        };

        let mut merged = serde_json::to_value(&state.snapshot[position])?;
        overlay(&mut merged, returned);
        let mut record: R::Record = serde_json::from_value(merged)?;
        self.resource.annotate(&mut record);

        if state.sender.is_some() {
            let generation = self.issue();
            let mut records = state.snapshot.as_ref().clone();
            records[position] = record.clone();
            Self::publish(&mut state, generation, records);
        }
        Ok(record)
    }
}

impl<R: Resource> Drop for Inner<R> {
    fn drop(&mut self) {
        let listener = self
            .listener
            .get_mut()
            .unwrap_or_else(PoisonError::into_inner);
        if let Some(handle) = listener.take() {
            handle.abort();
        }
    }
}

impl<R: Resource> CollectionCache<R> {
    /// Creates an empty cache without fetching or listening.
    pub fn new(resource: R, store: Arc<dyn RemoteStore>, snapshot_capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(snapshot_capacity.max(1));
        Self {
            inner: Arc::new(Inner {
                resource,
                store,
                state: Mutex::new(State {
                    snapshot: Arc::new(Vec::new()),
                    applied: 0,
                    sender: Some(sender),
                }),
                generation: AtomicU64::new(0),
                listener: Mutex::new(None),
            }),
        }
    }

    /// Creates the cache, subscribes to its tables, runs the initial fetch
    /// and starts the change listener.
    ///
    /// Subscribing happens before the fetch so no change between the two is
    /// missed. A failed initial fetch leaves the snapshot empty; the next
    /// notification retries it.
    pub async fn start(
        resource: R,
        store: Arc<dyn RemoteStore>,
        feed: &dyn ChangeFeed,
        options: CacheOptions,
    ) -> Self {
        let cache = Self::new(resource, store, options.snapshot_capacity);

        let mut receivers: Vec<(&'static str, broadcast::Receiver<ChangeEvent>)> = Vec::new();
        for table in cache.inner.resource.watched_tables() {
            match feed.subscribe(table).await {
                Ok(receiver) => receivers.push((table, receiver)),
                Err(e) => tracing::error!(
                    table = R::TABLE,
                    watched = table,
                    error = %e,
                    "Change subscription failed, collection will not live-update"
                ),
            }
        }

        let _ = cache.refresh().await;

        if !receivers.is_empty() {
            let handle = listener::spawn(Arc::downgrade(&cache.inner), receivers, options.debounce);
            *cache
                .inner
                .listener
                .lock()
                .unwrap_or_else(PoisonError::into_inner) = Some(handle);
        }
        tracing::debug!(table = R::TABLE, count = cache.len(), "Collection cache started");
        cache
    }

    pub fn table(&self) -> &'static str {
        R::TABLE
    }

    pub fn resource(&self) -> &R {
        &self.inner.resource
    }

    pub fn store(&self) -> &Arc<dyn RemoteStore> {
        &self.inner.store
    }

    /// The current snapshot.
    pub fn snapshot(&self) -> Snapshot<R::Record> {
        self.inner.lock().snapshot.clone()
    }

    pub fn get(&self, id: RecordId) -> Option<R::Record> {
        self.inner
            .lock()
            .snapshot
            .iter()
            .find(|record| record.id() == id)
            .cloned()
    }

    pub fn len(&self) -> usize {
        self.inner.lock().snapshot.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn is_disposed(&self) -> bool {
        self.inner.lock().sender.is_none()
    }

    /// Yields the current snapshot, then every later one.
    ///
    /// A subscriber that falls behind the channel buffer skips straight to
    /// the newest snapshot. The stream ends when the cache is disposed.
    pub fn stream(&self) -> impl futures_core::Stream<Item = Snapshot<R::Record>> + Send + 'static {
        let (current, mut receiver) = self.inner.subscribe();
        let inner: Weak<Inner<R>> = Arc::downgrade(&self.inner);

        async_stream::stream! {
            yield current;
            loop {
                match receiver.recv().await {
                    Ok(snapshot) => yield snapshot,
                    Err(RecvError::Lagged(skipped)) => {
                        let Some(strong) = inner.upgrade() else {
                            break;
                        };
                        tracing::warn!(
                            table = R::TABLE,
                            skipped,
                            "Snapshot subscriber lagged, resynchronizing"
                        );
                        let (latest, resubscribed) = strong.subscribe();
                        drop(strong);
                        receiver = resubscribed;
                        yield latest;
                    }
                    Err(RecvError::Closed) => break,
                }
            }
        }
    }

    /// Re-fetches the whole collection and publishes it.
    ///
    /// On failure the previous snapshot is kept and the error is logged
    /// before being returned.
    pub async fn refresh(&self) -> Result<(), FetchError> {
        self.inner.refresh().await
    }

    /// Inserts a record and appends the stored version to the snapshot.
    pub async fn create(&self, input: R::Create) -> Result<R::Record, WriteError> {
        let fail = |message: String| WriteError::new(R::TABLE, WriteOp::Create, message);
        let resource = &self.inner.resource;

        let input = resource
            .prepare_create(input)
            .map_err(|e| fail(e.to_string()))?;
        let row = serde_json::to_value(&input).map_err(|e| fail(e.to_string()))?;
        let stored = self
            .inner
            .store
            .insert(R::TABLE, row, &resource.select())
            .await
            .map_err(|e| WriteError::from_store(R::TABLE, WriteOp::Create, &e))?;

        let mut record: R::Record = serde_json::from_value(stored).map_err(|e| fail(e.to_string()))?;
        resource.annotate(&mut record);

        let id = record.id();
        let appended = record.clone();
        self.inner.apply_local(move |records| {
            match records.iter().position(|r| r.id() == id) {
                Some(position) => records[position] = appended,
                None => records.push(appended),
            }
        });
        tracing::debug!(table = R::TABLE, id, "Record created");
        Ok(record)
    }

    /// Patches a record and merges the stored version into the snapshot.
    pub async fn update(&self, id: RecordId, patch: R::Patch) -> Result<R::Record, WriteError> {
        let fail = |message: String| WriteError::new(R::TABLE, WriteOp::Update, message);
        let resource = &self.inner.resource;

        let patch = resource
            .prepare_patch(patch)
            .map_err(|e| fail(e.to_string()))?;
        let patch = serde_json::to_value(&patch).map_err(|e| fail(e.to_string()))?;
        let rows = self
            .inner
            .store
            .update(
                R::TABLE,
                &[Filter::eq(R::PRIMARY_KEY, id)],
                patch,
                &resource.select(),
            )
            .await
            .map_err(|e| WriteError::from_store(R::TABLE, WriteOp::Update, &e))?;

        let returned = rows
            .into_iter()
            .next()
            .ok_or_else(|| fail(format!("no row with {} = {id}", R::PRIMARY_KEY)))?;
        let record = self
            .inner
            .merge_local(id, returned)
            .map_err(|e| fail(e.to_string()))?;
        tracing::debug!(table = R::TABLE, id, "Record updated");
        Ok(record)
    }

    /// Deletes a record and removes it from the snapshot.
    pub async fn delete(&self, id: RecordId) -> Result<(), WriteError> {
        self.inner
            .store
            .delete(R::TABLE, &[Filter::eq(R::PRIMARY_KEY, id)])
            .await
            .map_err(|e| WriteError::from_store(R::TABLE, WriteOp::Delete, &e))?;

        self.inner
            .apply_local(|records| records.retain(|record| record.id() != id));
        tracing::debug!(table = R::TABLE, id, "Record deleted");
        Ok(())
    }

    /// Stops the listener and ends every subscriber stream. Later refreshes
    /// and writes no longer publish.
    pub fn dispose(&self) {
        if let Some(handle) = self
            .inner
            .listener
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
        {
            handle.abort();
        }
        self.inner.lock().sender = None;
        tracing::debug!(table = R::TABLE, "Collection cache disposed");
    }
}
