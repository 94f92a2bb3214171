//! The asynchronous map, whose owner is a Tokio task.

use crate::storage::MapStorage;
use crate::tracing_shim::{debug, info_span, trace, Instrument as _};
use crate::MapError;
use std::fmt;
use std::hash::Hash;
use std::sync::Arc;
use std::time::Duration;
use tokio::runtime::Handle;
use tokio::sync::{mpsc, oneshot, watch, Semaphore};

/// Tokio does not permit unbuffered channels, so this is the closest available handoff.
const DEFAULT_REQUEST_CAPACITY: usize = 1;

/// Set `key` to `value`. The reply is whether `key` was already present.
#[derive(Debug)]
struct AddRequest<K, V> {
    /// The key to insert or overwrite.
    key: K,
    /// The value to store.
    value: V,
    /// Where the prior-existence flag is sent.
    reply: oneshot::Sender<bool>,
}

/// Look up `key`.
#[derive(Debug)]
struct GetRequest<K, V> {
    /// The key to look up.
    key: K,
    /// Where the value, if any, is sent.
    reply: oneshot::Sender<Option<V>>,
}

/// Remove `key`. The reply is whether `key` was present.
#[derive(Debug)]
struct DeleteRequest<K> {
    /// The key to remove.
    key: K,
    /// Where the prior-existence flag is sent.
    reply: oneshot::Sender<bool>,
}

/// Count the stored keys.
#[derive(Debug)]
struct SizeRequest {
    /// Where the count is sent.
    reply: oneshot::Sender<usize>,
}

/// The task that exclusively owns the storage.
struct Owner<K, V> {
    /// The map itself. Nothing outside of [`Owner::run`] can reach it.
    storage: MapStorage<K, V>,
    /// Incoming add requests.
    add: mpsc::Receiver<AddRequest<K, V>>,
    /// Incoming get requests.
    get: mpsc::Receiver<GetRequest<K, V>>,
    /// Incoming delete requests.
    delete: mpsc::Receiver<DeleteRequest<K>>,
    /// Incoming size requests.
    size: mpsc::Receiver<SizeRequest>,
    /// Set to `true` by [`SharedMap::close`].
    shutdown: watch::Receiver<bool>,
}

impl<K, V> Owner<K, V>
where
    K: Eq + Hash,
    V: Clone,
{
    /// Whether [`SharedMap::close`] has been called. Checked after taking each request, so that
    /// nothing sent after `close` returns is ever handled.
    fn is_shut_down(&self) -> bool {
        *self.shutdown.borrow()
    }

    /// Serve requests until every handle is gone or the map is closed.
    ///
    /// Handling a request never awaits, so cancelling this future (when its runtime shuts down) can
    /// only happen between two requests.
    async fn run(mut self) {
        debug!("map owner started");
        loop {
            // Branch order is randomized by `select!`; no channel is preferred.
            tokio::select! {
                // Also completes with an error once every handle, and so the sender, is gone.
                _ = self.shutdown.changed() => break,
                Some(AddRequest { key, value, reply }) = self.add.recv() => {
                    if self.is_shut_down() {
                        break;
                    }
                    let existed = self.storage.add(key, value);
                    trace!(existed, "add");
                    let _res = reply.send(existed);
                }
                Some(GetRequest { key, reply }) = self.get.recv() => {
                    if self.is_shut_down() {
                        break;
                    }
                    let value = self.storage.get(&key);
                    trace!(found = value.is_some(), "get");
                    let _res = reply.send(value);
                }
                Some(DeleteRequest { key, reply }) = self.delete.recv() => {
                    if self.is_shut_down() {
                        break;
                    }
                    let found = self.storage.delete(&key);
                    trace!(found, "delete");
                    let _res = reply.send(found);
                }
                Some(SizeRequest { reply }) = self.size.recv() => {
                    if self.is_shut_down() {
                        break;
                    }
                    let size = self.storage.size();
                    trace!(size, "size");
                    let _res = reply.send(size);
                }
                else => break,
            }
        }
        debug!(size = self.storage.size(), "map owner stopped");
    }
}

/// Options for constructing a [`SharedMap`].
#[must_use]
#[derive(Debug, Clone, Copy)]
pub struct Builder {
    /// Capacity of each request channel.
    request_capacity: usize,
    /// Deadline applied to each operation, if any.
    timeout: Option<Duration>,
}

impl Default for Builder {
    fn default() -> Self {
        Self {
            request_capacity: DEFAULT_REQUEST_CAPACITY,
            timeout: None,
        }
    }
}

impl Builder {
    /// Options matching [`SharedMap::new`].
    #[inline]
    pub fn new() -> Self {
        Self::default()
    }

    /// How many requests of each kind may be queued before callers wait on send. Zero is treated
    /// as one, and values above [`Semaphore::MAX_PERMITS`] as that maximum.
    #[inline]
    pub const fn request_capacity(mut self, capacity: usize) -> Self {
        self.request_capacity = if capacity == 0 {
            1
        } else if capacity > Semaphore::MAX_PERMITS {
            Semaphore::MAX_PERMITS
        } else {
            capacity
        };
        self
    }

    /// Fail any operation whose send and reply together take longer than `timeout` with
    /// [`MapError::TimedOut`].
    ///
    /// The runtime the map is used from must have its time driver enabled.
    #[inline]
    pub const fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Start the owner on the current Tokio runtime.
    ///
    /// # Panics
    ///
    /// Panics if called outside of a Tokio runtime.
    #[inline]
    pub fn build<K, V>(self) -> SharedMap<K, V>
    where
        K: Eq + Hash + Send + 'static,
        V: Clone + Send + 'static,
    {
        self.build_on(&Handle::current())
    }

    /// Start the owner on the given runtime. The returned map may then be used from any runtime.
    pub fn build_on<K, V>(self, runtime: &Handle) -> SharedMap<K, V>
    where
        K: Eq + Hash + Send + 'static,
        V: Clone + Send + 'static,
    {
        let (add, add_rx) = mpsc::channel(self.request_capacity);
        let (get, get_rx) = mpsc::channel(self.request_capacity);
        let (delete, delete_rx) = mpsc::channel(self.request_capacity);
        let (size, size_rx) = mpsc::channel(self.request_capacity);
        let (shutdown, shutdown_rx) = watch::channel(false);

        let owner = Owner {
            storage: MapStorage::new(),
            add: add_rx,
            get: get_rx,
            delete: delete_rx,
            size: size_rx,
            shutdown: shutdown_rx,
        };
        // Detached; the owner is stopped through `shutdown` or by dropping every handle.
        let _task = runtime.spawn(owner.run().instrument(info_span!("map_owner")));

        SharedMap {
            add,
            get,
            delete,
            size,
            shutdown: Arc::new(shutdown),
            timeout: self.timeout,
        }
    }
}

/// A handle to a map whose storage is owned by a Tokio task.
///
/// Handles are cheap to clone, and all clones refer to the same map. The owner stops once every
/// handle has been dropped or [`close`](Self::close) has been called on any of them.
pub struct SharedMap<K, V> {
    /// Sends add requests.
    add: mpsc::Sender<AddRequest<K, V>>,
    /// Sends get requests.
    get: mpsc::Sender<GetRequest<K, V>>,
    /// Sends delete requests.
    delete: mpsc::Sender<DeleteRequest<K>>,
    /// Sends size requests.
    size: mpsc::Sender<SizeRequest>,
    /// Tells the owner to stop.
    shutdown: Arc<watch::Sender<bool>>,
    /// Deadline applied to each operation, if any.
    timeout: Option<Duration>,
}

impl<K, V> SharedMap<K, V>
where
    K: Eq + Hash + Send + 'static,
    V: Clone + Send + 'static,
{
    /// Create an empty map, starting its owner on the current Tokio runtime.
    ///
    /// # Panics
    ///
    /// Panics if called outside of a Tokio runtime.
    #[inline]
    pub fn new() -> Self {
        Builder::new().build()
    }

    /// The value currently stored for `key`, or `None` if there is none.
    #[cfg_attr(feature = "tracing", tracing::instrument(level = "trace", skip_all))]
    pub async fn get(&self, key: K) -> Result<Option<V>, MapError> {
        let (reply, response) = oneshot::channel();
        self.exchange(&self.get, GetRequest { key, reply }, response)
            .await
    }

    /// The value currently stored for `key`, or `V::default()` if there is none.
    ///
    /// An absent key cannot be told apart from one holding the default value. Prefer
    /// [`get`](Self::get) unless that is the intent.
    pub async fn get_or_default(&self, key: K) -> Result<V, MapError>
    where
        V: Default,
    {
        Ok(self.get(key).await?.unwrap_or_default())
    }

    /// Set `key` to `value`, returning whether `key` was already present.
    #[cfg_attr(feature = "tracing", tracing::instrument(level = "trace", skip_all))]
    pub async fn add(&self, key: K, value: V) -> Result<bool, MapError> {
        let (reply, response) = oneshot::channel();
        self.exchange(&self.add, AddRequest { key, value, reply }, response)
            .await
    }

    /// Remove `key`, returning whether it was present.
    #[cfg_attr(feature = "tracing", tracing::instrument(level = "trace", skip_all))]
    pub async fn delete(&self, key: K) -> Result<bool, MapError> {
        let (reply, response) = oneshot::channel();
        self.exchange(&self.delete, DeleteRequest { key, reply }, response)
            .await
    }

    /// The number of keys stored, as of the moment the owner handles this request.
    #[cfg_attr(feature = "tracing", tracing::instrument(level = "trace", skip_all))]
    pub async fn size(&self) -> Result<usize, MapError> {
        let (reply, response) = oneshot::channel();
        self.exchange(&self.size, SizeRequest { reply }, response)
            .await
    }
}

impl<K, V> SharedMap<K, V> {
    /// Send `request` and wait for its reply, subject to the configured timeout.
    ///
    /// Dropping the returned future abandons the request. If the owner already has it, the reply is
    /// discarded.
    async fn exchange<R, T>(
        &self,
        channel: &mpsc::Sender<R>,
        request: R,
        response: oneshot::Receiver<T>,
    ) -> Result<T, MapError> {
        let exchange = async {
            channel
                .send(request)
                .await
                .map_err(|_| MapError::Unavailable)?;
            response.await.map_err(|_| MapError::Unavailable)
        };

        match self.timeout {
            Some(timeout) => tokio::time::timeout(timeout, exchange)
                .await
                .map_err(|_| MapError::TimedOut)?,
            None => exchange.await,
        }
    }

    /// Stop the owner. The stored entries are dropped, and every operation on any handle to this
    /// map fails with [`MapError::Unavailable`] from then on, including those already queued.
    ///
    /// A request the owner is in the middle of handling when this is called still completes.
    pub fn close(&self) {
        debug!("closing map");
        let _was_closed = self.shutdown.send_replace(true);
    }

    /// Whether the owner is known to have stopped.
    ///
    /// This becomes `true` shortly after [`close`](Self::close), not necessarily immediately.
    #[inline]
    pub fn is_closed(&self) -> bool {
        self.add.is_closed()
    }
}

impl<K, V> Default for SharedMap<K, V>
where
    K: Eq + Hash + Send + 'static,
    V: Clone + Send + 'static,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<K, V> Clone for SharedMap<K, V> {
    fn clone(&self) -> Self {
        Self {
            add: self.add.clone(),
            get: self.get.clone(),
            delete: self.delete.clone(),
            size: self.size.clone(),
            shutdown: Arc::clone(&self.shutdown),
            timeout: self.timeout,
        }
    }
}

impl<K, V> fmt::Debug for SharedMap<K, V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SharedMap")
            .field("closed", &self.is_closed())
            .field("timeout", &self.timeout)
            .finish_non_exhaustive()
    }
}
