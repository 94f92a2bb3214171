//! A map whose owner is a dedicated thread, for callers that are not running on an async runtime.
//!
//! Request channels have no buffer: a send completes only when the owner takes the request, the
//! same handoff the owner uses to serialize everything else.

use crate::storage::MapStorage;
use crate::tracing_shim::{debug, trace};
use crate::MapError;
use crossbeam::channel::{self, Receiver, RecvTimeoutError, SendTimeoutError, Sender};
use std::hash::Hash;
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};
use std::{fmt, io};

/// The name given to every owner thread.
const OWNER_THREAD_NAME: &str = "sharedmap-owner";

/// Set `key` to `value`. The reply is whether `key` was already present.
#[derive(Debug)]
struct AddRequest<K, V> {
    /// The key to insert or overwrite.
    key: K,
    /// The value to store.
    value: V,
    /// Where the prior-existence flag is sent.
    reply: Sender<bool>,
}

/// Look up `key`.
#[derive(Debug)]
struct GetRequest<K, V> {
    /// The key to look up.
    key: K,
    /// Where the value, if any, is sent.
    reply: Sender<Option<V>>,
}

/// Remove `key`. The reply is whether `key` was present.
#[derive(Debug)]
struct DeleteRequest<K> {
    /// The key to remove.
    key: K,
    /// Where the prior-existence flag is sent.
    reply: Sender<bool>,
}

/// Count the stored keys.
#[derive(Debug)]
struct SizeRequest {
    /// Where the count is sent.
    reply: Sender<usize>,
}

/// The thread state that exclusively owns the storage.
struct Owner<K, V> {
    /// The map itself.
    storage: MapStorage<K, V>,
    /// Incoming add requests.
    add: Receiver<AddRequest<K, V>>,
    /// Incoming get requests.
    get: Receiver<GetRequest<K, V>>,
    /// Incoming delete requests.
    delete: Receiver<DeleteRequest<K>>,
    /// Incoming size requests.
    size: Receiver<SizeRequest>,
    /// Signalled by [`SharedMap::close`].
    shutdown: Receiver<()>,
}

impl<K, V> Owner<K, V>
where
    K: Eq + Hash,
    V: Clone,
{
    /// Serve requests until told to stop or until every handle is gone.
    fn run(self) {
        let Self {
            mut storage,
            add,
            get,
            delete,
            size,
            shutdown,
        } = self;

        debug!("map owner started");
        // Every handle holds all five senders, so one disconnecting means all have.
        loop {
            channel::select! {
                recv(add) -> request => match request {
                    Ok(AddRequest { key, value, reply }) => {
                        let existed = storage.add(key, value);
                        trace!(existed, "add");
                        let _res = reply.send(existed);
                    }
                    Err(_) => break,
                },
                recv(get) -> request => match request {
                    Ok(GetRequest { key, reply }) => {
                        let value = storage.get(&key);
                        trace!(found = value.is_some(), "get");
                        let _res = reply.send(value);
                    }
                    Err(_) => break,
                },
                recv(delete) -> request => match request {
                    Ok(DeleteRequest { key, reply }) => {
                        let found = storage.delete(&key);
                        trace!(found, "delete");
                        let _res = reply.send(found);
                    }
                    Err(_) => break,
                },
                recv(size) -> request => match request {
                    Ok(SizeRequest { reply }) => {
                        let len = storage.size();
                        trace!(size = len, "size");
                        let _res = reply.send(len);
                    }
                    Err(_) => break,
                },
                recv(shutdown) -> _ => break,
            }
        }
        debug!(size = storage.size(), "map owner stopped");
    }
}

/// Options for constructing a blocking [`SharedMap`].
#[must_use]
#[derive(Debug, Default, Clone, Copy)]
pub struct Builder {
    /// Deadline applied to each operation, if any.
    timeout: Option<Duration>,
}

impl Builder {
    /// Options matching [`SharedMap::new`].
    #[inline]
    pub fn new() -> Self {
        Self::default()
    }

    /// Fail any operation whose send and reply together take longer than `timeout` with
    /// [`MapError::TimedOut`].
    #[inline]
    pub const fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Spawn the owner thread.
    pub fn build<K, V>(self) -> io::Result<SharedMap<K, V>>
    where
        K: Eq + Hash + Send + 'static,
        V: Clone + Send + 'static,
    {
        let (add, add_rx) = channel::bounded(0);
        let (get, get_rx) = channel::bounded(0);
        let (delete, delete_rx) = channel::bounded(0);
        let (size, size_rx) = channel::bounded(0);
        let (shutdown, shutdown_rx) = channel::bounded(0);

        let owner = Owner {
            storage: MapStorage::new(),
            add: add_rx,
            get: get_rx,
            delete: delete_rx,
            size: size_rx,
            shutdown: shutdown_rx,
        };
        let thread = thread::Builder::new()
            .name(OWNER_THREAD_NAME.to_owned())
            .spawn(move || owner.run())?;

        Ok(SharedMap {
            add,
            get,
            delete,
            size,
            shutdown,
            owner: Arc::new(thread),
            timeout: self.timeout,
        })
    }
}

/// A handle to a map whose storage is owned by a dedicated thread.
///
/// Every operation blocks the calling thread until the owner replies. Handles are cheap to clone,
/// and all clones refer to the same map.
pub struct SharedMap<K, V> {
    /// Sends add requests.
    add: Sender<AddRequest<K, V>>,
    /// Sends get requests.
    get: Sender<GetRequest<K, V>>,
    /// Sends delete requests.
    delete: Sender<DeleteRequest<K>>,
    /// Sends size requests.
    size: Sender<SizeRequest>,
    /// Tells the owner to stop.
    shutdown: Sender<()>,
    /// The owner thread.
    owner: Arc<JoinHandle<()>>,
    /// Deadline applied to each operation, if any.
    timeout: Option<Duration>,
}

impl<K, V> SharedMap<K, V>
where
    K: Eq + Hash + Send + 'static,
    V: Clone + Send + 'static,
{
    /// Create an empty map and spawn its owner thread.
    #[inline]
    pub fn new() -> io::Result<Self> {
        Builder::new().build()
    }

    /// The value currently stored for `key`, or `None` if there is none.
    pub fn get(&self, key: K) -> Result<Option<V>, MapError> {
        let (reply, response) = channel::bounded(1);
        self.exchange(&self.get, GetRequest { key, reply }, &response)
    }

    /// The value currently stored for `key`, or `V::default()` if there is none.
    ///
    /// An absent key cannot be told apart from one holding the default value.
    pub fn get_or_default(&self, key: K) -> Result<V, MapError>
    where
        V: Default,
    {
        Ok(self.get(key)?.unwrap_or_default())
    }

    /// Set `key` to `value`, returning whether `key` was already present.
    pub fn add(&self, key: K, value: V) -> Result<bool, MapError> {
        let (reply, response) = channel::bounded(1);
        self.exchange(&self.add, AddRequest { key, value, reply }, &response)
    }

    /// Remove `key`, returning whether it was present.
    pub fn delete(&self, key: K) -> Result<bool, MapError> {
        let (reply, response) = channel::bounded(1);
        self.exchange(&self.delete, DeleteRequest { key, reply }, &response)
    }

    /// The number of keys stored, as of the moment the owner handles this request.
    pub fn size(&self) -> Result<usize, MapError> {
        let (reply, response) = channel::bounded(1);
        self.exchange(&self.size, SizeRequest { reply }, &response)
    }
}

impl<K, V> SharedMap<K, V> {
    /// Hand `request` to the owner and wait for its reply, subject to the configured timeout.
    fn exchange<R, T>(
        &self,
        channel: &Sender<R>,
        request: R,
        response: &Receiver<T>,
    ) -> Result<T, MapError> {
        let Some(deadline) = self
            .timeout
            .and_then(|timeout| Instant::now().checked_add(timeout))
        else {
            channel.send(request).map_err(|_| MapError::Unavailable)?;
            return response.recv().map_err(|_| MapError::Unavailable);
        };

        channel
            .send_deadline(request, deadline)
            .map_err(|err| match err {
                SendTimeoutError::Timeout(_) => MapError::TimedOut,
                SendTimeoutError::Disconnected(_) => MapError::Unavailable,
            })?;
        response.recv_deadline(deadline).map_err(|err| match err {
            RecvTimeoutError::Timeout => MapError::TimedOut,
            RecvTimeoutError::Disconnected => MapError::Unavailable,
        })
    }

    /// Stop the owner, dropping the stored entries. Every later operation on any handle to this map
    /// fails with [`MapError::Unavailable`].
    ///
    /// Blocks until the owner has taken the shutdown signal, which happens between two requests.
    pub fn close(&self) {
        debug!("closing map");
        let _res = self.shutdown.send(());
    }

    /// Whether the owner thread has finished.
    #[inline]
    pub fn is_closed(&self) -> bool {
        self.owner.is_finished()
    }
}

impl<K, V> Clone for SharedMap<K, V> {
    fn clone(&self) -> Self {
        Self {
            add: self.add.clone(),
            get: self.get.clone(),
            delete: self.delete.clone(),
            size: self.size.clone(),
            shutdown: self.shutdown.clone(),
            owner: Arc::clone(&self.owner),
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
