//! Client side of a module worker.
//!
//! A [`ModuleWorker`] owns the request channel to its host thread and a
//! table of replies it is still waiting for. Replies are read by a pump task
//! on the local executor and matched back to callers by `messageId`.

use crate::error::WorkerError;
use crate::host::{HostLink, spawn_host};
use crate::module::ModuleRegistry;
use crate::protocol::{self, MessageId, Reply, Request};
use cadence_scheduler::{Deferred, deferred};
use futures::StreamExt;
use futures::channel::mpsc::UnboundedReceiver;
use futures::executor::LocalSpawner;
use futures::task::LocalSpawnExt;
use rustc_hash::FxHashMap;
use serde_json::Value;
use std::cell::{Cell, RefCell};
use std::rc::{Rc, Weak};
use std::sync::mpsc::Sender;

type Waiter = Deferred<Result<WorkerModule, WorkerError>>;

enum Record {
    Waiting(Vec<Waiter>),
    Ready(Result<Rc<[String]>, WorkerError>),
}

struct Shared {
    url: String,
    requests: Sender<String>,
    next_message_id: Cell<MessageId>,
    pending: RefCell<FxHashMap<MessageId, Deferred<Result<Value, WorkerError>>>>,
    record: RefCell<Record>,
}

/// A worker thread that has loaded (or is loading) one module.
#[derive(Clone)]
pub struct ModuleWorker {
    shared: Rc<Shared>,
}

impl ModuleWorker {
    /// Starts the host thread and asks it to import `url`. Replies are
    /// processed by a task spawned on `spawner`.
    pub fn spawn(
        url: impl Into<String>,
        registry: ModuleRegistry,
        spawner: &LocalSpawner,
    ) -> Result<Self, WorkerError> {
        let url = url.into();
        let HostLink {
            requests,
            replies,
            thread: _,
        } = spawn_host(registry, &url)?;

        let shared = Rc::new(Shared {
            url: url.clone(),
            requests,
            next_message_id: Cell::new(0),
            pending: RefCell::new(FxHashMap::default()),
            record: RefCell::new(Record::Waiting(Vec::new())),
        });

        spawner
            .spawn_local(pump(Rc::downgrade(&shared), replies))
            .map_err(|err| WorkerError::Spawn(err.to_string()))?;

        shared.send(&Request::ImportModule { url: url.clone() })?;
        tracing::debug!("started worker for `{}`", url);
        Ok(Self { shared })
    }

    pub fn url(&self) -> &str {
        &self.shared.url
    }

    pub fn same(&self, other: &ModuleWorker) -> bool {
        Rc::ptr_eq(&self.shared, &other.shared)
    }

    /// Requests still waiting for a reply.
    pub fn pending_requests(&self) -> usize {
        self.shared.pending.borrow().len()
    }

    /// Resolves to a proxy for the loaded module, or to the import error.
    pub async fn module(&self) -> Result<WorkerModule, WorkerError> {
        let settled = {
            let mut record = self.shared.record.borrow_mut();
            match &mut *record {
                Record::Ready(result) => return self.proxy(result.clone()),
                Record::Waiting(waiters) => {
                    let (settle, settled) = deferred();
                    waiters.push(settle);
                    settled
                }
            }
        };
        settled.await.unwrap_or(Err(WorkerError::Disconnected))
    }

    fn proxy(&self, names: Result<Rc<[String]>, WorkerError>) -> Result<WorkerModule, WorkerError> {
        names.map(|export_names| WorkerModule {
            shared: Rc::clone(&self.shared),
            export_names,
        })
    }
}

impl std::fmt::Debug for ModuleWorker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModuleWorker")
            .field("url", &self.shared.url)
            .field("pending", &self.pending_requests())
            .finish()
    }
}

/// Proxy to a module loaded in a worker.
#[derive(Clone)]
pub struct WorkerModule {
    shared: Rc<Shared>,
    export_names: Rc<[String]>,
}

impl WorkerModule {
    pub fn export_names(&self) -> &[String] {
        &self.export_names
    }

    pub fn has_export(&self, name: &str) -> bool {
        self.export_names.iter().any(|export| export == name)
    }

    /// Fetches the value of an exported variable.
    pub async fn get(&self, name: &str) -> Result<Value, WorkerError> {
        self.shared
            .request(|message_id| Request::GetExport {
                name: name.to_string(),
                message_id,
            })
            .await
    }

    /// Calls an exported function.
    pub async fn call(&self, name: &str, args: Vec<Value>) -> Result<Value, WorkerError> {
        self.shared
            .request(|message_id| Request::CallExport {
                name: name.to_string(),
                args,
                message_id,
            })
            .await
    }
}

impl Shared {
    fn send(&self, request: &Request) -> Result<(), WorkerError> {
        let frame = protocol::encode(request)?;
        self.requests
            .send(frame)
            .map_err(|_| WorkerError::Disconnected)
    }

    async fn request(
        &self,
        build: impl FnOnce(MessageId) -> Request,
    ) -> Result<Value, WorkerError> {
        let message_id = self.next_message_id.get();
        self.next_message_id.set(message_id + 1);

        let (settle, settled) = deferred();
        self.pending.borrow_mut().insert(message_id, settle);
        if let Err(err) = self.send(&build(message_id)) {
            self.pending.borrow_mut().remove(&message_id);
            return Err(err);
        }
        settled.await.unwrap_or(Err(WorkerError::Disconnected))
    }

    fn dispatch(self: &Rc<Self>, reply: Reply) {
        match reply {
            Reply::ModuleRecord {
                export_names,
                error,
            } => {
                let result = match error {
                    Some(error) => Err(WorkerError::Import(error)),
                    None => Ok(Rc::from(export_names)),
                };
                self.resolve_record(result);
            }
            Reply::GetExportReply {
                value,
                error,
                message_id,
            }
            | Reply::CallExportReply {
                value,
                error,
                message_id,
            } => {
                let waiter = self.pending.borrow_mut().remove(&message_id);
                let Some(waiter) = waiter else {
                    tracing::warn!("worker `{}` replied to unknown message {}", self.url, message_id);
                    return;
                };
                let outcome = match error {
                    Some(error) => Err(WorkerError::Remote(error)),
                    None => Ok(value),
                };
                waiter.settle(outcome);
            }
        }
    }

    fn resolve_record(self: &Rc<Self>, result: Result<Rc<[String]>, WorkerError>) {
        let previous = self.record.replace(Record::Ready(result.clone()));
        let Record::Waiting(waiters) = previous else {
            tracing::warn!("worker `{}` sent a second module record", self.url);
            return;
        };
        if let Err(err) = &result {
            tracing::warn!("worker `{}` failed to load its module: {}", self.url, err);
        }
        for waiter in waiters {
            let proxy = result.clone().map(|export_names| WorkerModule {
                shared: Rc::clone(self),
                export_names,
            });
            waiter.settle(proxy);
        }
    }

    fn disconnect(&self) {
        {
            let mut record = self.record.borrow_mut();
            // Dropped waiters resolve to `Disconnected` on their side.
            if matches!(*record, Record::Waiting(_)) {
                *record = Record::Ready(Err(WorkerError::Disconnected));
            }
        }
        self.pending.borrow_mut().clear();
    }
}

/// Feeds replies from the host thread to their waiters. Holds only a weak
/// reference, so dropping every handle closes the request channel and lets
/// the host thread exit.
async fn pump(shared: Weak<Shared>, mut replies: UnboundedReceiver<String>) {
    while let Some(frame) = replies.next().await {
        let Some(shared) = shared.upgrade() else {
            return;
        };
        match protocol::decode::<Reply>(&frame) {
            Ok(reply) => shared.dispatch(reply),
            Err(err) => tracing::warn!("worker `{}` sent an unreadable reply: {}", shared.url, err),
        }
    }
    if let Some(shared) = shared.upgrade() {
        tracing::debug!("worker `{}` disconnected", shared.url);
        shared.disconnect();
    }
}
