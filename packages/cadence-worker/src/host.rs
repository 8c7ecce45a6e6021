//! The worker side of the boundary.
//!
//! A [`ModuleHost`] owns at most one loaded module and answers [`Request`]s
//! about it. [`spawn_host`] runs a host on its own thread; the only link to
//! it is a pair of channels carrying encoded messages.

use crate::error::WorkerError;
use crate::module::{Module, ModuleRegistry};
use crate::protocol::{self, Reply, Request};
use futures::channel::mpsc::{UnboundedReceiver, UnboundedSender, unbounded};
use std::sync::mpsc::{self, Receiver, Sender};
use std::thread::{self, JoinHandle};

pub struct ModuleHost {
    registry: ModuleRegistry,
    url: Option<String>,
    module: Option<Module>,
}

impl ModuleHost {
    pub fn new(registry: ModuleRegistry) -> Self {
        Self {
            registry,
            url: None,
            module: None,
        }
    }

    pub fn url(&self) -> Option<&str> {
        self.url.as_deref()
    }

    pub fn handle(&mut self, request: Request) -> Reply {
        match request {
            Request::ImportModule { url } => match self.import(url) {
                Ok(export_names) => Reply::ModuleRecord {
                    export_names,
                    error: None,
                },
                Err(err) => Reply::ModuleRecord {
                    export_names: Vec::new(),
                    error: Some(err.to_string()),
                },
            },
            Request::GetExport { name, message_id } => {
                Reply::get_reply(message_id, self.loaded().and_then(|module| module.get(&name)))
            }
            Request::CallExport {
                name,
                args,
                message_id,
            } => Reply::call_reply(
                message_id,
                self.loaded().and_then(|module| module.call(&name, args)),
            ),
        }
    }

    /// A host imports once. The URL is claimed before loading, so a failed
    /// import still rules out a second attempt.
    fn import(&mut self, url: String) -> Result<Vec<String>, WorkerError> {
        if self.url.is_some() {
            return Err(WorkerError::AlreadyLoaded);
        }
        self.url = Some(url.clone());
        let module = self.registry.load(&url)?;
        let export_names = module.export_names();
        tracing::debug!("loaded module `{}` with {} exports", url, export_names.len());
        self.module = Some(module);
        Ok(export_names)
    }

    fn loaded(&self) -> Result<&Module, WorkerError> {
        self.module.as_ref().ok_or(WorkerError::NotLoaded)
    }
}

/// Channel ends held by the client of a spawned host.
pub struct HostLink {
    pub requests: Sender<String>,
    pub replies: UnboundedReceiver<String>,
    pub thread: JoinHandle<()>,
}

/// Starts a host on a dedicated thread. The thread exits once every request
/// sender is dropped.
pub fn spawn_host(registry: ModuleRegistry, name: &str) -> Result<HostLink, WorkerError> {
    let (request_tx, request_rx) = mpsc::channel();
    let (reply_tx, reply_rx) = unbounded();
    let host = ModuleHost::new(registry);

    let thread = thread::Builder::new()
        .name(format!("module-worker:{}", name))
        .spawn(move || serve(host, request_rx, reply_tx))
        .map_err(|err| WorkerError::Spawn(err.to_string()))?;

    Ok(HostLink {
        requests: request_tx,
        replies: reply_rx,
        thread,
    })
}

fn serve(mut host: ModuleHost, requests: Receiver<String>, replies: UnboundedSender<String>) {
    for frame in requests {
        let request = match protocol::decode::<Request>(&frame) {
            Ok(request) => request,
            Err(err) => {
                tracing::warn!("module host dropped a request: {}", err);
                continue;
            }
        };
        let reply = host.handle(request);
        let encoded = match protocol::encode(&reply) {
            Ok(encoded) => encoded,
            Err(err) => {
                tracing::error!("module host failed to encode a reply: {}", err);
                continue;
            }
        };
        if replies.unbounded_send(encoded).is_err() {
            break;
        }
    }
    tracing::debug!("module host for {:?} shutting down", host.url());
}
