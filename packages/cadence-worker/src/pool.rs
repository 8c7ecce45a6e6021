use crate::error::WorkerError;
use crate::module::ModuleRegistry;
use crate::worker::ModuleWorker;
use futures::executor::LocalSpawner;
use rustc_hash::FxHashMap;
use std::cell::RefCell;

/// One worker per module, started on first use and kept for reuse.
pub struct WorkerPool {
    registry: ModuleRegistry,
    spawner: LocalSpawner,
    workers: RefCell<FxHashMap<String, ModuleWorker>>,
}

impl WorkerPool {
    pub fn new(registry: ModuleRegistry, spawner: LocalSpawner) -> Self {
        Self {
            registry,
            spawner,
            workers: RefCell::new(FxHashMap::default()),
        }
    }

    pub fn registry(&self) -> &ModuleRegistry {
        &self.registry
    }

    /// The worker for `url`, spawning it if this is the first request.
    pub fn worker(&self, url: &str) -> Result<ModuleWorker, WorkerError> {
        if let Some(worker) = self.workers.borrow().get(url) {
            return Ok(worker.clone());
        }
        let worker = ModuleWorker::spawn(url, self.registry.clone(), &self.spawner)?;
        self.workers
            .borrow_mut()
            .insert(url.to_string(), worker.clone());
        Ok(worker)
    }

    pub fn len(&self) -> usize {
        self.workers.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
