//! Modules a worker can load.
//!
//! There is no dynamic import, so every module a worker may load is registered
//! up front under a URL-like name, together with a loader that builds its
//! exports on the worker thread.

use crate::error::WorkerError;
use rustc_hash::FxHashMap;
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

pub type ExportFn = Arc<dyn Fn(Vec<Value>) -> anyhow::Result<Value> + Send + Sync>;
pub type ModuleLoader = Arc<dyn Fn() -> anyhow::Result<Module> + Send + Sync>;

#[derive(Clone)]
pub enum Export {
    Value(Value),
    Function(ExportFn),
}

impl fmt::Debug for Export {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Export::Value(value) => f.debug_tuple("Value").field(value).finish(),
            Export::Function(_) => f.write_str("Function(..)"),
        }
    }
}

/// A loaded module: named exports, each a plain value or a function.
#[derive(Debug, Clone, Default)]
pub struct Module {
    exports: BTreeMap<String, Export>,
}

impl Module {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_value(mut self, name: impl Into<String>, value: Value) -> Self {
        self.exports.insert(name.into(), Export::Value(value));
        self
    }

    pub fn with_function<F>(mut self, name: impl Into<String>, function: F) -> Self
    where
        F: Fn(Vec<Value>) -> anyhow::Result<Value> + Send + Sync + 'static,
    {
        self.exports
            .insert(name.into(), Export::Function(Arc::new(function)));
        self
    }

    /// Export names in sorted order.
    pub fn export_names(&self) -> Vec<String> {
        self.exports.keys().cloned().collect()
    }

    pub fn get(&self, name: &str) -> Result<Value, WorkerError> {
        match self.exports.get(name) {
            Some(Export::Value(value)) => Ok(value.clone()),
            Some(Export::Function(_)) => Err(WorkerError::NotTransferable(name.to_string())),
            None => Err(WorkerError::MissingExport(name.to_string())),
        }
    }

    pub fn call(&self, name: &str, args: Vec<Value>) -> Result<Value, WorkerError> {
        match self.exports.get(name) {
            Some(Export::Function(function)) => {
                function(args).map_err(|err| WorkerError::Remote(format!("{:#}", err)))
            }
            Some(Export::Value(_)) => Err(WorkerError::NotCallable(name.to_string())),
            None => Err(WorkerError::MissingExport(name.to_string())),
        }
    }
}

/// URL → loader table shared by every worker of a pool.
#[derive(Clone, Default)]
pub struct ModuleRegistry {
    loaders: FxHashMap<String, ModuleLoader>,
}

impl ModuleRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register<F>(&mut self, url: impl Into<String>, loader: F)
    where
        F: Fn() -> anyhow::Result<Module> + Send + Sync + 'static,
    {
        let url = url.into();
        if self.loaders.insert(url.clone(), Arc::new(loader)).is_some() {
            tracing::warn!("replaced module loader for `{}`", url);
        }
    }

    pub fn contains(&self, url: &str) -> bool {
        self.loaders.contains_key(url)
    }

    pub fn load(&self, url: &str) -> Result<Module, WorkerError> {
        let loader = self
            .loaders
            .get(url)
            .ok_or_else(|| WorkerError::ModuleNotFound(url.to_string()))?;
        loader().map_err(|err| WorkerError::Import(format!("{:#}", err)))
    }
}

impl fmt::Debug for ModuleRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut urls: Vec<_> = self.loaders.keys().collect();
        urls.sort();
        f.debug_struct("ModuleRegistry").field("urls", &urls).finish()
    }
}
