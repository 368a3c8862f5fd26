/*
 * config_comm.rs
 *
 * Copyright (C) 2026 Posit Software, PBC. All rights reserved.
 *
 */

use std::sync::Arc;
use std::sync::Mutex;
use std::sync::MutexGuard;
use std::sync::PoisonError;

use log::warn;
use serde_json::json;
use serde_json::Value;

use crate::comm::comm_registry::CommHandler;
use crate::comm::comm_registry::CommRegistry;
use crate::config::ConfigStore;
use crate::language::backend::Backend;
use crate::language::backend::ClusterInfo;
use crate::wire::header::JupyterHeader;

pub const CONFIG_TARGET: &str = "databricks.config";

/// Builds the `{config, clusters}` payload the frontend renders its settings
/// panel from. Shared by the config comm, the periodic broadcaster and the
/// cluster watcher.
#[derive(Clone)]
pub struct ConfigPublisher {
    store: Arc<Mutex<ConfigStore>>,
    backend: Arc<dyn Backend>,
}

impl ConfigPublisher {
    pub fn new(store: Arc<Mutex<ConfigStore>>, backend: Arc<dyn Backend>) -> Self {
        Self { store, backend }
    }

    fn store(&self) -> MutexGuard<'_, ConfigStore> {
        self.store.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn payload(&self) -> Value {
        // Listing can be slow; don't hold the store meanwhile
        let clusters = match self.backend.clusters() {
            Ok(clusters) => clusters,
            Err(err) => {
                warn!("Could not list clusters: {err:?}");
                Vec::<ClusterInfo>::new()
            },
        };

        let mut store = self.store();
        store.select_default_cluster(&clusters);
        json!({
            "config": store.config(),
            "clusters": clusters,
        })
    }

    /// Merge the frontend's changes, persist them, and hand the new config to
    /// the backend.
    pub fn apply(&self, changes: &serde_json::Map<String, Value>) -> crate::Result<()> {
        let config = self.store().update(changes)?.clone();
        if let Err(err) = self.backend.configure(&config) {
            warn!("Backend rejected the new config: {err:?}");
        }
        Ok(())
    }

    /// Push the current payload to every config comm.
    pub fn broadcast(&self, registry: &CommRegistry) -> usize {
        registry.broadcast(CONFIG_TARGET, &self.payload())
    }
}

/// Handler for comms bound to the config target. Any message carrying a
/// non-empty object updates the config; every message is answered with the
/// current payload.
pub struct ConfigComm {
    publisher: ConfigPublisher,
}

impl ConfigComm {
    pub fn new(publisher: ConfigPublisher) -> Self {
        Self { publisher }
    }
}

impl CommHandler for ConfigComm {
    fn handle_msg(
        &mut self,
        data: &Value,
        _parent: &JupyterHeader,
    ) -> crate::Result<Option<Value>> {
        if let Value::Object(changes) = data {
            if !changes.is_empty() {
                // The frontend still gets the current payload, so it can
                // show what was kept
                if let Err(err) = self.publisher.apply(changes) {
                    warn!("Ignoring config changes: {err}");
                }
            }
        }
        Ok(Some(self.publisher.payload()))
    }
}
