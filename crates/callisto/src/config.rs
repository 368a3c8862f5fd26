/*
 * config.rs
 *
 * Copyright (C) 2026 Posit Software, PBC. All rights reserved.
 *
 */

use std::fs;
use std::path::Path;
use std::path::PathBuf;

use serde::Deserialize;
use serde::Serialize;
use serde_json::Map;
use serde_json::Value;

use crate::error::Error;
use crate::language::backend::ClusterInfo;

/// Backend settings shared with the frontend over the config comm.
///
/// Keys other than the three the kernel understands are kept as they are so
/// the frontend can store its own state alongside.
#[serde_with::skip_serializing_none]
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct KernelConfig {
    /// Workspace URL
    pub uri: Option<String>,

    /// Personal access token
    pub api_key: Option<String>,

    /// The cluster commands run on
    pub cluster_id: Option<String>,

    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// The config file on disk plus its in-memory contents.
#[derive(Debug)]
pub struct ConfigStore {
    path: PathBuf,
    config: KernelConfig,
}

impl ConfigStore {
    /// Default location of the config file: `~/.jupyter/databricks.json`.
    pub fn default_path() -> PathBuf {
        let home = dirs::home_dir().unwrap_or_else(|| PathBuf::from("."));
        home.join(".jupyter").join("databricks.json")
    }

    /// Open the store at `path`. A missing or unreadable file yields an
    /// empty config.
    pub fn load(path: PathBuf) -> Self {
        let config = match Self::read(&path) {
            Ok(Some(config)) => {
                log::info!("Loaded kernel config from '{}'", path.display());
                config
            },
            Ok(None) => KernelConfig::default(),
            Err(err) => {
                log::warn!("{err}");
                KernelConfig::default()
            },
        };
        Self { path, config }
    }

    fn read(path: &Path) -> crate::Result<Option<KernelConfig>> {
        if !path.exists() {
            return Ok(None);
        }
        let contents =
            fs::read_to_string(path).map_err(|err| Error::ReadConfigFailed(path.into(), err))?;
        let config = serde_json::from_str(&contents)
            .map_err(|err| Error::InvalidConfig(path.into(), err))?;
        Ok(Some(config))
    }

    pub fn config(&self) -> &KernelConfig {
        &self.config
    }

    /// Merge `changes` into the config key by key and write the result to
    /// disk. A `null` value clears a key.
    pub fn update(&mut self, changes: &Map<String, Value>) -> crate::Result<&KernelConfig> {
        let mut merged = match serde_json::to_value(&self.config) {
            Ok(Value::Object(map)) => map,
            Ok(_) => Map::new(),
            Err(err) => return Err(Error::CannotSerialize(err)),
        };
        for (key, value) in changes {
            merged.insert(key.clone(), value.clone());
        }
        merged.retain(|_, value| !value.is_null());

        self.config = serde_json::from_value(Value::Object(merged))
            .map_err(|err| Error::InvalidConfig(self.path.clone(), err))?;
        self.persist()?;
        Ok(&self.config)
    }

    /// Pick the first listed cluster when none is configured. The choice is
    /// kept in memory only.
    pub fn select_default_cluster(&mut self, clusters: &[ClusterInfo]) {
        if self.config.cluster_id.is_some() {
            return;
        }
        if let Some(cluster) = clusters.first() {
            log::info!("No cluster configured, using '{}'", cluster.id);
            self.config.cluster_id = Some(cluster.id.clone());
        }
    }

    fn persist(&self) -> crate::Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)
                .map_err(|err| Error::WriteConfigFailed(self.path.clone(), err))?;
        }
        let contents =
            serde_json::to_string_pretty(&self.config).map_err(Error::CannotSerialize)?;
        fs::write(&self.path, contents)
            .map_err(|err| Error::WriteConfigFailed(self.path.clone(), err))?;
        log::trace!("Wrote kernel config to '{}'", self.path.display());
        Ok(())
    }
}
