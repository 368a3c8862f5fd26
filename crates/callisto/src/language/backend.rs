/*
 * backend.rs
 *
 * Copyright (C) 2026 Posit Software, PBC. All rights reserved.
 *
 */

use serde::Deserialize;
use serde::Serialize;

use crate::config::KernelConfig;

/// A remote compute cluster as listed by the backend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClusterInfo {
    pub id: String,
    pub name: String,

    /// Lower-cased cluster state, e.g. `running` or `pending`
    pub state: String,
}

impl ClusterInfo {
    pub fn new(id: &str, name: &str, state: &str) -> Self {
        Self {
            id: String::from(id),
            name: String::from(name),
            state: state.to_lowercase(),
        }
    }

    pub fn is_running(&self) -> bool {
        self.state == "running"
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandState {
    Queued,
    Running,
    Finished,
}

/// What a finished command produced.
#[derive(Debug, Clone, PartialEq)]
pub enum CommandResult {
    Text(String),
    Table {
        columns: Vec<String>,
        rows: Vec<Vec<serde_json::Value>>,
    },
    Error {
        summary: String,
        cause: String,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub struct CommandStatus {
    pub state: CommandState,

    /// Only meaningful once `state` is `Finished`; a finished command with
    /// no result is an incomplete result
    pub result: Option<CommandResult>,
}

impl CommandStatus {
    pub fn is_pending(&self) -> bool {
        matches!(self.state, CommandState::Queued | CommandState::Running)
    }
}

/// The remote code execution service the kernel drives.
///
/// Calls block the calling thread; the shell thread is the only caller of
/// the execution methods, so implementations need not serialize them.
pub trait Backend: Send + Sync {
    /// Whether the configured cluster can accept commands.
    fn is_online(&self) -> anyhow::Result<bool>;

    /// Return the id of the execution context, creating it on first use.
    fn ensure_context(&self) -> anyhow::Result<String>;

    /// Submit `code` for execution and return the id of the remote command.
    fn submit(&self, language: &str, context_id: &str, code: &str) -> anyhow::Result<String>;

    fn poll_status(&self, command_id: &str) -> anyhow::Result<CommandStatus>;

    /// Ask the backend to stop a queued or running command.
    fn cancel(&self, command_id: &str) -> anyhow::Result<()>;

    /// List the clusters available to the configured credentials.
    fn clusters(&self) -> anyhow::Result<Vec<ClusterInfo>>;

    fn start_cluster(&self, cluster_id: &str) -> anyhow::Result<()>;

    /// Called whenever the frontend changes the config.
    fn configure(&self, config: &KernelConfig) -> anyhow::Result<()>;

    /// Release remote resources (the execution context, open sessions).
    fn shutdown(&self) -> anyhow::Result<()>;
}
