/*
 * fake_backend.rs
 *
 * Copyright (C) 2026 Posit Software, PBC. All rights reserved.
 *
 */

use std::collections::HashMap;
use std::collections::VecDeque;
use std::sync::Mutex;
use std::time::Duration;
use std::time::Instant;

use anyhow::anyhow;

use crate::config::KernelConfig;
use crate::language::backend::Backend;
use crate::language::backend::ClusterInfo;
use crate::language::backend::CommandResult;
use crate::language::backend::CommandState;
use crate::language::backend::CommandStatus;

/// An in-memory `Backend` for tests. Commands finish on their first poll
/// with the configured result, unless the backend is set to hang, in which
/// case they keep running until cancelled.
pub struct FakeBackend {
    state: Mutex<FakeState>,
}

struct FakeState {
    online: bool,
    hang: bool,
    fail_clusters: bool,
    result: Option<CommandResult>,
    clusters: Vec<ClusterInfo>,
    /// States a cluster moves through after `start_cluster`, one per listing
    pending_states: HashMap<String, VecDeque<String>>,
    started: Vec<String>,
    commands: HashMap<String, CommandState>,
    calls: Vec<String>,
    configured: Vec<KernelConfig>,
}

impl Default for FakeBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl FakeBackend {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(FakeState {
                online: true,
                hang: false,
                fail_clusters: false,
                result: Some(CommandResult::Text(String::from("ok"))),
                clusters: vec![ClusterInfo::new("c1", "Shared cluster", "RUNNING")],
                pending_states: HashMap::new(),
                started: Vec::new(),
                commands: HashMap::new(),
                calls: Vec::new(),
                configured: Vec::new(),
            }),
        }
    }

    fn state(&self) -> std::sync::MutexGuard<'_, FakeState> {
        self.state
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }

    pub fn set_online(&self, online: bool) {
        self.state().online = online;
    }

    pub fn set_hang(&self, hang: bool) {
        self.state().hang = hang;
    }

    pub fn set_result(&self, result: Option<CommandResult>) {
        self.state().result = result;
    }

    pub fn set_clusters(&self, clusters: Vec<ClusterInfo>) {
        self.state().clusters = clusters;
    }

    pub fn set_fail_clusters(&self, fail: bool) {
        self.state().fail_clusters = fail;
    }

    /// Once `start_cluster(cluster_id)` is called, successive listings report
    /// `states` in order; the last one sticks.
    pub fn set_start_sequence(&self, cluster_id: &str, states: &[&str]) {
        let states = states.iter().map(|state| String::from(*state)).collect();
        self.state()
            .pending_states
            .insert(String::from(cluster_id), states);
    }

    /// Names of the backend methods called so far, in order.
    pub fn calls(&self) -> Vec<String> {
        self.state().calls.clone()
    }

    pub fn configured(&self) -> Vec<KernelConfig> {
        self.state().configured.clone()
    }

    /// Wait until `call` has been made `count` times.
    pub fn wait_for_calls(&self, call: &str, count: usize, timeout: Duration) -> bool {
        let start = Instant::now();
        while start.elapsed() < timeout {
            if self.calls().iter().filter(|c| *c == call).count() >= count {
                return true;
            }
            std::thread::sleep(Duration::from_millis(10));
        }
        false
    }

    fn record(&self, call: &str) {
        self.state().calls.push(String::from(call));
    }
}

impl Backend for FakeBackend {
    fn is_online(&self) -> anyhow::Result<bool> {
        self.record("is_online");
        Ok(self.state().online)
    }

    fn ensure_context(&self) -> anyhow::Result<String> {
        self.record("ensure_context");
        Ok(String::from("fake-context"))
    }

    fn submit(&self, _language: &str, _context_id: &str, _code: &str) -> anyhow::Result<String> {
        self.record("submit");
        let mut state = self.state();
        let command_id = format!("command-{}", state.calls.len());
        let command_state = if state.hang {
            CommandState::Running
        } else {
            CommandState::Finished
        };
        state.commands.insert(command_id.clone(), command_state);
        Ok(command_id)
    }

    fn poll_status(&self, command_id: &str) -> anyhow::Result<CommandStatus> {
        self.record("poll_status");
        let state = self.state();
        let Some(command_state) = state.commands.get(command_id) else {
            return Err(anyhow!("Unknown command '{command_id}'"));
        };
        let result = match command_state {
            CommandState::Finished => state.result.clone(),
            _ => None,
        };
        Ok(CommandStatus {
            state: *command_state,
            result,
        })
    }

    fn cancel(&self, command_id: &str) -> anyhow::Result<()> {
        self.record("cancel");
        self.state().commands.remove(command_id);
        Ok(())
    }

    fn clusters(&self) -> anyhow::Result<Vec<ClusterInfo>> {
        self.record("clusters");
        let mut state = self.state();
        if state.fail_clusters {
            return Err(anyhow!("Invalid access token"));
        }
        let FakeState {
            clusters,
            pending_states,
            started,
            ..
        } = &mut *state;
        for cluster in clusters.iter_mut() {
            if !started.contains(&cluster.id) {
                continue;
            }
            if let Some(states) = pending_states.get_mut(&cluster.id) {
                if states.len() > 1 {
                    if let Some(next) = states.pop_front() {
                        cluster.state = next;
                    }
                } else if let Some(last) = states.front() {
                    cluster.state = last.clone();
                }
            }
        }
        Ok(clusters.clone())
    }

    fn start_cluster(&self, cluster_id: &str) -> anyhow::Result<()> {
        self.record("start_cluster");
        let mut state = self.state();
        if !state.clusters.iter().any(|cluster| cluster.id == cluster_id) {
            return Err(anyhow!("No such cluster '{cluster_id}'"));
        }
        state.started.push(String::from(cluster_id));
        Ok(())
    }

    fn configure(&self, config: &KernelConfig) -> anyhow::Result<()> {
        self.record("configure");
        self.state().configured.push(config.clone());
        Ok(())
    }

    fn shutdown(&self) -> anyhow::Result<()> {
        self.record("shutdown");
        Ok(())
    }
}
