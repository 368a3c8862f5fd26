/*
 * actions_comm.rs
 *
 * Copyright (C) 2026 Posit Software, PBC. All rights reserved.
 *
 */

use std::collections::HashSet;
use std::str::FromStr;
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::MutexGuard;
use std::sync::PoisonError;
use std::time::Duration;

use log::info;
use log::trace;
use log::warn;
use serde::Deserialize;
use serde_json::Value;
use strum_macros::EnumString;

use crate::comm::comm_registry::CommHandler;
use crate::comm::comm_registry::CommRegistry;
use crate::comm::config_comm::ConfigPublisher;
use crate::language::backend::Backend;
use crate::wire::header::JupyterHeader;

pub const ACTIONS_TARGET: &str = "databricks.actions";

/// A watcher gives up after this many consecutive polls where its cluster
/// can't be found
const MISSING_POLLS_LIMIT: u32 = 30;

#[derive(Debug, PartialEq, EnumString)]
#[strum(serialize_all = "snake_case")]
pub enum Action {
    StartCluster,
}

#[derive(Debug, Deserialize)]
struct ActionMsg {
    action: String,
    #[serde(default)]
    data: Value,
}

#[derive(Debug, Deserialize)]
struct StartClusterArgs {
    cluster_id: String,
}

/// Handler for comms bound to the actions target. Actions never reply
/// directly; their effects reach the frontend through config broadcasts.
pub struct ActionsComm {
    backend: Arc<dyn Backend>,
    publisher: ConfigPublisher,
    registry: CommRegistry,
    cluster_poll_interval: Duration,

    /// Clusters with a live watcher; at most one per id
    watching: Arc<Mutex<HashSet<String>>>,
}

impl ActionsComm {
    pub fn new(
        backend: Arc<dyn Backend>,
        publisher: ConfigPublisher,
        registry: CommRegistry,
        cluster_poll_interval: Duration,
    ) -> Self {
        Self {
            backend,
            publisher,
            registry,
            cluster_poll_interval,
            watching: Arc::new(Mutex::new(HashSet::new())),
        }
    }

    pub fn is_watching(&self, cluster_id: &str) -> bool {
        lock(&self.watching).contains(cluster_id)
    }

    fn start_cluster(&self, data: Value) -> crate::Result<()> {
        let args: StartClusterArgs = match serde_json::from_value(data.clone()) {
            Ok(args) => args,
            Err(err) => {
                return Err(crate::Error::InvalidMessage(
                    String::from("start_cluster"),
                    data,
                    err,
                ))
            },
        };

        let initial = cluster_state(self.backend.as_ref(), &args.cluster_id);
        info!(
            "Starting cluster '{}' (currently {:?})",
            args.cluster_id, initial
        );
        self.backend.start_cluster(&args.cluster_id)?;

        if !lock(&self.watching).insert(args.cluster_id.clone()) {
            trace!("Cluster '{}' already has a watcher", args.cluster_id);
            return Ok(());
        }

        let watcher = ClusterWatcher {
            cluster_id: args.cluster_id.clone(),
            backend: self.backend.clone(),
            publisher: self.publisher.clone(),
            registry: self.registry.clone(),
            interval: self.cluster_poll_interval,
            last_state: initial,
            missing_polls: 0,
        };
        let watching = self.watching.clone();
        let spawned = std::thread::Builder::new()
            .name(String::from("cluster-watcher"))
            .spawn(move || {
                let cluster_id = watcher.cluster_id.clone();
                watcher.watch();
                lock(&watching).remove(&cluster_id);
            });

        if let Err(err) = spawned {
            lock(&self.watching).remove(&args.cluster_id);
            return Err(anyhow::anyhow!("Could not spawn cluster watcher: {err}").into());
        }
        Ok(())
    }
}

impl CommHandler for ActionsComm {
    fn handle_msg(
        &mut self,
        data: &Value,
        _parent: &JupyterHeader,
    ) -> crate::Result<Option<Value>> {
        let msg: ActionMsg = match serde_json::from_value(data.clone()) {
            Ok(msg) => msg,
            Err(err) => {
                warn!("Ignoring malformed action {data}: {err}");
                return Ok(None);
            },
        };

        match Action::from_str(&msg.action) {
            Ok(Action::StartCluster) => self.start_cluster(msg.data)?,
            Err(_) => warn!("Ignoring unknown action '{}'", msg.action),
        }
        Ok(None)
    }
}

fn lock(watching: &Mutex<HashSet<String>>) -> MutexGuard<'_, HashSet<String>> {
    watching.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Follows a starting cluster, broadcasting the config payload on every state
/// change until the cluster is running or has been missing for too long.
struct ClusterWatcher {
    cluster_id: String,
    backend: Arc<dyn Backend>,
    publisher: ConfigPublisher,
    registry: CommRegistry,
    interval: Duration,
    last_state: Option<String>,
    missing_polls: u32,
}

impl ClusterWatcher {
    fn watch(mut self) {
        loop {
            std::thread::sleep(self.interval);

            let state = cluster_state(self.backend.as_ref(), &self.cluster_id);
            if state != self.last_state {
                trace!(
                    "Cluster '{}' moved from {:?} to {:?}",
                    self.cluster_id,
                    self.last_state,
                    state
                );
                self.publisher.broadcast(&self.registry);
                self.last_state = state;
            }

            if self.last_state.as_deref() == Some("running") {
                info!("Cluster '{}' is running", self.cluster_id);
                return;
            }

            if self.last_state.is_some() {
                self.missing_polls = 0;
                continue;
            }
            self.missing_polls += 1;
            if self.missing_polls >= MISSING_POLLS_LIMIT {
                warn!(
                    "Cluster '{}' not found after {} polls, no longer watching it",
                    self.cluster_id, self.missing_polls
                );
                return;
            }
        }
    }
}

/// The state of one cluster, or `None` when it can't be found
fn cluster_state(backend: &dyn Backend, cluster_id: &str) -> Option<String> {
    match backend.clusters() {
        Ok(clusters) => clusters
            .into_iter()
            .find(|cluster| cluster.id == cluster_id)
            .map(|cluster| cluster.state),
        Err(err) => {
            warn!("Could not list clusters: {err:?}");
            None
        },
    }
}

#[cfg(test)]
mod tests {
    use std::time::Instant;

    use assert_matches::assert_matches;
    use crossbeam::channel::unbounded;
    use crossbeam::channel::Receiver;
    use serde_json::json;

    use super::*;
    use crate::comm::config_comm::ConfigComm;
    use crate::comm::config_comm::CONFIG_TARGET;
    use crate::config::ConfigStore;
    use crate::fixtures::fake_backend::FakeBackend;
    use crate::language::backend::ClusterInfo;
    use crate::socket::iopub::IOPubMessage;

    fn parent() -> JupyterHeader {
        JupyterHeader::create(
            String::from("comm_msg"),
            String::from("client"),
            String::from("user"),
        )
    }

    fn setup(
        backend: Arc<FakeBackend>,
        dir: &tempfile::TempDir,
    ) -> (ActionsComm, Receiver<IOPubMessage>) {
        let (tx, rx) = unbounded();
        let registry = CommRegistry::new(tx);
        let store = ConfigStore::load(dir.path().join("databricks.json"));
        let publisher = ConfigPublisher::new(Arc::new(Mutex::new(store)), backend.clone());
        registry.register(
            CONFIG_TARGET,
            Arc::new(Mutex::new(ConfigComm::new(publisher.clone()))),
        );
        let comm = ActionsComm::new(backend, publisher, registry, Duration::from_millis(5));
        (comm, rx)
    }

    #[test]
    fn test_action_names() {
        assert_eq!(Action::from_str("start_cluster"), Ok(Action::StartCluster));
        assert!(Action::from_str("StartCluster").is_err());
    }

    #[test]
    fn test_start_cluster_broadcasts_until_running() {
        let dir = tempfile::tempdir().unwrap();
        let backend = Arc::new(FakeBackend::new());
        backend.set_clusters(vec![ClusterInfo::new("c2", "Jobs", "TERMINATED")]);
        backend.set_start_sequence("c2", &["pending", "pending", "running"]);
        let (mut comm, rx) = setup(backend.clone(), &dir);

        let reply = comm
            .handle_msg(
                &json!({"action": "start_cluster", "data": {"cluster_id": "c2"}}),
                &parent(),
            )
            .unwrap();
        assert_eq!(reply, None);

        // terminated -> pending, then pending -> running
        for expected in ["pending", "running"] {
            assert_matches!(
                rx.recv_timeout(Duration::from_secs(5)).unwrap(),
                IOPubMessage::CommMsgEvent(msg) => {
                    assert_eq!(msg.data["clusters"][0]["state"], json!(expected));
                }
            );
        }
        assert!(rx.recv_timeout(Duration::from_millis(100)).is_err());
        assert!(backend.calls().contains(&String::from("start_cluster")));
    }

    fn wait_until_unwatched(comm: &ActionsComm, cluster_id: &str) -> bool {
        let deadline = Instant::now() + Duration::from_secs(5);
        while Instant::now() < deadline {
            if !comm.is_watching(cluster_id) {
                return true;
            }
            std::thread::sleep(Duration::from_millis(5));
        }
        false
    }

    #[test]
    fn test_one_watcher_per_cluster() {
        let dir = tempfile::tempdir().unwrap();
        let backend = Arc::new(FakeBackend::new());
        backend.set_clusters(vec![ClusterInfo::new("c2", "Jobs", "TERMINATED")]);
        backend.set_start_sequence("c2", &["pending"]);
        let (mut comm, _rx) = setup(backend.clone(), &dir);

        let start = json!({"action": "start_cluster", "data": {"cluster_id": "c2"}});
        comm.handle_msg(&start, &parent()).unwrap();
        comm.handle_msg(&start, &parent()).unwrap();

        // Both requests reach the backend, but only one watcher follows
        let starts = backend
            .calls()
            .iter()
            .filter(|call| *call == "start_cluster")
            .count();
        assert_eq!(starts, 2);
        assert!(comm.is_watching("c2"));
        assert_eq!(lock(&comm.watching).len(), 1);

        backend.set_fail_clusters(true);
        assert!(wait_until_unwatched(&comm, "c2"));
    }

    #[test]
    fn test_watcher_gives_up_on_missing_cluster() {
        let dir = tempfile::tempdir().unwrap();
        let backend = Arc::new(FakeBackend::new());
        backend.set_clusters(vec![ClusterInfo::new("c2", "Jobs", "TERMINATED")]);
        backend.set_start_sequence("c2", &["pending"]);
        let (mut comm, _rx) = setup(backend.clone(), &dir);

        comm.handle_msg(
            &json!({"action": "start_cluster", "data": {"cluster_id": "c2"}}),
            &parent(),
        )
        .unwrap();
        assert!(comm.is_watching("c2"));

        // The cluster vanishes from the listing
        backend.set_fail_clusters(true);
        assert!(wait_until_unwatched(&comm, "c2"));

        // A new start request gets a fresh watcher
        backend.set_fail_clusters(false);
        comm.handle_msg(
            &json!({"action": "start_cluster", "data": {"cluster_id": "c2"}}),
            &parent(),
        )
        .unwrap();
        assert!(comm.is_watching("c2"));
    }

    #[test]
    fn test_watcher_is_released_once_running() {
        let dir = tempfile::tempdir().unwrap();
        let backend = Arc::new(FakeBackend::new());
        backend.set_clusters(vec![ClusterInfo::new("c2", "Jobs", "TERMINATED")]);
        backend.set_start_sequence("c2", &["pending", "running"]);
        let (mut comm, _rx) = setup(backend, &dir);

        comm.handle_msg(
            &json!({"action": "start_cluster", "data": {"cluster_id": "c2"}}),
            &parent(),
        )
        .unwrap();
        assert!(wait_until_unwatched(&comm, "c2"));
    }

    #[test]
    fn test_start_cluster_failure_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let backend = Arc::new(FakeBackend::new());
        let (mut comm, rx) = setup(backend, &dir);

        let result = comm.handle_msg(
            &json!({"action": "start_cluster", "data": {"cluster_id": "missing"}}),
            &parent(),
        );
        assert!(result.is_err());
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_unknown_action_is_ignored() {
        let dir = tempfile::tempdir().unwrap();
        let backend = Arc::new(FakeBackend::new());
        let (mut comm, rx) = setup(backend.clone(), &dir);

        let reply = comm
            .handle_msg(&json!({"action": "restart_cluster"}), &parent())
            .unwrap();
        assert_eq!(reply, None);
        assert!(!backend.calls().contains(&String::from("start_cluster")));
        assert!(rx.try_recv().is_err());
    }
}
