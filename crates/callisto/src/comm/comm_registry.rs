/*
 * comm_registry.rs
 *
 * Copyright (C) 2026 Posit Software, PBC. All rights reserved.
 *
 */

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::MutexGuard;
use std::sync::PoisonError;

use crossbeam::channel::Sender;
use log::debug;
use log::info;
use log::trace;
use serde_json::Value;
use uuid::Uuid;

use crate::error::Error;
use crate::socket::iopub::IOPubMessage;
use crate::wire::comm_msg::CommWireMsg;
use crate::wire::header::JupyterHeader;

/// Receives the `data` of every `comm_msg` addressed to one comm.
///
/// A returned payload is published back to the frontend as a `comm_msg` on
/// the same comm, parented to the request. `None`, `null` and `{}` mean no
/// reply.
pub trait CommHandler: Send {
    fn handle_msg(
        &mut self,
        data: &Value,
        parent: &JupyterHeader,
    ) -> crate::Result<Option<Value>>;
}

/// A registered comm as seen from outside the registry
#[derive(Debug, Clone, PartialEq)]
pub struct CommInfo {
    pub id: String,
    pub target_name: String,
}

#[derive(Clone)]
struct CommEntry {
    target_name: String,
    handler: Arc<Mutex<dyn CommHandler>>,
}

/// The table of open comms. Cheap to clone; all clones share the same table.
///
/// The table lock is only held to read or modify the table itself, never
/// while a handler runs, so handlers may call back into the registry.
#[derive(Clone)]
pub struct CommRegistry {
    comms: Arc<Mutex<HashMap<String, CommEntry>>>,
    iopub_tx: Sender<IOPubMessage>,
}

impl CommRegistry {
    pub fn new(iopub_tx: Sender<IOPubMessage>) -> Self {
        Self {
            comms: Arc::new(Mutex::new(HashMap::new())),
            iopub_tx,
        }
    }

    /// Register a comm under a fresh id and return that id.
    pub fn register(&self, target_name: &str, handler: Arc<Mutex<dyn CommHandler>>) -> String {
        let comm_id = Uuid::new_v4().simple().to_string();
        self.register_with_id(comm_id.clone(), target_name, handler);
        comm_id
    }

    /// Register a comm under a known id, replacing any comm with that id.
    pub fn register_with_id(
        &self,
        comm_id: String,
        target_name: &str,
        handler: Arc<Mutex<dyn CommHandler>>,
    ) {
        let mut comms = self.table();
        comms.insert(comm_id.clone(), CommEntry {
            target_name: String::from(target_name),
            handler,
        });
        info!(
            "Comm '{comm_id}' registered for target '{target_name}'; there are now {} comms",
            comms.len()
        );
    }

    pub fn lookup(&self, comm_id: &str) -> Option<CommInfo> {
        self.table().get(comm_id).map(|entry| CommInfo {
            id: String::from(comm_id),
            target_name: entry.target_name.clone(),
        })
    }

    /// All registered comms.
    pub fn comms(&self) -> Vec<CommInfo> {
        self.table()
            .iter()
            .map(|(id, entry)| CommInfo {
                id: id.clone(),
                target_name: entry.target_name.clone(),
            })
            .collect()
    }

    /// The registered comms bound to `target_name`.
    pub fn comms_for(&self, target_name: &str) -> Vec<CommInfo> {
        self.comms()
            .into_iter()
            .filter(|comm| comm.target_name == target_name)
            .collect()
    }

    /// Send `payload` to the frontend once on every comm bound to
    /// `target_name`. Broadcasts have no parent. Returns the number of
    /// messages queued.
    pub fn broadcast(&self, target_name: &str, payload: &Value) -> usize {
        let mut sent = 0;
        for comm in self.comms_for(target_name) {
            let msg = CommWireMsg {
                comm_id: comm.id,
                data: payload.clone(),
            };
            match self.iopub_tx.send(IOPubMessage::CommMsgEvent(msg)) {
                Ok(_) => sent += 1,
                Err(err) => log::error!("Could not broadcast on '{target_name}': {err}"),
            }
        }
        trace!("Broadcast on '{target_name}' reached {sent} comms");
        sent
    }

    /// Deliver the `data` of a frontend `comm_msg` to the comm it names.
    /// Messages for unknown comms are dropped.
    pub fn dispatch(
        &self,
        comm_id: &str,
        data: &Value,
        parent: &JupyterHeader,
    ) -> crate::Result<()> {
        // Clone the handler out so the table is unlocked while it runs
        let entry = self.table().get(comm_id).cloned();
        let Some(entry) = entry else {
            debug!("Ignoring message for unknown comm '{comm_id}'");
            return Ok(());
        };

        trace!(
            "Delivering message to comm '{comm_id}' ({})",
            entry.target_name
        );
        let reply = {
            let mut handler = entry
                .handler
                .lock()
                .unwrap_or_else(PoisonError::into_inner);
            handler.handle_msg(data, parent)?
        };

        if let Some(reply) = reply {
            if is_empty_payload(&reply) {
                return Ok(());
            }
            let msg = CommWireMsg {
                comm_id: String::from(comm_id),
                data: reply,
            };
            if let Err(err) = self
                .iopub_tx
                .send(IOPubMessage::CommMsgReply(parent.clone(), msg))
            {
                return Err(Error::SendError(format!(
                    "Could not deliver reply from comm '{comm_id}': {err}"
                )));
            }
        }

        Ok(())
    }

    fn table(&self) -> MutexGuard<'_, HashMap<String, CommEntry>> {
        self.comms.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

fn is_empty_payload(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::Object(map) => map.is_empty(),
        _ => false,
    }
}
