/*
 * backend.rs
 *
 * Copyright (C) 2026 Posit Software, PBC. All rights reserved.
 *
 */

use std::collections::HashMap;
use std::sync::Mutex;
use std::sync::MutexGuard;
use std::sync::PoisonError;

use anyhow::anyhow;
use callisto::config::KernelConfig;
use callisto::language::backend::Backend;
use callisto::language::backend::ClusterInfo;
use callisto::language::backend::CommandResult;
use callisto::language::backend::CommandState;
use callisto::language::backend::CommandStatus;
use serde_json::json;
use uuid::Uuid;

/// Number of polls a `sleep` command stays running
const SLEEP_POLLS: u32 = 30;

struct Command {
    code: String,
    polls_left: u32,
}

struct EchoState {
    cluster: ClusterInfo,
    context_id: Option<String>,
    commands: HashMap<String, Command>,
    /// Listings left before a starting cluster reports `running`
    starting_polls: u32,
}

/// A backend that runs nothing remotely. Code is echoed back, except:
///
/// - `raise <message>` fails with a command error,
/// - `table` returns a small table,
/// - `sleep` keeps running for a while, so it can be interrupted.
pub struct EchoBackend {
    state: Mutex<EchoState>,
}

impl EchoBackend {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(EchoState {
                cluster: ClusterInfo::new("local", "Local echo cluster", "terminated"),
                context_id: None,
                commands: HashMap::new(),
                starting_polls: 0,
            }),
        }
    }

    fn state(&self) -> MutexGuard<'_, EchoState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

fn evaluate(code: &str) -> CommandResult {
    let code = code.trim();
    if let Some(message) = code.strip_prefix("raise ") {
        return CommandResult::Error {
            summary: format!("Exception: {message}"),
            cause: format!("Traceback (most recent call last):\n  <echo>\nException: {message}"),
        };
    }
    if code == "table" {
        return CommandResult::Table {
            columns: vec![String::from("id"), String::from("name")],
            rows: vec![vec![json!(1), json!("one")], vec![json!(2), json!("two")]],
        };
    }
    CommandResult::Text(String::from(code))
}

impl Backend for EchoBackend {
    fn is_online(&self) -> anyhow::Result<bool> {
        Ok(self.state().cluster.is_running())
    }

    fn ensure_context(&self) -> anyhow::Result<String> {
        let mut state = self.state();
        let context_id = state
            .context_id
            .get_or_insert_with(|| Uuid::new_v4().simple().to_string());
        Ok(context_id.clone())
    }

    fn submit(&self, language: &str, context_id: &str, code: &str) -> anyhow::Result<String> {
        let mut state = self.state();
        if state.context_id.as_deref() != Some(context_id) {
            return Err(anyhow!("Unknown execution context '{context_id}'"));
        }

        let command_id = Uuid::new_v4().simple().to_string();
        log::trace!("Submitting {language} command '{command_id}'");
        let polls_left = if code.trim() == "sleep" { SLEEP_POLLS } else { 1 };
        state.commands.insert(command_id.clone(), Command {
            code: String::from(code),
            polls_left,
        });
        Ok(command_id)
    }

    fn poll_status(&self, command_id: &str) -> anyhow::Result<CommandStatus> {
        let mut state = self.state();
        let Some(command) = state.commands.get_mut(command_id) else {
            return Err(anyhow!("Unknown command '{command_id}'"));
        };

        if command.polls_left > 0 {
            command.polls_left -= 1;
            return Ok(CommandStatus {
                state: CommandState::Running,
                result: None,
            });
        }

        let result = evaluate(&command.code);
        state.commands.remove(command_id);
        Ok(CommandStatus {
            state: CommandState::Finished,
            result: Some(result),
        })
    }

    fn cancel(&self, command_id: &str) -> anyhow::Result<()> {
        match self.state().commands.remove(command_id) {
            Some(_) => Ok(()),
            None => Err(anyhow!("Unknown command '{command_id}'")),
        }
    }

    fn clusters(&self) -> anyhow::Result<Vec<ClusterInfo>> {
        let mut state = self.state();
        if state.cluster.state == "pending" {
            if state.starting_polls == 0 {
                state.cluster.state = String::from("running");
            } else {
                state.starting_polls -= 1;
            }
        }
        Ok(vec![state.cluster.clone()])
    }

    fn start_cluster(&self, cluster_id: &str) -> anyhow::Result<()> {
        let mut state = self.state();
        if state.cluster.id != cluster_id {
            return Err(anyhow!("No such cluster '{cluster_id}'"));
        }
        if !state.cluster.is_running() {
            state.cluster.state = String::from("pending");
            state.starting_polls = 2;
        }
        Ok(())
    }

    fn configure(&self, config: &KernelConfig) -> anyhow::Result<()> {
        log::info!(
            "Echo backend configured for '{}'",
            config.uri.as_deref().unwrap_or("<no workspace>")
        );
        Ok(())
    }

    fn shutdown(&self) -> anyhow::Result<()> {
        self.state().context_id = None;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn run(backend: &EchoBackend, code: &str) -> CommandStatus {
        let context = backend.ensure_context().unwrap();
        let command = backend.submit("python", &context, code).unwrap();
        loop {
            let status = backend.poll_status(&command).unwrap();
            if !status.is_pending() {
                return status;
            }
        }
    }

    #[test]
    fn test_echo() {
        let backend = EchoBackend::new();
        assert_eq!(
            run(&backend, "1 + 1").result,
            Some(CommandResult::Text(String::from("1 + 1")))
        );
        assert!(matches!(
            run(&backend, "raise boom").result,
            Some(CommandResult::Error { summary, .. }) if summary == "Exception: boom"
        ));
        assert!(matches!(
            run(&backend, "table").result,
            Some(CommandResult::Table { .. })
        ));
    }

    #[test]
    fn test_cluster_starts() {
        let backend = EchoBackend::new();
        assert!(!backend.is_online().unwrap());

        backend.start_cluster("local").unwrap();
        let mut states = vec![];
        while !backend.is_online().unwrap() {
            states.push(backend.clusters().unwrap()[0].state.clone());
        }
        assert_eq!(states, vec!["pending", "pending", "running"]);
        assert!(backend.start_cluster("remote").is_err());
    }
}
