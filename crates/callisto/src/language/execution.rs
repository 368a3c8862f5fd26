/*
 * execution.rs
 *
 * Copyright (C) 2026 Posit Software, PBC. All rights reserved.
 *
 */

use std::fmt;
use std::sync::atomic::AtomicBool;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;

use chrono::DateTime;
use chrono::Utc;
use crossbeam::channel::Sender;
use log::info;
use log::trace;
use log::warn;
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::json;
use serde_json::Value;

use crate::language::backend::Backend;
use crate::language::backend::CommandResult;
use crate::language::backend::CommandStatus;
use crate::socket::iopub::IOPubMessage;
use crate::wire::display_data::DisplayData;
use crate::wire::exception::Exception;
use crate::wire::execute_reply::ExecuteReply;
use crate::wire::execute_reply_exception::ExecuteReplyException;
use crate::wire::execute_request::ExecuteRequest;
use crate::wire::header::JupyterHeader;
use crate::wire::jupyter_message::Status;
use crate::wire::stream::Stream;
use crate::wire::stream::StreamOutput;

/// `%name args`, on a single line
static RE_MAGIC: Lazy<Regex> = Lazy::new(|| Regex::new(r"^%(\w+)\s(.+?)$").unwrap());

/// Quoted arguments of a magic command
static RE_MAGIC_ARG: Lazy<Regex> = Lazy::new(|| Regex::new(r#"["'](.+?)["']"#).unwrap());

/// Set from the control thread, polled by the shell thread while a command
/// runs.
#[derive(Debug, Clone, Default)]
pub struct InterruptFlag(Arc<AtomicBool>);

impl InterruptFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn request(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn reset(&self) {
        self.0.store(false, Ordering::SeqCst);
    }

    pub fn is_requested(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Ways an execute request can fail.
#[derive(Debug)]
pub enum ExecutionError {
    ClusterOffline,
    IncompleteResult,
    NoSuchMagic(String),
    Command { summary: String, cause: String },
    Canceled,
    Unexpected(anyhow::Error),
}

impl fmt::Display for ExecutionError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            ExecutionError::ClusterOffline => write!(f, "Cluster is not online."),
            ExecutionError::IncompleteResult => write!(f, "No results found."),
            ExecutionError::NoSuchMagic(name) => write!(f, "No such magic: {name}"),
            ExecutionError::Command { summary, .. } => write!(f, "{summary}"),
            ExecutionError::Canceled => write!(f, "Command is cancelled."),
            ExecutionError::Unexpected(err) => write!(f, "{err}"),
        }
    }
}

impl std::error::Error for ExecutionError {}

impl From<anyhow::Error> for ExecutionError {
    fn from(err: anyhow::Error) -> Self {
        ExecutionError::Unexpected(err)
    }
}

impl ExecutionError {
    pub fn ename(&self) -> &'static str {
        match self {
            ExecutionError::ClusterOffline => "ClusterNotOnline",
            ExecutionError::IncompleteResult => "IncompleteResults",
            ExecutionError::NoSuchMagic(_) => "NoSuchMagic",
            ExecutionError::Command { .. } => "CommandError",
            ExecutionError::Canceled => "CommandCanceled",
            ExecutionError::Unexpected(_) => "InternalError",
        }
    }

    /// The text streamed to stderr when the error ends a request.
    pub fn stream_text(&self) -> String {
        match self {
            ExecutionError::Command { summary, cause } if !cause.is_empty() => {
                format!("{summary}\n{cause}")
            },
            // Includes the `Caused by:` chain
            ExecutionError::Unexpected(err) => format!("{err:?}"),
            _ => self.to_string(),
        }
    }

    pub fn to_exception(&self) -> Exception {
        let traceback = match self {
            ExecutionError::Command { cause, .. } => cause.lines().map(String::from).collect(),
            ExecutionError::Unexpected(err) => err.chain().skip(1).map(|e| e.to_string()).collect(),
            _ => vec![],
        };
        Exception {
            ename: String::from(self.ename()),
            evalue: self.to_string(),
            traceback,
        }
    }
}

/// A magic command line, `%name 'arg' "arg"`.
#[derive(Debug, PartialEq)]
pub struct Magic {
    pub name: String,
    pub args: Vec<String>,
}

impl Magic {
    pub fn parse(code: &str) -> Option<Self> {
        let captures = RE_MAGIC.captures(code)?;
        let name = String::from(&captures[1]);
        let args = RE_MAGIC_ARG
            .captures_iter(&captures[2])
            .map(|arg| String::from(&arg[1]))
            .collect();
        Some(Self { name, args })
    }
}

/// Output of a successful command, ready to publish.
#[derive(Debug, PartialEq)]
enum ExecuteOutput {
    Text(String),
    Table {
        columns: Vec<String>,
        rows: Vec<Vec<Value>>,
    },
}

/// What the shell sends back for an `execute_request`.
#[derive(Debug)]
pub enum ExecuteResponse {
    Reply(ExecuteReply),
    Exception(ExecuteReplyException),
}

impl ExecuteResponse {
    pub fn status(&self) -> Status {
        match self {
            ExecuteResponse::Reply(reply) => reply.status.clone(),
            ExecuteResponse::Exception(reply) => reply.status.clone(),
        }
    }

    pub fn execution_count(&self) -> u32 {
        match self {
            ExecuteResponse::Reply(reply) => reply.execution_count,
            ExecuteResponse::Exception(reply) => reply.execution_count,
        }
    }
}

/// Runs execute requests against the backend and tracks the execution
/// counter and the time of the last failure. Lives on the shell thread.
pub struct ExecutionController {
    backend: Arc<dyn Backend>,
    iopub_tx: Sender<IOPubMessage>,
    interrupt: InterruptFlag,
    language: String,
    poll_interval: Duration,
    execution_count: u32,
    last_error: Option<DateTime<Utc>>,
}

impl ExecutionController {
    pub fn new(
        backend: Arc<dyn Backend>,
        iopub_tx: Sender<IOPubMessage>,
        interrupt: InterruptFlag,
        language: String,
        poll_interval: Duration,
    ) -> Self {
        Self {
            backend,
            iopub_tx,
            interrupt,
            language,
            poll_interval,
            execution_count: 0,
            last_error: None,
        }
    }

    pub fn execution_count(&self) -> u32 {
        self.execution_count
    }

    pub fn last_error(&self) -> Option<DateTime<Utc>> {
        self.last_error
    }

    /// Handle one `execute_request`. Requests sent before the last failure
    /// are counted, then aborted without reaching the backend.
    pub fn handle_execute_request(
        &mut self,
        header: &JupyterHeader,
        req: &ExecuteRequest,
    ) -> ExecuteResponse {
        self.interrupt.reset();

        // Every request consumes a count, including those aborted below
        self.execution_count += 1;

        if self.is_stale(header) {
            info!(
                "Aborting execute request '{}' sent before the last error",
                header.msg_id
            );
            return self.reply(Status::Abort);
        }

        trace!(
            "Executing request '{}' as [{}]",
            header.msg_id,
            self.execution_count
        );

        match self.execute(&req.code) {
            Ok(output) => {
                self.publish_output(header, output);
                self.reply(Status::Ok)
            },
            Err(ExecutionError::Canceled) => {
                self.stream(header, Stream::Stderr, String::from("Command canceled."));
                self.last_error = Some(Utc::now());
                self.reply(Status::Abort)
            },
            Err(err) => {
                warn!("Execute request '{}' failed: {err}", header.msg_id);
                self.stream(header, Stream::Stderr, err.stream_text());
                self.last_error = Some(Utc::now());
                ExecuteResponse::Exception(ExecuteReplyException {
                    status: Status::Error,
                    execution_count: self.execution_count,
                    exception: err.to_exception(),
                })
            },
        }
    }

    fn is_stale(&self, header: &JupyterHeader) -> bool {
        let Some(last_error) = self.last_error else {
            return false;
        };
        match header.timestamp() {
            Some(sent) => sent < last_error,
            None => {
                warn!(
                    "Can't parse date '{}' of request '{}'; running it",
                    header.date, header.msg_id
                );
                false
            },
        }
    }

    fn reply(&self, status: Status) -> ExecuteResponse {
        ExecuteResponse::Reply(ExecuteReply {
            status,
            execution_count: self.execution_count,
            user_expressions: json!({}),
        })
    }

    fn execute(&self, code: &str) -> Result<ExecuteOutput, ExecutionError> {
        if let Some(magic) = Magic::parse(code) {
            return self.execute_magic(magic);
        }

        if !self.backend.is_online()? {
            return Err(ExecutionError::ClusterOffline);
        }
        let context_id = self.backend.ensure_context()?;
        let command_id = self.backend.submit(&self.language, &context_id, code)?;
        let status = self.wait_for(&command_id)?;

        match status.result {
            None => Err(ExecutionError::IncompleteResult),
            Some(CommandResult::Text(text)) => Ok(ExecuteOutput::Text(text)),
            Some(CommandResult::Table { columns, rows }) => {
                Ok(ExecuteOutput::Table { columns, rows })
            },
            Some(CommandResult::Error { summary, cause }) => {
                Err(ExecutionError::Command { summary, cause })
            },
        }
    }

    /// No magics are registered
    fn execute_magic(&self, magic: Magic) -> Result<ExecuteOutput, ExecutionError> {
        Err(ExecutionError::NoSuchMagic(magic.name))
    }

    /// Poll the command until it leaves the queued/running states, cancelling
    /// it if an interrupt arrives first.
    fn wait_for(&self, command_id: &str) -> Result<CommandStatus, ExecutionError> {
        let mut status = self.backend.poll_status(command_id)?;
        loop {
            if self.interrupt.is_requested() {
                info!("Interrupt requested, cancelling command '{command_id}'");
                if let Err(err) = self.backend.cancel(command_id) {
                    warn!("Could not cancel command '{command_id}': {err:?}");
                }
                return Err(ExecutionError::Canceled);
            }
            if !status.is_pending() {
                return Ok(status);
            }
            std::thread::sleep(self.poll_interval);
            status = self.backend.poll_status(command_id)?;
        }
    }

    fn publish_output(&self, header: &JupyterHeader, output: ExecuteOutput) {
        match output {
            ExecuteOutput::Text(text) => self.stream(header, Stream::Stdout, text),
            ExecuteOutput::Table { columns, rows } => {
                let plain = table_to_text(&columns, &rows);
                let data = json!({
                    "application/json": { "columns": columns, "rows": rows },
                    "text/plain": plain,
                });
                let msg = DisplayData {
                    data,
                    metadata: json!({}),
                    transient: json!({}),
                };
                self.send(IOPubMessage::DisplayData(Some(header.clone()), msg));
            },
        }
    }

    fn stream(&self, header: &JupyterHeader, name: Stream, text: String) {
        let msg = StreamOutput { name, text };
        self.send(IOPubMessage::Stream(Some(header.clone()), msg));
    }

    fn send(&self, msg: IOPubMessage) {
        if let Err(err) = self.iopub_tx.send(msg) {
            log::error!("Could not publish execution output: {err}");
        }
    }
}

/// Tab separated rendering of a table, header row first.
fn table_to_text(columns: &[String], rows: &[Vec<Value>]) -> String {
    let mut lines = vec![columns.join("\t")];
    for row in rows {
        let cells: Vec<String> = row
            .iter()
            .map(|cell| match cell {
                Value::String(s) => s.clone(),
                other => other.to_string(),
            })
            .collect();
        lines.push(cells.join("\t"));
    }
    lines.join("\n")
}
