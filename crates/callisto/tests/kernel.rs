/*
 * kernel.rs
 *
 * Copyright (C) 2026 Posit Software, PBC. All rights reserved.
 *
 */

use std::sync::Arc;
use std::time::Duration;

use assert_matches::assert_matches;
use callisto::comm::actions_comm::ACTIONS_TARGET;
use callisto::comm::config_comm::CONFIG_TARGET;
use callisto::fixtures::dummy_frontend::DummyFrontend;
use callisto::fixtures::fake_backend::FakeBackend;
use callisto::kernel;
use callisto::kernel::KernelHandle;
use callisto::kernel::KernelOptions;
use callisto::language::backend::Backend;
use callisto::language::backend::CommandResult;
use callisto::session::SignaturePolicy;
use callisto::wire::interrupt_request::InterruptRequest;
use callisto::wire::jupyter_message::Message;
use callisto::wire::jupyter_message::Status;
use callisto::wire::kernel_info_reply::KernelInfo;
use callisto::wire::kernel_info_request::KernelInfoRequest;
use callisto::wire::language_info::LanguageInfo;
use callisto::wire::shutdown_request::ShutdownRequest;
use callisto::wire::status::ExecutionState;
use crossbeam::channel::bounded;
use serde_json::json;

struct TestKernel {
    frontend: DummyFrontend,
    backend: Arc<FakeBackend>,
    handle: KernelHandle,
    _config_dir: tempfile::TempDir,
}

fn kernel_info() -> KernelInfo {
    KernelInfo {
        implementation: String::from("databricks"),
        implementation_version: String::from("2.0.0"),
        language_info: LanguageInfo {
            name: String::from("python"),
            version: String::from("3"),
            mimetype: String::from("text/x-python"),
            file_extension: String::from(".py"),
            pygments_lexer: None,
            codemirror_mode: None,
            nbconvert_exporter: None,
        },
        banner: String::from("Remote Python"),
    }
}

fn start_kernel() -> TestKernel {
    let kernel = boot_kernel(None);
    kernel.frontend.recv_iopub_starting();
    kernel
}

/// Start a kernel without consuming the `starting` status, which periodic
/// broadcasts may overtake
fn boot_kernel(broadcast_interval: Option<Duration>) -> TestKernel {
    let _ = env_logger::builder().is_test(true).try_init();

    let frontend = DummyFrontend::new();
    let backend = Arc::new(FakeBackend::new());
    let config_dir = tempfile::tempdir().unwrap();

    let options = KernelOptions {
        poll_interval: Duration::from_millis(10),
        broadcast_interval,
        cluster_poll_interval: Duration::from_millis(10),
        subscription_timeout: Duration::from_secs(10),
        signature_policy: SignaturePolicy::Enforce,
        config_path: Some(config_dir.path().join("databricks.json")),
    };

    // `connect()` blocks until the frontend subscribes to IOPub, so run it on
    // its own thread
    let connection_file = frontend.get_connection_file();
    let kernel_backend: Arc<dyn Backend> = backend.clone();
    let (tx, rx) = bounded(1);
    std::thread::spawn(move || {
        let handle = kernel::connect(
            "callisto",
            connection_file,
            kernel_info(),
            kernel_backend,
            options,
        );
        tx.send(handle).unwrap();
    });

    frontend.complete_initialization();
    let handle = rx
        .recv_timeout(Duration::from_secs(20))
        .unwrap()
        .unwrap();

    TestKernel {
        frontend,
        backend,
        handle,
        _config_dir: config_dir,
    }
}

fn comm_id(kernel: &TestKernel, target: &str) -> String {
    let comms = kernel.handle.comms().comms_for(target);
    assert_eq!(comms.len(), 1);
    comms[0].id.clone()
}

#[test]
fn test_kernel_info() {
    let kernel = start_kernel();
    let frontend = &kernel.frontend;

    let id = frontend.send_shell(KernelInfoRequest {});
    frontend.recv_iopub_busy();

    assert_matches!(frontend.recv_shell(), Message::KernelInfoReply(reply) => {
        assert_eq!(reply.parent_header.unwrap().msg_id, id);
        assert_eq!(reply.content.status, Status::Ok);
        assert_eq!(reply.content.protocol_version, "5.3");
        assert_eq!(reply.content.implementation, "databricks");
        assert_eq!(reply.content.implementation_version, "2.0.0");
        assert_eq!(reply.content.language_info.name, "python");
    });

    frontend.recv_iopub_idle();
    frontend.assert_no_incoming();
}

#[test]
fn test_comm_info() {
    let kernel = start_kernel();
    let frontend = &kernel.frontend;

    frontend.send_comm_info_request(None);
    frontend.recv_iopub_busy();
    assert_matches!(frontend.recv_shell(), Message::CommInfoReply(reply) => {
        assert_eq!(reply.content.comms.len(), 2);
        let targets: Vec<&serde_json::Value> = reply
            .content
            .comms
            .values()
            .map(|info| &info["target_name"])
            .collect();
        assert!(targets.contains(&&json!(CONFIG_TARGET)));
        assert!(targets.contains(&&json!(ACTIONS_TARGET)));
    });
    frontend.recv_iopub_idle();

    let config_id = comm_id(&kernel, CONFIG_TARGET);
    frontend.send_comm_info_request(Some(CONFIG_TARGET));
    frontend.recv_iopub_busy();
    assert_matches!(frontend.recv_shell(), Message::CommInfoReply(reply) => {
        assert_eq!(reply.content.comms.len(), 1);
        assert!(reply.content.comms.contains_key(&config_id));
    });
    frontend.recv_iopub_idle();
}

#[test]
fn test_config_comm_reply() {
    let kernel = start_kernel();
    let frontend = &kernel.frontend;
    let config_id = comm_id(&kernel, CONFIG_TARGET);

    let request_id = frontend.send_comm_msg(
        &config_id,
        json!({"uri": "https://workspace.example", "api_key": "token"}),
    );
    frontend.recv_iopub_busy();

    let reply = frontend.recv_iopub_comm_msg();
    assert_eq!(reply.parent_header.unwrap().msg_id, request_id);
    assert_eq!(reply.content.comm_id, config_id);
    assert_eq!(
        reply.content.data["config"]["uri"],
        json!("https://workspace.example")
    );
    assert_eq!(reply.content.data["config"]["cluster_id"], json!("c1"));
    assert_eq!(reply.content.data["clusters"][0]["id"], json!("c1"));

    frontend.recv_iopub_idle();

    let configured = kernel.backend.configured();
    assert_eq!(
        configured.last().and_then(|config| config.api_key.clone()),
        Some(String::from("token"))
    );
    frontend.assert_no_incoming();
}

#[test]
fn test_config_is_broadcast_periodically() {
    let kernel = boot_kernel(Some(Duration::from_millis(20)));
    let frontend = &kernel.frontend;
    let config_id = comm_id(&kernel, CONFIG_TARGET);

    // Unsolicited: no parent and no busy/idle around them
    let mut broadcasts = 0;
    while broadcasts < 2 {
        match frontend.recv_iopub() {
            Message::Status(msg) => {
                assert_eq!(msg.content.execution_state, ExecutionState::Starting);
            },
            Message::CommMsg(msg) => {
                assert!(msg.parent_header.is_none());
                assert_eq!(msg.content.comm_id, config_id);
                assert_eq!(msg.content.data["config"]["cluster_id"], json!("c1"));
                assert_eq!(msg.content.data["clusters"][0]["id"], json!("c1"));
                broadcasts += 1;
            },
            other => panic!("Unexpected IOPub message: {other:?}"),
        }
    }
}

#[test]
fn test_unknown_comm_is_ignored() {
    let kernel = start_kernel();
    let frontend = &kernel.frontend;

    frontend.send_comm_msg("not-a-comm", json!({"uri": "x"}));
    frontend.recv_iopub_busy();
    frontend.recv_iopub_idle();

    assert!(kernel.backend.configured().iter().all(|c| c.uri.is_none()));
    frontend.assert_no_incoming();
}

#[test]
fn test_execute_text_result() {
    let kernel = start_kernel();
    let frontend = &kernel.frontend;
    kernel
        .backend
        .set_result(Some(CommandResult::Text(String::from("4"))));

    frontend.send_execute_request("2+2");
    frontend.recv_iopub_busy();
    assert_eq!(frontend.recv_iopub_stream_stdout(), "4");
    frontend.recv_iopub_idle();
    assert_eq!(frontend.recv_shell_execute_reply(Status::Ok), 1);

    frontend.send_execute_request("2+2");
    frontend.recv_iopub_busy();
    assert_eq!(frontend.recv_iopub_stream_stdout(), "4");
    frontend.recv_iopub_idle();
    assert_eq!(frontend.recv_shell_execute_reply(Status::Ok), 2);

    frontend.assert_no_incoming();
}

#[test]
fn test_execute_table_result() {
    let kernel = start_kernel();
    let frontend = &kernel.frontend;
    kernel.backend.set_result(Some(CommandResult::Table {
        columns: vec![String::from("x")],
        rows: vec![vec![json!(1)], vec![json!(2)]],
    }));

    frontend.send_execute_request("spark.range(2)");
    frontend.recv_iopub_busy();
    assert_matches!(frontend.recv_iopub(), Message::DisplayData(msg) => {
        assert_eq!(msg.content.data["application/json"]["rows"], json!([[1], [2]]));
        assert_eq!(msg.content.data["text/plain"], json!("x\n1\n2"));
    });
    frontend.recv_iopub_idle();
    assert_eq!(frontend.recv_shell_execute_reply(Status::Ok), 1);
}

#[test]
fn test_error_then_stale_request_is_aborted() {
    let kernel = start_kernel();
    let frontend = &kernel.frontend;
    kernel.backend.set_online(false);

    frontend.send_execute_request("1");
    frontend.recv_iopub_busy();
    assert!(frontend
        .recv_iopub_stream_stderr()
        .contains("Cluster is not online."));
    frontend.recv_iopub_idle();
    assert_eq!(frontend.recv_shell_execute_reply_exception(), 1);

    // Queued before the failure: counted, but aborted without reaching the
    // backend
    kernel.backend.set_online(true);
    let submitted = kernel.backend.calls().len();
    frontend.send_execute_request_dated("2", "2000-01-01T00:00:00.000000Z");
    frontend.recv_iopub_busy();
    frontend.recv_iopub_idle();
    assert_eq!(frontend.recv_shell_execute_reply(Status::Abort), 2);
    assert_eq!(kernel.backend.calls().len(), submitted);

    // Sent after the failure: runs
    frontend.send_execute_request("3");
    frontend.recv_iopub_busy();
    assert_eq!(frontend.recv_iopub_stream_stdout(), "ok");
    frontend.recv_iopub_idle();
    assert_eq!(frontend.recv_shell_execute_reply(Status::Ok), 3);

    frontend.assert_no_incoming();
}

#[test]
fn test_interrupt_cancels_running_command() {
    let kernel = start_kernel();
    let frontend = &kernel.frontend;
    kernel.backend.set_hang(true);

    frontend.send_execute_request("while True: pass");
    frontend.recv_iopub_busy();
    assert!(kernel
        .backend
        .wait_for_calls("poll_status", 1, Duration::from_secs(5)));

    // The control channel answers while the shell is busy
    frontend.send_control(InterruptRequest {});
    assert_matches!(frontend.recv_control(), Message::InterruptReply(reply) => {
        assert_eq!(reply.content.status, Status::Ok);
    });

    assert_eq!(frontend.recv_iopub_stream_stderr(), "Command canceled.");
    frontend.recv_iopub_idle();
    assert_eq!(frontend.recv_shell_execute_reply(Status::Abort), 1);
    assert!(kernel.backend.calls().contains(&String::from("cancel")));

    frontend.assert_no_incoming();
}

#[test]
fn test_heartbeat_echoes() {
    let kernel = start_kernel();
    let frontend = &kernel.frontend;

    frontend.send_heartbeat(zmq::Message::from("Heartbeat"));
    assert_eq!(frontend.recv_heartbeat(), zmq::Message::from("Heartbeat"));
}

#[test]
fn test_bad_signature_is_dropped() {
    let kernel = start_kernel();
    let frontend = &kernel.frontend;

    // Frames on a DEALER socket: delimiter, signature, then the four parts
    let mut frames = frontend.encode(KernelInfoRequest {});
    frames[1] = vec![b'0'; 64];
    frontend.send_shell_frames(&frames);

    let id = frontend.send_shell(KernelInfoRequest {});
    frontend.recv_iopub_busy();
    assert_matches!(frontend.recv_shell(), Message::KernelInfoReply(reply) => {
        assert_eq!(reply.parent_header.unwrap().msg_id, id);
    });
    frontend.recv_iopub_idle();
    frontend.assert_no_incoming();
}

#[test]
fn test_shutdown() {
    let kernel = start_kernel();
    let frontend = &kernel.frontend;

    frontend.send_control(ShutdownRequest { restart: false });
    assert_matches!(frontend.recv_control(), Message::ShutdownReply(reply) => {
        assert_eq!(reply.content.status, Status::Ok);
        assert!(!reply.content.restart);
    });

    assert_matches!(kernel.handle.wait_for_shutdown(), Some(req) => {
        assert!(!req.restart);
    });
    assert!(kernel.backend.calls().contains(&String::from("shutdown")));
}
