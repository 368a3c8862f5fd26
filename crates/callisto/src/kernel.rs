/*
 * kernel.rs
 *
 * Copyright (C) 2026 Posit Software, PBC. All rights reserved.
 *
 */

use std::path::PathBuf;
use std::sync::Arc;
use std::sync::Mutex;
use std::time::Duration;

use crossbeam::channel::bounded;
use crossbeam::channel::tick;
use crossbeam::channel::unbounded;
use crossbeam::channel::Receiver;

use crate::comm::actions_comm::ActionsComm;
use crate::comm::actions_comm::ACTIONS_TARGET;
use crate::comm::comm_registry::CommRegistry;
use crate::comm::config_comm::ConfigComm;
use crate::comm::config_comm::ConfigPublisher;
use crate::comm::config_comm::CONFIG_TARGET;
use crate::config::ConfigStore;
use crate::connection_file::ConnectionFile;
use crate::error::Error;
use crate::language::backend::Backend;
use crate::language::execution::ExecutionController;
use crate::language::execution::InterruptFlag;
use crate::session::Session;
use crate::session::SignaturePolicy;
use crate::socket::control::Control;
use crate::socket::heartbeat::Heartbeat;
use crate::socket::iopub::IOPub;
use crate::socket::iopub::IOPubMessage;
use crate::socket::shell::Shell;
use crate::socket::socket::Socket;
use crate::socket::stdin::Stdin;
use crate::wire::kernel_info_reply::KernelInfo;
use crate::wire::shutdown_request::ShutdownRequest;

/// Tuning knobs for a kernel. `Default` gives the production values.
#[derive(Debug, Clone)]
pub struct KernelOptions {
    /// Delay between two status polls of a running command
    pub poll_interval: Duration,

    /// Period of the unsolicited config broadcast; `None` disables it
    pub broadcast_interval: Option<Duration>,

    /// Delay between two cluster listings while a cluster starts
    pub cluster_poll_interval: Duration,

    /// How long `connect()` waits for a frontend to subscribe to IOPub
    pub subscription_timeout: Duration,

    pub signature_policy: SignaturePolicy,

    /// Location of the config file; `None` for `~/.jupyter/databricks.json`
    pub config_path: Option<PathBuf>,
}

impl Default for KernelOptions {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(1),
            broadcast_interval: Some(Duration::from_secs(5)),
            cluster_poll_interval: Duration::from_secs(2),
            subscription_timeout: Duration::from_secs(10),
            signature_policy: SignaturePolicy::Enforce,
            config_path: None,
        }
    }
}

/// A running kernel, as seen by the binary that started it.
pub struct KernelHandle {
    connection_file: ConnectionFile,
    comms: CommRegistry,
    shutdown_rx: Receiver<ShutdownRequest>,
}

impl KernelHandle {
    /// The connection file with the ports the kernel actually bound.
    pub fn connection_file(&self) -> &ConnectionFile {
        &self.connection_file
    }

    pub fn comms(&self) -> &CommRegistry {
        &self.comms
    }

    /// Block until the frontend asks the kernel to shut down. Returns `None`
    /// if the control thread went away without a request.
    pub fn wait_for_shutdown(&self) -> Option<ShutdownRequest> {
        self.shutdown_rx.recv().ok()
    }
}

/// Connects the Kernel to the frontend
pub fn connect(
    name: &str,
    connection_file: ConnectionFile,
    kernel_info: KernelInfo,
    backend: Arc<dyn Backend>,
    options: KernelOptions,
) -> Result<KernelHandle, Error> {
    let ctx = zmq::Context::new();

    let session = Session::create(
        &connection_file.key,
        &connection_file.signature_scheme,
        options.signature_policy,
    )?;

    // Channel delivering messages to the IOPub thread from every other thread
    let (iopub_tx, iopub_rx) = unbounded::<IOPubMessage>();

    // Load the saved config and hand it to the backend before any request
    // can reach it
    let config_path = options
        .config_path
        .clone()
        .unwrap_or_else(ConfigStore::default_path);
    let store = ConfigStore::load(config_path);
    if let Err(err) = backend.configure(store.config()) {
        log::warn!("Backend rejected the saved config: {err:?}");
    }
    let publisher = ConfigPublisher::new(Arc::new(Mutex::new(store)), backend.clone());

    let comms = CommRegistry::new(iopub_tx.clone());
    comms.register(
        CONFIG_TARGET,
        Arc::new(Mutex::new(ConfigComm::new(publisher.clone()))),
    );
    comms.register(
        ACTIONS_TARGET,
        Arc::new(Mutex::new(ActionsComm::new(
            backend.clone(),
            publisher.clone(),
            comms.clone(),
            options.cluster_poll_interval,
        ))),
    );

    let interrupt = InterruptFlag::new();
    let mut bound = connection_file.clone();

    // Create the Shell ROUTER/DEALER socket and start a thread to listen
    // for client messages.
    let shell_socket = Socket::new(
        session.clone(),
        ctx.clone(),
        String::from("Shell"),
        zmq::ROUTER,
        None,
        connection_file.endpoint(connection_file.shell_port),
    )?;
    bound.shell_port = port_finalize(&shell_socket, connection_file.shell_port)?;

    let execution = ExecutionController::new(
        backend.clone(),
        iopub_tx.clone(),
        interrupt.clone(),
        kernel_info.language_info.name.clone(),
        options.poll_interval,
    );
    let shell_iopub_tx = iopub_tx.clone();
    let shell_comms = comms.clone();
    spawn(format!("{name}-shell"), move || {
        let mut shell = Shell::new(
            shell_socket,
            shell_iopub_tx,
            kernel_info,
            shell_comms,
            execution,
        );
        shell.listen();
    })?;

    // Create the IOPub XPUB/SUB socket and start a thread to broadcast to
    // the client. IOPub only broadcasts messages, so it listens to other
    // threads on a Receiver<IOPubMessage> instead of to the client.
    let iopub_socket = Socket::new(
        session.clone(),
        ctx.clone(),
        String::from("IOPub"),
        zmq::XPUB,
        None,
        connection_file.endpoint(connection_file.iopub_port),
    )?;
    bound.iopub_port = port_finalize(&iopub_socket, connection_file.iopub_port)?;

    // Notified once the XPUB socket has received a subscription, meaning the
    // messages we send over IOPub will no longer be dropped on the way out
    let (iopub_subscription_tx, iopub_subscription_rx) = bounded::<()>(1);
    spawn(format!("{name}-iopub"), move || {
        let mut iopub = IOPub::new(iopub_socket, iopub_rx, iopub_subscription_tx);
        iopub.listen();
    })?;

    // Create the heartbeat socket and start a thread to listen for
    // heartbeat messages.
    let heartbeat_socket = Socket::new(
        session.clone(),
        ctx.clone(),
        String::from("Heartbeat"),
        zmq::REP,
        None,
        connection_file.endpoint(connection_file.hb_port),
    )?;
    bound.hb_port = port_finalize(&heartbeat_socket, connection_file.hb_port)?;
    spawn(format!("{name}-heartbeat"), move || {
        Heartbeat::new(heartbeat_socket).listen();
    })?;

    let stdin_socket = Socket::new(
        session.clone(),
        ctx.clone(),
        String::from("Stdin"),
        zmq::ROUTER,
        None,
        connection_file.endpoint(connection_file.stdin_port),
    )?;
    bound.stdin_port = port_finalize(&stdin_socket, connection_file.stdin_port)?;
    spawn(format!("{name}-stdin"), move || {
        Stdin::new(stdin_socket).listen();
    })?;

    // Create the Control ROUTER/DEALER socket. It gets its own thread so
    // interrupts are seen while the shell is blocked on the backend.
    let control_socket = Socket::new(
        session.clone(),
        ctx.clone(),
        String::from("Control"),
        zmq::ROUTER,
        None,
        connection_file.endpoint(connection_file.control_port),
    )?;
    bound.control_port = port_finalize(&control_socket, connection_file.control_port)?;

    let (shutdown_tx, shutdown_rx) = bounded::<ShutdownRequest>(1);
    spawn(format!("{name}-control"), move || {
        let control = Control::new(control_socket, interrupt, backend, shutdown_tx);
        control.listen();
        log::info!("Control thread exited");
    })?;

    if let Some(interval) = options.broadcast_interval {
        let broadcaster_comms = comms.clone();
        spawn(format!("{name}-config-broadcast"), move || {
            config_broadcast_thread(publisher, broadcaster_comms, interval)
        })?;
    }

    // Wait until we have our first (and usually only) IOPub subscription
    // message come in. Without a subscriber, the IOPub socket drops anything
    // we send, including the busy/idle statuses of the first requests.
    log::info!("Waiting on IOPub subscription confirmation");
    match iopub_subscription_rx.recv_timeout(options.subscription_timeout) {
        Ok(_) => {
            log::info!("Received IOPub subscription confirmation, completing kernel connection");
        },
        Err(err) => {
            log::warn!("No IOPub subscription after {:?}: {err:?}", options.subscription_timeout);
        },
    }

    Ok(KernelHandle {
        connection_file: bound,
        comms,
        shutdown_rx,
    })
}

/// Periodically pushes the config payload to every config comm so frontends
/// pick up changes made elsewhere (new clusters, state changes).
fn config_broadcast_thread(publisher: ConfigPublisher, comms: CommRegistry, interval: Duration) {
    let ticker = tick(interval);
    for _ in ticker.iter() {
        publisher.broadcast(&comms);
    }
}

fn spawn<F>(name: String, f: F) -> crate::Result<()>
where
    F: FnOnce() + Send + 'static,
{
    match std::thread::Builder::new().name(name.clone()).spawn(f) {
        Ok(_) => Ok(()),
        Err(err) => Err(crate::anyhow!("Can't spawn thread '{name}': {err:?}")),
    }
}

fn port_finalize(socket: &Socket, port: u16) -> crate::Result<u16> {
    if port == 0 {
        // Server provided the port, extract it from the socket
        // since we gave zmq a port number of `0` to begin with.
        port_from_socket(socket)
    } else {
        // Client provided the port, just use that
        Ok(port)
    }
}

pub(crate) fn port_from_socket(socket: &Socket) -> crate::Result<u16> {
    let name = socket.name.as_str();

    let address = match socket.socket.get_last_endpoint() {
        Ok(Ok(address)) => address,
        Ok(Err(_)) => {
            return Err(crate::anyhow!(
                "Can't access last endpoint of '{name}' socket."
            ));
        },
        Err(err) => {
            return Err(crate::anyhow!(
                "Can't access last endpoint of '{name}' socket due to {err:?}"
            ));
        },
    };

    // We've got the full address but we only want the port at the very end
    let Some(loc) = address.rfind(':') else {
        return Err(crate::anyhow!(
            "Failed to find port in the '{name}' socket address."
        ));
    };

    let port = &address[(loc + 1)..];
    match port.parse::<u16>() {
        Ok(port) => Ok(port),
        Err(err) => Err(crate::anyhow!(
            "Can't parse port '{port}' into a `u16` due to {err:?}"
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_options() {
        let options = KernelOptions::default();
        assert_eq!(options.poll_interval, Duration::from_secs(1));
        assert_eq!(options.broadcast_interval, Some(Duration::from_secs(5)));
        assert_eq!(options.cluster_poll_interval, Duration::from_secs(2));
        assert_eq!(options.signature_policy, SignaturePolicy::Enforce);
        assert!(options.config_path.is_none());
    }

    #[test]
    fn test_port_from_bound_socket() {
        let session = Session::create("", "", SignaturePolicy::Enforce).unwrap();
        let socket = Socket::new(
            session,
            zmq::Context::new(),
            String::from("Heartbeat"),
            zmq::REP,
            None,
            String::from("tcp://127.0.0.1:0"),
        )
        .unwrap();

        let port = port_finalize(&socket, 0).unwrap();
        assert_ne!(port, 0);
        assert_eq!(port_finalize(&socket, 4242).unwrap(), 4242);
    }
}
