/*
 * connection_file.rs
 *
 * Copyright (C) 2026 Posit Software, PBC. All rights reserved.
 *
 */

use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use anyhow::Context;
use serde::Deserialize;
use serde::Serialize;

/// The Jupyter connection file handed to the kernel by its launcher.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct ConnectionFile {
    // ZeroMQ ports
    pub control_port: u16,
    pub shell_port: u16,
    pub stdin_port: u16,
    pub iopub_port: u16,
    pub hb_port: u16,

    /// Usually "tcp"
    pub transport: String,

    /// "hmac-sha256" or "hmac-sha512"; empty means the default
    #[serde(default)]
    pub signature_scheme: String,

    pub ip: String,

    /// Signing key; empty means messages are not signed
    #[serde(default)]
    pub key: String,
}

impl ConnectionFile {
    /// Create a ConnectionFile by parsing the contents of a connection file.
    pub fn from_file<P: AsRef<Path>>(connection_file: P) -> anyhow::Result<ConnectionFile> {
        let path = connection_file.as_ref();
        let file = File::open(path)
            .with_context(|| format!("Can't open connection file '{}'", path.display()))?;
        let reader = BufReader::new(file);
        let control = serde_json::from_reader(reader)
            .with_context(|| format!("Can't parse connection file '{}'", path.display()))?;

        Ok(control)
    }

    /// Given a port, return a URI-like string that can be used to connect to
    /// the port, given the other parameters in the connection file.
    ///
    /// Example: `32` => `"tcp://127.0.0.1:32"`
    pub fn endpoint(&self, port: u16) -> String {
        format!("{}://{}:{}", self.transport, self.ip, port)
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;

    #[test]
    fn test_read_connection_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{
                "control_port": 50160,
                "shell_port": 57503,
                "transport": "tcp",
                "signature_scheme": "hmac-sha256",
                "stdin_port": 52597,
                "hb_port": 42540,
                "ip": "127.0.0.1",
                "iopub_port": 40885,
                "key": "a0436f6c-1916-498b-8eb9-e81ab9368e84",
                "kernel_name": "databricks"
            }}"#
        )
        .unwrap();

        let connection = ConnectionFile::from_file(file.path()).unwrap();
        assert_eq!(connection.shell_port, 57503);
        assert_eq!(connection.signature_scheme, "hmac-sha256");
        assert_eq!(
            connection.endpoint(connection.hb_port),
            "tcp://127.0.0.1:42540"
        );
    }

    #[test]
    fn test_missing_connection_file() {
        let dir = tempfile::tempdir().unwrap();
        let err = ConnectionFile::from_file(dir.path().join("kernel.json")).unwrap_err();
        assert!(format!("{err}").contains("kernel.json"));
    }
}
