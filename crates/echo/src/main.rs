/*
 * main.rs
 *
 * Copyright (C) 2026 Posit Software, PBC. All rights reserved.
 *
 */

mod backend;

use std::sync::Arc;

use callisto::connection_file::ConnectionFile;
use callisto::kernel;
use callisto::kernel::KernelOptions;
use callisto::wire::kernel_info_reply::KernelInfo;
use callisto::wire::language_info::LanguageInfo;

use crate::backend::EchoBackend;

fn kernel_info(language: &str) -> KernelInfo {
    KernelInfo {
        implementation: String::from("databricks"),
        implementation_version: String::from("2.0.0"),
        language_info: LanguageInfo {
            name: String::from(language),
            version: String::from("1.0"),
            mimetype: format!("text/x-{language}"),
            file_extension: String::from(".txt"),
            pygments_lexer: None,
            codemirror_mode: None,
            nbconvert_exporter: None,
        },
        banner: format!("Callisto echo kernel ({language})"),
    }
}

fn start_kernel(connection_file: ConnectionFile, language: &str) {
    let backend = Arc::new(EchoBackend::new());

    let handle = match kernel::connect(
        "echo",
        connection_file,
        kernel_info(language),
        backend,
        KernelOptions::default(),
    ) {
        Ok(handle) => handle,
        Err(err) => {
            log::error!("Couldn't connect to frontend: {err:?}");
            std::process::exit(1);
        },
    };

    log::info!("Kernel connected: {:?}", handle.connection_file());

    match handle.wait_for_shutdown() {
        Some(req) => log::info!("Shutting down (restart: {})", req.restart),
        None => log::warn!("Control thread exited without a shutdown request"),
    }
}

fn main() {
    // Initialize logging system; the env_logger lets you configure logging with
    // the RUST_LOG env var
    env_logger::init();

    // Get an iterator over all the command-line arguments
    let mut argv = std::env::args();

    // Skip the first "argument" as it's the path/name to this executable
    argv.next();

    let mut connection_file: Option<String> = None;
    let mut language = String::from("python");

    // Process remaining arguments
    while let Some(arg) = argv.next() {
        match arg.as_str() {
            "--connection_file" => {
                connection_file = argv.next();
                if connection_file.is_none() {
                    eprintln!(
                        "A connection file must be specified with the --connection_file argument."
                    );
                    return;
                }
            },
            "--language" => match argv.next() {
                Some(value) => language = value,
                None => {
                    eprintln!("A language must be specified with the --language argument.");
                    return;
                },
            },
            "--version" => {
                println!("Callisto echo {}", env!("CARGO_PKG_VERSION"));
                return;
            },
            other => {
                eprintln!("Argument '{}' unknown", other);
                return;
            },
        }
    }

    let Some(file) = connection_file else {
        println!("Usage: echo --connection_file /path/to/file [--language python]");
        return;
    };

    match ConnectionFile::from_file(&file) {
        Ok(connection) => {
            log::info!("Loaded connection information from frontend in {file}");
            start_kernel(connection, &language);
        },
        Err(err) => {
            eprintln!("Failed to load connection file: {err:?}");
        },
    }
}
