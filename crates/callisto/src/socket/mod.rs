/*
 * mod.rs
 *
 * Copyright (C) 2026 Posit Software, PBC. All rights reserved.
 *
 */

pub mod control;
pub mod heartbeat;
pub mod iopub;
pub mod shell;
pub mod socket;
pub mod stdin;
