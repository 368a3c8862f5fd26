/*
 * mod.rs
 *
 * Copyright (C) 2026 Posit Software, PBC. All rights reserved.
 *
 */

pub mod actions_comm;
pub mod comm_registry;
pub mod config_comm;
