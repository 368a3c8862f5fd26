/*
 * mod.rs
 *
 * Copyright (C) 2026 Posit Software, PBC. All rights reserved.
 *
 */

pub mod backend;
pub mod execution;
