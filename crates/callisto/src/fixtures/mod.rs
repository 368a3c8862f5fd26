/*
 * mod.rs
 *
 * Copyright (C) 2026 Posit Software, PBC. All rights reserved.
 *
 */

pub mod dummy_frontend;
pub mod fake_backend;
