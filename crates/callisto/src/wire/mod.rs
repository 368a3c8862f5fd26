/*
 * mod.rs
 *
 * Copyright (C) 2026 Posit Software, PBC. All rights reserved.
 *
 */

pub mod comm_info_reply;
pub mod comm_info_request;
pub mod comm_msg;
pub mod display_data;
pub mod exception;
pub mod execute_reply;
pub mod execute_reply_exception;
pub mod execute_request;
pub mod header;
pub mod interrupt_reply;
pub mod interrupt_request;
pub mod jupyter_message;
pub mod kernel_info_reply;
pub mod kernel_info_request;
pub mod language_info;
pub mod shutdown_reply;
pub mod shutdown_request;
pub mod signature;
pub mod status;
pub mod stream;
pub mod subscription_message;
pub mod wire_message;
