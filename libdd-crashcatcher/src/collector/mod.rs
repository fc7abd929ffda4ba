// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0
#![cfg(unix)]
mod alt_stack;
mod api;
mod crash_handler;
mod fault_state;
mod rendezvous;
mod report_worker;
mod signal_handler_manager;
mod signal_set;

pub use api::*;
pub use crash_handler::fault_state;
pub use fault_state::FaultState;
pub use rendezvous::HandOff;
pub use signal_handler_manager::ChainTarget;
pub use signal_set::{default_signals, is_concerned, ConcernedSignal};
