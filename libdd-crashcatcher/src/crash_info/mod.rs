// Copyright 2024-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

mod fault_detail;
mod sig_info;

pub use fault_detail::{FaultDetail, ThreadIdentity};
pub use sig_info::{carries_si_code, signal_mnemonic, translate_si_code, SiCodes};
