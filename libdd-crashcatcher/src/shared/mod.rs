// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Configuration and constants shared between the fault path and the
//! reporting worker.

pub(crate) mod configuration;
pub mod constants;
pub(crate) mod errors;
