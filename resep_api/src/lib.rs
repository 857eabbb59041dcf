// SPDX-FileCopyrightText: © 2024 Claudio Cicconetti <c.cicconetti@iit.cnr.it>
// SPDX-License-Identifier: MIT

pub mod error;
pub mod records;
pub mod service;
pub mod service_profile;
pub mod typed_value;
pub mod util;

/// Name of the composite service that drives the workflow.
/// It is never listed among the registered atomic services.
pub const ROOT_SERVICE: &str = "TeleAssistanceService";

/// Service name used in the per-round aggregate rows of the results file.
pub const AGGREGATE_SERVICE: &str = "AssistanceService";
