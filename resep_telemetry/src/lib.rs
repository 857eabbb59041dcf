// SPDX-FileCopyrightText: © 2024 Claudio Cicconetti <c.cicconetti@iit.cnr.it>
// SPDX-License-Identifier: MIT

pub mod log_filter;
pub mod metrics_sink;
pub mod report;

pub use metrics_sink::{export, read_all, read_log, LogFile, MetricsSink, ResultsFile};
