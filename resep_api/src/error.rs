// SPDX-FileCopyrightText: © 2024 Claudio Cicconetti <c.cicconetti@iit.cnr.it>
// SPDX-License-Identifier: MIT

use thiserror::Error;

/// Errors of the service testbed.
///
/// A lost message is not an error: it is reported as an outcome of the call.
#[derive(Debug, Error)]
pub enum ResepError {
    /// Malformed workflow, input profile, or literal.
    #[error("parse error in {source_name}: {reason}")]
    Parse { source_name: String, reason: String },

    #[error("service not found: {0}")]
    ServiceNotFound(String),

    /// The service is registered but excluded by the active configuration.
    #[error("service not eligible: {0}")]
    ServiceIneligible(String),

    #[error("operation {operation} not exposed by service {service}")]
    OperationNotFound { service: String, operation: String },

    #[error("service already registered: {0}")]
    DuplicateService(String),

    #[error("I/O error on {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// Rejected configuration change, prior values remain in effect.
    #[error("invalid configuration: {0}")]
    InvalidConfiguration(String),

    #[error("unknown attribute {attribute} in {owner}")]
    UnknownAttribute { owner: String, attribute: String },

    #[error("unknown variable: {0}")]
    UnknownVariable(String),
}

impl ResepError {
    pub fn parse(source_name: &str, reason: impl Into<String>) -> Self {
        Self::Parse {
            source_name: source_name.to_string(),
            reason: reason.into(),
        }
    }

    pub fn io(path: &str, source: std::io::Error) -> Self {
        Self::Io {
            path: path.to_string(),
            source,
        }
    }

    pub fn invalid_configuration(reason: impl Into<String>) -> Self {
        Self::InvalidConfiguration(reason.into())
    }

    /// Per-call errors are folded into the invocation outcome, the others abort.
    pub fn is_call_failure(&self) -> bool {
        matches!(
            self,
            Self::ServiceNotFound(_) | Self::ServiceIneligible(_) | Self::OperationNotFound { .. }
        )
    }
}
