// SPDX-FileCopyrightText: © 2024 Claudio Cicconetti <c.cicconetti@iit.cnr.it>
// SPDX-License-Identifier: MIT

use crate::error::ResepError;
use crate::typed_value::TypedValue;

/// Kind of behavior model that can be attached to a service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, serde::Deserialize, serde::Serialize)]
pub enum ProfileKind {
    Reliability,
    Cost,
    Performance,
}

impl ProfileKind {
    pub fn all() -> [ProfileKind; 3] {
        [ProfileKind::Reliability, ProfileKind::Cost, ProfileKind::Performance]
    }

    pub fn from_string(val: &str) -> Option<Self> {
        match val.to_ascii_lowercase().as_str() {
            "reliability" => Some(ProfileKind::Reliability),
            "cost" => Some(ProfileKind::Cost),
            "performance" => Some(ProfileKind::Performance),
            _ => None,
        }
    }

    /// Profile of this kind with neutral attributes: never fails,
    /// costs nothing, adds no latency.
    pub fn default_profile(&self) -> ServiceProfile {
        match self {
            ProfileKind::Reliability => ServiceProfile::Reliability { failure_rate: 0.0 },
            ProfileKind::Cost => ServiceProfile::Cost { cost: 0.0 },
            ProfileKind::Performance => ServiceProfile::Performance {
                min_latency_ms: 0,
                max_latency_ms: 0,
            },
        }
    }
}

impl std::fmt::Display for ProfileKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ProfileKind::Reliability => write!(f, "Reliability"),
            ProfileKind::Cost => write!(f, "Cost"),
            ProfileKind::Performance => write!(f, "Performance"),
        }
    }
}

/// Named, editable attribute of a service profile.
#[derive(Debug, Clone, PartialEq)]
pub struct ProfileAttribute {
    pub name: &'static str,
    pub value: TypedValue,
}

impl ProfileAttribute {
    pub fn type_tag(&self) -> &'static str {
        self.value.type_tag()
    }
}

/// Behavior model that determines the synthetic outcome of a service call.
#[derive(Debug, Clone, PartialEq, serde::Deserialize, serde::Serialize)]
#[serde(tag = "kind")]
pub enum ServiceProfile {
    /// The call fails with probability `failure_rate`.
    Reliability { failure_rate: f64 },
    /// Each call that reaches the service is charged `cost`.
    Cost { cost: f64 },
    /// The service takes a latency uniformly distributed in
    /// [`min_latency_ms`, `max_latency_ms`] to answer.
    Performance { min_latency_ms: u64, max_latency_ms: u64 },
}

impl ServiceProfile {
    pub fn kind(&self) -> ProfileKind {
        match self {
            ServiceProfile::Reliability { .. } => ProfileKind::Reliability,
            ServiceProfile::Cost { .. } => ProfileKind::Cost,
            ServiceProfile::Performance { .. } => ProfileKind::Performance,
        }
    }

    pub fn list_attributes(&self) -> Vec<ProfileAttribute> {
        match self {
            ServiceProfile::Reliability { failure_rate } => vec![ProfileAttribute {
                name: "failure_rate",
                value: TypedValue::Double(*failure_rate),
            }],
            ServiceProfile::Cost { cost } => vec![ProfileAttribute {
                name: "cost",
                value: TypedValue::Double(*cost),
            }],
            ServiceProfile::Performance {
                min_latency_ms,
                max_latency_ms,
            } => vec![
                ProfileAttribute {
                    name: "min_latency_ms",
                    value: TypedValue::Long(*min_latency_ms as i64),
                },
                ProfileAttribute {
                    name: "max_latency_ms",
                    value: TypedValue::Long(*max_latency_ms as i64),
                },
            ],
        }
    }

    /// Set the attribute `name` from its textual representation.
    /// The profile is left untouched if the value is rejected.
    pub fn set_attribute(&mut self, name: &str, text: &str) -> Result<(), ResepError> {
        let current = match self.list_attributes().into_iter().find(|x| x.name == name) {
            Some(attribute) => attribute.value,
            None => {
                return Err(ResepError::UnknownAttribute {
                    owner: self.kind().to_string(),
                    attribute: name.to_string(),
                })
            }
        };
        let value = current.parse_like(text)?;

        let mut candidate = self.clone();
        match (&mut candidate, value) {
            (ServiceProfile::Reliability { failure_rate }, TypedValue::Double(val)) => *failure_rate = val,
            (ServiceProfile::Cost { cost }, TypedValue::Double(val)) => *cost = val,
            (ServiceProfile::Performance { min_latency_ms, .. }, TypedValue::Long(val)) if name == "min_latency_ms" => {
                *min_latency_ms = Self::non_negative_latency(val)?
            }
            (ServiceProfile::Performance { max_latency_ms, .. }, TypedValue::Long(val)) => *max_latency_ms = Self::non_negative_latency(val)?,
            _ => {
                return Err(ResepError::UnknownAttribute {
                    owner: self.kind().to_string(),
                    attribute: name.to_string(),
                })
            }
        }
        candidate.validate()?;
        *self = candidate;
        Ok(())
    }

    pub fn validate(&self) -> Result<(), ResepError> {
        match self {
            ServiceProfile::Reliability { failure_rate } => {
                if !(0.0..=1.0).contains(failure_rate) {
                    return Err(ResepError::invalid_configuration(format!(
                        "failure rate must be in [0,1], got {}",
                        failure_rate
                    )));
                }
            }
            ServiceProfile::Cost { cost } => {
                if !cost.is_finite() || *cost < 0.0 {
                    return Err(ResepError::invalid_configuration(format!("cost must be non-negative, got {}", cost)));
                }
            }
            ServiceProfile::Performance {
                min_latency_ms,
                max_latency_ms,
            } => {
                if min_latency_ms > max_latency_ms {
                    return Err(ResepError::invalid_configuration(format!(
                        "min latency {} ms greater than max latency {} ms",
                        min_latency_ms, max_latency_ms
                    )));
                }
            }
        }
        Ok(())
    }

    fn non_negative_latency(val: i64) -> Result<u64, ResepError> {
        u64::try_from(val).map_err(|_| ResepError::invalid_configuration(format!("negative latency {} ms", val)))
    }
}

impl std::fmt::Display for ServiceProfile {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}Profile[{}]",
            self.kind(),
            self.list_attributes()
                .iter()
                .map(|x| format!("{}={}", x.name, x.value))
                .collect::<Vec<String>>()
                .join(",")
        )
    }
}
