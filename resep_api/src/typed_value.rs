// SPDX-FileCopyrightText: © 2024 Claudio Cicconetti <c.cicconetti@iit.cnr.it>
// SPDX-License-Identifier: MIT

use crate::error::ResepError;

/// Typed literal used as input profile value, service attribute,
/// and custom descriptor property.
#[derive(Debug, Clone, PartialEq, serde::Deserialize, serde::Serialize)]
#[serde(tag = "type", content = "value")]
pub enum TypedValue {
    Boolean(bool),
    Short(i16),
    Integer(i32),
    Long(i64),
    Float(f32),
    Double(f64),
    #[serde(rename = "String")]
    Text(String),
}

impl TypedValue {
    /// Parse `text` as a value of the type identified by `type_tag`.
    /// Unknown type tags are treated as strings.
    pub fn parse(type_tag: &str, text: &str) -> Result<Self, ResepError> {
        let trimmed = text.trim();
        let invalid = |_| ResepError::parse(type_tag, format!("invalid literal '{}'", text));
        Ok(match type_tag {
            "Boolean" => match trimmed.to_ascii_lowercase().as_str() {
                "true" => Self::Boolean(true),
                "false" => Self::Boolean(false),
                _ => return Err(ResepError::parse(type_tag, format!("invalid literal '{}'", text))),
            },
            "Short" => Self::Short(trimmed.parse::<i16>().map_err(invalid)?),
            "Integer" => Self::Integer(trimmed.parse::<i32>().map_err(invalid)?),
            "Long" => Self::Long(trimmed.parse::<i64>().map_err(invalid)?),
            "Float" => Self::Float(trimmed.parse::<f32>().map_err(|_| ResepError::parse(type_tag, format!("invalid literal '{}'", text)))?),
            "Double" => Self::Double(trimmed.parse::<f64>().map_err(|_| ResepError::parse(type_tag, format!("invalid literal '{}'", text)))?),
            _ => Self::Text(text.to_string()),
        })
    }

    /// Parse `text` as a value of the same type as `self`.
    pub fn parse_like(&self, text: &str) -> Result<Self, ResepError> {
        Self::parse(self.type_tag(), text)
    }

    pub fn type_tag(&self) -> &'static str {
        match self {
            Self::Boolean(_) => "Boolean",
            Self::Short(_) => "Short",
            Self::Integer(_) => "Integer",
            Self::Long(_) => "Long",
            Self::Float(_) => "Float",
            Self::Double(_) => "Double",
            Self::Text(_) => "String",
        }
    }

    /// Numeric view of the value, if any.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Short(val) => Some(*val as f64),
            Self::Integer(val) => Some(*val as f64),
            Self::Long(val) => Some(*val as f64),
            Self::Float(val) => Some(*val as f64),
            Self::Double(val) => Some(*val),
            Self::Boolean(_) | Self::Text(_) => None,
        }
    }
}

impl std::fmt::Display for TypedValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Boolean(val) => write!(f, "{}", val),
            Self::Short(val) => write!(f, "{}", val),
            Self::Integer(val) => write!(f, "{}", val),
            Self::Long(val) => write!(f, "{}", val),
            Self::Float(val) => write!(f, "{}", val),
            Self::Double(val) => write!(f, "{}", val),
            Self::Text(val) => write!(f, "{}", val),
        }
    }
}
