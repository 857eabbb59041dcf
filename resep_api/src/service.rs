// SPDX-FileCopyrightText: © 2024 Claudio Cicconetti <c.cicconetti@iit.cnr.it>
// SPDX-License-Identifier: MIT

use crate::typed_value::TypedValue;

/// Operation exposed by a service.
#[derive(Debug, Clone, PartialEq, serde::Deserialize, serde::Serialize)]
pub struct Operation {
    pub name: String,
    /// Names of the input parameters, bound from the input profile variables
    /// with the same name.
    #[serde(default)]
    pub parameters: Vec<String>,
}

impl Operation {
    pub fn new(name: &str, parameters: &[&str]) -> Self {
        Self {
            name: name.to_string(),
            parameters: parameters.iter().map(|x| x.to_string()).collect(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, serde::Deserialize, serde::Serialize)]
pub struct ServiceDescriptor {
    pub service_name: String,
    pub service_type: String,
    pub endpoint: String,
    /// Assigned by the registry when empty.
    #[serde(default)]
    pub register_id: String,
    #[serde(default)]
    pub operations: Vec<Operation>,
    #[serde(default)]
    pub custom_properties: std::collections::BTreeMap<String, TypedValue>,
}

impl ServiceDescriptor {
    pub fn new(service_name: &str, service_type: &str, endpoint: &str, operations: Vec<Operation>) -> Self {
        Self {
            service_name: service_name.to_string(),
            service_type: service_type.to_string(),
            endpoint: endpoint.to_string(),
            register_id: String::default(),
            operations,
            custom_properties: std::collections::BTreeMap::new(),
        }
    }

    pub fn operation(&self, name: &str) -> Option<&Operation> {
        self.operations.iter().find(|x| x.name == name)
    }

    pub fn has_operation(&self, name: &str) -> bool {
        self.operation(name).is_some()
    }
}

impl std::fmt::Display for ServiceDescriptor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} (type {}, endpoint {}, id {}), operations [{}]",
            self.service_name,
            self.service_type,
            self.endpoint,
            self.register_id,
            self.operations.iter().map(|x| x.name.clone()).collect::<Vec<String>>().join(",")
        )
    }
}
