// SPDX-FileCopyrightText: © 2024 Claudio Cicconetti <c.cicconetti@iit.cnr.it>
// SPDX-License-Identifier: MIT

use resep_api::error::ResepError;
use resep_api::typed_value::TypedValue;

/// Candidate value of a variable with its relative weight.
#[derive(Debug, Clone, PartialEq)]
pub struct InputProfileValue {
    pub data: TypedValue,
    pub ratio: f64,
}

/// Weighted catalog of the values a workflow variable can take.
///
/// Invariant: ratios are non-negative and their sum is positive.
#[derive(Debug, Clone, PartialEq)]
pub struct InputProfileVariable {
    name: String,
    values: Vec<InputProfileValue>,
}

impl InputProfileVariable {
    pub fn new(name: &str, values: Vec<InputProfileValue>) -> Result<Self, ResepError> {
        let variable = Self {
            name: name.to_string(),
            values,
        };
        variable.validate()?;
        Ok(variable)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn values(&self) -> &[InputProfileValue] {
        &self.values
    }

    pub fn total_ratio(&self) -> f64 {
        self.values.iter().map(|x| x.ratio).sum()
    }

    fn validate(&self) -> Result<(), ResepError> {
        for value in &self.values {
            if !value.ratio.is_finite() || value.ratio < 0.0 {
                return Err(ResepError::parse(
                    &self.name,
                    format!("invalid ratio {} for value {}", value.ratio, value.data),
                ));
            }
        }
        let total = self.total_ratio();
        if total <= 0.0 || !total.is_finite() {
            return Err(ResepError::parse(&self.name, format!("sum of ratios must be positive, got {}", total)));
        }
        Ok(())
    }

    /// Apply `change` to a copy and keep it only if the invariant still holds.
    fn try_update<F>(&mut self, change: F) -> Result<(), ResepError>
    where
        F: FnOnce(&mut Vec<InputProfileValue>) -> Result<(), ResepError>,
    {
        let mut values = self.values.clone();
        change(&mut values)?;
        let candidate = Self {
            name: self.name.clone(),
            values,
        };
        candidate.validate()?;
        *self = candidate;
        Ok(())
    }

    fn index_check(values: &[InputProfileValue], name: &str, index: usize) -> Result<(), ResepError> {
        if index >= values.len() {
            return Err(ResepError::UnknownAttribute {
                owner: name.to_string(),
                attribute: format!("value {}", index),
            });
        }
        Ok(())
    }

    /// Append a value parsed with the type of the existing values.
    pub fn add_value(&mut self, text: &str, ratio: f64) -> Result<(), ResepError> {
        let data = self.values[0].data.parse_like(text)?;
        self.add_typed_value(data, ratio)
    }

    pub fn add_typed_value(&mut self, data: TypedValue, ratio: f64) -> Result<(), ResepError> {
        let expected = self.values[0].data.type_tag();
        if data.type_tag() != expected {
            return Err(ResepError::parse(
                &self.name,
                format!("value {} is {}, expected {}", data, data.type_tag(), expected),
            ));
        }
        self.try_update(|values| {
            values.push(InputProfileValue { data, ratio });
            Ok(())
        })
    }

    pub fn set_value_data(&mut self, index: usize, text: &str) -> Result<(), ResepError> {
        let name = self.name.clone();
        self.try_update(|values| {
            Self::index_check(values, &name, index)?;
            values[index].data = values[index].data.parse_like(text)?;
            Ok(())
        })
    }

    pub fn set_value_ratio(&mut self, index: usize, ratio: f64) -> Result<(), ResepError> {
        let name = self.name.clone();
        self.try_update(|values| {
            Self::index_check(values, &name, index)?;
            values[index].ratio = ratio;
            Ok(())
        })
    }

    /// Weighted draw: pick r uniformly in [0, total) and return the first
    /// value whose cumulative ratio exceeds r.
    pub fn sample<R: rand::Rng + ?Sized>(&self, rng: &mut R) -> &TypedValue {
        let r = rng.gen_range(0.0..self.total_ratio());
        let mut cumulative = 0.0;
        for value in &self.values {
            cumulative += value.ratio;
            if cumulative > r {
                return &value.data;
            }
        }
        // rounding: r can reach the total only through accumulated error
        let last = self.values.iter().rev().find(|x| x.ratio > 0.0).unwrap_or(&self.values[self.values.len() - 1]);
        &last.data
    }
}

/// Step budget, QoS requirement and input catalog of a run.
#[derive(Debug, Clone, PartialEq)]
pub struct InputProfile {
    pub max_steps: u64,
    pub qos_requirement: String,
    variables: Vec<InputProfileVariable>,
}

impl InputProfile {
    pub fn new(max_steps: u64, qos_requirement: &str) -> Self {
        Self {
            max_steps,
            qos_requirement: qos_requirement.to_string(),
            variables: vec![],
        }
    }

    /// Add a variable, replacing any previous one with the same name.
    pub fn add_variable(&mut self, variable: InputProfileVariable) {
        match self.variables.iter_mut().find(|x| x.name == variable.name) {
            Some(existing) => *existing = variable,
            None => self.variables.push(variable),
        }
    }

    pub fn set_max_steps(&mut self, max_steps: u64) {
        log::debug!("max steps changed from {} to {}", self.max_steps, max_steps);
        self.max_steps = max_steps;
    }

    pub fn variable(&self, name: &str) -> Option<&InputProfileVariable> {
        self.variables.iter().find(|x| x.name == name)
    }

    pub fn variable_mut(&mut self, name: &str) -> Result<&mut InputProfileVariable, ResepError> {
        self.variables
            .iter_mut()
            .find(|x| x.name == name)
            .ok_or_else(|| ResepError::UnknownVariable(name.to_string()))
    }

    pub fn variables(&self) -> &[InputProfileVariable] {
        &self.variables
    }

    pub fn variable_names(&self) -> Vec<String> {
        self.variables.iter().map(|x| x.name.clone()).collect()
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use rand::SeedableRng;

    fn value(data: &str, ratio: f64) -> InputProfileValue {
        InputProfileValue {
            data: TypedValue::Text(data.to_string()),
            ratio,
        }
    }

    #[test]
    fn test_input_profile_variable_invariant() {
        assert!(InputProfileVariable::new("v", vec![]).is_err());
        assert!(InputProfileVariable::new("v", vec![value("a", 0.0), value("b", 0.0)]).is_err());
        assert!(InputProfileVariable::new("v", vec![value("a", -1.0), value("b", 2.0)]).is_err());
        assert!(InputProfileVariable::new("v", vec![value("a", f64::NAN)]).is_err());
        let variable = InputProfileVariable::new("v", vec![value("a", 0.0), value("b", 3.0)]).unwrap();
        assert_eq!(3.0, variable.total_ratio());
    }

    #[test]
    fn test_input_profile_variable_editing() {
        let mut variable = InputProfileVariable::new(
            "passengers",
            vec![InputProfileValue {
                data: TypedValue::Integer(1),
                ratio: 1.0,
            }],
        )
        .unwrap();

        variable.add_value("4", 3.0).unwrap();
        assert!(variable.add_value("four", 1.0).is_err());
        assert!(variable.add_value("5", -1.0).is_err());
        assert!(variable.add_typed_value(TypedValue::Long(5), 1.0).is_err());
        assert_eq!(2, variable.values().len());
        assert_eq!(TypedValue::Integer(4), variable.values()[1].data);

        variable.set_value_data(0, "2").unwrap();
        assert!(variable.set_value_data(0, "x").is_err());
        assert!(variable.set_value_data(9, "2").is_err());
        assert_eq!(TypedValue::Integer(2), variable.values()[0].data);

        variable.set_value_ratio(0, 0.0).unwrap();
        // all ratios zero would break the invariant
        assert!(variable.set_value_ratio(1, 0.0).is_err());
        assert_eq!(3.0, variable.total_ratio());
    }

    #[test]
    fn test_input_profile_variable_sample_distribution() {
        let variable = InputProfileVariable::new("v", vec![value("a", 1.0), value("b", 0.0), value("c", 3.0), value("d", 6.0)]).unwrap();
        let mut rng = rand_pcg::Pcg64::seed_from_u64(42);
        let mut counts = std::collections::HashMap::new();
        let draws = 100000;
        for _ in 0..draws {
            *counts.entry(variable.sample(&mut rng).to_string()).or_insert(0_u64) += 1;
        }
        assert!(!counts.contains_key("b"));
        for (name, expected) in [("a", 0.1), ("c", 0.3), ("d", 0.6)] {
            let observed = counts[name] as f64 / draws as f64;
            assert!((observed - expected).abs() < 0.01, "{}: observed {} expected {}", name, observed, expected);
        }
    }

    #[test]
    fn test_input_profile_variables() {
        let mut profile = InputProfile::new(10, "CostQoS");
        profile.add_variable(InputProfileVariable::new("a", vec![value("x", 1.0)]).unwrap());
        profile.add_variable(InputProfileVariable::new("b", vec![value("y", 1.0)]).unwrap());
        profile.add_variable(InputProfileVariable::new("a", vec![value("z", 1.0)]).unwrap());
        assert_eq!(vec!["a".to_string(), "b".to_string()], profile.variable_names());
        assert_eq!(TypedValue::Text("z".to_string()), profile.variable("a").unwrap().values()[0].data);
        assert!(profile.variable("c").is_none());
        assert!(matches!(profile.variable_mut("c"), Err(ResepError::UnknownVariable(_))));

        profile.set_max_steps(3);
        assert_eq!(3, profile.max_steps);
    }
}
