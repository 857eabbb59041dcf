// SPDX-FileCopyrightText: © 2024 Claudio Cicconetti <c.cicconetti@iit.cnr.it>
// SPDX-License-Identifier: MIT

use resep_api::error::ResepError;
use resep_api::typed_value::TypedValue;

use crate::input_profile::InputProfile;

/// Draws the inputs of a run from its input profile.
pub struct InputProfileSampler {
    profile: InputProfile,
    rng: rand_pcg::Pcg64,
}

impl InputProfileSampler {
    pub fn new(profile: InputProfile, rng: rand_pcg::Pcg64) -> Self {
        Self { profile, rng }
    }

    pub fn profile(&self) -> &InputProfile {
        &self.profile
    }

    pub fn sample(&mut self, variable_name: &str) -> Result<TypedValue, ResepError> {
        match self.profile.variable(variable_name) {
            Some(variable) => Ok(variable.sample(&mut self.rng).clone()),
            None => Err(ResepError::UnknownVariable(variable_name.to_string())),
        }
    }

    /// Sample the variables among `names` defined in the profile, skipping the others.
    pub fn bindings(&mut self, names: &[String]) -> std::collections::BTreeMap<String, TypedValue> {
        let mut bindings = std::collections::BTreeMap::new();
        for name in names {
            if let Ok(value) = self.sample(name) {
                bindings.insert(name.clone(), value);
            }
        }
        bindings
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::input_profile::{InputProfileValue, InputProfileVariable};
    use rand::SeedableRng;

    fn profile() -> InputProfile {
        let mut profile = InputProfile::new(5, "ReliabilityQoS");
        profile.add_variable(
            InputProfileVariable::new(
                "urgent",
                vec![
                    InputProfileValue {
                        data: TypedValue::Boolean(true),
                        ratio: 1.0,
                    },
                    InputProfileValue {
                        data: TypedValue::Boolean(false),
                        ratio: 1.0,
                    },
                ],
            )
            .unwrap(),
        );
        profile
    }

    #[test]
    fn test_input_profile_sampler_deterministic() {
        let mut first = InputProfileSampler::new(profile(), rand_pcg::Pcg64::seed_from_u64(7));
        let mut second = InputProfileSampler::new(profile(), rand_pcg::Pcg64::seed_from_u64(7));
        for _ in 0..100 {
            assert_eq!(first.sample("urgent").unwrap(), second.sample("urgent").unwrap());
        }
        assert!(matches!(first.sample("missing"), Err(ResepError::UnknownVariable(_))));
        assert_eq!(5, first.profile().max_steps);
    }

    #[test]
    fn test_input_profile_sampler_bindings() {
        let mut sampler = InputProfileSampler::new(profile(), rand_pcg::Pcg64::seed_from_u64(7));
        let bindings = sampler.bindings(&["urgent".to_string(), "missing".to_string()]);
        assert_eq!(1, bindings.len());
        assert!(matches!(bindings["urgent"], TypedValue::Boolean(_)));
    }
}
