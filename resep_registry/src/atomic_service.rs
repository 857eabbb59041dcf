// SPDX-FileCopyrightText: © 2024 Claudio Cicconetti <c.cicconetti@iit.cnr.it>
// SPDX-License-Identifier: MIT

use rand_distr::Distribution;
use resep_api::error::ResepError;
use resep_api::service::ServiceDescriptor;
use resep_api::service_profile::{ProfileAttribute, ProfileKind, ServiceProfile};
use resep_api::typed_value::TypedValue;

#[derive(Debug, Clone, PartialEq)]
pub struct ProfileSlot {
    pub profile: ServiceProfile,
    /// Only active profiles influence the outcome of calls.
    pub active: bool,
}

/// Synthetic outcome of an operation, as determined by the active profiles.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ServiceOutcome {
    pub success: bool,
    pub cost: f64,
    /// Nominal time taken by the service to answer.
    pub latency_ms: u64,
}

/// Simulated service with at most one profile per kind.
#[derive(Debug, Clone, PartialEq)]
pub struct AtomicService {
    descriptor: ServiceDescriptor,
    profiles: std::collections::BTreeMap<ProfileKind, ProfileSlot>,
    eligible: bool,
}

impl AtomicService {
    pub fn new(descriptor: ServiceDescriptor) -> Self {
        Self {
            descriptor,
            profiles: std::collections::BTreeMap::new(),
            eligible: true,
        }
    }

    pub fn name(&self) -> &str {
        &self.descriptor.service_name
    }

    pub fn descriptor(&self) -> &ServiceDescriptor {
        &self.descriptor
    }

    pub(crate) fn descriptor_mut(&mut self) -> &mut ServiceDescriptor {
        &mut self.descriptor
    }

    pub fn is_eligible(&self) -> bool {
        self.eligible
    }

    pub(crate) fn set_eligible(&mut self, eligible: bool) {
        self.eligible = eligible;
    }

    pub fn profiles(&self) -> impl Iterator<Item = &ProfileSlot> {
        self.profiles.values()
    }

    pub fn profile(&self, kind: ProfileKind) -> Option<&ProfileSlot> {
        self.profiles.get(&kind)
    }

    pub fn active_profiles(&self) -> Vec<&ServiceProfile> {
        self.profiles.values().filter(|x| x.active).map(|x| &x.profile).collect()
    }

    /// Profile kinds that are not attached to this service yet.
    pub fn available_kinds(&self) -> Vec<ProfileKind> {
        ProfileKind::all().into_iter().filter(|x| !self.profiles.contains_key(x)).collect()
    }

    /// Attach a profile, replacing the one of the same kind, if any.
    pub fn add_profile(&mut self, profile: ServiceProfile, active: bool) -> Result<(), ResepError> {
        profile.validate()?;
        self.profiles.insert(profile.kind(), ProfileSlot { profile, active });
        Ok(())
    }

    pub fn remove_profile(&mut self, kind: ProfileKind) -> Result<ServiceProfile, ResepError> {
        match self.profiles.remove(&kind) {
            Some(slot) => Ok(slot.profile),
            None => Err(self.unknown_profile(kind)),
        }
    }

    pub fn set_profile_active(&mut self, kind: ProfileKind, active: bool) -> Result<(), ResepError> {
        let unknown = self.unknown_profile(kind);
        match self.profiles.get_mut(&kind) {
            Some(slot) => {
                slot.active = active;
                Ok(())
            }
            None => Err(unknown),
        }
    }

    pub fn profile_attributes(&self, kind: ProfileKind) -> Result<Vec<ProfileAttribute>, ResepError> {
        match self.profiles.get(&kind) {
            Some(slot) => Ok(slot.profile.list_attributes()),
            None => Err(self.unknown_profile(kind)),
        }
    }

    pub fn set_profile_attribute(&mut self, kind: ProfileKind, name: &str, text: &str) -> Result<(), ResepError> {
        let unknown = self.unknown_profile(kind);
        match self.profiles.get_mut(&kind) {
            Some(slot) => slot.profile.set_attribute(name, text),
            None => Err(unknown),
        }
    }

    /// Add or replace a custom property of the descriptor.
    pub fn set_custom_property(&mut self, key: &str, value: TypedValue) {
        self.descriptor.custom_properties.insert(key.to_string(), value);
    }

    fn unknown_profile(&self, kind: ProfileKind) -> ResepError {
        ResepError::UnknownAttribute {
            owner: self.name().to_string(),
            attribute: format!("{} profile", kind),
        }
    }

    /// Draw the outcome of a call according to the active profiles.
    /// Without profiles the call succeeds immediately at no cost.
    pub fn invoke<R: rand::Rng + ?Sized>(&self, rng: &mut R) -> ServiceOutcome {
        let mut outcome = ServiceOutcome {
            success: true,
            cost: 0.0,
            latency_ms: 0,
        };
        for profile in self.active_profiles() {
            match profile {
                ServiceProfile::Reliability { failure_rate } => outcome.success = rng.gen::<f64>() >= *failure_rate,
                ServiceProfile::Cost { cost } => outcome.cost = *cost,
                ServiceProfile::Performance {
                    min_latency_ms,
                    max_latency_ms,
                } => outcome.latency_ms = rand_distr::Uniform::new_inclusive(*min_latency_ms, *max_latency_ms).sample(rng),
            }
        }
        outcome
    }
}
