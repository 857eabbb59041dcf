// SPDX-FileCopyrightText: © 2024 Claudio Cicconetti <c.cicconetti@iit.cnr.it>
// SPDX-License-Identifier: MIT

pub mod atomic_service;
pub mod composite;
pub mod configuration;
pub mod liveness;
pub mod registry;
pub mod strategy;

use resep_api::service::{Operation, ServiceDescriptor};
use resep_api::service_profile::{ProfileKind, ServiceProfile};
use resep_api::typed_value::TypedValue;

#[derive(Debug, Clone, PartialEq, serde::Deserialize, serde::Serialize)]
pub struct ServiceSettings {
    pub service_name: String,
    pub service_type: String,
    pub endpoint: String,
    #[serde(default)]
    pub operations: Vec<Operation>,
    #[serde(default)]
    pub custom_properties: std::collections::BTreeMap<String, TypedValue>,
    /// Profiles attached to the service, active unless listed in `inactive_profiles`.
    #[serde(default)]
    pub profiles: Vec<ServiceProfile>,
    #[serde(default)]
    pub inactive_profiles: Vec<ProfileKind>,
}

impl ServiceSettings {
    pub fn to_service(&self) -> anyhow::Result<atomic_service::AtomicService> {
        let mut descriptor = ServiceDescriptor::new(&self.service_name, &self.service_type, &self.endpoint, self.operations.clone());
        descriptor.custom_properties = self.custom_properties.clone();
        let mut service = atomic_service::AtomicService::new(descriptor);
        for profile in &self.profiles {
            anyhow::ensure!(
                service.profile(profile.kind()).is_none(),
                "service {}: more than one {} profile",
                self.service_name,
                profile.kind()
            );
            service.add_profile(profile.clone(), !self.inactive_profiles.contains(&profile.kind()))?;
        }
        Ok(service)
    }
}

#[derive(Debug, Clone, PartialEq, serde::Deserialize, serde::Serialize)]
pub struct ConfigurationSettings {
    pub name: String,
    pub strategy: strategy::AdaptationStrategy,
    /// Services excluded from routing while the configuration is active.
    #[serde(default)]
    pub disabled_services: Vec<String>,
}

/// Register the services defined in the settings.
pub async fn populate(registry: &registry::ServiceRegistry, services: &[ServiceSettings]) -> anyhow::Result<()> {
    for settings in services {
        registry.register_service(settings.to_service()?).await?;
    }
    Ok(())
}

#[cfg(test)]
mod test {
    use super::*;

    #[derive(serde::Deserialize)]
    struct Holder {
        services: Vec<ServiceSettings>,
        configurations: Vec<ConfigurationSettings>,
    }

    const CONF: &str = r##"
[[services]]
service_name = "AlarmService1"
service_type = "AlarmService"
endpoint = "service.alarm1"
operations = [ { name = "triggerAlarm", parameters = ["patientId"] } ]
custom_properties = { tier = { type = "String", value = "gold" } }
profiles = [
    { kind = "Reliability", failure_rate = 0.1 },
    { kind = "Cost", cost = 4.5 },
]
inactive_profiles = ["Cost"]

[[services]]
service_name = "DrugService"
service_type = "DrugService"
endpoint = "service.drug"

[[configurations]]
name = "Retry"
strategy = { Retry = { max_attempts = 2 } }
disabled_services = ["AlarmService1"]
"##;

    #[tokio::test]
    async fn test_populate_from_settings() {
        let holder: Holder = toml::from_str(CONF).unwrap();
        assert_eq!(
            strategy::AdaptationStrategy::Retry { max_attempts: 2 },
            holder.configurations[0].strategy
        );

        let registry = registry::ServiceRegistry::new();
        populate(&registry, &holder.services).await.unwrap();
        assert_eq!(vec!["AlarmService1", "DrugService"], registry.registered_services().await);

        let alarm = registry.resolve("AlarmService1").await.unwrap();
        assert_eq!(vec![&ServiceProfile::Reliability { failure_rate: 0.1 }], alarm.active_profiles());
        assert!(!alarm.profile(ProfileKind::Cost).unwrap().active);
        assert_eq!(vec!["patientId".to_string()], alarm.descriptor().operation("triggerAlarm").unwrap().parameters);
        assert_eq!(
            Some(&TypedValue::Text("gold".to_string())),
            alarm.descriptor().custom_properties.get("tier")
        );

        // duplicate names and duplicate profile kinds are rejected
        assert!(populate(&registry, &holder.services[1..]).await.is_err());
        let mut settings = holder.services[1].clone();
        settings.service_name = "Other".to_string();
        settings.profiles = vec![ServiceProfile::Cost { cost: 1.0 }, ServiceProfile::Cost { cost: 2.0 }];
        assert!(settings.to_service().is_err());
        settings.profiles = vec![ServiceProfile::Reliability { failure_rate: 2.0 }];
        assert!(settings.to_service().is_err());
    }
}
