// SPDX-FileCopyrightText: © 2024 Claudio Cicconetti <c.cicconetti@iit.cnr.it>
// SPDX-License-Identifier: MIT

use resep_api::error::ResepError;
use resep_api::service::ServiceDescriptor;
use resep_api::service_profile::{ProfileKind, ServiceProfile};
use resep_api::typed_value::TypedValue;

use crate::atomic_service::AtomicService;

/// Liveness of the registered services at a given time.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LivenessSnapshot {
    /// Services that answered successfully within the window.
    pub alive: Vec<String>,
    pub stale: Vec<String>,
}

struct RegistryInner {
    services: std::collections::BTreeMap<String, AtomicService>,
    last_success: std::collections::HashMap<String, std::time::Instant>,
}

/// Process-wide set of the reachable services.
///
/// Cloning yields a handle to the same registry. The lock is only held
/// while reading or changing the entries, never during calls.
#[derive(Clone)]
pub struct ServiceRegistry {
    inner: std::sync::Arc<tokio::sync::Mutex<RegistryInner>>,
}

impl Default for ServiceRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl ServiceRegistry {
    pub fn new() -> Self {
        Self {
            inner: std::sync::Arc::new(tokio::sync::Mutex::new(RegistryInner {
                services: std::collections::BTreeMap::new(),
                last_success: std::collections::HashMap::new(),
            })),
        }
    }

    /// Register a service without profiles.
    pub async fn register(&self, descriptor: ServiceDescriptor) -> Result<String, ResepError> {
        self.register_service(AtomicService::new(descriptor)).await
    }

    /// Register a service, returning its registration identifier.
    pub async fn register_service(&self, service: AtomicService) -> Result<String, ResepError> {
        let mut service = service;
        let name = service.name().to_string();
        if name.is_empty() || name.contains(',') || name.contains(char::is_whitespace) {
            return Err(ResepError::invalid_configuration(format!("invalid service name '{}'", name)));
        }
        let descriptor = service.descriptor_mut();
        if descriptor.register_id.is_empty() {
            descriptor.register_id = uuid::Uuid::new_v4().to_string();
        }
        let register_id = descriptor.register_id.clone();

        let mut lck = self.inner.lock().await;
        if lck.services.contains_key(&name) {
            return Err(ResepError::DuplicateService(name));
        }
        log::info!("registered service {}", service.descriptor());
        lck.services.insert(name, service);
        Ok(register_id)
    }

    pub async fn unregister(&self, service_name: &str) -> Result<(), ResepError> {
        let mut lck = self.inner.lock().await;
        match lck.services.remove(service_name) {
            Some(_) => {
                lck.last_success.remove(service_name);
                log::info!("unregistered service {}", service_name);
                Ok(())
            }
            None => Err(ResepError::ServiceNotFound(service_name.to_string())),
        }
    }

    /// Names of all the services, sorted.
    pub async fn get_all_services(&self) -> Vec<String> {
        self.inner.lock().await.services.keys().cloned().collect()
    }

    /// Names of the atomic services, i.e., all but the root composite.
    pub async fn registered_services(&self) -> Vec<String> {
        self.get_all_services()
            .await
            .into_iter()
            .filter(|x| x != resep_api::ROOT_SERVICE)
            .collect()
    }

    /// Snapshot of a service: later changes to the registry do not affect it.
    pub async fn resolve(&self, service_name: &str) -> Result<AtomicService, ResepError> {
        match self.inner.lock().await.services.get(service_name) {
            Some(service) => Ok(service.clone()),
            None => Err(ResepError::ServiceNotFound(service_name.to_string())),
        }
    }

    /// Eligible services of type `service_type` exposing `operation`, sorted by name.
    pub async fn alternatives(&self, service_type: &str, operation: &str) -> Vec<String> {
        self.inner
            .lock()
            .await
            .services
            .values()
            .filter(|x| x.is_eligible() && x.descriptor().service_type == service_type && x.descriptor().has_operation(operation))
            .map(|x| x.name().to_string())
            .collect()
    }

    async fn modify<T, F>(&self, service_name: &str, change: F) -> Result<T, ResepError>
    where
        F: FnOnce(&mut AtomicService) -> Result<T, ResepError>,
    {
        match self.inner.lock().await.services.get_mut(service_name) {
            Some(service) => change(service),
            None => Err(ResepError::ServiceNotFound(service_name.to_string())),
        }
    }

    pub async fn set_eligible(&self, service_name: &str, eligible: bool) -> Result<(), ResepError> {
        self.modify(service_name, |service| {
            service.set_eligible(eligible);
            Ok(())
        })
        .await?;
        log::info!("service {} {}", service_name, if eligible { "eligible" } else { "not eligible" });
        Ok(())
    }

    pub async fn add_profile(&self, service_name: &str, profile: ServiceProfile, active: bool) -> Result<(), ResepError> {
        log::info!("service {}: adding {} (active {})", service_name, profile, active);
        self.modify(service_name, |service| service.add_profile(profile, active)).await
    }

    pub async fn remove_profile(&self, service_name: &str, kind: ProfileKind) -> Result<ServiceProfile, ResepError> {
        log::info!("service {}: removing {} profile", service_name, kind);
        self.modify(service_name, |service| service.remove_profile(kind)).await
    }

    /// Takes effect from the next call routed to the service.
    pub async fn set_profile_active(&self, service_name: &str, kind: ProfileKind, active: bool) -> Result<(), ResepError> {
        log::info!(
            "service {}: {} {} profile",
            service_name,
            if active { "activating" } else { "deactivating" },
            kind
        );
        self.modify(service_name, |service| service.set_profile_active(kind, active)).await
    }

    pub async fn set_profile_attribute(&self, service_name: &str, kind: ProfileKind, attribute: &str, text: &str) -> Result<(), ResepError> {
        log::info!("service {}: {} profile {} = {}", service_name, kind, attribute, text);
        self.modify(service_name, |service| service.set_profile_attribute(kind, attribute, text))
            .await
    }

    pub async fn set_custom_property(&self, service_name: &str, key: &str, value: TypedValue) -> Result<(), ResepError> {
        log::info!("service {}: property {} = {}", service_name, key, value);
        self.modify(service_name, |service| {
            service.set_custom_property(key, value);
            Ok(())
        })
        .await
    }

    /// Note that `service_name` answered successfully now.
    pub async fn record_success(&self, service_name: &str) {
        let mut lck = self.inner.lock().await;
        if lck.services.contains_key(service_name) {
            lck.last_success.insert(service_name.to_string(), std::time::Instant::now());
        }
    }

    pub async fn liveness(&self, window: std::time::Duration) -> LivenessSnapshot {
        let lck = self.inner.lock().await;
        let mut snapshot = LivenessSnapshot::default();
        for name in lck.services.keys().filter(|x| *x != resep_api::ROOT_SERVICE) {
            let alive = match lck.last_success.get(name) {
                Some(last) => last.elapsed() <= window,
                None => false,
            };
            match alive {
                true => snapshot.alive.push(name.clone()),
                false => snapshot.stale.push(name.clone()),
            }
        }
        snapshot
    }
}
