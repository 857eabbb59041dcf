// SPDX-FileCopyrightText: © 2024 Claudio Cicconetti <c.cicconetti@iit.cnr.it>
// SPDX-License-Identifier: MIT

use resep_api::error::ResepError;

use crate::composite::CompositeService;
use crate::strategy::AdaptationStrategy;
use crate::ConfigurationSettings;

/// Adaptation strategy that can be installed on and removed from the
/// composite service.
#[async_trait::async_trait]
pub trait Configuration: Send + Sync {
    fn name(&self) -> &str;
    async fn set_configuration(&mut self, composite: &CompositeService) -> anyhow::Result<()>;
    async fn remove_configuration(&mut self, composite: &CompositeService) -> anyhow::Result<()>;
}

/// Configuration that selects an adaptation strategy and excludes a set of
/// services from routing while active.
pub struct StrategyConfiguration {
    settings: ConfigurationSettings,
}

impl StrategyConfiguration {
    pub fn new(settings: ConfigurationSettings) -> Self {
        Self { settings }
    }

    async fn set_eligibility(&self, composite: &CompositeService, eligible: bool) {
        for service_name in &self.settings.disabled_services {
            if let Err(err) = composite.registry().set_eligible(service_name, eligible).await {
                log::warn!("configuration {}: {}", self.settings.name, err);
            }
        }
    }
}

#[async_trait::async_trait]
impl Configuration for StrategyConfiguration {
    fn name(&self) -> &str {
        &self.settings.name
    }

    async fn set_configuration(&mut self, composite: &CompositeService) -> anyhow::Result<()> {
        self.set_eligibility(composite, false).await;
        composite.set_strategy(self.settings.strategy);
        Ok(())
    }

    async fn remove_configuration(&mut self, composite: &CompositeService) -> anyhow::Result<()> {
        composite.set_strategy(AdaptationStrategy::NoAdaptation);
        self.set_eligibility(composite, true).await;
        Ok(())
    }
}

struct SwitchInner {
    configurations: Vec<Box<dyn Configuration>>,
    active: usize,
}

/// Named, mutually exclusive configurations, exactly one of which is active.
///
/// Invocation rounds hold a [`RoundGuard`] while running, switching waits for
/// the round in progress to finish.
pub struct ConfigurationSwitch {
    composite: CompositeService,
    inner: tokio::sync::RwLock<SwitchInner>,
}

pub type RoundGuard<'a> = tokio::sync::RwLockReadGuard<'a, ()>;

impl ConfigurationSwitch {
    /// Create the switch, activating the first configuration.
    pub async fn new(composite: CompositeService, configurations: Vec<Box<dyn Configuration>>) -> anyhow::Result<Self> {
        let mut configurations = configurations;
        anyhow::ensure!(!configurations.is_empty(), "no configuration defined");
        let mut names = std::collections::HashSet::new();
        for configuration in &configurations {
            anyhow::ensure!(
                names.insert(configuration.name().to_string()),
                "duplicate configuration: {}",
                configuration.name()
            );
        }

        configurations[0].set_configuration(&composite).await?;
        log::info!("active configuration: {}", configurations[0].name());
        Ok(Self {
            composite,
            inner: tokio::sync::RwLock::new(SwitchInner {
                configurations,
                active: 0,
            }),
        })
    }

    pub async fn names(&self) -> Vec<String> {
        self.inner.read().await.configurations.iter().map(|x| x.name().to_string()).collect()
    }

    pub async fn active(&self) -> String {
        let lck = self.inner.read().await;
        lck.configurations[lck.active].name().to_string()
    }

    /// Block configuration changes until the guard is dropped.
    pub async fn round_guard(&self) -> RoundGuard<'_> {
        tokio::sync::RwLockReadGuard::map(self.inner.read().await, |_| &())
    }

    /// Tear down the active configuration and set up `name`.
    /// Selecting the active configuration has no effect.
    pub async fn select(&self, name: &str) -> anyhow::Result<()> {
        let mut lck = self.inner.write().await;
        let new_index = match lck.configurations.iter().position(|x| x.name() == name) {
            Some(index) => index,
            None => return Err(ResepError::invalid_configuration(format!("unknown configuration: {}", name)).into()),
        };
        let old_index = lck.active;
        if new_index == old_index {
            return Ok(());
        }

        lck.configurations[old_index].remove_configuration(&self.composite).await?;
        if let Err(err) = lck.configurations[new_index].set_configuration(&self.composite).await {
            log::error!("could not set configuration {}, restoring {}: {}", name, lck.configurations[old_index].name(), err);
            lck.configurations[old_index].set_configuration(&self.composite).await?;
            return Err(err);
        }
        lck.active = new_index;
        log::info!("configuration switched from {} to {}", lck.configurations[old_index].name(), name);
        Ok(())
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::registry::ServiceRegistry;
    use resep_api::service::ServiceDescriptor;
    use resep_messaging::context::{SimulationContext, SimulationSettings};
    use resep_messaging::simulator::MessagingSimulator;

    fn composite() -> CompositeService {
        let context = SimulationContext::new(SimulationSettings::default(), 42).unwrap();
        CompositeService::new(ServiceRegistry::new(), MessagingSimulator::new(context))
    }

    fn configuration(name: &str, strategy: AdaptationStrategy, disabled_services: &[&str]) -> Box<dyn Configuration> {
        Box::new(StrategyConfiguration::new(ConfigurationSettings {
            name: name.to_string(),
            strategy,
            disabled_services: disabled_services.iter().map(|x| x.to_string()).collect(),
        }))
    }

    /// Records the hooks called, in order.
    struct Tracing {
        name: String,
        events: std::sync::Arc<std::sync::Mutex<Vec<String>>>,
        fail_set: bool,
    }

    #[async_trait::async_trait]
    impl Configuration for Tracing {
        fn name(&self) -> &str {
            &self.name
        }

        async fn set_configuration(&mut self, _composite: &CompositeService) -> anyhow::Result<()> {
            self.events.lock().unwrap().push(format!("set {}", self.name));
            anyhow::ensure!(!self.fail_set, "cannot set {}", self.name);
            Ok(())
        }

        async fn remove_configuration(&mut self, _composite: &CompositeService) -> anyhow::Result<()> {
            self.events.lock().unwrap().push(format!("remove {}", self.name));
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_configuration_switch_hooks() {
        let events = std::sync::Arc::new(std::sync::Mutex::new(vec![]));
        let tracing = |name: &str, fail_set: bool| -> Box<dyn Configuration> {
            Box::new(Tracing {
                name: name.to_string(),
                events: events.clone(),
                fail_set,
            })
        };
        let switch = ConfigurationSwitch::new(composite(), vec![tracing("A", false), tracing("B", false), tracing("C", true)])
            .await
            .unwrap();
        assert_eq!("A", switch.active().await);
        assert_eq!(vec!["A", "B", "C"], switch.names().await);

        switch.select("B").await.unwrap();
        switch.select("B").await.unwrap();
        assert_eq!("B", switch.active().await);

        // failure to set up restores the previous configuration
        assert!(switch.select("C").await.is_err());
        assert_eq!("B", switch.active().await);

        let err = switch.select("Z").await.unwrap_err();
        assert!(matches!(err.downcast_ref::<ResepError>(), Some(ResepError::InvalidConfiguration(_))));

        assert_eq!(
            vec!["set A", "remove A", "set B", "remove B", "set C", "set B"],
            *events.lock().unwrap()
        );
    }

    #[tokio::test]
    async fn test_configuration_switch_invalid() {
        assert!(ConfigurationSwitch::new(composite(), vec![]).await.is_err());
        assert!(ConfigurationSwitch::new(
            composite(),
            vec![
                configuration("A", AdaptationStrategy::NoAdaptation, &[]),
                configuration("A", AdaptationStrategy::Failover, &[])
            ]
        )
        .await
        .is_err());
    }

    #[tokio::test]
    async fn test_configuration_switch_strategy_configuration() {
        let composite = composite();
        for name in ["S1", "S2"] {
            composite.registry().register(ServiceDescriptor::new(name, "T", "local", vec![])).await.unwrap();
        }
        let switch = ConfigurationSwitch::new(
            composite.clone(),
            vec![
                configuration("plain", AdaptationStrategy::NoAdaptation, &[]),
                configuration("retry", AdaptationStrategy::Retry { max_attempts: 2 }, &["S1", "Ghost"]),
                configuration("failover", AdaptationStrategy::Failover, &["S2"]),
            ],
        )
        .await
        .unwrap();

        switch.select("retry").await.unwrap();
        assert_eq!(AdaptationStrategy::Retry { max_attempts: 2 }, composite.strategy());
        assert!(!composite.registry().resolve("S1").await.unwrap().is_eligible());

        switch.select("failover").await.unwrap();
        assert_eq!(AdaptationStrategy::Failover, composite.strategy());
        assert!(composite.registry().resolve("S1").await.unwrap().is_eligible());
        assert!(!composite.registry().resolve("S2").await.unwrap().is_eligible());

        switch.select("plain").await.unwrap();
        assert_eq!(AdaptationStrategy::NoAdaptation, composite.strategy());
        assert!(composite.registry().resolve("S2").await.unwrap().is_eligible());
    }

    #[tokio::test]
    async fn test_configuration_switch_waits_for_round() {
        let switch = std::sync::Arc::new(
            ConfigurationSwitch::new(
                composite(),
                vec![
                    configuration("A", AdaptationStrategy::NoAdaptation, &[]),
                    configuration("B", AdaptationStrategy::Failover, &[]),
                ],
            )
            .await
            .unwrap(),
        );

        let guard = switch.round_guard().await;
        let switch_cloned = switch.clone();
        let handle = tokio::spawn(async move { switch_cloned.select("B").await });
        tokio::time::sleep(std::time::Duration::from_millis(50)).await;
        assert!(!handle.is_finished());
        drop(guard);

        handle.await.unwrap().unwrap();
        assert_eq!("B", switch.active().await);
    }
}
