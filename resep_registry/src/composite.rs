// SPDX-FileCopyrightText: © 2024 Claudio Cicconetti <c.cicconetti@iit.cnr.it>
// SPDX-License-Identifier: MIT

use resep_api::error::ResepError;
use resep_api::typed_value::TypedValue;
use resep_messaging::simulator::{Delivery, MessagingSimulator};

use crate::registry::ServiceRegistry;
use crate::strategy::AdaptationStrategy;

const RNG_STREAM: u64 = 2;

#[derive(Debug, Clone, PartialEq)]
pub enum CallStatus {
    Success,
    /// The service answered with a failure.
    Failure,
    /// The message was dropped by the messaging simulator.
    Lost,
    /// The call could not be issued, e.g., the service is not registered.
    Unreachable(String),
}

/// Outcome of one call to an atomic service.
#[derive(Debug, Clone, PartialEq)]
pub struct CallOutcome {
    pub service_name: String,
    pub status: CallStatus,
    pub cost: f64,
    pub response_time_ms: f64,
    pub message_delay_ms: f64,
}

impl CallOutcome {
    pub fn success(&self) -> bool {
        self.status == CallStatus::Success
    }

    fn unreachable(service_name: &str, err: ResepError) -> Self {
        if err.is_call_failure() {
            log::debug!("{} unreachable: {}", service_name, err);
        } else {
            log::warn!("{} unreachable for an unexpected reason: {}", service_name, err);
        }
        Self {
            service_name: service_name.to_string(),
            status: CallStatus::Unreachable(err.to_string()),
            cost: 0.0,
            response_time_ms: 0.0,
            message_delay_ms: 0.0,
        }
    }
}

/// All the calls issued to serve one workflow step, in order.
#[derive(Debug, Clone, PartialEq)]
pub struct RouteOutcome {
    pub attempts: Vec<CallOutcome>,
}

impl RouteOutcome {
    /// The step succeeds if its last attempt succeeds.
    pub fn success(&self) -> bool {
        self.attempts.last().is_some_and(|x| x.success())
    }

    pub fn cost(&self) -> f64 {
        self.attempts.iter().map(|x| x.cost).sum()
    }
}

/// Entry point of the workflow: routes operations to the atomic services
/// through the messaging simulator.
#[derive(Clone)]
pub struct CompositeService {
    registry: ServiceRegistry,
    simulator: MessagingSimulator,
    strategy: std::sync::Arc<std::sync::RwLock<AdaptationStrategy>>,
    rng: std::sync::Arc<std::sync::Mutex<rand_pcg::Pcg64>>,
}

impl CompositeService {
    pub fn new(registry: ServiceRegistry, simulator: MessagingSimulator) -> Self {
        let rng = simulator.context().rng(RNG_STREAM);
        Self {
            registry,
            simulator,
            strategy: std::sync::Arc::new(std::sync::RwLock::new(AdaptationStrategy::default())),
            rng: std::sync::Arc::new(std::sync::Mutex::new(rng)),
        }
    }

    pub fn registry(&self) -> &ServiceRegistry {
        &self.registry
    }

    pub fn strategy(&self) -> AdaptationStrategy {
        *self.strategy.read().unwrap_or_else(std::sync::PoisonError::into_inner)
    }

    pub fn set_strategy(&self, strategy: AdaptationStrategy) {
        log::info!("adaptation strategy: {}", strategy);
        *self.strategy.write().unwrap_or_else(std::sync::PoisonError::into_inner) = strategy;
    }

    /// Serve `operation` on `target`, applying the current adaptation strategy.
    pub async fn route(&self, target: &str, operation: &str, args: &std::collections::BTreeMap<String, TypedValue>) -> RouteOutcome {
        let strategy = self.strategy();
        let mut attempts = vec![self.call(target, operation, args).await];
        match strategy {
            AdaptationStrategy::NoAdaptation => {}
            AdaptationStrategy::Retry { max_attempts } => {
                while attempts.len() < max_attempts as usize && !attempts[attempts.len() - 1].success() {
                    log::debug!("retrying {}.{}, attempt {}", target, operation, attempts.len() + 1);
                    attempts.push(self.call(target, operation, args).await);
                }
            }
            AdaptationStrategy::Failover => {
                if !attempts[0].success() {
                    let service_type = match self.registry.resolve(target).await {
                        Ok(service) => service.descriptor().service_type.clone(),
                        Err(_) => String::default(),
                    };
                    for alternative in self.registry.alternatives(&service_type, operation).await {
                        if alternative == target {
                            continue;
                        }
                        log::debug!("failover of {}.{} to {}", target, operation, alternative);
                        let outcome = self.call(&alternative, operation, args).await;
                        let success = outcome.success();
                        attempts.push(outcome);
                        if success {
                            break;
                        }
                    }
                }
            }
        }
        RouteOutcome { attempts }
    }

    /// The service to invoke for `service_name.operation`, if it can be called.
    async fn callable(&self, service_name: &str, operation: &str) -> Result<crate::atomic_service::AtomicService, ResepError> {
        let service = self.registry.resolve(service_name).await?;
        if !service.is_eligible() {
            return Err(ResepError::ServiceIneligible(service_name.to_string()));
        }
        if !service.descriptor().has_operation(operation) {
            return Err(ResepError::OperationNotFound {
                service: service_name.to_string(),
                operation: operation.to_string(),
            });
        }
        Ok(service)
    }

    /// Issue a single call to `service_name`.
    async fn call(&self, service_name: &str, operation: &str, args: &std::collections::BTreeMap<String, TypedValue>) -> CallOutcome {
        // the profiles in effect now determine the outcome of this call
        let service = match self.callable(service_name, operation).await {
            Ok(service) => service,
            Err(err) => return CallOutcome::unreachable(service_name, err),
        };
        log::debug!("{}.{}({:?})", service_name, operation, args);

        let outcome = {
            let mut rng = self.rng.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
            service.invoke(&mut *rng)
        };
        let latency = self.simulator.context().scale(outcome.latency_ms);

        let start = std::time::Instant::now();
        let delivery = self
            .simulator
            .call(service_name, operation, async move {
                if !latency.is_zero() {
                    tokio::time::sleep(latency).await;
                }
                outcome
            })
            .await;
        let response_time_ms = start.elapsed().as_secs_f64() * 1000.0;
        let message_delay_ms = delivery.delay().as_secs_f64() * 1000.0;

        match delivery {
            Delivery::Delivered { value, .. } => {
                if value.success {
                    self.registry.record_success(service_name).await;
                }
                CallOutcome {
                    service_name: service_name.to_string(),
                    status: if value.success { CallStatus::Success } else { CallStatus::Failure },
                    cost: value.cost,
                    response_time_ms,
                    message_delay_ms,
                }
            }
            Delivery::Lost { .. } => CallOutcome {
                service_name: service_name.to_string(),
                status: CallStatus::Lost,
                cost: 0.0,
                response_time_ms,
                message_delay_ms,
            },
        }
    }
}
