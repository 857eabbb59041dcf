// SPDX-FileCopyrightText: © 2024 Claudio Cicconetti <c.cicconetti@iit.cnr.it>
// SPDX-License-Identifier: MIT

use rand::SeedableRng;
use resep_api::error::ResepError;

/// Runtime knobs of the simulation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Deserialize, serde::Serialize)]
pub struct SimulationSettings {
    /// Minimum nominal message delay, in ms.
    pub min_delay_ms: u64,
    /// Maximum nominal message delay, in ms.
    pub max_delay_ms: u64,
    /// Probability that a message is lost, in percent.
    pub loss_percent: u32,
    /// Multiplier converting nominal ms into simulated time.
    pub time_scale: u32,
}

impl Default for SimulationSettings {
    fn default() -> Self {
        Self {
            min_delay_ms: 0,
            max_delay_ms: 0,
            loss_percent: 0,
            time_scale: 1,
        }
    }
}

impl SimulationSettings {
    pub fn validate(&self) -> Result<(), ResepError> {
        if self.min_delay_ms > self.max_delay_ms {
            return Err(ResepError::invalid_configuration(format!(
                "minimum delay {} ms greater than maximum delay {} ms",
                self.min_delay_ms, self.max_delay_ms
            )));
        }
        if self.loss_percent > 100 {
            return Err(ResepError::invalid_configuration(format!(
                "message loss {}% outside [0,100]",
                self.loss_percent
            )));
        }
        if self.time_scale == 0 {
            return Err(ResepError::invalid_configuration("time scale must be positive"));
        }
        Ok(())
    }
}

impl std::fmt::Display for SimulationSettings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "delay [{},{}] ms, loss {}%, time scale {}",
            self.min_delay_ms, self.max_delay_ms, self.loss_percent, self.time_scale
        )
    }
}

struct ContextInner {
    settings: std::sync::RwLock<SimulationSettings>,
    seed: u64,
}

/// Simulation state shared by the components of one process.
///
/// Cloning yields a handle to the same state.
#[derive(Clone)]
pub struct SimulationContext {
    inner: std::sync::Arc<ContextInner>,
}

impl SimulationContext {
    pub fn new(settings: SimulationSettings, seed: u64) -> anyhow::Result<Self> {
        settings.validate()?;
        log::info!("simulation context: {}, seed {}", settings, seed);
        Ok(Self {
            inner: std::sync::Arc::new(ContextInner {
                settings: std::sync::RwLock::new(settings),
                seed,
            }),
        })
    }

    pub fn settings(&self) -> SimulationSettings {
        *self.inner.settings.read().unwrap_or_else(std::sync::PoisonError::into_inner)
    }

    /// Replace all the knobs at once, or none of them.
    pub fn apply(&self, settings: SimulationSettings) -> Result<(), ResepError> {
        self.update(|current| *current = settings)
    }

    /// Change the knobs with `change`, validated while holding the lock so
    /// that concurrent changes are never lost.
    fn update<F>(&self, change: F) -> Result<(), ResepError>
    where
        F: FnOnce(&mut SimulationSettings),
    {
        let mut current = self.inner.settings.write().unwrap_or_else(std::sync::PoisonError::into_inner);
        let mut candidate = *current;
        change(&mut candidate);
        if let Err(err) = candidate.validate() {
            log::warn!("configuration change rejected: {}", err);
            return Err(err);
        }
        if *current != candidate {
            log::info!("simulation settings changed: {}", candidate);
        }
        *current = candidate;
        Ok(())
    }

    pub fn set_message_delay(&self, min_delay_ms: u64, max_delay_ms: u64) -> Result<(), ResepError> {
        self.update(|current| {
            current.min_delay_ms = min_delay_ms;
            current.max_delay_ms = max_delay_ms;
        })
    }

    pub fn set_message_loss(&self, loss_percent: u32) -> Result<(), ResepError> {
        self.update(|current| current.loss_percent = loss_percent)
    }

    pub fn set_time_scale(&self, time_scale: u32) -> Result<(), ResepError> {
        self.update(|current| current.time_scale = time_scale)
    }

    /// Simulated duration of a nominal delay.
    pub fn scale(&self, nominal_ms: u64) -> std::time::Duration {
        std::time::Duration::from_millis(nominal_ms.saturating_mul(self.settings().time_scale as u64))
    }

    pub fn seed(&self) -> u64 {
        self.inner.seed
    }

    /// Pseudo-random number generator for the component identified by `stream`.
    /// Different streams produce independent sequences from the same seed.
    pub fn rng(&self, stream: u64) -> rand_pcg::Pcg64 {
        rand_pcg::Pcg64::seed_from_u64(self.inner.seed.wrapping_add(stream.wrapping_mul(0x9e37_79b9_7f4a_7c15)))
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use rand::RngCore;

    #[test]
    fn test_simulation_settings_validate() {
        assert!(SimulationSettings::default().validate().is_ok());
        let valid = SimulationSettings {
            min_delay_ms: 5,
            max_delay_ms: 5,
            loss_percent: 100,
            time_scale: 3,
        };
        assert!(valid.validate().is_ok());
        assert!(SimulationSettings {
            min_delay_ms: 6,
            ..valid
        }
        .validate()
        .is_err());
        assert!(SimulationSettings {
            loss_percent: 101,
            ..valid
        }
        .validate()
        .is_err());
        assert!(SimulationSettings { time_scale: 0, ..valid }.validate().is_err());
    }

    #[test]
    fn test_simulation_context_rejects_invalid_changes() {
        let context = SimulationContext::new(SimulationSettings::default(), 42).unwrap();
        context.set_message_delay(10, 20).unwrap();
        context.set_message_loss(30).unwrap();
        context.set_time_scale(2).unwrap();
        let expected = SimulationSettings {
            min_delay_ms: 10,
            max_delay_ms: 20,
            loss_percent: 30,
            time_scale: 2,
        };
        assert_eq!(expected, context.settings());

        assert!(matches!(context.set_message_delay(30, 20), Err(ResepError::InvalidConfiguration(_))));
        assert!(context.set_message_loss(150).is_err());
        assert!(context.set_time_scale(0).is_err());
        assert_eq!(expected, context.settings());

        assert!(SimulationContext::new(SimulationSettings { time_scale: 0, ..expected }, 42).is_err());
    }

    #[test]
    fn test_simulation_context_concurrent_setters() {
        let context = SimulationContext::new(SimulationSettings::default(), 42).unwrap();
        let handles = (0..8u32)
            .map(|i| {
                let context = context.clone();
                std::thread::spawn(move || {
                    for j in 0..500u64 {
                        match i % 2 {
                            0 => context.set_message_delay(j, j + 1).unwrap(),
                            _ => context.set_message_loss((j % 100) as u32).unwrap(),
                        }
                    }
                })
            })
            .collect::<Vec<_>>();
        for handle in handles {
            handle.join().unwrap();
        }
        // every thread ends with its own last value, none is overwritten by a stale copy
        assert_eq!(
            SimulationSettings {
                min_delay_ms: 499,
                max_delay_ms: 500,
                loss_percent: 99,
                time_scale: 1,
            },
            context.settings()
        );
    }

    #[test]
    fn test_simulation_context_scale_and_shared_state() {
        let context = SimulationContext::new(SimulationSettings::default(), 42).unwrap();
        let other = context.clone();
        assert_eq!(std::time::Duration::from_millis(7), context.scale(7));
        other.set_time_scale(10).unwrap();
        assert_eq!(std::time::Duration::from_millis(70), context.scale(7));
    }

    #[test]
    fn test_simulation_context_rng_streams() {
        let context = SimulationContext::new(SimulationSettings::default(), 42).unwrap();
        assert_eq!(context.rng(1).next_u64(), context.rng(1).next_u64());
        assert_ne!(context.rng(1).next_u64(), context.rng(2).next_u64());
    }
}
