// SPDX-FileCopyrightText: © 2024 Claudio Cicconetti <c.cicconetti@iit.cnr.it>
// SPDX-License-Identifier: MIT

use rand::Rng;
use rand_distr::Distribution;

use crate::context::SimulationContext;

const RNG_STREAM: u64 = 1;

/// Delay and loss drawn for one message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Verdict {
    /// Simulated delay, already scaled.
    pub delay: std::time::Duration,
    pub lost: bool,
}

/// Outcome of a call through the messaging simulator.
#[derive(Debug, Clone, PartialEq)]
pub enum Delivery<T> {
    Delivered { value: T, delay: std::time::Duration },
    /// The message was dropped: the target never received it.
    Lost { delay: std::time::Duration },
}

impl<T> Delivery<T> {
    pub fn delay(&self) -> std::time::Duration {
        match self {
            Delivery::Delivered { delay, .. } => *delay,
            Delivery::Lost { delay } => *delay,
        }
    }

    pub fn is_lost(&self) -> bool {
        matches!(self, Delivery::Lost { .. })
    }
}

/// Injects random delay and loss into every inter-service call.
#[derive(Clone)]
pub struct MessagingSimulator {
    context: SimulationContext,
    rng: std::sync::Arc<std::sync::Mutex<rand_pcg::Pcg64>>,
}

impl MessagingSimulator {
    pub fn new(context: SimulationContext) -> Self {
        let rng = context.rng(RNG_STREAM);
        Self {
            context,
            rng: std::sync::Arc::new(std::sync::Mutex::new(rng)),
        }
    }

    pub fn context(&self) -> &SimulationContext {
        &self.context
    }

    /// Draw the delay and the loss decision for a message, with the
    /// settings in effect now.
    pub fn draw(&self) -> Verdict {
        let settings = self.context.settings();
        let mut rng = self.rng.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        let nominal_ms = rand_distr::Uniform::new_inclusive(settings.min_delay_ms, settings.max_delay_ms).sample(&mut *rng);
        let lost = match settings.loss_percent {
            0 => false,
            loss_percent if loss_percent >= 100 => true,
            loss_percent => rng.gen_range(0..100) < loss_percent,
        };
        Verdict {
            delay: std::time::Duration::from_millis(nominal_ms.saturating_mul(settings.time_scale as u64)),
            lost,
        }
    }

    /// Deliver the `request` to `target` after the simulated delay, unless
    /// the message is lost, in which case `request` is dropped without being
    /// polled.
    ///
    /// No lock is held while waiting.
    pub async fn call<T, F>(&self, target: &str, operation: &str, request: F) -> Delivery<T>
    where
        F: std::future::Future<Output = T>,
    {
        let verdict = self.draw();
        log::debug!(
            "message to {}.{}: delay {} ms{}",
            target,
            operation,
            verdict.delay.as_millis(),
            if verdict.lost { ", lost" } else { "" }
        );
        if !verdict.delay.is_zero() {
            tokio::time::sleep(verdict.delay).await;
        }
        match verdict.lost {
            true => Delivery::Lost { delay: verdict.delay },
            false => Delivery::Delivered {
                value: request.await,
                delay: verdict.delay,
            },
        }
    }
}
