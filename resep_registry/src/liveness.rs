// SPDX-FileCopyrightText: © 2024 Claudio Cicconetti <c.cicconetti@iit.cnr.it>
// SPDX-License-Identifier: MIT

use futures::Future;

use crate::registry::{LivenessSnapshot, ServiceRegistry};

/// Periodically publishes the liveness of the registered services.
pub struct LivenessMonitor {}

impl LivenessMonitor {
    /// Create the channel on which the snapshots are published and the task
    /// producing them every `period`, considering alive the services that
    /// answered successfully within `window`.
    ///
    /// The task ends when the receiver is dropped.
    pub fn new(
        registry: ServiceRegistry,
        period: std::time::Duration,
        window: std::time::Duration,
    ) -> (
        tokio::sync::mpsc::Receiver<LivenessSnapshot>,
        std::pin::Pin<Box<dyn Future<Output = ()> + Send>>,
    ) {
        let (sender, receiver) = tokio::sync::mpsc::channel(1);

        let refresh_task = Box::pin(async move {
            let mut interval = tokio::time::interval(period);
            loop {
                interval.tick().await;
                let snapshot = registry.liveness(window).await;
                if sender.send(snapshot).await.is_err() {
                    log::debug!("liveness receiver dropped, stopping the refresh task");
                    break;
                }
            }
        });

        (receiver, refresh_task)
    }
}
