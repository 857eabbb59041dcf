// SPDX-FileCopyrightText: © 2024 Claudio Cicconetti <c.cicconetti@iit.cnr.it>
// SPDX-License-Identifier: MIT

use futures::Future;

use crate::engine::{EngineHandle, EngineState, Progress};

/// Periodically publishes the progress of a workflow engine.
pub struct ProgressReporter {}

impl ProgressReporter {
    /// Create the channel on which the progress is published and the task
    /// reading it from `handle` every `period`.
    ///
    /// The task ends when the receiver is dropped or after publishing the
    /// progress of a run that has ended.
    pub fn new(
        handle: EngineHandle,
        period: std::time::Duration,
    ) -> (
        tokio::sync::mpsc::Receiver<Progress>,
        std::pin::Pin<Box<dyn Future<Output = ()> + Send>>,
    ) {
        let (sender, receiver) = tokio::sync::mpsc::channel(1);

        let refresh_task = Box::pin(async move {
            let mut interval = tokio::time::interval(period);
            loop {
                interval.tick().await;
                let state = handle.state();
                if sender.send(handle.progress()).await.is_err() {
                    log::debug!("progress receiver dropped, stopping the refresh task");
                    break;
                }
                if matches!(state, EngineState::Stopped | EngineState::Completed) {
                    break;
                }
            }
        });

        (receiver, refresh_task)
    }
}
