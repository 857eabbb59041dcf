// SPDX-FileCopyrightText: © 2024 Claudio Cicconetti <c.cicconetti@iit.cnr.it>
// SPDX-License-Identifier: MIT

use resep_api::records::{AggregateRecord, InvocationRecord};
use resep_messaging::context::SimulationContext;
use resep_profile::{InputProfile, InputProfileSampler};
use resep_registry::composite::{CallStatus, CompositeService};
use resep_registry::configuration::ConfigurationSwitch;
use resep_telemetry::MetricsSink;

use crate::workflow::Workflow;

/// First pseudo-random number generator stream used for input sampling,
/// incremented at every run.
const RNG_STREAM_SAMPLER: u64 = 100;

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
pub enum EngineState {
    Idle,
    Running,
    Stopped,
    Completed,
}

impl std::fmt::Display for EngineState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EngineState::Idle => write!(f, "idle"),
            EngineState::Running => write!(f, "running"),
            EngineState::Stopped => write!(f, "stopped"),
            EngineState::Completed => write!(f, "completed"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
pub struct Progress {
    /// Number of invocation rounds completed.
    pub invocations: u64,
    pub max_steps: u64,
}

impl std::fmt::Display for Progress {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} / {}", self.invocations, self.max_steps)
    }
}

#[derive(Debug, Clone, PartialEq, serde::Serialize)]
pub struct RunSummary {
    pub state: EngineState,
    pub rounds: u64,
    pub successful_rounds: u64,
    pub total_cost: f64,
}

struct EngineShared {
    state: std::sync::Mutex<EngineState>,
    invocations: std::sync::atomic::AtomicU64,
    max_steps: std::sync::atomic::AtomicU64,
    stop: std::sync::atomic::AtomicBool,
}

impl EngineShared {
    fn state(&self) -> EngineState {
        *self.state.lock().unwrap_or_else(std::sync::PoisonError::into_inner)
    }

    fn set_state(&self, state: EngineState) {
        let mut current = self.state.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        log::info!("engine state: {} -> {}", *current, state);
        *current = state;
    }

    fn progress(&self) -> Progress {
        Progress {
            invocations: self.invocations.load(std::sync::atomic::Ordering::SeqCst),
            max_steps: self.max_steps.load(std::sync::atomic::Ordering::SeqCst),
        }
    }
}

/// View of the state and progress of an engine, which can be polled
/// without interfering with the execution, e.g., from another task.
#[derive(Clone)]
pub struct EngineHandle {
    shared: std::sync::Arc<EngineShared>,
}

impl EngineHandle {
    pub fn state(&self) -> EngineState {
        self.shared.state()
    }

    pub fn progress(&self) -> Progress {
        self.shared.progress()
    }

    /// Ask the run to end after the round in progress.
    /// No effect if the engine is not running.
    pub fn stop(&self) {
        match self.state() {
            EngineState::Running => {
                log::info!("stop requested at {}", self.progress());
                self.shared.stop.store(true, std::sync::atomic::Ordering::SeqCst);
            }
            state => log::debug!("stop ignored, engine {}", state),
        }
    }
}

/// Everything a run needs, moved into the task executing it.
struct Run {
    workflow: Workflow,
    sampler: InputProfileSampler,
    composite: CompositeService,
    switch: std::sync::Arc<ConfigurationSwitch>,
    sink: MetricsSink,
    shared: std::sync::Arc<EngineShared>,
}

/// Executes workflows against the service composition.
pub struct WorkflowEngine {
    /// Simulation context, also providing the input sampling seeds.
    context: SimulationContext,
    composite: CompositeService,
    /// Configurations, which cannot change during an invocation round.
    switch: std::sync::Arc<ConfigurationSwitch>,
    sink: MetricsSink,
    shared: std::sync::Arc<EngineShared>,
    /// Task of the current or last run.
    run: Option<tokio::task::JoinHandle<anyhow::Result<RunSummary>>>,
    /// Number of runs started so far.
    runs: u64,
}

impl WorkflowEngine {
    pub fn new(context: SimulationContext, composite: CompositeService, switch: std::sync::Arc<ConfigurationSwitch>, sink: MetricsSink) -> Self {
        Self {
            context,
            composite,
            switch,
            sink,
            shared: std::sync::Arc::new(EngineShared {
                state: std::sync::Mutex::new(EngineState::Idle),
                invocations: std::sync::atomic::AtomicU64::new(0),
                max_steps: std::sync::atomic::AtomicU64::new(0),
                stop: std::sync::atomic::AtomicBool::new(false),
            }),
            run: None,
            runs: 0,
        }
    }

    pub fn state(&self) -> EngineState {
        self.shared.state()
    }

    pub fn progress(&self) -> Progress {
        self.shared.progress()
    }

    pub fn handle(&self) -> EngineHandle {
        EngineHandle {
            shared: self.shared.clone(),
        }
    }

    pub fn switch(&self) -> &std::sync::Arc<ConfigurationSwitch> {
        &self.switch
    }

    /// Load the workflow and the input profile, then start executing.
    /// Nothing is executed if either cannot be loaded.
    pub fn start(&mut self, workflow_path: &str, profile_path: &str) -> anyhow::Result<()> {
        anyhow::ensure!(self.state() != EngineState::Running, "a run is already in progress");
        let workflow = Workflow::load(workflow_path)?;
        let profile = resep_profile::load_profile(profile_path)?;
        self.start_with(workflow, profile)
    }

    /// Start executing `workflow` for the number of steps of `profile`.
    /// Must be called within a tokio runtime.
    pub fn start_with(&mut self, workflow: Workflow, profile: InputProfile) -> anyhow::Result<()> {
        anyhow::ensure!(self.state() != EngineState::Running, "a run is already in progress");
        if self.state() != EngineState::Idle {
            self.reset()?;
        }

        let sampler = InputProfileSampler::new(profile, self.context.rng(RNG_STREAM_SAMPLER + self.runs));
        self.runs += 1;
        self.shared.invocations.store(0, std::sync::atomic::Ordering::SeqCst);
        self.shared.max_steps.store(sampler.profile().max_steps, std::sync::atomic::Ordering::SeqCst);
        self.shared.stop.store(false, std::sync::atomic::Ordering::SeqCst);
        self.sink.restart_steps();
        self.shared.set_state(EngineState::Running);

        let run = Run {
            workflow,
            sampler,
            composite: self.composite.clone(),
            switch: self.switch.clone(),
            sink: self.sink.clone(),
            shared: self.shared.clone(),
        };
        self.run = Some(tokio::spawn(Self::run_task(run)));
        Ok(())
    }

    pub fn stop(&self) {
        self.handle().stop();
    }

    /// Wait for the current run to end.
    pub async fn wait(&mut self) -> anyhow::Result<RunSummary> {
        match self.run.take() {
            Some(handle) => handle.await?,
            None => anyhow::bail!("no run to wait for"),
        }
    }

    /// Go back to idle after a run ended.
    pub fn reset(&mut self) -> anyhow::Result<()> {
        match self.state() {
            EngineState::Running => anyhow::bail!("cannot reset a running engine"),
            EngineState::Idle => Ok(()),
            EngineState::Stopped | EngineState::Completed => {
                self.shared.set_state(EngineState::Idle);
                Ok(())
            }
        }
    }

    async fn run_task(run: Run) -> anyhow::Result<RunSummary> {
        let shared = run.shared.clone();
        let sink = run.sink.clone();
        let result = match Self::execute(run).await {
            Ok(summary) => sink
                .log(
                    "Run",
                    &format!(
                        "{} after {} rounds, {} successful, total cost {}",
                        summary.state, summary.rounds, summary.successful_rounds, summary.total_cost
                    ),
                )
                .map(|_| summary)
                .map_err(anyhow::Error::from),
            Err(err) => Err(err),
        };
        match &result {
            Ok(summary) => shared.set_state(summary.state),
            Err(err) => {
                log::error!("run aborted: {}", err);
                shared.set_state(EngineState::Stopped);
                if let Err(log_err) = sink.log("Run", &format!("aborted: {}", err)) {
                    log::error!("could not record the abort: {}", log_err);
                }
            }
        }
        result
    }

    async fn execute(mut run: Run) -> anyhow::Result<RunSummary> {
        let max_steps = run.sampler.profile().max_steps;
        run.sink.log(
            "Run",
            &format!(
                "started: {} rounds of {}, configuration {}",
                max_steps,
                run.workflow,
                run.switch.active().await
            ),
        )?;

        let mut summary = RunSummary {
            state: EngineState::Completed,
            rounds: 0,
            successful_rounds: 0,
            total_cost: 0.0,
        };
        for step_index in 0..max_steps {
            if run.shared.stop.load(std::sync::atomic::Ordering::SeqCst) {
                summary.state = EngineState::Stopped;
                break;
            }

            let round_guard = run.switch.round_guard().await;
            let mut round_success = true;
            let mut round_cost = 0.0;
            for step in run.workflow.steps() {
                let parameters = match run.composite.registry().resolve(&step.service).await {
                    Ok(service) => service.descriptor().operation(&step.operation).map(|x| x.parameters.clone()).unwrap_or_default(),
                    Err(_) => vec![],
                };
                let args = run.sampler.bindings(&parameters);
                let outcome = run.composite.route(&step.service, &step.operation, &args).await;
                for attempt in &outcome.attempts {
                    match &attempt.status {
                        CallStatus::Unreachable(reason) => log::warn!("step {}, {}: {}", step_index, step, reason),
                        CallStatus::Lost => log::debug!("step {}, {}: message lost", step_index, step),
                        CallStatus::Success | CallStatus::Failure => {}
                    }
                    run.sink.append_invocation(&InvocationRecord {
                        step_index,
                        service_name: attempt.service_name.clone(),
                        success: attempt.success(),
                        cost: attempt.cost,
                        response_time_ms: attempt.response_time_ms,
                        message_delay_ms: attempt.message_delay_ms,
                    })?;
                }
                round_success &= outcome.success();
                round_cost += outcome.cost();
            }
            run.sink.append_aggregate(&AggregateRecord {
                step_index,
                success: round_success,
                cost: round_cost,
            })?;
            drop(round_guard);

            summary.rounds += 1;
            if round_success {
                summary.successful_rounds += 1;
            }
            summary.total_cost += round_cost;
            run.shared.invocations.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
        }
        Ok(summary)
    }
}
