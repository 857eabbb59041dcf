// SPDX-FileCopyrightText: © 2024 Claudio Cicconetti <c.cicconetti@iit.cnr.it>
// SPDX-License-Identifier: MIT

use futures::Future;
use tokio::io::AsyncBufReadExt;

use resep_messaging::context::SimulationContext;
use resep_registry::configuration::ConfigurationSwitch;

use crate::engine::EngineHandle;

/// Change requested while a workflow is running.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Switch to the named configuration.
    Configuration(String),
    /// Set the nominal message delay range, in ms.
    Delay(u64, u64),
    /// Set the message loss probability, in percent.
    Loss(u32),
    /// Set the simulated time scale.
    Scale(u32),
    /// End the run after the round in progress.
    Stop,
    /// Log the progress and the settings in effect.
    Status,
}

fn parse_number<T: std::str::FromStr>(what: &str, value: Option<&str>) -> anyhow::Result<T> {
    match value {
        Some(value) => value.parse::<T>().map_err(|_| anyhow::anyhow!("invalid {}: {}", what, value)),
        None => anyhow::bail!("missing {}", what),
    }
}

impl std::str::FromStr for Command {
    type Err = anyhow::Error;

    fn from_str(line: &str) -> anyhow::Result<Self> {
        let mut tokens = line.split_whitespace();
        let keyword = tokens.next().unwrap_or_default();
        let command = match keyword {
            "configuration" => {
                // names may contain spaces, e.g., "No adaptation"
                let name = line.trim_start()[keyword.len()..].trim();
                anyhow::ensure!(!name.is_empty(), "missing configuration name");
                return Ok(Command::Configuration(name.to_string()));
            }
            "delay" => Command::Delay(parse_number("minimum delay", tokens.next())?, parse_number("maximum delay", tokens.next())?),
            "loss" => Command::Loss(parse_number("message loss", tokens.next())?),
            "scale" => Command::Scale(parse_number("time scale", tokens.next())?),
            "stop" => Command::Stop,
            "status" => Command::Status,
            "" => anyhow::bail!("empty command"),
            _ => anyhow::bail!("unknown command: {}", keyword),
        };
        anyhow::ensure!(tokens.next().is_none(), "trailing arguments: {}", line.trim());
        Ok(command)
    }
}

/// What the commands act upon.
#[derive(Clone)]
pub struct CommandTarget {
    pub switch: std::sync::Arc<ConfigurationSwitch>,
    pub context: SimulationContext,
    pub handle: EngineHandle,
}

impl CommandTarget {
    pub async fn apply(&self, command: &Command) -> anyhow::Result<()> {
        match command {
            Command::Configuration(name) => self.switch.select(name).await?,
            Command::Delay(min_delay_ms, max_delay_ms) => self.context.set_message_delay(*min_delay_ms, *max_delay_ms)?,
            Command::Loss(loss_percent) => self.context.set_message_loss(*loss_percent)?,
            Command::Scale(time_scale) => self.context.set_time_scale(*time_scale)?,
            Command::Stop => self.handle.stop(),
            Command::Status => log::info!(
                "engine {} at {}, configuration {}, {}",
                self.handle.state(),
                self.handle.progress(),
                self.switch.active().await,
                self.context.settings()
            ),
        }
        Ok(())
    }
}

/// Reads one command per line and applies it, until the input ends.
pub struct CommandListener {}

impl CommandListener {
    /// Create the task applying the commands read from `reader` to `target`.
    /// Invalid commands are logged and skipped.
    pub fn new<R>(reader: R, target: CommandTarget) -> std::pin::Pin<Box<dyn Future<Output = ()> + Send>>
    where
        R: tokio::io::AsyncBufRead + Unpin + Send + 'static,
    {
        Box::pin(async move {
            let mut lines = reader.lines();
            loop {
                let line = match lines.next_line().await {
                    Ok(Some(line)) => line,
                    Ok(None) => break,
                    Err(err) => {
                        log::error!("could not read commands: {}", err);
                        break;
                    }
                };
                if line.trim().is_empty() {
                    continue;
                }
                let command = match line.parse::<Command>() {
                    Ok(command) => command,
                    Err(err) => {
                        log::warn!("{}", err);
                        continue;
                    }
                };
                match target.apply(&command).await {
                    Ok(_) => log::debug!("applied {:?}", command),
                    Err(err) => log::warn!("could not apply {:?}: {}", command, err),
                }
            }
            log::debug!("command listener finished");
        })
    }
}
