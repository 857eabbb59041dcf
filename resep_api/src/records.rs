// SPDX-FileCopyrightText: © 2024 Claudio Cicconetti <c.cicconetti@iit.cnr.it>
// SPDX-License-Identifier: MIT

use crate::error::ResepError;

/// Format of the timestamps in log rows: fixed width and lexicographically sortable.
pub const LOG_TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.3f";

/// Outcome of one service call within an invocation round.
#[derive(Debug, Clone, PartialEq)]
pub struct InvocationRecord {
    pub step_index: u64,
    pub service_name: String,
    pub success: bool,
    pub cost: f64,
    /// Time elapsed between issuing the call and receiving the outcome.
    pub response_time_ms: f64,
    /// Share of the response time spent in the simulated network.
    pub message_delay_ms: f64,
}

/// Summary of a whole invocation round, attributed to the root service.
#[derive(Debug, Clone, PartialEq)]
pub struct AggregateRecord {
    pub step_index: u64,
    pub success: bool,
    pub cost: f64,
}

/// Row of the results file.
#[derive(Debug, Clone, PartialEq)]
pub enum ResultRow {
    /// 6 columns: step, service, success, cost, message delay, response time.
    Invocation(InvocationRecord),
    /// 4 columns: step, AssistanceService, success, total cost.
    Aggregate(AggregateRecord),
}

impl ResultRow {
    pub fn step_index(&self) -> u64 {
        match self {
            ResultRow::Invocation(record) => record.step_index,
            ResultRow::Aggregate(record) => record.step_index,
        }
    }

    pub fn to_csv_row(&self) -> String {
        match self {
            ResultRow::Invocation(record) => format!(
                "{},{},{},{},{},{}",
                record.step_index, record.service_name, record.success, record.cost, record.message_delay_ms, record.response_time_ms
            ),
            ResultRow::Aggregate(record) => format!("{},{},{},{}", record.step_index, crate::AGGREGATE_SERVICE, record.success, record.cost),
        }
    }

    pub fn from_csv_row(line: &str) -> Result<Self, ResepError> {
        let tokens = line.trim_end_matches(['\r', '\n']).split(',').map(|x| x.trim()).collect::<Vec<&str>>();
        let malformed = |reason: &str| ResepError::parse("results row", format!("{}: '{}'", reason, line));
        let step_index = tokens[0].parse::<u64>().map_err(|_| malformed("invalid step index"))?;
        match tokens.len() {
            4 => Ok(ResultRow::Aggregate(AggregateRecord {
                step_index,
                success: tokens[2].parse::<bool>().map_err(|_| malformed("invalid success flag"))?,
                cost: tokens[3].parse::<f64>().map_err(|_| malformed("invalid cost"))?,
            })),
            6 => Ok(ResultRow::Invocation(InvocationRecord {
                step_index,
                service_name: tokens[1].to_string(),
                success: tokens[2].parse::<bool>().map_err(|_| malformed("invalid success flag"))?,
                cost: tokens[3].parse::<f64>().map_err(|_| malformed("invalid cost"))?,
                message_delay_ms: tokens[4].parse::<f64>().map_err(|_| malformed("invalid delay"))?,
                response_time_ms: tokens[5].parse::<f64>().map_err(|_| malformed("invalid response time"))?,
            })),
            _ => Err(malformed("unexpected number of columns")),
        }
    }
}

/// Free-form operational event.
#[derive(Debug, Clone, PartialEq)]
pub struct LogEntry {
    pub time: chrono::NaiveDateTime,
    pub title: String,
    pub message: String,
}

impl LogEntry {
    /// Create an entry stamped with the current local time.
    pub fn now(title: &str, message: &str) -> Self {
        Self {
            time: chrono::Local::now().naive_local(),
            title: title.to_string(),
            message: message.to_string(),
        }
    }

    pub fn formatted_time(&self) -> String {
        self.time.format(LOG_TIME_FORMAT).to_string()
    }

    /// The title cannot contain commas, neither field can span lines.
    pub fn to_csv_row(&self) -> String {
        format!(
            "{},{},{}",
            self.formatted_time(),
            self.title.replace(',', ";").replace(['\r', '\n'], " "),
            self.message.replace(['\r', '\n'], " ")
        )
    }

    pub fn from_csv_row(line: &str) -> Result<Self, ResepError> {
        let mut tokens = line.trim_end_matches(['\r', '\n']).splitn(3, ',');
        let (time, title, message) = match (tokens.next(), tokens.next(), tokens.next()) {
            (Some(time), Some(title), Some(message)) => (time, title, message),
            _ => return Err(ResepError::parse("log row", format!("expected 3 columns: '{}'", line))),
        };
        let time = chrono::NaiveDateTime::parse_from_str(time, LOG_TIME_FORMAT)
            .map_err(|err| ResepError::parse("log row", format!("invalid time '{}': {}", time, err)))?;
        Ok(Self {
            time,
            title: title.to_string(),
            message: message.to_string(),
        })
    }
}
