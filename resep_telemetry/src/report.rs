// SPDX-FileCopyrightText: © 2024 Claudio Cicconetti <c.cicconetti@iit.cnr.it>
// SPDX-License-Identifier: MIT

use resep_api::records::ResultRow;

/// Per-service statistics of a run.
#[derive(Debug, Clone, Default, PartialEq, serde::Serialize)]
pub struct ServiceStats {
    pub successes: u64,
    pub failures: u64,
    pub total_cost: f64,
    /// (step index, response time in ms) of every call.
    pub response_times: Vec<(u64, f64)>,
}

impl ServiceStats {
    pub fn reliability(&self) -> f64 {
        match self.successes + self.failures {
            0 => 0.0,
            calls => self.successes as f64 / calls as f64,
        }
    }

    pub fn average_response_time(&self) -> f64 {
        match self.response_times.len() {
            0 => 0.0,
            calls => self.response_times.iter().map(|x| x.1).sum::<f64>() / calls as f64,
        }
    }
}

/// Reliability, cost and performance of a run, from its results file.
#[derive(Debug, Clone, Default, PartialEq, serde::Serialize)]
pub struct RunReport {
    pub services: std::collections::BTreeMap<String, ServiceStats>,
    pub rounds: u64,
    pub successful_rounds: u64,
    /// (step index, cost accumulated up to that step), one point per round.
    pub cumulative_cost: Vec<(u64, f64)>,
    pub last_step: Option<u64>,
}

impl RunReport {
    pub fn from_rows(rows: &[ResultRow]) -> Self {
        let mut report = RunReport::default();
        let mut total_cost = 0.0;
        for row in rows {
            report.last_step = Some(std::cmp::max(report.last_step.unwrap_or_default(), row.step_index()));
            match row {
                ResultRow::Invocation(record) => {
                    let stats = report.services.entry(record.service_name.clone()).or_default();
                    match record.success {
                        true => stats.successes += 1,
                        false => stats.failures += 1,
                    }
                    stats.total_cost += record.cost;
                    stats.response_times.push((record.step_index, record.response_time_ms));
                }
                ResultRow::Aggregate(record) => {
                    report.rounds += 1;
                    if record.success {
                        report.successful_rounds += 1;
                    }
                    total_cost += record.cost;
                    report.cumulative_cost.push((record.step_index, total_cost));
                }
            }
        }
        report
    }

    pub fn total_cost(&self) -> f64 {
        self.cumulative_cost.last().map(|x| x.1).unwrap_or_default()
    }

    pub fn reliability(&self) -> f64 {
        match self.rounds {
            0 => 0.0,
            rounds => self.successful_rounds as f64 / rounds as f64,
        }
    }
}

impl std::fmt::Display for RunReport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(
            f,
            "rounds {} (successful {}, reliability {:.3}), total cost {}",
            self.rounds,
            self.successful_rounds,
            self.reliability(),
            self.total_cost()
        )?;
        for (name, stats) in &self.services {
            writeln!(
                f,
                "{}: calls {}, failures {}, reliability {:.3}, cost {}, avg response time {:.3} ms",
                name,
                stats.successes + stats.failures,
                stats.failures,
                stats.reliability(),
                stats.total_cost,
                stats.average_response_time()
            )?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use resep_api::records::{AggregateRecord, InvocationRecord};

    fn call(step_index: u64, service_name: &str, success: bool, cost: f64, response_time_ms: f64) -> ResultRow {
        ResultRow::Invocation(InvocationRecord {
            step_index,
            service_name: service_name.to_string(),
            success,
            cost,
            response_time_ms,
            message_delay_ms: 0.0,
        })
    }

    fn round(step_index: u64, success: bool, cost: f64) -> ResultRow {
        ResultRow::Aggregate(AggregateRecord { step_index, success, cost })
    }

    #[test]
    fn test_run_report() {
        let rows = vec![
            call(0, "S1", true, 10.0, 4.0),
            call(0, "S2", false, 5.0, 2.0),
            round(0, false, 15.0),
            call(1, "S1", true, 10.0, 6.0),
            call(1, "S2", true, 5.0, 2.0),
            round(1, true, 15.0),
            call(2, "S1", false, 10.0, 8.0),
        ];
        let report = RunReport::from_rows(&rows);
        assert_eq!(2, report.rounds);
        assert_eq!(1, report.successful_rounds);
        assert_eq!(vec![(0, 15.0), (1, 30.0)], report.cumulative_cost);
        assert_eq!(30.0, report.total_cost());
        assert_eq!(Some(2), report.last_step);
        assert_eq!(0.5, report.reliability());

        let s1 = &report.services["S1"];
        assert_eq!((2, 1), (s1.successes, s1.failures));
        assert_eq!(30.0, s1.total_cost);
        assert_eq!(6.0, s1.average_response_time());
        assert_eq!(vec![(0, 4.0), (1, 6.0), (2, 8.0)], s1.response_times);

        let text = report.to_string();
        assert!(text.starts_with("rounds 2 (successful 1, reliability 0.500), total cost 30\n"));
        assert!(text.contains("S2: calls 2, failures 1, reliability 0.500, cost 10, avg response time 2.000 ms\n"));

        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["rounds"], 2);
    }

    #[test]
    fn test_run_report_empty() {
        let report = RunReport::from_rows(&[]);
        assert_eq!(None, report.last_step);
        assert_eq!(0.0, report.total_cost());
        assert_eq!(0.0, report.reliability());
        assert!(report.services.is_empty());
    }
}
