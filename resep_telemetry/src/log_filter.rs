// SPDX-FileCopyrightText: © 2024 Claudio Cicconetti <c.cicconetti@iit.cnr.it>
// SPDX-License-Identifier: MIT

use resep_api::records::LogEntry;

/// Selection of log entries by date range and text.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LogFilter {
    /// First day included.
    pub from: Option<chrono::NaiveDate>,
    /// Last day included.
    pub to: Option<chrono::NaiveDate>,
    /// Case-insensitive substring of the title or the message.
    pub text: Option<String>,
}

impl LogFilter {
    /// Build a filter from its textual representation, empty strings meaning
    /// no constraint. Dates are in the format `yyyy-MM-dd`.
    pub fn new(from: &str, to: &str, text: &str) -> anyhow::Result<Self> {
        let parse_date = |val: &str| -> anyhow::Result<Option<chrono::NaiveDate>> {
            match val.trim() {
                "" => Ok(None),
                val => Ok(Some(chrono::NaiveDate::parse_from_str(val, "%Y-%m-%d")?)),
            }
        };
        let filter = Self {
            from: parse_date(from)?,
            to: parse_date(to)?,
            text: match text.is_empty() {
                true => None,
                false => Some(text.to_string()),
            },
        };
        if let (Some(from), Some(to)) = (filter.from, filter.to) {
            anyhow::ensure!(from <= to, "empty date range: {} > {}", from, to);
        }
        Ok(filter)
    }

    pub fn matches(&self, entry: &LogEntry) -> bool {
        let day = entry.time.date();
        if self.from.is_some_and(|from| day < from) || self.to.is_some_and(|to| day > to) {
            return false;
        }
        match &self.text {
            Some(text) => {
                let text = text.to_lowercase();
                entry.title.to_lowercase().contains(&text) || entry.message.to_lowercase().contains(&text)
            }
            None => true,
        }
    }

    /// Entries matching the filter, most recent first.
    pub fn apply(&self, entries: &[LogEntry]) -> Vec<LogEntry> {
        let mut selected = entries.iter().filter(|x| self.matches(x)).cloned().collect::<Vec<LogEntry>>();
        selected.sort_by(|a, b| b.time.cmp(&a.time));
        selected
    }
}
