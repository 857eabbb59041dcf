// SPDX-FileCopyrightText: © 2024 Claudio Cicconetti <c.cicconetti@iit.cnr.it>
// SPDX-License-Identifier: MIT

use resep_api::error::ResepError;
use resep_api::records::{AggregateRecord, InvocationRecord, LogEntry, ResultRow};
use std::io::prelude::*;

struct ResultsWriter {
    outfile: std::fs::File,
    last_step: Option<u64>,
}

struct SinkInner {
    results_path: String,
    log_path: String,
    results: std::sync::Mutex<ResultsWriter>,
    log: std::sync::Mutex<std::fs::File>,
}

/// Append-only results and log files.
///
/// Every row is written with a single write while holding the lock of
/// its file, so rows from concurrent writers never interleave.
#[derive(Clone)]
pub struct MetricsSink {
    inner: std::sync::Arc<SinkInner>,
}

fn open(filename: &str, append: bool) -> Result<std::fs::File, ResepError> {
    if let Some(parent) = std::path::Path::new(filename).parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent).map_err(|err| ResepError::io(filename, err))?;
        }
    }
    let mut options = std::fs::OpenOptions::new();
    options.create(true);
    match append {
        true => options.append(true),
        false => options.write(true).truncate(true),
    };
    options.open(filename).map_err(|err| ResepError::io(filename, err))
}

/// Empty the file and move the cursor back to its start, which matters when
/// the file was not opened in append mode.
fn truncate(outfile: &mut std::fs::File, filename: &str) -> Result<(), ResepError> {
    outfile.set_len(0).map_err(|err| ResepError::io(filename, err))?;
    outfile.seek(std::io::SeekFrom::Start(0)).map_err(|err| ResepError::io(filename, err))?;
    Ok(())
}

fn write_row(outfile: &mut std::fs::File, filename: &str, row: &str) -> Result<(), ResepError> {
    let mut line = String::with_capacity(row.len() + 1);
    line.push_str(row);
    line.push('\n');
    outfile.write_all(line.as_bytes()).map_err(|err| ResepError::io(filename, err))
}

impl MetricsSink {
    /// Open the results and log files, creating them if needed.
    /// Unless `append` is set their content is discarded.
    pub fn new(results_path: &str, log_path: &str, append: bool) -> Result<Self, ResepError> {
        let results = open(results_path, append)?;
        let log = open(log_path, append)?;
        log::info!("metrics sink: results {}, log {}", results_path, log_path);
        Ok(Self {
            inner: std::sync::Arc::new(SinkInner {
                results_path: results_path.to_string(),
                log_path: log_path.to_string(),
                results: std::sync::Mutex::new(ResultsWriter {
                    outfile: results,
                    last_step: None,
                }),
                log: std::sync::Mutex::new(log),
            }),
        })
    }

    pub fn results_path(&self) -> &str {
        &self.inner.results_path
    }

    pub fn log_path(&self) -> &str {
        &self.inner.log_path
    }

    pub fn append_invocation(&self, record: &InvocationRecord) -> Result<(), ResepError> {
        self.append_row(&ResultRow::Invocation(record.clone()))
    }

    pub fn append_aggregate(&self, record: &AggregateRecord) -> Result<(), ResepError> {
        self.append_row(&ResultRow::Aggregate(record.clone()))
    }

    /// Rows must be appended with non-decreasing step index.
    pub fn append_row(&self, row: &ResultRow) -> Result<(), ResepError> {
        let mut writer = self.inner.results.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        if let Some(last_step) = writer.last_step {
            if row.step_index() < last_step {
                return Err(ResepError::parse(
                    &self.inner.results_path,
                    format!("step {} appended after step {}", row.step_index(), last_step),
                ));
            }
        }
        write_row(&mut writer.outfile, &self.inner.results_path, &row.to_csv_row())?;
        writer.last_step = Some(row.step_index());
        Ok(())
    }

    /// Allow the step index to start over, e.g., for a new run appending
    /// to the same results file.
    pub fn restart_steps(&self) {
        let mut writer = self.inner.results.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        writer.last_step = None;
    }

    pub fn append_log(&self, entry: &LogEntry) -> Result<(), ResepError> {
        let mut outfile = self.inner.log.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        write_row(&mut outfile, &self.inner.log_path, &entry.to_csv_row())
    }

    /// Record an event both in the log file and through the logger.
    pub fn log(&self, title: &str, message: &str) -> Result<(), ResepError> {
        log::info!("{}: {}", title, message);
        self.append_log(&LogEntry::now(title, message))
    }

    pub fn clear_results(&self) -> Result<(), ResepError> {
        let mut writer = self.inner.results.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        truncate(&mut writer.outfile, &self.inner.results_path)?;
        writer.last_step = None;
        log::info!("cleared {}", self.inner.results_path);
        Ok(())
    }

    pub fn clear_log(&self) -> Result<(), ResepError> {
        let mut outfile = self.inner.log.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        truncate(&mut outfile, &self.inner.log_path)?;
        log::info!("cleared {}", self.inner.log_path);
        Ok(())
    }
}

/// Content of a results file.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResultsFile {
    pub rows: Vec<ResultRow>,
    /// Number of malformed rows that were ignored.
    pub skipped: usize,
}

/// Content of a log file.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LogFile {
    pub entries: Vec<LogEntry>,
    pub skipped: usize,
}

fn read_rows<T, F>(path: &str, parse: F) -> Result<(Vec<T>, usize), ResepError>
where
    F: Fn(&str) -> Result<T, ResepError>,
{
    let file = std::fs::File::open(path).map_err(|err| ResepError::io(path, err))?;
    let reader = std::io::BufReader::new(file);
    let mut rows = vec![];
    let mut skipped = 0;
    for (line_no, line) in reader.lines().enumerate() {
        let line = line.map_err(|err| ResepError::io(path, err))?;
        if line.trim().is_empty() {
            continue;
        }
        match parse(&line) {
            Ok(row) => rows.push(row),
            Err(err) => {
                log::warn!("{}:{}: skipping row: {}", path, line_no + 1, err);
                skipped += 1;
            }
        }
    }
    Ok((rows, skipped))
}

/// Read back a results file, skipping malformed rows.
pub fn read_all(path: &str) -> Result<ResultsFile, ResepError> {
    let (rows, skipped) = read_rows(path, ResultRow::from_csv_row)?;
    Ok(ResultsFile { rows, skipped })
}

pub fn read_log(path: &str) -> Result<LogFile, ResepError> {
    let (entries, skipped) = read_rows(path, LogEntry::from_csv_row)?;
    Ok(LogFile { entries, skipped })
}

/// Copy a results or log file to `destination`, with `.csv` extension.
pub fn export(source: &str, destination: &str) -> Result<std::path::PathBuf, ResepError> {
    let destination = std::path::Path::new(destination).with_extension("csv");
    std::fs::copy(source, &destination).map_err(|err| ResepError::io(source, err))?;
    log::info!("exported {} to {}", source, destination.display());
    Ok(destination)
}
