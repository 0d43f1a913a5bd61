//! Parser for probe and process-listing output
//!
//! The probe prints one value per line in a fixed order. Each line is decoded
//! with the strict literal decoder and then mapped onto its typed field, so a
//! line of the wrong shape is reported with its field name and line number.

use chrono::Utc;
use serde::de::DeserializeOwned;

use super::literal;
use super::snapshot::{ProbeFields, ProcessEntry, StatsSnapshot};
use crate::error::{ParseError, ParseResult};
use crate::probe::RawProbeOutput;

/// Field names of the probe lines, in output order
pub const PROBE_FIELDS: [&str; 8] = [
    "usernames",
    "memory",
    "cpu_logical",
    "cpu_physical",
    "cpu_frequency",
    "cpu_times",
    "cpu_percent",
    "cpu_percent_per_core",
];

/// Stateless parser for raw probe output
pub struct StatsParser;

impl StatsParser {
    /// Parses both outputs of one collection into a snapshot.
    ///
    /// # Errors
    ///
    /// Returns a [`ParseError`] if either output is malformed or the per-core
    /// list does not have one entry per logical CPU.
    pub fn parse(raw: &RawProbeOutput) -> ParseResult<StatsSnapshot> {
        let fields = Self::parse_probe(&raw.probe_lines)?;

        if fields.cpu_percent_per_core.len() != fields.cpu_logical as usize {
            return Err(ParseError::CoreCount {
                logical: fields.cpu_logical,
                per_core: fields.cpu_percent_per_core.len(),
            });
        }

        let heavy = Self::parse_processes(&raw.process_lines)?;
        Ok(StatsSnapshot::new(fields, heavy, Utc::now()))
    }

    /// Decodes the eight probe lines.
    ///
    /// # Errors
    ///
    /// Returns [`ParseError::LineCount`] unless there are exactly eight lines,
    /// and [`ParseError::Literal`] or [`ParseError::Field`] for the first line
    /// that does not decode to its field's shape.
    pub fn parse_probe<S: AsRef<str>>(lines: &[S]) -> ParseResult<ProbeFields> {
        if lines.len() != PROBE_FIELDS.len() {
            return Err(ParseError::LineCount {
                expected: PROBE_FIELDS.len(),
                actual: lines.len(),
            });
        }

        Ok(ProbeFields {
            usernames: field(lines, 0)?,
            memory: field(lines, 1)?,
            cpu_logical: field(lines, 2)?,
            cpu_physical: field(lines, 3)?,
            cpu_frequency: field(lines, 4)?,
            cpu_times: field(lines, 5)?,
            cpu_percent: field(lines, 6)?,
            cpu_percent_per_core: field(lines, 7)?,
        })
    }

    /// Parses the process listing and keeps the heavy entries, in order.
    ///
    /// Blank lines are skipped.
    ///
    /// # Errors
    ///
    /// Returns [`ParseError::ProcessLine`] for a line that is not exactly
    /// `user,command,cpu` with a numeric `cpu`.
    pub fn parse_processes<S: AsRef<str>>(lines: &[S]) -> ParseResult<Vec<ProcessEntry>> {
        let mut heavy = Vec::new();
        for line in lines.iter().map(|l| l.as_ref()) {
            if line.trim().is_empty() {
                continue;
            }
            let entry = Self::parse_process_line(line)?;
            if entry.is_heavy() {
                heavy.push(entry);
            }
        }
        Ok(heavy)
    }

    /// Parses one `user,command,cpu` line.
    ///
    /// # Errors
    ///
    /// Returns [`ParseError::ProcessLine`] if the line does not have exactly
    /// three fields or the third is not a number.
    pub fn parse_process_line(line: &str) -> ParseResult<ProcessEntry> {
        let malformed = |reason: String| ParseError::ProcessLine {
            line: line.to_string(),
            reason,
        };

        let parts: Vec<&str> = line.split(',').collect();
        let [user, command, cpu] = parts.as_slice() else {
            return Err(malformed(format!(
                "expected 3 comma-separated fields, found {}",
                parts.len()
            )));
        };

        let cpu_percent = cpu
            .trim()
            .parse::<f64>()
            .map_err(|e| malformed(format!("invalid cpu percentage `{}`: {e}", cpu.trim())))?;

        Ok(ProcessEntry {
            user: user.trim().to_string(),
            command: command.trim().to_string(),
            cpu_percent,
        })
    }
}

/// Decodes line `index` into the type of its schema field
fn field<T: DeserializeOwned, S: AsRef<str>>(lines: &[S], index: usize) -> ParseResult<T> {
    let name = PROBE_FIELDS[index];
    let line = index + 1;

    let value = literal::decode(lines[index].as_ref()).map_err(|e| ParseError::Literal {
        line,
        field: name,
        reason: e.to_string(),
    })?;

    serde_json::from_value(value).map_err(|e| ParseError::Field {
        line,
        field: name,
        reason: e.to_string(),
    })
}
