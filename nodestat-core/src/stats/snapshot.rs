//! Data models for one host's statistics

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Processes at or below this CPU percentage are not reported
pub const HEAVY_PROCESS_THRESHOLD: f64 = 10.0;

/// Virtual memory figures as reported by the probe
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MemoryInfo {
    /// Total physical memory (bytes)
    pub total: u64,
    /// Memory available to new processes (bytes)
    pub available: u64,
    /// Used memory (bytes)
    pub used: u64,
    /// Used memory as a percentage (0.0–100.0)
    pub percent: f64,
    /// Any further numeric fields (`free`, `buffers`, `cached`, ...)
    #[serde(flatten)]
    pub extra: BTreeMap<String, f64>,
}

/// One line of the remote process listing
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProcessEntry {
    /// Owning user
    pub user: String,
    /// Command name
    pub command: String,
    /// CPU usage percentage
    pub cpu_percent: f64,
}

impl ProcessEntry {
    /// Returns true if the process is above [`HEAVY_PROCESS_THRESHOLD`]
    #[must_use]
    pub fn is_heavy(&self) -> bool {
        self.cpu_percent > HEAVY_PROCESS_THRESHOLD
    }
}

/// The eight probe fields, decoded but not yet combined with the process
/// listing
#[derive(Debug, Clone, PartialEq)]
pub struct ProbeFields {
    /// Active session user names, in reported order
    pub usernames: Vec<String>,
    /// Memory figures
    pub memory: MemoryInfo,
    /// Logical CPU count
    pub cpu_logical: u32,
    /// Physical core count, if the host can report it
    pub cpu_physical: Option<u32>,
    /// Frequency fields (`current`, `min`, `max`)
    pub cpu_frequency: BTreeMap<String, f64>,
    /// CPU time accounting fields
    pub cpu_times: BTreeMap<String, f64>,
    /// Overall CPU usage (0.0–100.0)
    pub cpu_percent: f64,
    /// Per logical core CPU usage
    pub cpu_percent_per_core: Vec<f64>,
}

/// A complete statistics snapshot of one host
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatsSnapshot {
    /// Active session user names, duplicates kept
    pub usernames: Vec<String>,
    /// Memory figures
    pub memory: MemoryInfo,
    /// Logical CPU count
    pub cpu_logical: u32,
    /// Physical core count, if the host can report it
    pub cpu_physical: Option<u32>,
    /// Frequency fields, informational
    pub cpu_frequency: BTreeMap<String, f64>,
    /// CPU time accounting fields, informational
    pub cpu_times: BTreeMap<String, f64>,
    /// Overall CPU usage (0.0–100.0)
    pub cpu_percent: f64,
    /// Per logical core CPU usage, one entry per logical CPU
    pub cpu_percent_per_core: Vec<f64>,
    /// Processes above [`HEAVY_PROCESS_THRESHOLD`], in listing order
    pub heavy_processes: Vec<ProcessEntry>,
    /// When the snapshot was assembled
    pub collected_at: DateTime<Utc>,
}

impl StatsSnapshot {
    /// Combines decoded probe fields with the filtered process list
    #[must_use]
    pub fn new(
        fields: ProbeFields,
        heavy_processes: Vec<ProcessEntry>,
        collected_at: DateTime<Utc>,
    ) -> Self {
        Self {
            usernames: fields.usernames,
            memory: fields.memory,
            cpu_logical: fields.cpu_logical,
            cpu_physical: fields.cpu_physical,
            cpu_frequency: fields.cpu_frequency,
            cpu_times: fields.cpu_times,
            cpu_percent: fields.cpu_percent,
            cpu_percent_per_core: fields.cpu_percent_per_core,
            heavy_processes,
            collected_at,
        }
    }
}
