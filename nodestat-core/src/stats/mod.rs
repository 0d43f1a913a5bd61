//! Host statistics: data model, literal decoder and parser

pub mod literal;
mod parser;
mod snapshot;

pub use parser::{PROBE_FIELDS, StatsParser};
pub use snapshot::{
    HEAVY_PROCESS_THRESHOLD, MemoryInfo, ProbeFields, ProcessEntry, StatsSnapshot,
};
