//! Property-based tests for row building and emphasis

use std::collections::BTreeMap;

use chrono::Utc;
use nodestat_core::presenter::{CORES_PER_LINE, CoreSlot, format_bytes_human, wrap_per_core};
use nodestat_core::{Emphasis, MemoryInfo, ProcessEntry, StatsPresenter, StatsSnapshot};
use proptest::prelude::*;

fn arb_percent() -> impl Strategy<Value = f64> {
    0.0f64..=100.0
}

fn arb_snapshot() -> impl Strategy<Value = StatsSnapshot> {
    (
        prop::collection::vec("[a-z]{1,8}", 0..7),
        any::<u64>(),
        arb_percent(),
        prop::collection::vec(arb_percent(), 1..40),
        prop::collection::vec(("[a-z]{1,8}", "[a-z]{1,8}", 10.1f64..100.0), 0..5),
    )
        .prop_map(|(usernames, total, percent, per_core, processes)| StatsSnapshot {
            usernames,
            memory: MemoryInfo {
                total,
                available: total / 2,
                used: total / 2,
                percent,
                extra: BTreeMap::new(),
            },
            cpu_logical: per_core.len() as u32,
            cpu_physical: None,
            cpu_frequency: BTreeMap::new(),
            cpu_times: BTreeMap::new(),
            cpu_percent: percent,
            cpu_percent_per_core: per_core,
            heavy_processes: processes
                .into_iter()
                .map(|(user, command, cpu_percent)| ProcessEntry {
                    user,
                    command,
                    cpu_percent,
                })
                .collect(),
            collected_at: Utc::now(),
        })
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(100))]

    /// Every row has one cell per header in both modes
    #[test]
    fn prop_row_matches_headers(snapshot in arb_snapshot(), short in any::<bool>()) {
        let row = StatsPresenter::build_row("node1", &snapshot, short);
        prop_assert_eq!(row.cells.len(), StatsPresenter::headers(short).len());
    }

    /// Emphasis depends only on the thresholds
    #[test]
    fn prop_emphasis_thresholds(value in -10.0f64..110.0) {
        let expected = if value > 50.0 {
            Emphasis::Critical
        } else if value > 25.0 {
            Emphasis::Warning
        } else {
            Emphasis::Normal
        };
        prop_assert_eq!(Emphasis::for_percent(value), expected);
    }

    /// Per-core lines are always full, padding only closes the last line
    #[test]
    fn prop_per_core_padding(values in prop::collection::vec(arb_percent(), 0..70)) {
        let lines = wrap_per_core(&values);
        prop_assert_eq!(lines.len(), values.len().div_ceil(CORES_PER_LINE));

        for (i, line) in lines.iter().enumerate() {
            prop_assert_eq!(line.len(), CORES_PER_LINE);
            if i + 1 < lines.len() {
                prop_assert!(!line.contains(&CoreSlot::Padding));
            }
        }

        let flattened: Vec<f64> = lines
            .iter()
            .flatten()
            .filter_map(|slot| match slot {
                CoreSlot::Value(v) => Some(*v),
                CoreSlot::Padding => None,
            })
            .collect();
        prop_assert_eq!(flattened, values);
    }

    /// Padding never carries a usage emphasis
    #[test]
    fn prop_padding_is_hidden(values in prop::collection::vec(arb_percent(), 1..10)) {
        for slot in wrap_per_core(&values).into_iter().flatten() {
            let span = slot.span();
            if slot == CoreSlot::Padding {
                prop_assert_eq!(span.emphasis, Some(Emphasis::Hidden));
                prop_assert_eq!(span.text.as_str(), "0.0");
            } else {
                prop_assert_ne!(span.emphasis, Some(Emphasis::Hidden));
            }
        }
    }

    /// Human-readable sizes use one decimal and a unit, or plain bytes
    #[test]
    fn prop_bytes_human_format(bytes in any::<u64>()) {
        let text = format_bytes_human(bytes);
        if bytes < 1024 {
            let expected = format!("{bytes}B");
            prop_assert_eq!(text, expected);
        } else {
            let unit = text.chars().last().unwrap();
            prop_assert!("KMGTPE".contains(unit));
            let number: f64 = text[..text.len() - 1].parse().unwrap();
            prop_assert!((1.0..=1024.0).contains(&number));
            prop_assert_eq!(text.split('.').nth(1).map(str::len), Some(2));
        }
    }
}
