//! Property-based tests for probe and process-listing parsing

use nodestat_core::StatsParser;
use nodestat_core::probe::RawProbeOutput;
use nodestat_core::stats::HEAVY_PROCESS_THRESHOLD;
use proptest::prelude::*;

/// Strategy for a user or command token without commas
fn arb_token() -> impl Strategy<Value = String> {
    "[a-z][a-z0-9_/ -]{0,12}"
}

/// Strategy for a CPU percentage with one decimal
fn arb_cpu() -> impl Strategy<Value = f64> {
    (0u32..=1000).prop_map(|tenths| f64::from(tenths) / 10.0)
}

/// Strategy for a process listing line padded with whitespace
fn arb_process_line() -> impl Strategy<Value = (String, String, f64, String)> {
    (arb_token(), arb_token(), arb_cpu(), " {0,3}").prop_map(|(user, command, cpu, pad)| {
        let line = format!("{pad}{user}{pad},{pad}{command},{pad}{cpu:.1}");
        (user, command, cpu, line)
    })
}

/// Builds eight probe lines for the given per-core values
fn probe_lines(per_core: &[f64]) -> Vec<String> {
    let overall = if per_core.is_empty() {
        0.0
    } else {
        per_core.iter().sum::<f64>() / per_core.len() as f64
    };
    vec![
        r#"["alice"]"#.to_string(),
        r#"{"total": 2048, "available": 1024, "used": 1024, "percent": 50.0}"#.to_string(),
        per_core.len().to_string(),
        "null".to_string(),
        "{}".to_string(),
        r#"{"user": 1.5, "system": 0.5}"#.to_string(),
        format!("{overall:?}"),
        serde_json::to_string(per_core).unwrap(),
    ]
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(100))]

    /// Heavy processes are exactly the lines above the threshold, in order,
    /// with trimmed fields
    #[test]
    fn prop_heavy_filter(lines in prop::collection::vec(arb_process_line(), 0..30)) {
        let raw: Vec<&str> = lines.iter().map(|(_, _, _, l)| l.as_str()).collect();
        let heavy = StatsParser::parse_processes(&raw).unwrap();

        let expected: Vec<_> = lines
            .iter()
            .filter(|(_, _, cpu, _)| *cpu > HEAVY_PROCESS_THRESHOLD)
            .collect();

        prop_assert_eq!(heavy.len(), expected.len());
        for (entry, (user, command, cpu, _)) in heavy.iter().zip(expected) {
            prop_assert_eq!(&entry.user, user.trim());
            prop_assert_eq!(&entry.command, command.trim());
            prop_assert!((entry.cpu_percent - cpu).abs() < 1e-9);
            prop_assert!(entry.cpu_percent > HEAVY_PROCESS_THRESHOLD);
        }
    }

    /// A line with a comma-free body never parses
    #[test]
    fn prop_line_without_commas_rejected(token in "[a-z0-9 .]{1,20}") {
        prop_assert!(StatsParser::parse_process_line(&token).is_err());
    }

    /// Valid probe output yields one per-core entry per logical CPU
    #[test]
    fn prop_per_core_matches_logical(per_core in prop::collection::vec(arb_cpu(), 1..64)) {
        let raw = RawProbeOutput {
            probe_lines: probe_lines(&per_core),
            process_lines: Vec::new(),
        };
        let snapshot = StatsParser::parse(&raw).unwrap();
        prop_assert_eq!(snapshot.cpu_percent_per_core.len(), snapshot.cpu_logical as usize);
        prop_assert_eq!(snapshot.cpu_percent_per_core, per_core);
    }

    /// Dropping any probe line is a parse error
    #[test]
    fn prop_missing_line_rejected(per_core in prop::collection::vec(arb_cpu(), 1..8), drop in 0usize..8) {
        let mut lines = probe_lines(&per_core);
        lines.remove(drop);
        prop_assert!(StatsParser::parse_probe(&lines).is_err());
    }
}
