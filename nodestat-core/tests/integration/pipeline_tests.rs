//! Integration tests for the polling pipeline

use nodestat_core::poller::PollObserver;
use nodestat_core::{
    ConfigError, Emphasis, HostErrorPolicy, HostReport, NodestatConfig, NodestatError, ParseError,
    Poller, ProbeExecutor, ProcessEntry, SessionError, SshTarget, StatsPresenter, TransferError,
};
use secrecy::SecretString;

use super::fake::{FakeConnector, FakeHost, SCENARIO_A_PROBE};

fn target(host: &str) -> SshTarget {
    SshTarget::new(host, "alice", SecretString::from("secret".to_string()))
}

fn targets(hosts: &[&str]) -> Vec<SshTarget> {
    hosts.iter().map(|h| target(h)).collect()
}

/// Observer that records every callback
#[derive(Default)]
struct Recorder {
    started: Vec<String>,
    reports: Vec<HostReport>,
    skipped: Vec<String>,
}

impl PollObserver for Recorder {
    fn host_started(&mut self, host: &str) {
        self.started.push(host.to_string());
    }

    fn host_polled(&mut self, report: HostReport) {
        self.reports.push(report);
    }

    fn host_skipped(&mut self, host: &str, _error: &NodestatError) {
        self.skipped.push(host.to_string());
    }
}

// ========== Reference scenario ==========

#[tokio::test]
async fn scenario_a_end_to_end() {
    let connector = FakeConnector::new().with_host("node1", FakeHost::scenario_a());
    let poller = Poller::new(&connector, ProbeExecutor::default(), "");

    let report = poller.poll_host(target("node1")).await.unwrap();
    let snapshot = &report.snapshot;

    assert_eq!(report.host, "node1");
    assert_eq!(snapshot.usernames, vec!["alice", "bob"]);
    assert_eq!(
        snapshot.heavy_processes,
        vec![ProcessEntry {
            user: "alice".to_string(),
            command: "python job".to_string(),
            cpu_percent: 45.0,
        }]
    );
    assert!((snapshot.memory.percent - 60.0).abs() < f64::EPSILON);
    assert!((snapshot.cpu_percent - 30.0).abs() < f64::EPSILON);
    assert_eq!(snapshot.cpu_percent_per_core.len(), snapshot.cpu_logical as usize);

    let row = StatsPresenter::build_row(&report.host, snapshot, false);
    assert_eq!(row.cells.len(), StatsPresenter::headers(false).len());
    assert_eq!(row.cells[3].text(), "1000B");
    assert_eq!(row.cells[6].text(), "60.0");
    assert_eq!(row.cells[6].lines()[0][0].emphasis, Some(Emphasis::Critical));
    assert_eq!(row.cells[7].text(), "30.0");
    assert_eq!(row.cells[7].lines()[0][0].emphasis, Some(Emphasis::Warning));
    assert_eq!(row.cells[8].text(), "10.0 20.0 70.0 5.0");
    assert_eq!(row.cells[9].text(), "alice python job 45.0");
}

#[tokio::test]
async fn pipeline_call_order() {
    let connector = FakeConnector::new().with_host("node1", FakeHost::scenario_a());
    let poller = Poller::new(&connector, ProbeExecutor::new("python"), "/tmp/");

    poller.poll_host(target("node1")).await.unwrap();

    let events = connector.events();
    let probe_size = nodestat_core::probe::PROBE_SCRIPT.len();
    assert_eq!(
        events,
        vec![
            "connect node1".to_string(),
            format!("upload node1 /tmp/nodestat_probe.py {probe_size}"),
            "exec node1 python '/tmp/nodestat_probe.py'".to_string(),
            "remove node1 /tmp/nodestat_probe.py".to_string(),
            format!("exec node1 {}", nodestat_core::probe::PROCESS_LIST_COMMAND),
            "close-shell node1".to_string(),
            "close-transfer node1".to_string(),
            "close-files node1".to_string(),
        ]
    );
}

// ========== Authentication failure ==========

#[tokio::test]
async fn auth_failure_aborts_before_any_report() {
    let rejecting = FakeHost {
        reject_auth: true,
        ..FakeHost::scenario_a()
    };
    let connector = FakeConnector::new()
        .with_host("node1", rejecting)
        .with_host("node2", FakeHost::scenario_a())
        .with_host("node3", FakeHost::scenario_a());
    let poller =
        Poller::new(&connector, ProbeExecutor::default(), "").with_policy(HostErrorPolicy::Skip);

    let mut recorder = Recorder::default();
    let err = poller
        .run(targets(&["node1", "node2", "node3"]), &mut recorder)
        .await
        .unwrap_err();

    assert!(err.is_fatal());
    assert!(matches!(
        err,
        NodestatError::Session(SessionError::AuthenticationFailed { .. })
    ));
    assert!(recorder.reports.is_empty());
    assert!(recorder.skipped.is_empty());
    assert_eq!(recorder.started, vec!["node1"]);
    assert!(!connector.was_contacted("node2"));
    assert!(!connector.was_contacted("node3"));
}

#[tokio::test]
async fn auth_failure_after_successful_host() {
    let rejecting = FakeHost {
        reject_auth: true,
        ..FakeHost::default()
    };
    let connector = FakeConnector::new()
        .with_host("node1", FakeHost::scenario_a())
        .with_host("node2", rejecting)
        .with_host("node3", FakeHost::scenario_a());
    let poller = Poller::new(&connector, ProbeExecutor::default(), "");

    let mut reports = Vec::new();
    let mut on_report = |report: HostReport| reports.push(report.host);
    let result = poller
        .run(targets(&["node1", "node2", "node3"]), &mut on_report)
        .await;

    assert!(result.unwrap_err().is_fatal());
    assert_eq!(reports, vec!["node1"]);
    assert!(!connector.was_contacted("node3"));
}

// ========== Probe cleanup ==========

#[tokio::test]
async fn removal_attempted_when_probe_execution_fails() {
    let host = FakeHost {
        fail_probe_exec: true,
        ..FakeHost::scenario_a()
    };
    let connector = FakeConnector::new().with_host("node1", host);
    let poller = Poller::new(&connector, ProbeExecutor::default(), "");

    let err = poller.poll_host(target("node1")).await.unwrap_err();
    assert!(matches!(
        err,
        NodestatError::Session(SessionError::CommandFailed { .. })
    ));

    let events = connector.events();
    assert!(events.contains(&"remove node1 nodestat_probe.py".to_string()));
    // The process listing is not run after a failed probe
    assert_eq!(events.iter().filter(|e| e.starts_with("exec")).count(), 1);
    assert!(events.contains(&"close-files node1".to_string()));
}

#[tokio::test]
async fn removal_failure_is_not_fatal() {
    let host = FakeHost {
        fail_remove: true,
        ..FakeHost::scenario_a()
    };
    let connector = FakeConnector::new().with_host("node1", host);
    let poller = Poller::new(&connector, ProbeExecutor::default(), "");

    let report = poller.poll_host(target("node1")).await.unwrap();
    assert_eq!(report.snapshot.heavy_processes.len(), 1);
}

#[tokio::test]
async fn upload_failure_fails_the_poll() {
    let host = FakeHost {
        fail_upload: true,
        ..FakeHost::scenario_a()
    };
    let connector = FakeConnector::new().with_host("node1", host);
    let poller = Poller::new(&connector, ProbeExecutor::default(), "/readonly");

    let err = poller.poll_host(target("node1")).await.unwrap_err();
    assert!(matches!(
        err,
        NodestatError::Transfer(TransferError::Upload { .. })
    ));
    assert!(!err.is_fatal());

    let events = connector.events();
    assert!(!events.iter().any(|e| e.starts_with("exec")));
    assert!(!events.iter().any(|e| e.starts_with("remove")));
    assert!(events.contains(&"close-shell node1".to_string()));
}

#[tokio::test]
async fn nonzero_probe_exit_still_parsed() {
    let host = FakeHost {
        probe_exit: Some(1),
        ..FakeHost::scenario_a()
    };
    let connector = FakeConnector::new().with_host("node1", host);
    let poller = Poller::new(&connector, ProbeExecutor::default(), "");

    assert!(poller.poll_host(target("node1")).await.is_ok());
}

#[tokio::test]
async fn failed_process_listing_leaves_no_heavy_processes() {
    let host = FakeHost {
        fail_ps: true,
        ..FakeHost::scenario_a()
    };
    let connector = FakeConnector::new().with_host("node1", host);
    let poller = Poller::new(&connector, ProbeExecutor::default(), "");

    let report = poller.poll_host(target("node1")).await.unwrap();
    assert!(report.snapshot.heavy_processes.is_empty());
    assert_eq!(report.snapshot.usernames, vec!["alice", "bob"]);

    let row = StatsPresenter::build_row(&report.host, &report.snapshot, false);
    assert_eq!(row.cells[9].text(), "");
}

// ========== Malformed output ==========

#[tokio::test]
async fn malformed_process_line_is_a_parse_error() {
    let host = FakeHost::with_output(&SCENARIO_A_PROBE, &["aliceonly"]);
    let connector = FakeConnector::new().with_host("node1", host);
    let poller = Poller::new(&connector, ProbeExecutor::default(), "");

    let err = poller.poll_host(target("node1")).await.unwrap_err();
    match err {
        NodestatError::Parse(ParseError::ProcessLine { line, .. }) => {
            assert_eq!(line, "aliceonly");
        }
        other => panic!("unexpected error: {other}"),
    }
    // The session is still torn down
    assert!(
        connector
            .events()
            .contains(&"close-shell node1".to_string())
    );
}

#[tokio::test]
async fn short_probe_output_is_a_parse_error() {
    let host = FakeHost::with_output(&SCENARIO_A_PROBE[..6], &[]);
    let connector = FakeConnector::new().with_host("node1", host);
    let poller = Poller::new(&connector, ProbeExecutor::default(), "");

    let err = poller.poll_host(target("node1")).await.unwrap_err();
    assert!(matches!(
        err,
        NodestatError::Parse(ParseError::LineCount {
            expected: 8,
            actual: 6
        })
    ));
}

// ========== Host error policy ==========

#[tokio::test]
async fn abort_policy_stops_at_first_failure() {
    let refusing = FakeHost {
        refuse_connection: true,
        ..FakeHost::default()
    };
    let connector = FakeConnector::new()
        .with_host("node1", refusing)
        .with_host("node2", FakeHost::scenario_a());
    let poller = Poller::new(&connector, ProbeExecutor::default(), "");
    assert_eq!(poller.policy(), HostErrorPolicy::Abort);

    let mut recorder = Recorder::default();
    let err = poller
        .run(targets(&["node1", "node2"]), &mut recorder)
        .await
        .unwrap_err();

    assert!(!err.is_fatal());
    assert!(recorder.reports.is_empty());
    assert!(!connector.was_contacted("node2"));
}

#[tokio::test]
async fn skip_policy_continues_with_next_host() {
    let refusing = FakeHost {
        refuse_connection: true,
        ..FakeHost::default()
    };
    let connector = FakeConnector::new()
        .with_host("node1", refusing)
        .with_host("node2", FakeHost::scenario_a());
    let poller =
        Poller::new(&connector, ProbeExecutor::default(), "").with_policy(HostErrorPolicy::Skip);

    let mut recorder = Recorder::default();
    let summary = poller
        .run(targets(&["node1", "unknown", "node2"]), &mut recorder)
        .await
        .unwrap();

    assert_eq!(summary.polled, 1);
    assert_eq!(summary.failed, 2);
    assert_eq!(recorder.started, vec!["node1", "unknown", "node2"]);
    assert_eq!(recorder.skipped, vec!["node1", "unknown"]);
    assert_eq!(recorder.reports.len(), 1);
    assert_eq!(recorder.reports[0].host, "node2");
}

#[tokio::test]
async fn reports_arrive_in_host_order() {
    let connector = FakeConnector::new()
        .with_host("b", FakeHost::scenario_a())
        .with_host("a", FakeHost::scenario_a())
        .with_host("c", FakeHost::scenario_a());
    let poller = Poller::new(&connector, ProbeExecutor::default(), "");

    let mut recorder = Recorder::default();
    let summary = poller
        .run(targets(&["c", "a", "b"]), &mut recorder)
        .await
        .unwrap();

    assert_eq!(summary.polled, 3);
    let hosts: Vec<_> = recorder.reports.iter().map(|r| r.host.as_str()).collect();
    assert_eq!(hosts, vec!["c", "a", "b"]);

    // Each host is fully closed before the next one connects
    let events = connector.events();
    let close_c = events.iter().position(|e| e == "close-files c").unwrap();
    let connect_a = events.iter().position(|e| e == "connect a").unwrap();
    assert!(close_c < connect_a);
}

// ========== Construction from config ==========

#[test]
fn from_config_rejects_invalid_settings() {
    let connector = FakeConnector::new();
    let config = NodestatConfig {
        username: "alice".to_string(),
        ..NodestatConfig::default()
    };

    let err = Poller::from_config(&config, &connector).unwrap_err();
    assert!(matches!(
        err,
        NodestatError::Config(ConfigError::Missing("REMOTE_HOSTNAME_LIST"))
    ));
    assert!(!err.is_fatal());
}

#[tokio::test]
async fn from_config_carries_settings() {
    let connector = FakeConnector::new().with_host("node1", FakeHost::scenario_a());
    let config = NodestatConfig {
        hosts: vec!["node1".to_string()],
        username: "alice".to_string(),
        remote_path: "/var/tmp".to_string(),
        python: "python3.12".to_string(),
        host_error_policy: HostErrorPolicy::Skip,
        ..NodestatConfig::default()
    };

    let poller = Poller::from_config(&config, &connector).unwrap();
    assert_eq!(poller.policy(), HostErrorPolicy::Skip);

    poller.poll_host(target("node1")).await.unwrap();
    assert!(
        connector
            .events()
            .contains(&"exec node1 python3.12 '/var/tmp/nodestat_probe.py'".to_string())
    );
}
