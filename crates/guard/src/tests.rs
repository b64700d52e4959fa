use std::{
    io,
    path::PathBuf,
    sync::{Arc, Mutex},
};

use mockall::{Sequence, mock};
use types::GuardConfig;

use super::*;

#[derive(Debug)]
struct FakeLocator {
    available: Vec<&'static str>,
    probes: Mutex<Vec<String>>,
}

impl FakeLocator {
    fn with_tools(available: &[&'static str]) -> Arc<Self> {
        Arc::new(Self {
            available: available.to_vec(),
            probes: Mutex::new(Vec::new()),
        })
    }

    fn probes(&self) -> Vec<String> {
        self.probes
            .lock()
            .expect("probe records mutex should not be poisoned")
            .clone()
    }
}

impl ExecutableLocator for FakeLocator {
    fn which(&self, program: &str) -> Option<PathBuf> {
        self.probes
            .lock()
            .expect("probe records mutex should not be poisoned")
            .push(program.to_owned());
        self.available
            .iter()
            .any(|tool| *tool == program)
            .then(|| PathBuf::from("/usr/sbin").join(program))
    }
}

#[derive(Debug, Clone, Copy)]
enum FailureMode {
    ExitStatus(i32),
    Spawn,
}

#[derive(Debug, Default)]
struct RecordingExecutor {
    calls: Mutex<Vec<(Vec<&'static str>, bool)>>,
    fail_at: Option<(usize, FailureMode)>,
}

impl RecordingExecutor {
    fn failing_at(index: usize, mode: FailureMode) -> Arc<Self> {
        Arc::new(Self {
            calls: Mutex::new(Vec::new()),
            fail_at: Some((index, mode)),
        })
    }

    fn calls(&self) -> Vec<(Vec<&'static str>, bool)> {
        self.calls
            .lock()
            .expect("call records mutex should not be poisoned")
            .clone()
    }

    fn argvs(&self) -> Vec<String> {
        self.calls()
            .into_iter()
            .map(|(argv, _)| argv.join(" "))
            .collect()
    }
}

impl CommandExecutor for RecordingExecutor {
    fn execute(&self, request: ExecRequest<'_>) -> Result<ExecOutput, ExecError> {
        let mut calls = self
            .calls
            .lock()
            .expect("call records mutex should not be poisoned");
        let index = calls.len();
        calls.push((request.command.argv(), request.capture));

        match self.fail_at {
            Some((fail_index, FailureMode::ExitStatus(code))) if fail_index == index => {
                Err(ExecError::ExitStatus {
                    command: request.command.to_string(),
                    code,
                    stderr: None,
                })
            }
            Some((fail_index, FailureMode::Spawn)) if fail_index == index => {
                Err(ExecError::Spawn {
                    command: request.command.to_string(),
                    source: io::Error::new(io::ErrorKind::PermissionDenied, "permission denied"),
                })
            }
            _ => Ok(ExecOutput {
                status_code: Some(0),
                ..ExecOutput::default()
            }),
        }
    }
}

#[derive(Debug, Default)]
struct RecordingDiagnostics {
    events: Mutex<Vec<GuardEvent>>,
}

impl RecordingDiagnostics {
    fn events(&self) -> Vec<GuardEvent> {
        self.events
            .lock()
            .expect("event records mutex should not be poisoned")
            .clone()
    }

    fn count_at(&self, level: DiagnosticLevel) -> usize {
        self.events()
            .iter()
            .filter(|event| event.level() == level)
            .count()
    }
}

impl Diagnostics for RecordingDiagnostics {
    fn emit(&self, event: GuardEvent) {
        self.events
            .lock()
            .expect("event records mutex should not be poisoned")
            .push(event);
    }
}

struct Harness {
    locator: Arc<FakeLocator>,
    executor: Arc<RecordingExecutor>,
    diagnostics: Arc<RecordingDiagnostics>,
    action: DisableEc2Metadata,
}

impl Harness {
    fn new(available: &[&'static str]) -> Self {
        Self::with_executor(available, Arc::new(RecordingExecutor::default()))
    }

    fn with_executor(available: &[&'static str], executor: Arc<RecordingExecutor>) -> Self {
        let locator = FakeLocator::with_tools(available);
        let diagnostics = Arc::new(RecordingDiagnostics::default());
        let action = DisableEc2Metadata::new(locator.clone(), executor.clone(), diagnostics.clone());
        Self {
            locator,
            executor,
            diagnostics,
            action,
        }
    }
}

fn enabled() -> GuardConfig {
    GuardConfig::with_disable_ec2_metadata(true)
}

mock! {
    Locator {}
    impl ExecutableLocator for Locator {
        fn which(&self, program: &str) -> Option<PathBuf>;
    }
}

impl std::fmt::Debug for MockLocator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MockLocator").finish_non_exhaustive()
    }
}

#[test]
fn disabled_flag_skips_without_probing_or_executing() {
    let harness = Harness::new(&["ip", "ifconfig"]);

    let outcome = harness
        .action
        .handle("foo", &GuardConfig::with_disable_ec2_metadata(false))
        .expect("disabled action should not fail");

    assert_eq!(outcome, BlockOutcome::Skipped);
    assert!(harness.locator.probes().is_empty());
    assert!(harness.executor.calls().is_empty());
    assert_eq!(
        harness.diagnostics.events(),
        vec![GuardEvent::Skipped {
            module: "foo".to_owned(),
        }]
    );
    assert_eq!(harness.diagnostics.count_at(DiagnosticLevel::Debug), 1);
}

#[test]
fn absent_flag_behaves_like_disabled() {
    let harness = Harness::new(&["ip"]);

    let outcome = harness
        .action
        .handle(MODULE_NAME, &GuardConfig::default())
        .expect("absent flag should not fail");

    assert_eq!(outcome, BlockOutcome::Skipped);
    assert!(harness.locator.probes().is_empty());
    assert!(harness.executor.calls().is_empty());
    assert_eq!(harness.diagnostics.events().len(), 1);
}

#[test]
fn ip_only_host_runs_ip_commands_in_order_without_capture() {
    let harness = Harness::new(&["ip"]);

    let outcome = harness
        .action
        .handle(MODULE_NAME, &enabled())
        .expect("ip route install should succeed");

    assert_eq!(
        outcome,
        BlockOutcome::Blocked {
            tool: ToolKind::IpRoute,
        }
    );
    assert_eq!(
        harness.executor.calls(),
        vec![
            (vec!["ip", "route", "add", "prohibit", "169.254.169.254"], false),
            (
                vec!["ip", "-6", "route", "add", "prohibit", "fd00:ec2::254"],
                false
            ),
        ]
    );
    assert_eq!(harness.locator.probes(), ["ip"]);
    assert_eq!(harness.diagnostics.count_at(DiagnosticLevel::Error), 0);
}

#[test]
fn legacy_only_host_runs_route_commands_in_order() {
    let harness = Harness::new(&["ifconfig"]);

    let outcome = harness
        .action
        .handle(MODULE_NAME, &enabled())
        .expect("route install should succeed");

    assert_eq!(
        outcome,
        BlockOutcome::Blocked {
            tool: ToolKind::RouteTable,
        }
    );
    assert_eq!(
        harness.executor.argvs(),
        [
            "route add -host 169.254.169.254 reject",
            "route -6 add -host fd00:ec2::254 reject",
        ]
    );
    assert!(harness.executor.calls().iter().all(|(_, capture)| !capture));
    assert_eq!(harness.locator.probes(), ["ip", "ifconfig"]);
    assert_eq!(
        harness.diagnostics.events(),
        vec![GuardEvent::RoutesBlocked {
            tool: ToolKind::RouteTable,
        }]
    );
}

#[test]
fn ip_wins_when_both_tools_are_present() {
    let harness = Harness::new(&["ifconfig", "ip"]);

    let outcome = harness
        .action
        .handle(MODULE_NAME, &enabled())
        .expect("install should succeed");

    assert_eq!(
        outcome,
        BlockOutcome::Blocked {
            tool: ToolKind::IpRoute,
        }
    );
    assert_eq!(
        harness.executor.argvs(),
        [
            "ip route add prohibit 169.254.169.254",
            "ip -6 route add prohibit fd00:ec2::254",
        ]
    );
}

#[test]
fn missing_tools_probe_both_and_report_one_error() {
    let harness = Harness::new(&[]);

    let outcome = harness
        .action
        .handle(MODULE_NAME, &enabled())
        .expect("missing tools should not be an error");

    assert_eq!(
        outcome,
        BlockOutcome::NoRoutingTool {
            checked: vec!["ip", "ifconfig"],
        }
    );
    assert_eq!(harness.locator.probes(), ["ip", "ifconfig"]);
    assert!(harness.executor.calls().is_empty());
    assert_eq!(harness.diagnostics.count_at(DiagnosticLevel::Error), 1);
    assert_eq!(harness.diagnostics.events().len(), 1);
}

#[test]
fn duplicate_route_failure_propagates_and_stops_the_sequence() {
    let harness = Harness::with_executor(
        &["ip"],
        RecordingExecutor::failing_at(0, FailureMode::ExitStatus(2)),
    );

    let error = harness
        .action
        .handle(MODULE_NAME, &enabled())
        .expect_err("existing route should surface as an error");

    match error {
        GuardError::Exec(ExecError::ExitStatus { command, code, .. }) => {
            assert_eq!(command, "ip route add prohibit 169.254.169.254");
            assert_eq!(code, 2);
        }
        other => panic!("unexpected error: {other:?}"),
    }
    assert_eq!(
        harness.executor.argvs(),
        ["ip route add prohibit 169.254.169.254"]
    );
    assert!(harness.diagnostics.events().is_empty());
}

#[test]
fn ipv6_failure_is_returned_after_ipv4_ran() {
    let harness = Harness::with_executor(
        &["ifconfig"],
        RecordingExecutor::failing_at(1, FailureMode::Spawn),
    );

    let error = harness
        .action
        .handle(MODULE_NAME, &enabled())
        .expect_err("spawn failure should surface");

    assert!(matches!(error, GuardError::Exec(ExecError::Spawn { .. })));
    assert_eq!(harness.executor.calls().len(), 2);
    assert_eq!(
        error.to_string(),
        "failed to spawn `route -6 add -host fd00:ec2::254 reject`: permission denied"
    );
}

#[test]
fn each_invocation_probes_again() {
    let harness = Harness::new(&["ip"]);

    for _ in 0..2 {
        harness
            .action
            .handle(MODULE_NAME, &enabled())
            .expect("install should succeed");
    }

    assert_eq!(harness.locator.probes(), ["ip", "ip"]);
    assert_eq!(harness.executor.calls().len(), 4);
}

#[test]
fn probes_follow_priority_order() {
    let mut locator = MockLocator::new();
    let mut sequence = Sequence::new();
    locator
        .expect_which()
        .withf(|program| program == "ip")
        .times(1)
        .in_sequence(&mut sequence)
        .returning(|_| None);
    locator
        .expect_which()
        .withf(|program| program == "ifconfig")
        .times(1)
        .in_sequence(&mut sequence)
        .returning(|_| None);

    let selection = select_tool(&locator);

    assert_eq!(
        selection,
        ToolSelection::NotFound {
            checked: vec!["ip", "ifconfig"],
        }
    );
}

#[test]
fn legacy_probe_is_skipped_once_ip_resolves() {
    let mut locator = MockLocator::new();
    locator
        .expect_which()
        .withf(|program| program == "ip")
        .times(1)
        .returning(|_| Some(PathBuf::from("/usr/bin/ip")));
    locator
        .expect_which()
        .withf(|program| program == "ifconfig")
        .times(0);

    assert_eq!(select_tool(&locator), ToolSelection::Found(ToolKind::IpRoute));
}

#[test]
fn module_meta_describes_an_every_boot_module() {
    let action = DisableEc2Metadata::for_host();
    let meta = action.meta();

    assert_eq!(meta.id, "cc_disable_ec2_metadata");
    assert_ne!(meta.id, MODULE_NAME);
    assert_eq!(meta.frequency, types::ModuleFrequency::Always);
    assert_eq!(meta.distros, [types::ALL_DISTROS]);
    assert!(meta.activates(&GuardConfig::with_disable_ec2_metadata(false)));
    assert!(!meta.activates(&GuardConfig::default()));
}
