//! `vrfcheck run` command handler

use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::Serialize;
use tracing::info;

use vrfcheck_conformance::{
    ConformanceConfigBuilder, ConformanceSuite, KubePlatform, ScenarioReport, SuiteReport,
};
use vrfcheck_core::config::VrfCheckConfig;

use crate::cli::RunArgs;
use crate::error::CliError;
use crate::output::{OutputWriter, Render};

/// Execute the `run` command.
pub async fn execute(
    args: RunArgs,
    config_path: &Path,
    writer: &OutputWriter,
) -> Result<(), CliError> {
    let config = VrfCheckConfig::load_or_default(config_path).await?;
    let kubeconfig = kubeconfig_path(args.kubeconfig.as_deref(), &config.cluster.kubeconfig);

    let mut builder = ConformanceConfigBuilder::from_core(config).keep_workloads(args.keep_workloads);
    if let Some(namespace) = &args.namespace {
        builder = builder.namespace(namespace.as_str());
    }
    if let Some(node) = &args.node {
        builder = builder.node_name(node.as_str());
    }
    let conformance = builder.build()?;

    let platform = match &kubeconfig {
        Some(path) => KubePlatform::from_kubeconfig(path).await?,
        None => KubePlatform::try_default().await?,
    };
    let platform = Arc::new(platform);

    let families = args.families();
    info!(
        families = ?families,
        namespace = conformance.namespace.as_str(),
        "starting conformance run"
    );

    let suite = ConformanceSuite::new(Arc::clone(&platform), platform, conformance);
    let report = RunReport {
        suite: suite.run(&families).await?,
    };

    writer.render(&report)?;

    if report.suite.has_failures() {
        return Err(CliError::ScenarioFailed {
            failed: report.suite.failed(),
            total: report.suite.scenarios.len(),
        });
    }
    Ok(())
}

/// `--kubeconfig` wins over `cluster.kubeconfig`; neither means client defaults.
fn kubeconfig_path(flag: Option<&Path>, configured: &str) -> Option<PathBuf> {
    match flag {
        Some(path) => Some(path.to_path_buf()),
        None if !configured.is_empty() => Some(PathBuf::from(configured)),
        None => None,
    }
}

/// Run result wrapper.
#[derive(Serialize)]
pub struct RunReport {
    #[serde(flatten)]
    pub suite: SuiteReport,
}

impl Render for RunReport {
    fn render_text(&self, w: &mut dyn Write) -> std::io::Result<()> {
        use colored::Colorize;

        writeln!(
            w,
            "VRF conformance (namespace: {}, node: {})",
            self.suite.namespace.bold(),
            self.suite.node_name.bold()
        )?;
        writeln!(w)?;

        for scenario in &self.suite.scenarios {
            render_scenario(scenario, w)?;
        }

        writeln!(
            w,
            "Summary: {} passed, {} failed, {} skipped",
            self.suite.passed().to_string().green(),
            self.suite.failed().to_string().red(),
            self.suite.skipped().to_string().yellow()
        )?;
        Ok(())
    }
}

fn render_scenario(scenario: &ScenarioReport, w: &mut dyn Write) -> std::io::Result<()> {
    use colored::Colorize;

    let tag = format!("[{}]", scenario.outcome);
    let tag = if scenario.passed() {
        tag.green().bold()
    } else if scenario.failed() {
        tag.red().bold()
    } else {
        tag.yellow().bold()
    };

    writeln!(
        w,
        "{tag} {} (run {}, {} ms)",
        scenario.family, scenario.run_id, scenario.duration_ms
    )?;

    let path = scenario
        .states()
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(" -> ");
    writeln!(w, "  States: {path}")?;

    if let Some(state) = scenario.failed_state {
        writeln!(
            w,
            "  Failed in: {} ({})",
            state.to_string().red(),
            scenario.error_kind.unwrap_or("unknown")
        )?;
    }
    if let Some(error) = &scenario.error {
        writeln!(w, "  Error: {}", error.red())?;
    }
    if let Some(reason) = &scenario.skip_reason {
        writeln!(w, "  Reason: {reason}")?;
    }
    writeln!(w)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use vrfcheck_conformance::{ScenarioOutcome, ScenarioState, SkipReason, StateTransition};
    use vrfcheck_core::types::IpFamily;

    use super::*;

    fn transitions(states: &[ScenarioState]) -> Vec<StateTransition> {
        states
            .iter()
            .enumerate()
            .map(|(i, state)| StateTransition {
                state: *state,
                elapsed_ms: i as u64 * 100,
            })
            .collect()
    }

    fn sample_report() -> RunReport {
        let passed = ScenarioReport {
            run_id: "a1b2c3".to_owned(),
            family: IpFamily::Ipv4,
            outcome: ScenarioOutcome::Passed,
            transitions: transitions(&[
                ScenarioState::Init,
                ScenarioState::StackCheck,
                ScenarioState::Done,
            ]),
            failed_state: None,
            error_kind: None,
            error: None,
            skip_reason: None,
            duration_ms: 42_000,
        };
        let failed = ScenarioReport {
            run_id: "d4e5f6".to_owned(),
            family: IpFamily::Ipv4,
            outcome: ScenarioOutcome::Failed,
            transitions: transitions(&[
                ScenarioState::Init,
                ScenarioState::StackCheck,
                ScenarioState::Provisioned,
                ScenarioState::Failed,
            ]),
            failed_state: Some(ScenarioState::Provisioned),
            error_kind: Some("workload_timeout"),
            error: Some("workload server-vrf-x not running after 300s".to_owned()),
            skip_reason: None,
            duration_ms: 300_000,
        };
        let skipped = ScenarioReport {
            run_id: "0789ab".to_owned(),
            family: IpFamily::Ipv6,
            outcome: ScenarioOutcome::Skipped,
            transitions: transitions(&[
                ScenarioState::Init,
                ScenarioState::StackCheck,
                ScenarioState::Skipped,
            ]),
            failed_state: None,
            error_kind: None,
            error: None,
            skip_reason: Some(SkipReason::Unsupported {
                family: IpFamily::Ipv6,
            }),
            duration_ms: 5,
        };

        RunReport {
            suite: SuiteReport {
                namespace: "vrf-testing".to_owned(),
                node_name: "worker-0".to_owned(),
                scenarios: vec![passed, failed, skipped],
            },
        }
    }

    #[test]
    fn test_kubeconfig_flag_wins() {
        let path = kubeconfig_path(Some(Path::new("/tmp/flag")), "/etc/kubeconfig");
        assert_eq!(path, Some(PathBuf::from("/tmp/flag")));
    }

    #[test]
    fn test_kubeconfig_from_config() {
        let path = kubeconfig_path(None, "/etc/kubeconfig");
        assert_eq!(path, Some(PathBuf::from("/etc/kubeconfig")));
        assert_eq!(kubeconfig_path(None, ""), None);
    }

    #[test]
    fn test_run_report_text() {
        let report = sample_report();
        let mut buffer = Vec::new();
        report.render_text(&mut buffer).expect("text rendering should succeed");
        let output = String::from_utf8(buffer).expect("valid UTF-8");

        assert!(output.contains("[PASS]"));
        assert!(output.contains("[FAIL]"));
        assert!(output.contains("[SKIP]"));
        assert!(output.contains("Init -> StackCheck -> Done"));
        assert!(output.contains("Provisioned"));
        assert!(output.contains("workload_timeout"));
        assert!(output.contains("unsupported protocol parameter: ipv6"));
        assert!(output.contains("worker-0"));
    }

    #[test]
    fn test_run_report_json() {
        let report = sample_report();
        let json = serde_json::to_value(&report).expect("JSON serialization should succeed");

        assert_eq!(json["namespace"], "vrf-testing");
        let scenarios = json["scenarios"].as_array().expect("scenarios array");
        assert_eq!(scenarios.len(), 3);
        assert_eq!(scenarios[0]["outcome"], "passed");
        assert_eq!(scenarios[1]["failed_state"], "provisioned");
        assert_eq!(scenarios[1]["error_kind"], "workload_timeout");
        assert_eq!(scenarios[2]["skip_reason"]["reason"], "unsupported");
        assert!(scenarios[0].get("error").is_none());
    }
}
