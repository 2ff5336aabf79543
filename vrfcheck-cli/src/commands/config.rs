//! `vrfcheck config` command handler

use std::io::Write;
use std::path::Path;

use serde::Serialize;
use tracing::info;

use vrfcheck_core::config::VrfCheckConfig;

use crate::cli::{ConfigAction, ConfigArgs};
use crate::error::CliError;
use crate::output::{OutputWriter, Render};

/// Section names accepted by `config show --section`.
pub const SECTIONS: [&str; 4] = ["general", "cluster", "scenario", "timing"];

/// Execute the `config` command.
pub async fn execute(
    args: ConfigArgs,
    config_path: &Path,
    writer: &OutputWriter,
) -> Result<(), CliError> {
    match args.action {
        ConfigAction::Validate => execute_validate(config_path, writer).await,
        ConfigAction::Show { section } => execute_show(config_path, section, writer).await,
    }
}

/// Load the file strictly (a missing file is an error) and report the result.
async fn execute_validate(config_path: &Path, writer: &OutputWriter) -> Result<(), CliError> {
    info!(path = %config_path.display(), "validating configuration");

    let report = match VrfCheckConfig::load(config_path).await {
        Ok(_) => ConfigValidationReport {
            source: config_path.display().to_string(),
            valid: true,
            errors: Vec::new(),
        },
        Err(e) => ConfigValidationReport {
            source: config_path.display().to_string(),
            valid: false,
            errors: vec![e.to_string()],
        },
    };

    writer.render(&report)?;

    if !report.valid {
        return Err(CliError::Config("configuration is invalid".to_owned()));
    }
    Ok(())
}

/// Show the effective configuration (defaults < file < environment).
async fn execute_show(
    config_path: &Path,
    section: Option<String>,
    writer: &OutputWriter,
) -> Result<(), CliError> {
    info!(path = %config_path.display(), "loading configuration");

    let config = VrfCheckConfig::load_or_default(config_path).await?;
    let report = build_config_report(&config, &config_path.display().to_string(), section)?;
    writer.render(&report)
}

/// Serialize the whole configuration or one section.
pub fn build_config_report(
    config: &VrfCheckConfig,
    source: &str,
    section: Option<String>,
) -> Result<ConfigReport, CliError> {
    let (config_toml, value) = match section.as_deref() {
        None => (to_toml(config), serde_json::to_value(config)?),
        Some("general") => (to_toml(&config.general), serde_json::to_value(&config.general)?),
        Some("cluster") => (to_toml(&config.cluster), serde_json::to_value(&config.cluster)?),
        Some("scenario") => (to_toml(&config.scenario), serde_json::to_value(&config.scenario)?),
        Some("timing") => (to_toml(&config.timing), serde_json::to_value(&config.timing)?),
        Some(other) => {
            return Err(CliError::Command(format!(
                "unknown section: {other} (expected: {})",
                SECTIONS.join(", ")
            )));
        }
    };

    Ok(ConfigReport {
        source: source.to_owned(),
        section,
        config: value,
        config_toml,
    })
}

fn to_toml<T: Serialize>(value: &T) -> String {
    toml::to_string_pretty(value).unwrap_or_else(|e| format!("(serialization error: {e})"))
}

/// Effective configuration display.
#[derive(Serialize)]
pub struct ConfigReport {
    pub source: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub section: Option<String>,
    pub config: serde_json::Value,
    /// Text rendering only
    #[serde(skip)]
    pub config_toml: String,
}

impl Render for ConfigReport {
    fn render_text(&self, w: &mut dyn Write) -> std::io::Result<()> {
        use colored::Colorize;

        if let Some(section) = &self.section {
            let label = format!("[{section}]");
            writeln!(w, "Configuration {} (source: {})", label.bold(), self.source)?;
        } else {
            writeln!(w, "Configuration (source: {})", self.source.bold())?;
        }

        writeln!(w)?;
        write!(w, "{}", self.config_toml)?;
        Ok(())
    }
}

/// Configuration validation result.
#[derive(Serialize)]
pub struct ConfigValidationReport {
    pub source: String,
    pub valid: bool,
    pub errors: Vec<String>,
}

impl Render for ConfigValidationReport {
    fn render_text(&self, w: &mut dyn Write) -> std::io::Result<()> {
        use colored::Colorize;

        writeln!(w, "Config Validation: {}", self.source.bold())?;
        if self.valid {
            writeln!(w, "  Result: {}", "VALID".green().bold())?;
        } else {
            writeln!(w, "  Result: {}", "INVALID".red().bold())?;
            for err in &self.errors {
                writeln!(w, "  Error: {}", err.red())?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn render(report: &impl Render) -> String {
        let mut buffer = Vec::new();
        report
            .render_text(&mut buffer)
            .expect("text rendering should succeed");
        String::from_utf8(buffer).expect("valid UTF-8")
    }

    #[test]
    fn test_full_report_contains_every_section() {
        let report = build_config_report(&VrfCheckConfig::default(), "vrfcheck.toml", None)
            .expect("default config should serialize");
        assert!(report.section.is_none());
        for section in SECTIONS {
            assert!(
                report.config_toml.contains(&format!("[{section}]")),
                "missing [{section}]"
            );
        }
        assert_eq!(report.config["scenario"]["primary_vrf"], "blue");
    }

    #[test]
    fn test_section_report_is_limited_to_section() {
        let report = build_config_report(
            &VrfCheckConfig::default(),
            "vrfcheck.toml",
            Some("timing".to_owned()),
        )
        .expect("timing section should serialize");
        assert!(report.config_toml.contains("scenario_timeout_secs = 1200"));
        assert!(!report.config_toml.contains("primary_vrf"));
        assert_eq!(report.config["reachability_poll_secs"], 5);

        let output = render(&report);
        assert!(output.contains("[timing]"));
        assert!(output.contains("vrfcheck.toml"));
    }

    #[test]
    fn test_unknown_section_is_rejected() {
        let result = build_config_report(
            &VrfCheckConfig::default(),
            "vrfcheck.toml",
            Some("bogus".to_owned()),
        );
        match result {
            Err(CliError::Command(msg)) => {
                assert!(msg.contains("unknown section: bogus"));
                assert!(msg.contains("general, cluster, scenario, timing"));
            }
            _ => panic!("expected Command error"),
        }
    }

    #[test]
    fn test_config_report_json_skips_toml_text() {
        let report = build_config_report(
            &VrfCheckConfig::default(),
            "vrfcheck.toml",
            Some("cluster".to_owned()),
        )
        .expect("cluster section should serialize");
        let json = serde_json::to_value(&report).expect("JSON serialization should succeed");
        assert_eq!(json["section"], "cluster");
        assert_eq!(json["config"]["namespace"], "vrf-testing");
        assert!(json.get("config_toml").is_none());
    }

    #[test]
    fn test_validation_report_render() {
        let valid = ConfigValidationReport {
            source: "vrfcheck.toml".to_owned(),
            valid: true,
            errors: Vec::new(),
        };
        let output = render(&valid);
        assert!(output.contains("VALID"));
        assert!(!output.contains("Error:"));

        let invalid = ConfigValidationReport {
            source: "bad.toml".to_owned(),
            valid: false,
            errors: vec!["invalid config value for 'scenario.secondary_vrf'".to_owned()],
        };
        let output = render(&invalid);
        assert!(output.contains("INVALID"));
        assert!(output.contains("scenario.secondary_vrf"));
    }
}
