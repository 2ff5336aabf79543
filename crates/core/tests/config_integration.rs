//! vrfcheck.toml 통합 설정 테스트
//!
//! - vrfcheck.toml.example 파싱 테스트
//! - 파일 로딩 / 파일 없음 폴백 테스트
//! - 환경변수 우선순위 테스트

use std::fs;

use tempfile::TempDir;
use vrfcheck_core::config::VrfCheckConfig;
use vrfcheck_core::error::{ConfigError, VrfCheckError};
use vrfcheck_core::types::IpFamily;

// =============================================================================
// vrfcheck.toml.example 파싱 테스트
// =============================================================================

#[test]
fn example_config_parses_successfully() {
    let content = include_str!("../../../vrfcheck.toml.example");
    let config = VrfCheckConfig::parse(content).expect("example config should parse");

    assert_eq!(config.general.log_level, "info");
    assert_eq!(config.general.log_format, "json");
    assert_eq!(config.cluster.namespace, "vrf-testing");
    assert_eq!(config.scenario.primary_vrf, "blue");
    assert_eq!(config.scenario.secondary_vrf, "red");
}

#[test]
fn example_config_passes_validation() {
    let content = include_str!("../../../vrfcheck.toml.example");
    let config = VrfCheckConfig::parse(content).expect("should parse");
    config
        .validate()
        .expect("example config should pass validation");
}

#[test]
fn example_config_matches_defaults() {
    let content = include_str!("../../../vrfcheck.toml.example");
    let config = VrfCheckConfig::parse(content).expect("should parse");
    let defaults = VrfCheckConfig::default();

    assert_eq!(config.scenario.ipv4.client, defaults.scenario.ipv4.client);
    assert_eq!(config.scenario.ipv4.server, defaults.scenario.ipv4.server);
    assert_eq!(config.scenario.macs.client_primary, defaults.scenario.macs.client_primary);
    assert_eq!(
        config.timing.reachability_poll_secs,
        defaults.timing.reachability_poll_secs
    );
    assert_eq!(
        config.scenario.families().expect("families"),
        vec![IpFamily::Ipv4]
    );
}

// =============================================================================
// 파일 로딩 테스트
// =============================================================================

#[tokio::test]
async fn load_reads_file() {
    let dir = TempDir::new().expect("temp dir");
    let path = dir.path().join("vrfcheck.toml");
    fs::write(
        &path,
        r#"
[cluster]
namespace = "vrf-e2e"
node_name = "worker-0"
"#,
    )
    .expect("write config");

    let config = VrfCheckConfig::from_file(&path).await.expect("should load");
    assert_eq!(config.cluster.namespace, "vrf-e2e");
    assert_eq!(config.cluster.node_name, "worker-0");
}

#[tokio::test]
async fn load_missing_file_is_not_found() {
    let dir = TempDir::new().expect("temp dir");
    let path = dir.path().join("missing.toml");

    let err = VrfCheckConfig::from_file(&path).await.unwrap_err();
    assert!(matches!(
        err,
        VrfCheckError::Config(ConfigError::FileNotFound { .. })
    ));
}

#[tokio::test]
#[serial_test::serial]
async fn load_or_default_falls_back_when_missing() {
    let dir = TempDir::new().expect("temp dir");
    let path = dir.path().join("missing.toml");

    let config = VrfCheckConfig::load_or_default(&path)
        .await
        .expect("should fall back to defaults");
    assert_eq!(config.scenario.probe_count, 5);
}

#[tokio::test]
async fn load_rejects_invalid_values() {
    let dir = TempDir::new().expect("temp dir");
    let path = dir.path().join("bad.toml");
    fs::write(
        &path,
        r#"
[scenario]
primary_vrf = "red"
secondary_vrf = "red"
"#,
    )
    .expect("write config");

    let err = VrfCheckConfig::from_file(&path).await.unwrap_err();
    assert!(matches!(
        err,
        VrfCheckError::Config(ConfigError::InvalidValue { .. })
    ));
}

#[tokio::test]
async fn load_or_default_surfaces_parse_errors() {
    let dir = TempDir::new().expect("temp dir");
    let path = dir.path().join("broken.toml");
    fs::write(&path, "[timing\n").expect("write config");

    let err = VrfCheckConfig::load_or_default(&path).await.unwrap_err();
    assert!(matches!(
        err,
        VrfCheckError::Config(ConfigError::ParseFailed { .. })
    ));
}

// =============================================================================
// 환경변수 우선순위 테스트
// =============================================================================

#[test]
#[serial_test::serial]
fn env_override_takes_precedence_over_toml() {
    let toml = r#"
[cluster]
namespace = "from-file"
"#;

    let original = std::env::var("VRFCHECK_CLUSTER_NAMESPACE").ok();
    // SAFETY: serial_test로 직렬화되어 환경변수 조작이 안전합니다.
    unsafe {
        std::env::set_var("VRFCHECK_CLUSTER_NAMESPACE", "from-env");
    }

    let mut config = VrfCheckConfig::parse(toml).expect("should parse");
    config.apply_env_overrides();
    let result = config.cluster.namespace.clone();

    // SAFETY: 테스트 정리
    unsafe {
        match original {
            Some(val) => std::env::set_var("VRFCHECK_CLUSTER_NAMESPACE", val),
            None => std::env::remove_var("VRFCHECK_CLUSTER_NAMESPACE"),
        }
    }

    assert_eq!(result, "from-env");
}

#[test]
#[serial_test::serial]
fn env_override_parses_family_list() {
    let original = std::env::var("VRFCHECK_SCENARIO_SUPPORTED_FAMILIES").ok();
    // SAFETY: serial_test로 직렬화되어 환경변수 조작이 안전합니다.
    unsafe {
        std::env::set_var("VRFCHECK_SCENARIO_SUPPORTED_FAMILIES", "ipv4, ipv6");
    }

    let mut config = VrfCheckConfig::default();
    config.apply_env_overrides();
    let families = config.scenario.families();

    // SAFETY: 테스트 정리
    unsafe {
        match original {
            Some(val) => std::env::set_var("VRFCHECK_SCENARIO_SUPPORTED_FAMILIES", val),
            None => std::env::remove_var("VRFCHECK_SCENARIO_SUPPORTED_FAMILIES"),
        }
    }

    assert_eq!(
        families.expect("should parse"),
        vec![IpFamily::Ipv4, IpFamily::Ipv6]
    );
}

#[test]
#[serial_test::serial]
fn env_override_ignores_unparsable_numbers() {
    let original = std::env::var("VRFCHECK_SCENARIO_PROBE_COUNT").ok();
    // SAFETY: serial_test로 직렬화되어 환경변수 조작이 안전합니다.
    unsafe {
        std::env::set_var("VRFCHECK_SCENARIO_PROBE_COUNT", "many");
    }

    let mut config = VrfCheckConfig::default();
    config.apply_env_overrides();
    let count = config.scenario.probe_count;

    // SAFETY: 테스트 정리
    unsafe {
        match original {
            Some(val) => std::env::set_var("VRFCHECK_SCENARIO_PROBE_COUNT", val),
            None => std::env::remove_var("VRFCHECK_SCENARIO_PROBE_COUNT"),
        }
    }

    assert_eq!(count, 5);
}
