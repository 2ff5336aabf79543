//! 설정 관리 — vrfcheck.toml 파싱 및 런타임 설정
//!
//! [`VrfCheckConfig`]는 검사기 전체 설정을 담는 최상위 구조체입니다.
//!
//! # 설정 로딩 우선순위
//! 1. CLI 인자 (최고 우선)
//! 2. 환경변수 (`VRFCHECK_CLUSTER_NAMESPACE=vrf-e2e` 형식)
//! 3. 설정 파일 (`vrfcheck.toml`)
//! 4. 기본값 (`Default` 구현)
//!
//! # 사용 예시
//! ```no_run
//! # async fn example() -> Result<(), vrfcheck_core::error::VrfCheckError> {
//! use vrfcheck_core::config::VrfCheckConfig;
//!
//! // 파일에서 로드 + 환경변수 오버라이드
//! let config = VrfCheckConfig::load("vrfcheck.toml").await?;
//!
//! // TOML 문자열에서 직접 파싱
//! let config = VrfCheckConfig::parse("[cluster]\nnamespace = \"vrf-e2e\"")?;
//! # Ok(())
//! # }
//! ```

use std::net::IpAddr;
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::{ConfigError, VrfCheckError};
use crate::types::{InterfaceAddress, IpFamily, MacAddress, VrfName};

/// 프로브 패킷 수 상한
const MAX_PROBE_COUNT: u32 = 100;

/// vrfcheck 통합 설정
///
/// `vrfcheck.toml` 파일의 최상위 구조를 나타냅니다.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct VrfCheckConfig {
    /// 일반 설정 (로깅)
    #[serde(default)]
    pub general: GeneralConfig,
    /// 클러스터 접속 및 워크로드 배치 설정
    #[serde(default)]
    pub cluster: ClusterConfig,
    /// 시나리오 파라미터 (VRF, 주소, MAC)
    #[serde(default)]
    pub scenario: ScenarioConfig,
    /// 폴링 주기 및 타임아웃
    #[serde(default)]
    pub timing: TimingConfig,
}

impl VrfCheckConfig {
    /// TOML 파일에서 설정을 로드하고 환경변수 오버라이드를 적용합니다.
    pub async fn load(path: impl AsRef<Path>) -> Result<Self, VrfCheckError> {
        let mut config = Self::from_file(path).await?;
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// 설정 파일이 없으면 기본값에 환경변수 오버라이드만 적용합니다.
    ///
    /// 파일이 존재하지만 읽거나 파싱할 수 없으면 에러를 반환합니다.
    pub async fn load_or_default(path: impl AsRef<Path>) -> Result<Self, VrfCheckError> {
        let path = path.as_ref();
        match Self::load(path).await {
            Err(VrfCheckError::Config(ConfigError::FileNotFound { .. })) => {
                warn!(
                    path = %path.display(),
                    "config file not found, using defaults with env overrides"
                );
                let mut config = Self::default();
                config.apply_env_overrides();
                config.validate()?;
                Ok(config)
            }
            other => other,
        }
    }

    /// TOML 파일에서 설정을 로드합니다 (환경변수 오버라이드 없음).
    pub async fn from_file(path: impl AsRef<Path>) -> Result<Self, VrfCheckError> {
        let path = path.as_ref();
        let content = tokio::fs::read_to_string(path).await.map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                VrfCheckError::Config(ConfigError::FileNotFound {
                    path: path.display().to_string(),
                })
            } else {
                VrfCheckError::Io(e)
            }
        })?;
        let config = Self::parse(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// TOML 문자열에서 설정을 파싱합니다.
    pub fn parse(toml_str: &str) -> Result<Self, VrfCheckError> {
        toml::from_str(toml_str).map_err(|e| {
            VrfCheckError::Config(ConfigError::ParseFailed {
                reason: e.to_string(),
            })
        })
    }

    /// 환경변수로 설정값을 오버라이드합니다.
    ///
    /// 환경변수 네이밍 규칙: `VRFCHECK_{SECTION}_{FIELD}`
    /// 예: `VRFCHECK_SCENARIO_PRIMARY_VRF=green`
    pub fn apply_env_overrides(&mut self) {
        // General
        override_string(&mut self.general.log_level, "VRFCHECK_GENERAL_LOG_LEVEL");
        override_string(&mut self.general.log_format, "VRFCHECK_GENERAL_LOG_FORMAT");

        // Cluster
        override_string(&mut self.cluster.kubeconfig, "VRFCHECK_CLUSTER_KUBECONFIG");
        override_string(&mut self.cluster.namespace, "VRFCHECK_CLUSTER_NAMESPACE");
        override_string(&mut self.cluster.node_name, "VRFCHECK_CLUSTER_NODE_NAME");
        override_string(
            &mut self.cluster.worker_selector,
            "VRFCHECK_CLUSTER_WORKER_SELECTOR",
        );
        override_string(&mut self.cluster.image, "VRFCHECK_CLUSTER_IMAGE");

        // Scenario
        override_csv(
            &mut self.scenario.supported_families,
            "VRFCHECK_SCENARIO_SUPPORTED_FAMILIES",
        );
        override_string(&mut self.scenario.primary_vrf, "VRFCHECK_SCENARIO_PRIMARY_VRF");
        override_string(
            &mut self.scenario.secondary_vrf,
            "VRFCHECK_SCENARIO_SECONDARY_VRF",
        );
        override_string(
            &mut self.scenario.default_interface,
            "VRFCHECK_SCENARIO_DEFAULT_INTERFACE",
        );
        override_u32(&mut self.scenario.probe_count, "VRFCHECK_SCENARIO_PROBE_COUNT");

        // Timing
        override_u64(
            &mut self.timing.workload_timeout_secs,
            "VRFCHECK_TIMING_WORKLOAD_TIMEOUT_SECS",
        );
        override_u64(
            &mut self.timing.config_timeout_secs,
            "VRFCHECK_TIMING_CONFIG_TIMEOUT_SECS",
        );
        override_u64(
            &mut self.timing.reachability_timeout_secs,
            "VRFCHECK_TIMING_REACHABILITY_TIMEOUT_SECS",
        );
        override_u64(
            &mut self.timing.scenario_timeout_secs,
            "VRFCHECK_TIMING_SCENARIO_TIMEOUT_SECS",
        );
    }

    /// 설정값의 유효성을 검증합니다.
    pub fn validate(&self) -> Result<(), VrfCheckError> {
        // log_level 검증
        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&self.general.log_level.as_str()) {
            return Err(invalid(
                "general.log_level",
                format!("must be one of: {}", valid_levels.join(", ")),
            ));
        }

        // log_format 검증
        let valid_formats = ["json", "pretty"];
        if !valid_formats.contains(&self.general.log_format.as_str()) {
            return Err(invalid(
                "general.log_format",
                format!("must be one of: {}", valid_formats.join(", ")),
            ));
        }

        self.cluster.validate()?;
        self.scenario.validate()?;
        self.timing.validate()?;
        Ok(())
    }
}

/// 일반 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// 로그 레벨 (trace, debug, info, warn, error)
    pub log_level: String,
    /// 로그 형식 (json, pretty)
    pub log_format: String,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_owned(),
            log_format: "json".to_owned(),
        }
    }
}

/// 클러스터 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ClusterConfig {
    /// kubeconfig 경로 (비어 있으면 기본 탐색 규칙 사용)
    pub kubeconfig: String,
    /// 테스트 네임스페이스
    pub namespace: String,
    /// 워크로드를 배치할 노드 (비어 있으면 워커 노드 중 첫 번째)
    pub node_name: String,
    /// 워커 노드 레이블 셀렉터
    pub worker_selector: String,
    /// 워크로드 컨테이너 이미지 (ping, ip 명령 포함)
    pub image: String,
}

impl Default for ClusterConfig {
    fn default() -> Self {
        Self {
            kubeconfig: String::new(),
            namespace: "vrf-testing".to_owned(),
            node_name: String::new(),
            worker_selector: "node-role.kubernetes.io/worker".to_owned(),
            image: "quay.io/openshift-kni/cnf-tests:latest".to_owned(),
        }
    }
}

impl ClusterConfig {
    fn validate(&self) -> Result<(), VrfCheckError> {
        if !is_dns_label(&self.namespace) {
            return Err(invalid(
                "cluster.namespace",
                "must be a lowercase RFC 1123 label (1-63 chars)",
            ));
        }
        if self.image.trim().is_empty() {
            return Err(invalid("cluster.image", "must not be empty"));
        }
        if self.node_name.is_empty() && self.worker_selector.trim().is_empty() {
            return Err(invalid(
                "cluster.worker_selector",
                "must not be empty when cluster.node_name is unset",
            ));
        }
        Ok(())
    }
}

/// 시나리오 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ScenarioConfig {
    /// 클러스터가 지원하는 것으로 간주할 IP 패밀리 목록
    pub supported_families: Vec<String>,
    /// 고정 주소를 사용하는 VRF
    pub primary_vrf: String,
    /// 겹치는 주소를 사용하는 VRF
    pub secondary_vrf: String,
    /// primary VRF 네트워크 어태치먼트 이름 접두어
    pub primary_attachment: String,
    /// secondary VRF 네트워크 어태치먼트 이름 접두어
    pub secondary_attachment: String,
    /// VRF 밖 기본 네트워크 인터페이스
    pub default_interface: String,
    /// 프로브당 전송할 echo 요청 수
    pub probe_count: u32,
    /// IPv4 예약 주소
    pub ipv4: ReservedAddressConfig,
    /// IPv6 예약 주소
    pub ipv6: ReservedAddressConfig,
    /// 인터페이스별 MAC 주소
    pub macs: MacConfig,
}

impl Default for ScenarioConfig {
    fn default() -> Self {
        Self {
            supported_families: vec!["ipv4".to_owned()],
            primary_vrf: "blue".to_owned(),
            secondary_vrf: "red".to_owned(),
            primary_attachment: "test-vrf-blue".to_owned(),
            secondary_attachment: "test-vrf-red".to_owned(),
            default_interface: "eth0".to_owned(),
            probe_count: 5,
            ipv4: ReservedAddressConfig {
                client: "10.255.255.1".to_owned(),
                server: "10.255.255.2".to_owned(),
                prefix_len: 24,
            },
            ipv6: ReservedAddressConfig {
                client: "fd00:ffff::1".to_owned(),
                server: "fd00:ffff::2".to_owned(),
                prefix_len: 64,
            },
            macs: MacConfig::default(),
        }
    }
}

impl ScenarioConfig {
    /// 지원 패밀리 목록을 파싱합니다.
    pub fn families(&self) -> Result<Vec<IpFamily>, VrfCheckError> {
        self.supported_families
            .iter()
            .map(|f| {
                f.parse::<IpFamily>()
                    .map_err(|e| invalid("scenario.supported_families", e.to_string()))
            })
            .collect()
    }

    /// 패밀리에 해당하는 예약 주소 설정을 반환합니다.
    pub fn reserved_for(&self, family: IpFamily) -> &ReservedAddressConfig {
        match family {
            IpFamily::Ipv4 => &self.ipv4,
            IpFamily::Ipv6 => &self.ipv6,
        }
    }

    fn validate(&self) -> Result<(), VrfCheckError> {
        let primary = VrfName::new(self.primary_vrf.clone())
            .map_err(|e| invalid("scenario.primary_vrf", e.to_string()))?;
        let secondary = VrfName::new(self.secondary_vrf.clone())
            .map_err(|e| invalid("scenario.secondary_vrf", e.to_string()))?;
        if primary == secondary {
            return Err(invalid(
                "scenario.secondary_vrf",
                "must differ from scenario.primary_vrf",
            ));
        }

        for (field, name) in [
            ("scenario.primary_attachment", &self.primary_attachment),
            ("scenario.secondary_attachment", &self.secondary_attachment),
        ] {
            if !is_dns_label(name) {
                return Err(invalid(
                    field,
                    "must be a lowercase RFC 1123 label (1-63 chars)",
                ));
            }
        }

        if self.default_interface.trim().is_empty() {
            return Err(invalid("scenario.default_interface", "must not be empty"));
        }

        if self.probe_count == 0 || self.probe_count > MAX_PROBE_COUNT {
            return Err(invalid(
                "scenario.probe_count",
                format!("must be 1-{MAX_PROBE_COUNT}"),
            ));
        }

        let families = self.families()?;
        if families.is_empty() {
            return Err(invalid(
                "scenario.supported_families",
                "at least one family is required",
            ));
        }
        for family in families {
            let section = format!("scenario.{family}");
            self.reserved_for(family).validate(&section, family)?;
        }

        self.macs.validate()?;
        Ok(())
    }
}

/// primary VRF에 할당할 클라이언트/서버 예약 주소
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReservedAddressConfig {
    /// 클라이언트 주소
    pub client: String,
    /// 서버 주소
    pub server: String,
    /// 프리픽스 길이
    pub prefix_len: u8,
}

impl ReservedAddressConfig {
    /// 클라이언트/서버 주소를 파싱합니다.
    pub fn addresses(&self) -> Result<(InterfaceAddress, InterfaceAddress), VrfCheckError> {
        let parse = |value: &str| -> Result<InterfaceAddress, VrfCheckError> {
            let ip = value
                .parse::<IpAddr>()
                .map_err(|e| invalid("scenario.reserved", format!("'{value}': {e}")))?;
            InterfaceAddress::new(ip, self.prefix_len)
                .map_err(|e| invalid("scenario.reserved", e.to_string()))
        };
        Ok((parse(&self.client)?, parse(&self.server)?))
    }

    fn validate(&self, section: &str, family: IpFamily) -> Result<(), VrfCheckError> {
        let (client, server) = self
            .addresses()
            .map_err(|e| invalid(section, e.to_string()))?;
        if client.family() != family || server.family() != family {
            return Err(invalid(section, format!("addresses must be {family}")));
        }
        if client.ip() == server.ip() {
            return Err(invalid(section, "client and server addresses must differ"));
        }
        Ok(())
    }
}

/// 클라이언트/서버 인터페이스 MAC 주소
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MacConfig {
    pub client_primary: String,
    pub client_secondary: String,
    pub server_primary: String,
    pub server_secondary: String,
}

impl Default for MacConfig {
    fn default() -> Self {
        Self {
            client_primary: "20:04:0f:f1:88:a1".to_owned(),
            client_secondary: "20:04:0f:f1:88:b2".to_owned(),
            server_primary: "20:04:0f:f1:88:a3".to_owned(),
            server_secondary: "20:04:0f:f1:88:b4".to_owned(),
        }
    }
}

impl MacConfig {
    fn validate(&self) -> Result<(), VrfCheckError> {
        let mut seen = Vec::with_capacity(4);
        for (field, value) in [
            ("scenario.macs.client_primary", &self.client_primary),
            ("scenario.macs.client_secondary", &self.client_secondary),
            ("scenario.macs.server_primary", &self.server_primary),
            ("scenario.macs.server_secondary", &self.server_secondary),
        ] {
            let mac = MacAddress::new(value.clone()).map_err(|e| invalid(field, e.to_string()))?;
            if seen.contains(&mac) {
                return Err(invalid(field, format!("duplicate mac address {mac}")));
            }
            seen.push(mac);
        }
        Ok(())
    }
}

/// 폴링 주기 및 타임아웃 설정 (초 단위)
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TimingConfig {
    /// 워크로드 Running 대기 타임아웃
    pub workload_timeout_secs: u64,
    /// 워크로드 상태 폴링 주기
    pub workload_poll_secs: u64,
    /// 워크로드 삭제 확인 타임아웃
    pub deletion_timeout_secs: u64,
    /// 삭제 확인 폴링 주기
    pub deletion_poll_secs: u64,
    /// VRF 설정 검증 타임아웃 (기대값당)
    pub config_timeout_secs: u64,
    /// VRF 설정 폴링 주기
    pub config_poll_secs: u64,
    /// 도달성 검증 타임아웃
    pub reachability_timeout_secs: u64,
    /// 도달성 폴링 주기
    pub reachability_poll_secs: u64,
    /// 시나리오 전체 타임아웃
    pub scenario_timeout_secs: u64,
}

impl Default for TimingConfig {
    fn default() -> Self {
        Self {
            workload_timeout_secs: 300,
            workload_poll_secs: 1,
            deletion_timeout_secs: 300,
            deletion_poll_secs: 5,
            config_timeout_secs: 300,
            config_poll_secs: 5,
            reachability_timeout_secs: 60,
            reachability_poll_secs: 5,
            scenario_timeout_secs: 1200,
        }
    }
}

impl TimingConfig {
    /// 초 단위 값을 `Duration`으로 변환합니다.
    pub fn secs(value: u64) -> Duration {
        Duration::from_secs(value)
    }

    fn validate(&self) -> Result<(), VrfCheckError> {
        let pairs = [
            (
                "timing.workload",
                self.workload_poll_secs,
                self.workload_timeout_secs,
            ),
            (
                "timing.deletion",
                self.deletion_poll_secs,
                self.deletion_timeout_secs,
            ),
            (
                "timing.config",
                self.config_poll_secs,
                self.config_timeout_secs,
            ),
            (
                "timing.reachability",
                self.reachability_poll_secs,
                self.reachability_timeout_secs,
            ),
        ];
        for (prefix, poll, timeout) in pairs {
            if poll == 0 {
                return Err(invalid(&format!("{prefix}_poll_secs"), "must be > 0"));
            }
            if timeout < poll {
                return Err(invalid(
                    &format!("{prefix}_timeout_secs"),
                    "must be >= the poll interval",
                ));
            }
        }
        if self.scenario_timeout_secs == 0 {
            return Err(invalid("timing.scenario_timeout_secs", "must be > 0"));
        }
        Ok(())
    }
}

fn invalid(field: &str, reason: impl Into<String>) -> VrfCheckError {
    ConfigError::InvalidValue {
        field: field.to_owned(),
        reason: reason.into(),
    }
    .into()
}

/// RFC 1123 레이블 검사 (소문자 영숫자와 '-', 1-63자, 양끝은 영숫자)
fn is_dns_label(name: &str) -> bool {
    !name.is_empty()
        && name.len() <= 63
        && name
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-')
        && !name.starts_with('-')
        && !name.ends_with('-')
}

fn override_string(target: &mut String, env_key: &str) {
    if let Ok(val) = std::env::var(env_key) {
        *target = val;
    }
}

fn override_u32(target: &mut u32, env_key: &str) {
    if let Ok(val) = std::env::var(env_key) {
        match val.parse::<u32>() {
            Ok(parsed) => *target = parsed,
            Err(_) => warn!(
                env_key,
                value = val.as_str(),
                "failed to parse u32 from env var, ignoring"
            ),
        }
    }
}

fn override_u64(target: &mut u64, env_key: &str) {
    if let Ok(val) = std::env::var(env_key) {
        match val.parse::<u64>() {
            Ok(parsed) => *target = parsed,
            Err(_) => warn!(
                env_key,
                value = val.as_str(),
                "failed to parse u64 from env var, ignoring"
            ),
        }
    }
}

fn override_csv(target: &mut Vec<String>, env_key: &str) {
    if let Ok(val) = std::env::var(env_key) {
        *target = val.split(',').map(|s| s.trim().to_owned()).collect();
    }
}
