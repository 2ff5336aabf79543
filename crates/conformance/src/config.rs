//! 적합성 검사 설정
//!
//! [`ConformanceConfig`]는 core의 [`VrfCheckConfig`]를 검증된 타입으로
//! 변환한 런타임 설정입니다. 문자열 설정값은 이 시점에 모두 파싱되므로
//! 시나리오 실행 중에는 설정 에러가 발생하지 않습니다.
//!
//! # 사용 예시
//! ```ignore
//! use vrfcheck_core::config::VrfCheckConfig;
//! use vrfcheck_conformance::config::ConformanceConfig;
//!
//! let core_config = VrfCheckConfig::default();
//! let config = ConformanceConfig::from_core(&core_config)?;
//! ```

use std::time::Duration;

use vrfcheck_core::config::VrfCheckConfig;
use vrfcheck_core::types::{InterfaceAddress, IpFamily, MacAddress, VrfName};

use crate::error::ConformanceError;
use crate::poll::PollSettings;

/// primary VRF에 할당할 클라이언트/서버 예약 주소
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReservedPair {
    pub client: InterfaceAddress,
    pub server: InterfaceAddress,
}

/// 클라이언트/서버 인터페이스 MAC 주소
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkloadMacs {
    pub client_primary: MacAddress,
    pub client_secondary: MacAddress,
    pub server_primary: MacAddress,
    pub server_secondary: MacAddress,
}

/// 적합성 검사 런타임 설정
#[derive(Debug, Clone)]
pub struct ConformanceConfig {
    /// 테스트 네임스페이스
    pub namespace: String,
    /// 고정 노드 (비어 있으면 워커 셀렉터로 선택)
    pub node_name: String,
    pub worker_selector: String,
    pub image: String,
    pub primary_vrf: VrfName,
    pub secondary_vrf: VrfName,
    pub primary_attachment: String,
    pub secondary_attachment: String,
    /// VRF 밖 기본 인터페이스
    pub default_interface: String,
    pub probe_count: u32,
    pub supported_families: Vec<IpFamily>,
    pub ipv4: Option<ReservedPair>,
    pub ipv6: Option<ReservedPair>,
    pub macs: WorkloadMacs,
    pub workload_wait: PollSettings,
    pub deletion_wait: PollSettings,
    pub config_wait: PollSettings,
    pub reachability_wait: PollSettings,
    /// 시나리오 전체 제한 시간
    pub scenario_timeout: Duration,
    /// 시나리오 후 워크로드를 남겨둘지 여부
    pub keep_workloads: bool,
}

impl ConformanceConfig {
    /// core 설정에서 런타임 설정을 생성합니다.
    ///
    /// 지원 목록에 없는 패밀리의 예약 주소는 파싱에 실패하면 `None`이 됩니다.
    pub fn from_core(core: &VrfCheckConfig) -> Result<Self, ConformanceError> {
        let scenario = &core.scenario;
        let timing = &core.timing;

        let supported_families = scenario.families().map_err(config_error)?;

        let reserved = |family: IpFamily| -> Result<Option<ReservedPair>, ConformanceError> {
            match scenario.reserved_for(family).addresses() {
                Ok((client, server)) => Ok(Some(ReservedPair { client, server })),
                Err(e) if supported_families.contains(&family) => Err(config_error(e)),
                Err(_) => Ok(None),
            }
        };
        let ipv4 = reserved(IpFamily::Ipv4)?;
        let ipv6 = reserved(IpFamily::Ipv6)?;

        let macs = WorkloadMacs {
            client_primary: MacAddress::new(scenario.macs.client_primary.clone())?,
            client_secondary: MacAddress::new(scenario.macs.client_secondary.clone())?,
            server_primary: MacAddress::new(scenario.macs.server_primary.clone())?,
            server_secondary: MacAddress::new(scenario.macs.server_secondary.clone())?,
        };

        let config = Self {
            namespace: core.cluster.namespace.clone(),
            node_name: core.cluster.node_name.clone(),
            worker_selector: core.cluster.worker_selector.clone(),
            image: core.cluster.image.clone(),
            primary_vrf: VrfName::new(scenario.primary_vrf.clone())?,
            secondary_vrf: VrfName::new(scenario.secondary_vrf.clone())?,
            primary_attachment: scenario.primary_attachment.clone(),
            secondary_attachment: scenario.secondary_attachment.clone(),
            default_interface: scenario.default_interface.clone(),
            probe_count: scenario.probe_count,
            supported_families,
            ipv4,
            ipv6,
            macs,
            workload_wait: PollSettings::from_secs(
                timing.workload_poll_secs,
                timing.workload_timeout_secs,
            ),
            deletion_wait: PollSettings::from_secs(
                timing.deletion_poll_secs,
                timing.deletion_timeout_secs,
            ),
            config_wait: PollSettings::from_secs(
                timing.config_poll_secs,
                timing.config_timeout_secs,
            ),
            reachability_wait: PollSettings::from_secs(
                timing.reachability_poll_secs,
                timing.reachability_timeout_secs,
            ),
            scenario_timeout: Duration::from_secs(timing.scenario_timeout_secs),
            keep_workloads: false,
        };
        config.validate()?;
        Ok(config)
    }

    /// 패밀리에 해당하는 예약 주소
    pub fn reserved_for(&self, family: IpFamily) -> Option<&ReservedPair> {
        match family {
            IpFamily::Ipv4 => self.ipv4.as_ref(),
            IpFamily::Ipv6 => self.ipv6.as_ref(),
        }
    }

    /// 설정값의 유효성을 검증합니다.
    pub fn validate(&self) -> Result<(), ConformanceError> {
        if self.namespace.is_empty() {
            return Err(invalid("namespace", "must not be empty"));
        }
        if self.node_name.is_empty() && self.worker_selector.is_empty() {
            return Err(invalid(
                "worker_selector",
                "must not be empty when node_name is unset",
            ));
        }
        if self.primary_vrf == self.secondary_vrf {
            return Err(invalid("secondary_vrf", "must differ from primary_vrf"));
        }
        if self.default_interface.is_empty() {
            return Err(invalid("default_interface", "must not be empty"));
        }
        if self.probe_count == 0 {
            return Err(invalid("probe_count", "must be > 0"));
        }
        if self.supported_families.is_empty() {
            return Err(invalid(
                "supported_families",
                "at least one family is required",
            ));
        }
        for (field, wait) in [
            ("workload_wait", self.workload_wait),
            ("deletion_wait", self.deletion_wait),
            ("config_wait", self.config_wait),
            ("reachability_wait", self.reachability_wait),
        ] {
            if wait.interval.is_zero() {
                return Err(invalid(field, "poll interval must be > 0"));
            }
            if wait.timeout < wait.interval {
                return Err(invalid(field, "timeout must be >= the poll interval"));
            }
        }
        if self.scenario_timeout.is_zero() {
            return Err(invalid("scenario_timeout", "must be > 0"));
        }
        Ok(())
    }
}

fn invalid(field: &str, reason: &str) -> ConformanceError {
    ConformanceError::Config {
        field: field.to_owned(),
        reason: reason.to_owned(),
    }
}

fn config_error(err: vrfcheck_core::error::VrfCheckError) -> ConformanceError {
    ConformanceError::Config {
        field: "scenario".to_owned(),
        reason: err.to_string(),
    }
}

/// 적합성 검사 설정 빌더
///
/// core 설정을 기반으로 CLI 인자 등의 개별 오버라이드를 적용합니다.
#[derive(Default)]
pub struct ConformanceConfigBuilder {
    core: VrfCheckConfig,
    families: Option<Vec<IpFamily>>,
    keep_workloads: bool,
}

impl ConformanceConfigBuilder {
    /// 기본 core 설정으로 빌더를 생성합니다.
    pub fn new() -> Self {
        Self::default()
    }

    /// 로드된 core 설정으로 빌더를 생성합니다.
    pub fn from_core(core: VrfCheckConfig) -> Self {
        Self {
            core,
            ..Self::default()
        }
    }

    pub fn namespace(mut self, namespace: impl Into<String>) -> Self {
        self.core.cluster.namespace = namespace.into();
        self
    }

    pub fn node_name(mut self, node_name: impl Into<String>) -> Self {
        self.core.cluster.node_name = node_name.into();
        self
    }

    pub fn image(mut self, image: impl Into<String>) -> Self {
        self.core.cluster.image = image.into();
        self
    }

    /// 지원 패밀리 목록을 대체합니다.
    pub fn supported_families(mut self, families: &[IpFamily]) -> Self {
        self.families = Some(families.to_vec());
        self
    }

    pub fn probe_count(mut self, count: u32) -> Self {
        self.core.scenario.probe_count = count;
        self
    }

    pub fn reachability_timeout_secs(mut self, secs: u64) -> Self {
        self.core.timing.reachability_timeout_secs = secs;
        self
    }

    pub fn config_timeout_secs(mut self, secs: u64) -> Self {
        self.core.timing.config_timeout_secs = secs;
        self
    }

    pub fn workload_timeout_secs(mut self, secs: u64) -> Self {
        self.core.timing.workload_timeout_secs = secs;
        self
    }

    pub fn scenario_timeout_secs(mut self, secs: u64) -> Self {
        self.core.timing.scenario_timeout_secs = secs;
        self
    }

    pub fn keep_workloads(mut self, keep: bool) -> Self {
        self.keep_workloads = keep;
        self
    }

    /// 설정을 검증하고 `ConformanceConfig`를 생성합니다.
    pub fn build(mut self) -> Result<ConformanceConfig, ConformanceError> {
        if let Some(families) = &self.families {
            self.core.scenario.supported_families =
                families.iter().map(|f| f.as_str().to_owned()).collect();
        }
        self.core.validate().map_err(config_error)?;
        let mut config = ConformanceConfig::from_core(&self.core)?;
        config.keep_workloads = self.keep_workloads;
        Ok(config)
    }
}
