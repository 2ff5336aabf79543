//! 적합성 검사 에러 타입
//!
//! [`ConformanceError`]는 시나리오 실행 중 발생하는 모든 에러를 표현합니다.
//! 각 변형은 실패 범주(프로비저닝, 타임아웃, 설정 결함, 도달성 결함)를
//! 구분할 수 있도록 설계되어 있으며, [`ConformanceError::kind`]로 고정된
//! 범주 이름을 얻을 수 있습니다.
//!
//! `From<ConformanceError> for VrfCheckError` 변환이 구현되어 있어
//! 상위 레이어에서 `?` 연산자로 전파할 수 있습니다.

use vrfcheck_core::error::{ScenarioError, ValidationError, VrfCheckError};
use vrfcheck_core::types::WorkloadPhase;

/// 적합성 검사 도메인 에러
#[derive(Debug, thiserror::Error)]
pub enum ConformanceError {
    /// 플랫폼 API 호출 실패 (생성/조회/삭제)
    #[error("platform api error during {operation}: {reason}")]
    Platform {
        /// 실패한 작업 (예: "create workload")
        operation: String,
        /// 실패 사유
        reason: String,
    },

    /// 객체가 존재하지 않음
    #[error("{kind} not found: {name}")]
    NotFound {
        /// 객체 종류
        kind: &'static str,
        /// 객체 이름
        name: String,
    },

    /// exec 채널 자체의 실패 (명령의 종료 코드와는 별개)
    #[error("exec in workload '{workload}' failed: {reason}")]
    Exec {
        /// 대상 워크로드
        workload: String,
        /// 실패 사유
        reason: String,
    },

    /// 워크로드가 기한 내에 Running에 도달하지 못함
    #[error(
        "workload '{workload}' did not reach Running within {waited_secs}s (last observed: {last_observed}; events: {})",
        format_events(.events)
    )]
    WorkloadTimeout {
        workload: String,
        waited_secs: u64,
        last_observed: String,
        /// 최근 워크로드 이벤트 (스케줄링/시작 지연 원인 진단용)
        events: Vec<String>,
    },

    /// 워크로드가 Running 전에 종료 단계에 들어감
    #[error(
        "workload '{workload}' terminated in phase {phase} before reaching Running (events: {})",
        format_events(.events)
    )]
    WorkloadTerminated {
        workload: String,
        phase: WorkloadPhase,
        events: Vec<String>,
    },

    /// 워크로드 삭제가 기한 내에 확인되지 않음
    #[error(
        "workload '{workload}' still present {waited_secs}s after deletion (last observed: {last_observed})"
    )]
    DeletionTimeout {
        workload: String,
        waited_secs: u64,
        last_observed: String,
    },

    /// VRF 설정 결함: 인터페이스 주소 또는 VRF 라우트가 관측되지 않음
    #[error(
        "vrf '{vrf}' is not configured on workload '{workload}' interface '{interface}' with {address} (last observed: {last_observed})"
    )]
    ConfigurationDefect {
        workload: String,
        vrf: String,
        interface: String,
        address: String,
        last_observed: String,
    },

    /// 도달성 결함: 기대한 도달성 판정이 기한 내에 관측되지 않음
    #[error(
        "expected {destination} to be {expected} from '{source_workload}' via '{scope}' (last observed: {last_observed})"
    )]
    ReachabilityDefect {
        source_workload: String,
        scope: String,
        destination: String,
        expected: &'static str,
        last_observed: String,
    },

    /// 시나리오 전체 기한 초과
    #[error("scenario deadline of {limit_secs}s exceeded while in state {state}")]
    ScenarioDeadline { state: String, limit_secs: u64 },

    /// 입력값 검증 실패
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// 설정 에러
    #[error("config error: {field}: {reason}")]
    Config {
        /// 설정 필드명
        field: String,
        /// 에러 사유
        reason: String,
    },
}

impl ConformanceError {
    /// 로그/리포트용 고정 범주 이름을 반환합니다.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Platform { .. }
            | Self::NotFound { .. }
            | Self::Exec { .. }
            | Self::WorkloadTerminated { .. } => "provisioning",
            Self::WorkloadTimeout { .. } => "workload_timeout",
            Self::DeletionTimeout { .. } => "deletion_timeout",
            Self::ConfigurationDefect { .. } => "configuration",
            Self::ReachabilityDefect { .. } => "reachability",
            Self::ScenarioDeadline { .. } => "scenario_deadline",
            Self::Validation(_) | Self::Config { .. } => "invalid_input",
        }
    }

    /// 객체 부재 에러인지 확인합니다.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }

    pub(crate) fn platform(operation: impl Into<String>, reason: impl ToString) -> Self {
        Self::Platform {
            operation: operation.into(),
            reason: reason.to_string(),
        }
    }
}

fn format_events(events: &[String]) -> String {
    if events.is_empty() {
        "none".to_owned()
    } else {
        events.join(" | ")
    }
}

impl From<ConformanceError> for VrfCheckError {
    fn from(err: ConformanceError) -> Self {
        match &err {
            ConformanceError::Validation(e) => VrfCheckError::Validation(e.clone()),
            ConformanceError::Config { field, reason } => {
                VrfCheckError::Config(vrfcheck_core::error::ConfigError::InvalidValue {
                    field: field.clone(),
                    reason: reason.clone(),
                })
            }
            ConformanceError::Platform { .. }
            | ConformanceError::NotFound { .. }
            | ConformanceError::Exec { .. }
            | ConformanceError::WorkloadTerminated { .. } => {
                VrfCheckError::Scenario(ScenarioError::Provisioning(err.to_string()))
            }
            ConformanceError::WorkloadTimeout { .. }
            | ConformanceError::DeletionTimeout { .. }
            | ConformanceError::ScenarioDeadline { .. } => {
                VrfCheckError::Scenario(ScenarioError::Timeout(err.to_string()))
            }
            ConformanceError::ConfigurationDefect { .. } => {
                VrfCheckError::Scenario(ScenarioError::Configuration(err.to_string()))
            }
            ConformanceError::ReachabilityDefect { .. } => {
                VrfCheckError::Scenario(ScenarioError::Reachability(err.to_string()))
            }
        }
    }
}
