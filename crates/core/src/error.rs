//! 에러 타입 — 도메인별 에러 정의

/// vrfcheck 최상위 에러 타입
#[derive(Debug, thiserror::Error)]
pub enum VrfCheckError {
    /// 설정 관련 에러
    #[error("config error: {0}")]
    Config(#[from] ConfigError),

    /// 입력값 검증 에러
    #[error("validation error: {0}")]
    Validation(#[from] ValidationError),

    /// 시나리오 실행 에러
    #[error("scenario error: {0}")]
    Scenario(#[from] ScenarioError),

    /// I/O 에러
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// 설정 관련 에러
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// 설정 파일을 찾을 수 없음
    #[error("config file not found: {path}")]
    FileNotFound { path: String },

    /// 설정 파싱 실패
    #[error("failed to parse config: {reason}")]
    ParseFailed { reason: String },

    /// 유효하지 않은 설정 값
    #[error("invalid config value for '{field}': {reason}")]
    InvalidValue { field: String, reason: String },
}

/// 도메인 값 검증 실패
///
/// VRF 이름, MAC 주소, 인터페이스 주소 등 생성 시점에 검증되는 값이
/// 규칙을 만족하지 않을 때 반환됩니다.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid {kind} '{value}': {reason}")]
pub struct ValidationError {
    /// 값의 종류 (예: "vrf name")
    pub kind: &'static str,
    /// 입력된 원본 값
    pub value: String,
    /// 실패 사유
    pub reason: String,
}

impl ValidationError {
    /// 새 검증 에러를 생성합니다.
    pub fn new(kind: &'static str, value: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            kind,
            value: value.into(),
            reason: reason.into(),
        }
    }
}

/// 시나리오 실패 분류
///
/// 적합성 시나리오가 실패한 원인을 범주별로 나타냅니다.
/// 각 범주는 서로 구분되어 보고되어야 합니다.
#[derive(Debug, thiserror::Error)]
pub enum ScenarioError {
    /// 플랫폼 API 호출 실패 (생성/조회/삭제)
    #[error("provisioning defect: {0}")]
    Provisioning(String),

    /// 폴링 대기 시간 초과 (워크로드 실행/삭제 대기)
    #[error("timeout: {0}")]
    Timeout(String),

    /// VRF 설정 검증 실패
    #[error("configuration defect: {0}")]
    Configuration(String),

    /// 도달성 검증 실패
    #[error("reachability defect: {0}")]
    Reachability(String),
}
