//! vrfcheck 공통 크레이트
//!
//! VRF 격리 적합성 검사기의 모든 크레이트가 공유하는 설정, 에러, 도메인 타입을 제공합니다.
//!
//! - [`config`]: `vrfcheck.toml` 파싱, 환경변수 오버라이드, 검증
//! - [`error`]: 최상위 에러 타입 (`VrfCheckError`)
//! - [`types`]: IP 패밀리, VRF 이름, 인터페이스 주소 등 공통 타입

pub mod config;
pub mod error;
pub mod types;

// --- 주요 타입 re-export ---

pub use config::VrfCheckConfig;
pub use error::{ConfigError, ScenarioError, ValidationError, VrfCheckError};
pub use types::{InterfaceAddress, IpFamily, MacAddress, VrfName, WorkloadPhase};
