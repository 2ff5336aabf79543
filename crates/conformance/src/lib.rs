#![doc = include_str!("../README.md")]
//!
//! # Module Structure
//!
//! - [`error`]: 도메인 에러 타입 (`ConformanceError`)
//! - [`config`]: 런타임 설정 (`ConformanceConfig`, 빌더)
//! - [`poll`]: 관측 기반 대기 (`poll_until`, `PollSettings`)
//! - [`platform`]: 플랫폼 추상화 (`PlatformApi`, `ExecChannel` 트레이트)
//! - [`kube_platform`]: kube-rs 구현 (`KubePlatform`)
//! - [`attachment`]: VRF 네트워크 어태치먼트 (`AttachmentProvisioner`)
//! - [`workload`]: 워크로드 정의 (`WorkloadSpec`, 빌더)
//! - [`lifecycle`]: 생성/Running 대기/삭제 확인 (`WorkloadLifecycle`)
//! - [`validator`]: 인터페이스 주소와 VRF 라우트 확인 (`ConfigValidator`)
//! - [`prober`]: 범위 지정 echo 프로브 (`ReachabilityProber`)
//! - [`stack`]: IP 패밀리 판정 (`StackResolver`)
//! - [`scenario`]: 시나리오 상태 머신 (`VrfScenario`)
//! - [`suite`]: 실행 단위 준비/정리 (`ConformanceSuite`)
//!
//! # Architecture
//!
//! ```text
//! ConformanceSuite.prepare()  -> namespace, node, attachments
//!        |
//!   VrfScenario.run(family)
//!        |
//!   StackCheck -> Provisioned -> BothRunning -> ConfigValidated
//!        -> PositiveVerified -> ServerDeleted -> NegativeVerified
//!        -> CrossCheckVerified -> Done
//! ```

pub mod attachment;
pub mod config;
pub mod error;
pub mod kube_platform;
pub mod lifecycle;
pub mod platform;
pub mod poll;
pub mod prober;
pub mod scenario;
pub mod stack;
pub mod suite;
pub mod validator;
pub mod workload;

// --- Public API Re-exports ---

// Suite / scenario
pub use scenario::{
    ScenarioContext, ScenarioOutcome, ScenarioReport, ScenarioState, StateTransition, VrfScenario,
};
pub use suite::{ConformanceSuite, SuiteReport};

// Configuration
pub use config::{ConformanceConfig, ConformanceConfigBuilder};

// Error
pub use error::ConformanceError;

// Platform
pub use kube_platform::KubePlatform;
pub use platform::{
    ExecChannel, ExecOutput, ExitStatus, PlatformApi, WorkloadEvent, WorkloadRef, WorkloadStatus,
};

// Building blocks
pub use attachment::{AttachmentProvisioner, AttachmentRef, CniConfig, NetworkAttachment};
pub use lifecycle::{RunningWorkload, WorkloadLifecycle};
pub use poll::{Observation, PollError, PollSettings, poll_until};
pub use prober::{ProbeResult, ProbeScope, Reachability, ReachabilityProber};
pub use stack::{SkipReason, StackDecision, StackResolver};
pub use validator::{ConfigValidator, VrfBindingExpectation};
pub use workload::{NetworkSelection, WorkloadSpec, WorkloadSpecBuilder};
