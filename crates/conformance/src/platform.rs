//! 오케스트레이션 플랫폼 추상화
//!
//! 시나리오 로직은 두 트레이트만 봅니다.
//!
//! - [`PlatformApi`]: 네임스페이스/노드/어태치먼트/워크로드 조회와 변경
//! - [`ExecChannel`]: 실행 중인 워크로드 안에서 명령을 실행하고 출력을 수집
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────┐
//! │   VrfScenario    │
//! └───┬──────────┬───┘
//!     │          │
//!     ▼          ▼
//! ┌────────┐ ┌────────────┐
//! │Platform│ │ExecChannel │ (traits)
//! │  Api   │ │            │
//! └───┬────┘ └─────┬──────┘
//!     │            │
//!     ▼            ▼
//!  KubePlatform (kube-rs) / 테스트용 시뮬레이터
//! ```
//!
//! # 에러 규칙
//! - 존재하지 않는 객체는 항상 [`ConformanceError::NotFound`]로 보고합니다.
//!   삭제 완료 확인은 이 규칙에 의존합니다.
//! - exec 채널 자체의 실패는 `Err`이고, 명령의 비정상 종료는
//!   `Ok(ExecOutput)`의 [`ExitStatus`]로 전달됩니다.

use std::fmt;
use std::future::Future;
use std::time::Duration;

use serde::Serialize;
use vrfcheck_core::types::WorkloadPhase;

use crate::attachment::{AttachmentRef, NetworkAttachment};
use crate::error::ConformanceError;
use crate::workload::WorkloadSpec;

/// 생성된 워크로드 식별자
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct WorkloadRef {
    pub namespace: String,
    pub name: String,
}

impl WorkloadRef {
    pub fn new(namespace: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            name: name.into(),
        }
    }
}

impl fmt::Display for WorkloadRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.namespace, self.name)
    }
}

/// 워크로드 상태 스냅샷
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct WorkloadStatus {
    /// 현재 단계
    pub phase: WorkloadPhase,
    /// 플랫폼이 할당한 기본 네트워크 주소
    pub primary_ip: Option<String>,
    /// 배치된 노드
    pub node: Option<String>,
}

/// 워크로드 관련 플랫폼 이벤트
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkloadEvent {
    /// 이벤트 유형 (Normal, Warning)
    pub kind: String,
    /// 짧은 사유 (예: FailedScheduling)
    pub reason: String,
    pub message: String,
}

impl fmt::Display for WorkloadEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}: {}", self.kind, self.reason, self.message)
    }
}

/// 명령 종료 상태
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExitStatus {
    /// 종료 코드 0
    Success,
    /// 0이 아닌 종료 코드
    Code(i32),
    /// 실패했지만 종료 코드를 알 수 없음
    Unknown(String),
}

impl ExitStatus {
    pub fn success(&self) -> bool {
        matches!(self, Self::Success)
    }
}

impl fmt::Display for ExitStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Success => write!(f, "exit 0"),
            Self::Code(code) => write!(f, "exit {code}"),
            Self::Unknown(reason) => write!(f, "exit unknown ({reason})"),
        }
    }
}

/// exec 결과
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecOutput {
    pub stdout: String,
    pub stderr: String,
    pub exit: ExitStatus,
}

impl ExecOutput {
    /// 종료 코드 0인 결과를 생성합니다.
    pub fn success(stdout: impl Into<String>) -> Self {
        Self {
            stdout: stdout.into(),
            stderr: String::new(),
            exit: ExitStatus::Success,
        }
    }

    /// 주어진 종료 코드로 실패한 결과를 생성합니다.
    pub fn failure(code: i32, stdout: impl Into<String>, stderr: impl Into<String>) -> Self {
        Self {
            stdout: stdout.into(),
            stderr: stderr.into(),
            exit: ExitStatus::Code(code),
        }
    }

    /// stdout과 stderr를 합친 출력
    pub fn combined(&self) -> String {
        if self.stderr.is_empty() {
            self.stdout.clone()
        } else if self.stdout.is_empty() {
            self.stderr.clone()
        } else {
            format!("{}\n{}", self.stdout, self.stderr)
        }
    }
}

/// 오케스트레이션 플랫폼 API
///
/// 모든 구현은 `Send + Sync + 'static`이어야 하며 `Arc`로 공유됩니다.
/// 존재하지 않는 객체 조회는 `ConformanceError::NotFound`를 반환해야 합니다.
pub trait PlatformApi: Send + Sync + 'static {
    /// 네임스페이스가 없으면 생성합니다. 이미 있으면 성공으로 처리합니다.
    fn ensure_namespace(
        &self,
        namespace: &str,
    ) -> impl Future<Output = Result<(), ConformanceError>> + Send;

    /// 레이블 셀렉터에 맞는 노드 이름을 반환합니다.
    fn list_nodes(
        &self,
        selector: &str,
    ) -> impl Future<Output = Result<Vec<String>, ConformanceError>> + Send;

    /// 네트워크 어태치먼트를 생성합니다. 최종 이름은 플랫폼이 접두어로부터 생성합니다.
    fn create_attachment(
        &self,
        attachment: &NetworkAttachment,
    ) -> impl Future<Output = Result<AttachmentRef, ConformanceError>> + Send;

    /// 워크로드를 제출합니다. 최종 이름은 플랫폼이 접두어로부터 생성합니다.
    fn create_workload(
        &self,
        spec: &WorkloadSpec,
    ) -> impl Future<Output = Result<WorkloadRef, ConformanceError>> + Send;

    /// 워크로드 상태를 조회합니다.
    fn get_workload(
        &self,
        workload: &WorkloadRef,
    ) -> impl Future<Output = Result<WorkloadStatus, ConformanceError>> + Send;

    /// 워크로드 삭제를 요청합니다. 삭제 완료를 기다리지 않습니다.
    fn delete_workload(
        &self,
        workload: &WorkloadRef,
        grace_period: Duration,
    ) -> impl Future<Output = Result<(), ConformanceError>> + Send;

    /// 워크로드 관련 최근 이벤트를 조회합니다.
    fn workload_events(
        &self,
        workload: &WorkloadRef,
    ) -> impl Future<Output = Result<Vec<WorkloadEvent>, ConformanceError>> + Send;

    /// 네임스페이스의 모든 워크로드 삭제를 요청합니다.
    fn delete_all_workloads(
        &self,
        namespace: &str,
    ) -> impl Future<Output = Result<(), ConformanceError>> + Send;
}

/// 워크로드 내부 명령 실행 채널
pub trait ExecChannel: Send + Sync + 'static {
    /// `argv`를 워크로드의 첫 번째 컨테이너에서 실행합니다.
    fn exec(
        &self,
        workload: &WorkloadRef,
        argv: &[String],
    ) -> impl Future<Output = Result<ExecOutput, ConformanceError>> + Send;
}
