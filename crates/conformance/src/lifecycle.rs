//! 워크로드 수명주기 -- 제출 후 Running 대기, 삭제 후 부재 확인
//!
//! Running 판정은 플랫폼이 보고한 단계로만 합니다. 삭제는 삭제 요청의
//! 응답이 아니라 조회가 `NotFound`를 반환하는 것으로 확인합니다.

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info, warn};
use vrfcheck_core::types::WorkloadPhase;

use crate::error::ConformanceError;
use crate::platform::{PlatformApi, WorkloadRef, WorkloadStatus};
use crate::poll::{Observation, PollError, PollSettings, poll_until};
use crate::workload::WorkloadSpec;

/// 타임아웃 에러에 포함할 최근 이벤트 수
const MAX_REPORTED_EVENTS: usize = 10;

/// Running 상태가 관측된 워크로드
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunningWorkload {
    pub workload: WorkloadRef,
    /// 플랫폼이 할당한 기본 네트워크 주소
    pub primary_ip: Option<String>,
    pub node: Option<String>,
}

/// 워크로드 수명주기 관리자
pub struct WorkloadLifecycle<P: PlatformApi> {
    platform: Arc<P>,
    running_wait: PollSettings,
    deletion_wait: PollSettings,
}

impl<P: PlatformApi> WorkloadLifecycle<P> {
    pub fn new(platform: Arc<P>, running_wait: PollSettings, deletion_wait: PollSettings) -> Self {
        Self {
            platform,
            running_wait,
            deletion_wait,
        }
    }

    /// 워크로드 정의를 제출합니다.
    pub async fn submit(&self, spec: &WorkloadSpec) -> Result<WorkloadRef, ConformanceError> {
        let workload = self.platform.create_workload(spec).await?;
        info!(
            workload = %workload,
            node = spec.node_name.as_str(),
            networks = spec.networks.len(),
            "workload submitted"
        );
        Ok(workload)
    }

    /// 워크로드가 Running에 도달할 때까지 기다립니다.
    ///
    /// 생성 직후의 `NotFound`는 아직 보이지 않는 것으로 간주합니다.
    /// `Succeeded`/`Failed` 단계와 그 외 조회 에러는 즉시 중단합니다.
    pub async fn await_running(
        &self,
        workload: &WorkloadRef,
    ) -> Result<RunningWorkload, ConformanceError> {
        let platform = &self.platform;
        let what = format!("workload {workload} running");
        let result = poll_until(&what, self.running_wait, || async move {
            match platform.get_workload(workload).await {
                Ok(WorkloadStatus {
                    phase: WorkloadPhase::Running,
                    primary_ip,
                    node,
                }) => Ok(Observation::Ready(RunningWorkload {
                    workload: workload.clone(),
                    primary_ip,
                    node,
                })),
                Ok(status) if status.phase.is_terminal() => {
                    Err(ConformanceError::WorkloadTerminated {
                        workload: workload.to_string(),
                        phase: status.phase,
                        events: Vec::new(),
                    })
                }
                Ok(status) => Ok(Observation::Pending(format!("phase {}", status.phase))),
                Err(e) if e.is_not_found() => {
                    Ok(Observation::Pending("not yet visible".to_owned()))
                }
                Err(e) => Err(e),
            }
        })
        .await;

        match result {
            Ok(running) => {
                info!(
                    workload = %workload,
                    primary_ip = running.primary_ip.as_deref().unwrap_or(""),
                    "workload running"
                );
                Ok(running)
            }
            Err(PollError::Aborted(ConformanceError::WorkloadTerminated { phase, .. })) => {
                let events = self.recent_events(workload).await;
                warn!(workload = %workload, phase = %phase, "workload terminated before Running");
                Err(ConformanceError::WorkloadTerminated {
                    workload: workload.to_string(),
                    phase,
                    events,
                })
            }
            Err(PollError::Aborted(e)) => Err(e),
            Err(PollError::Expired(expired)) => {
                let events = self.recent_events(workload).await;
                warn!(
                    workload = %workload,
                    attempts = expired.attempts,
                    last_observed = expired.last_observed.as_str(),
                    "workload did not reach Running"
                );
                Err(ConformanceError::WorkloadTimeout {
                    workload: workload.to_string(),
                    waited_secs: expired.elapsed.as_secs(),
                    last_observed: expired.last_observed,
                    events,
                })
            }
        }
    }

    /// 제출 후 Running까지 기다립니다.
    pub async fn create_and_await_running(
        &self,
        spec: &WorkloadSpec,
    ) -> Result<RunningWorkload, ConformanceError> {
        let workload = self.submit(spec).await?;
        self.await_running(&workload).await
    }

    /// 유예 기간 0으로 삭제를 요청하고, 조회가 `NotFound`를 반환할 때까지 기다립니다.
    ///
    /// 삭제 요청 자체가 `NotFound`이면 이미 없는 것으로 봅니다.
    pub async fn delete_and_await_absent(
        &self,
        workload: &WorkloadRef,
    ) -> Result<(), ConformanceError> {
        match self.platform.delete_workload(workload, Duration::ZERO).await {
            Ok(()) => info!(workload = %workload, "workload deletion requested"),
            Err(e) if e.is_not_found() => {
                debug!(workload = %workload, "workload already absent");
                return Ok(());
            }
            Err(e) => return Err(e),
        }

        let platform = &self.platform;
        let what = format!("workload {workload} absent");
        let result = poll_until(&what, self.deletion_wait, || async move {
            match platform.get_workload(workload).await {
                Err(e) if e.is_not_found() => Ok(Observation::Ready(())),
                Err(e) => Err(e),
                Ok(status) => Ok(Observation::Pending(format!(
                    "still present in phase {}",
                    status.phase
                ))),
            }
        })
        .await;

        match result {
            Ok(()) => {
                info!(workload = %workload, "workload absence confirmed");
                Ok(())
            }
            Err(PollError::Aborted(e)) => Err(e),
            Err(PollError::Expired(expired)) => Err(ConformanceError::DeletionTimeout {
                workload: workload.to_string(),
                waited_secs: expired.elapsed.as_secs(),
                last_observed: expired.last_observed,
            }),
        }
    }

    async fn recent_events(&self, workload: &WorkloadRef) -> Vec<String> {
        match self.platform.workload_events(workload).await {
            Ok(events) => {
                let skip = events.len().saturating_sub(MAX_REPORTED_EVENTS);
                events.iter().skip(skip).map(ToString::to_string).collect()
            }
            Err(e) => {
                warn!(workload = %workload, error = %e, "failed to list workload events");
                Vec::new()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use tokio::time::Instant;

    use super::*;
    use crate::platform::WorkloadEvent;
    use crate::platform::mock::{MockPlatform, Reply, pending, running};

    fn spec() -> WorkloadSpec {
        WorkloadSpec::builder("vrf-testing", "client-vrf-")
            .node("worker-0")
            .image("img")
            .build()
            .unwrap()
    }

    fn lifecycle(platform: MockPlatform) -> (Arc<MockPlatform>, WorkloadLifecycle<MockPlatform>) {
        let platform = Arc::new(platform);
        let lifecycle = WorkloadLifecycle::new(
            Arc::clone(&platform),
            PollSettings::from_secs(1, 300),
            PollSettings::from_secs(5, 300),
        );
        (platform, lifecycle)
    }

    #[tokio::test(start_paused = true)]
    async fn reaches_running_after_pending() {
        let (platform, lifecycle) = lifecycle(MockPlatform::new().with_status(vec![
            Reply::NotFound,
            Reply::Ok(pending()),
            Reply::Ok(pending()),
            Reply::Ok(running("10.128.2.15")),
        ]));
        let start = Instant::now();
        let running = lifecycle.create_and_await_running(&spec()).await.unwrap();
        assert_eq!(running.primary_ip.as_deref(), Some("10.128.2.15"));
        assert_eq!(start.elapsed(), Duration::from_secs(3));
        assert_eq!(platform.created.lock().unwrap().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn never_running_times_out_with_events() {
        let (_platform, lifecycle) = lifecycle(
            MockPlatform::new()
                .with_status(vec![Reply::Ok(pending())])
                .with_events(vec![WorkloadEvent {
                    kind: "Warning".to_owned(),
                    reason: "FailedScheduling".to_owned(),
                    message: "0/3 nodes are available".to_owned(),
                }]),
        );
        let start = Instant::now();
        let err = lifecycle.create_and_await_running(&spec()).await.unwrap_err();
        assert_eq!(start.elapsed(), Duration::from_secs(300));
        match err {
            ConformanceError::WorkloadTimeout {
                last_observed,
                events,
                waited_secs,
                ..
            } => {
                assert_eq!(last_observed, "phase Pending");
                assert_eq!(waited_secs, 300);
                assert_eq!(events.len(), 1);
                assert!(events[0].contains("FailedScheduling"));
            }
            other => panic!("expected workload timeout, got {other:?}"),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn lookup_error_aborts_running_wait() {
        let (_platform, lifecycle) = lifecycle(
            MockPlatform::new().with_status(vec![Reply::Fail("forbidden".to_owned())]),
        );
        let start = Instant::now();
        let err = lifecycle.create_and_await_running(&spec()).await.unwrap_err();
        assert_eq!(err.kind(), "provisioning");
        assert_eq!(start.elapsed(), Duration::ZERO);
    }

    #[tokio::test(start_paused = true)]
    async fn terminal_phase_stops_running_wait_with_events() {
        let failed = WorkloadStatus {
            phase: WorkloadPhase::Failed,
            ..WorkloadStatus::default()
        };
        let (_platform, lifecycle) = lifecycle(
            MockPlatform::new()
                .with_status(vec![Reply::Ok(pending()), Reply::Ok(failed)])
                .with_events(vec![WorkloadEvent {
                    kind: "Warning".to_owned(),
                    reason: "BackOff".to_owned(),
                    message: "back-off restarting failed container".to_owned(),
                }]),
        );
        let start = Instant::now();
        let err = lifecycle.create_and_await_running(&spec()).await.unwrap_err();
        // 0초 Pending, 1초 Failed -> 300초를 기다리지 않음
        assert_eq!(start.elapsed(), Duration::from_secs(1));
        assert_eq!(err.kind(), "provisioning");
        match err {
            ConformanceError::WorkloadTerminated {
                workload,
                phase,
                events,
            } => {
                assert!(workload.starts_with("vrf-testing/"));
                assert_eq!(phase, WorkloadPhase::Failed);
                assert_eq!(events.len(), 1);
                assert!(events[0].contains("BackOff"));
            }
            other => panic!("expected terminated workload, got {other:?}"),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn create_failure_propagates() {
        let (_platform, lifecycle) = lifecycle(MockPlatform::new().with_failing_create());
        let err = lifecycle.create_and_await_running(&spec()).await.unwrap_err();
        assert!(matches!(err, ConformanceError::Platform { .. }));
    }

    #[tokio::test(start_paused = true)]
    async fn deletion_waits_for_not_found() {
        let (platform, lifecycle) = lifecycle(MockPlatform::new().with_status(vec![
            Reply::Ok(running("10.128.2.16")),
            Reply::Ok(running("10.128.2.16")),
            Reply::NotFound,
        ]));
        let w = WorkloadRef::new("vrf-testing", "server-vrf-00001");
        let start = Instant::now();
        lifecycle.delete_and_await_absent(&w).await.unwrap();
        // 0초, 5초에 존재 -> 10초에 부재 확인
        assert_eq!(start.elapsed(), Duration::from_secs(10));
        assert_eq!(platform.deleted.lock().unwrap().as_slice(), &[w]);
    }

    #[tokio::test(start_paused = true)]
    async fn deletion_of_missing_workload_succeeds() {
        let (_platform, lifecycle) = lifecycle(MockPlatform::new().with_delete(Reply::NotFound));
        let w = WorkloadRef::new("vrf-testing", "gone");
        lifecycle.delete_and_await_absent(&w).await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn deletion_request_failure_propagates() {
        let (_platform, lifecycle) =
            lifecycle(MockPlatform::new().with_delete(Reply::Fail("conflict".to_owned())));
        let w = WorkloadRef::new("vrf-testing", "server");
        let err = lifecycle.delete_and_await_absent(&w).await.unwrap_err();
        assert_eq!(err.kind(), "provisioning");
    }

    #[tokio::test(start_paused = true)]
    async fn lingering_workload_times_out() {
        let (_platform, lifecycle) =
            lifecycle(MockPlatform::new().with_status(vec![Reply::Ok(running("10.128.2.16"))]));
        let w = WorkloadRef::new("vrf-testing", "server");
        let err = lifecycle.delete_and_await_absent(&w).await.unwrap_err();
        assert_eq!(err.kind(), "deletion_timeout");
        assert!(err.to_string().contains("still present"));
    }

    #[tokio::test(start_paused = true)]
    async fn lookup_error_during_deletion_aborts() {
        let (_platform, lifecycle) = lifecycle(MockPlatform::new().with_status(vec![
            Reply::Ok(running("10.128.2.16")),
            Reply::Fail("apiserver unavailable".to_owned()),
        ]));
        let w = WorkloadRef::new("vrf-testing", "server");
        let err = lifecycle.delete_and_await_absent(&w).await.unwrap_err();
        assert!(matches!(err, ConformanceError::Platform { .. }));
    }
}
