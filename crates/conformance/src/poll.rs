//! 유한 폴링 -- 외부 상태에 대한 조건을 제한 시간 안에서 반복 확인합니다.
//!
//! 워크로드 Running 대기, 삭제 확인, VRF 설정 검증, 도달성 검증은 모두
//! [`poll_until`] 하나를 사용합니다. 각 호출자는 분류 클로저로
//! "준비됨" / "아직 아님(마지막 관측)" / "즉시 중단"을 구분합니다.
//!
//! # 보장
//! - 개별 시도는 남은 예산으로 제한됩니다 (`tokio::time::timeout`)
//! - 대기 간격은 `min(interval, remaining)`이며, 마감 시점에 마지막 시도를 한 번 수행합니다
//! - 만료 에러는 시도 횟수, 경과 시간, 마지막 관측값을 포함합니다

use std::future::Future;
use std::time::Duration;

use tokio::time::Instant;
use tracing::debug;

/// 폴링 주기와 제한 시간
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollSettings {
    /// 시도 간 간격
    pub interval: Duration,
    /// 전체 제한 시간
    pub timeout: Duration,
}

impl PollSettings {
    pub fn new(interval: Duration, timeout: Duration) -> Self {
        Self { interval, timeout }
    }

    /// 초 단위 값으로 생성합니다.
    pub fn from_secs(interval_secs: u64, timeout_secs: u64) -> Self {
        Self::new(
            Duration::from_secs(interval_secs),
            Duration::from_secs(timeout_secs),
        )
    }
}

/// 한 번의 시도 결과
#[derive(Debug, Clone, PartialEq)]
pub enum Observation<T> {
    /// 조건 충족
    Ready(T),
    /// 아직 충족되지 않음 (마지막 관측 설명)
    Pending(String),
}

/// 제한 시간 만료 정보
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PollExpired {
    /// 수행한 시도 횟수
    pub attempts: u32,
    /// 경과 시간
    pub elapsed: Duration,
    /// 마지막으로 관측한 상태
    pub last_observed: String,
}

/// 폴링 실패
#[derive(Debug)]
pub enum PollError<E> {
    /// 조건이 제한 시간 안에 충족되지 않음
    Expired(PollExpired),
    /// 분류 클로저가 재시도 불가 에러를 반환함
    Aborted(E),
}

/// 조건이 충족될 때까지 `check`를 반복 호출합니다.
///
/// `what`은 로그에 남길 대기 대상 설명입니다.
pub async fn poll_until<T, E, F, Fut>(
    what: &str,
    settings: PollSettings,
    mut check: F,
) -> Result<T, PollError<E>>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<Observation<T>, E>>,
{
    let started = Instant::now();
    let deadline = started + settings.timeout;
    let mut attempts: u32 = 0;

    loop {
        attempts += 1;
        let remaining = deadline.saturating_duration_since(Instant::now());

        let last_observed = match tokio::time::timeout(remaining, check()).await {
            Ok(Ok(Observation::Ready(value))) => {
                debug!(what, attempts, "condition satisfied");
                return Ok(value);
            }
            Ok(Ok(Observation::Pending(observed))) => {
                debug!(what, attempts, observed = observed.as_str(), "condition not yet met");
                observed
            }
            Ok(Err(e)) => return Err(PollError::Aborted(e)),
            Err(_elapsed) => {
                debug!(what, attempts, "attempt exceeded the remaining budget");
                format!("attempt {attempts} did not complete before the deadline")
            }
        };

        let remaining = deadline.saturating_duration_since(Instant::now());
        if remaining.is_zero() {
            return Err(PollError::Expired(PollExpired {
                attempts,
                elapsed: started.elapsed(),
                last_observed,
            }));
        }
        tokio::time::sleep(settings.interval.min(remaining)).await;
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::sync::atomic::{AtomicU32, Ordering};

    use super::*;

    fn settings(interval: u64, timeout: u64) -> PollSettings {
        PollSettings::from_secs(interval, timeout)
    }

    #[tokio::test(start_paused = true)]
    async fn ready_on_first_attempt() {
        let result: Result<u32, PollError<()>> =
            poll_until("first", settings(1, 10), || async { Ok(Observation::Ready(7)) }).await;
        assert_eq!(result.unwrap(), 7);
    }

    #[tokio::test(start_paused = true)]
    async fn ready_after_several_attempts() {
        let calls = Arc::new(AtomicU32::new(0));
        let counter = Arc::clone(&calls);
        let result: Result<(), PollError<()>> = poll_until("third", settings(5, 60), || {
            let n = counter.fetch_add(1, Ordering::SeqCst);
            async move {
                if n >= 2 {
                    Ok(Observation::Ready(()))
                } else {
                    Ok(Observation::Pending(format!("attempt {n}")))
                }
            }
        })
        .await;
        assert!(result.is_ok());
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn expiry_carries_last_observation() {
        let start = Instant::now();
        let result: Result<(), PollError<()>> = poll_until("never", settings(5, 60), || async {
            Ok(Observation::Pending("phase Pending".to_owned()))
        })
        .await;

        match result {
            Err(PollError::Expired(expired)) => {
                assert_eq!(expired.last_observed, "phase Pending");
                // 0, 5, ..., 60 초에 시도
                assert_eq!(expired.attempts, 13);
                assert_eq!(expired.elapsed, Duration::from_secs(60));
            }
            other => panic!("expected expiry, got {other:?}"),
        }
        assert_eq!(start.elapsed(), Duration::from_secs(60));
    }

    #[tokio::test(start_paused = true)]
    async fn expiry_reports_most_recent_observation() {
        let calls = Arc::new(AtomicU32::new(0));
        let counter = Arc::clone(&calls);
        let result: Result<(), PollError<()>> = poll_until("changing", settings(5, 10), || {
            let n = counter.fetch_add(1, Ordering::SeqCst);
            async move { Ok(Observation::Pending(format!("attempt {n}"))) }
        })
        .await;
        match result {
            // 0, 5, 10 초
            Err(PollError::Expired(expired)) => assert_eq!(expired.last_observed, "attempt 2"),
            other => panic!("expected expiry, got {other:?}"),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn final_attempt_happens_at_deadline() {
        // 간격이 제한 시간과 나누어떨어지지 않아도 마감 시점에 한 번 더 시도
        let calls = Arc::new(AtomicU32::new(0));
        let counter = Arc::clone(&calls);
        let start = Instant::now();
        let result: Result<(), PollError<()>> = poll_until("edge", settings(4, 10), || {
            let n = counter.fetch_add(1, Ordering::SeqCst);
            async move {
                // 0, 4, 8, 10 초 -> 네 번째 시도에서 성공
                if n == 3 {
                    Ok(Observation::Ready(()))
                } else {
                    Ok(Observation::Pending("not yet".to_owned()))
                }
            }
        })
        .await;
        assert!(result.is_ok());
        assert_eq!(start.elapsed(), Duration::from_secs(10));
    }

    #[tokio::test(start_paused = true)]
    async fn abort_stops_immediately() {
        let calls = Arc::new(AtomicU32::new(0));
        let counter = Arc::clone(&calls);
        let result: Result<(), PollError<&'static str>> =
            poll_until("abort", settings(1, 60), || {
                counter.fetch_add(1, Ordering::SeqCst);
                async { Err("forbidden") }
            })
            .await;
        assert!(matches!(result, Err(PollError::Aborted("forbidden"))));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn slow_attempt_is_bounded_by_remaining_budget() {
        let start = Instant::now();
        let result: Result<(), PollError<()>> = poll_until("hang", settings(1, 30), || async {
            tokio::time::sleep(Duration::from_secs(3600)).await;
            Ok(Observation::Ready(()))
        })
        .await;
        match result {
            Err(PollError::Expired(expired)) => {
                assert!(expired.last_observed.contains("did not complete"));
            }
            other => panic!("expected expiry, got {other:?}"),
        }
        assert_eq!(start.elapsed(), Duration::from_secs(30));
    }
}
