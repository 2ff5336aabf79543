//! 도달성 프로브
//!
//! 지정한 VRF(또는 기본 인터페이스)에 묶인 echo 프로브를 실행하고
//! 결과를 reachable / not-reachable / indeterminate로 분류합니다.
//!
//! # 분류 규칙
//! | 종료 상태 | 손실률 | 분류 |
//! |-----------|--------|------|
//! | 0         | 0%     | Reachable |
//! | 0 아님    | 100%   | NotReachable |
//! | 그 외     |        | Indeterminate |
//!
//! 손실률 요약 줄이 없는 실패(예: 인터페이스 없음)는 도달 불가로 보지 않습니다.

use std::fmt;
use std::net::IpAddr;
use std::sync::Arc;

use serde::Serialize;
use tracing::{debug, error, info};
use vrfcheck_core::types::{DEFAULT_SCOPE, VrfName};

use crate::error::ConformanceError;
use crate::platform::{ExecChannel, ExecOutput, ExitStatus, WorkloadRef};
use crate::poll::{Observation, PollError, PollSettings, poll_until};
use crate::validator::summarize;

/// 프로브를 묶을 범위
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProbeScope {
    /// VRF 디바이스에 바인딩
    Vrf(VrfName),
    /// VRF 밖 기본 인터페이스
    Default,
}

impl ProbeScope {
    /// `ping -I`에 넘길 디바이스 이름
    pub fn device<'a>(&'a self, default_interface: &'a str) -> &'a str {
        match self {
            Self::Vrf(vrf) => vrf.as_str(),
            Self::Default => default_interface,
        }
    }
}

impl fmt::Display for ProbeScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Vrf(vrf) => write!(f, "{vrf}"),
            Self::Default => f.write_str(DEFAULT_SCOPE),
        }
    }
}

/// 도달성 분류
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Reachability {
    Reachable,
    NotReachable,
    Indeterminate,
}

impl fmt::Display for Reachability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Reachable => write!(f, "reachable"),
            Self::NotReachable => write!(f, "unreachable"),
            Self::Indeterminate => write!(f, "indeterminate"),
        }
    }
}

/// 단일 프로브 결과
#[derive(Debug, Clone, PartialEq)]
pub struct ProbeResult {
    /// 종료 코드 0 여부
    pub success: bool,
    /// 출력에서 파싱한 손실률
    pub loss_percent: Option<f64>,
    pub classification: Reachability,
    /// 종료 상태와 출력 요약
    pub summary: String,
}

impl ProbeResult {
    /// exec 출력으로부터 결과를 만듭니다.
    pub fn from_output(output: &ExecOutput) -> Self {
        let combined = output.combined();
        let loss_percent = parse_packet_loss(&combined);
        let success = output.exit.success();
        let classification = classify(&output.exit, loss_percent);
        let summary = match loss_percent {
            Some(loss) => format!("{}, {loss}% packet loss", output.exit),
            None => format!(
                "{}, no packet loss summary: {}",
                output.exit,
                summarize(&combined)
            ),
        };
        Self {
            success,
            loss_percent,
            classification,
            summary,
        }
    }
}

/// 종료 상태와 손실률로 도달성을 분류합니다.
pub fn classify(exit: &ExitStatus, loss_percent: Option<f64>) -> Reachability {
    match (exit.success(), loss_percent) {
        (true, Some(loss)) if loss == 0.0 => Reachability::Reachable,
        (false, Some(loss)) if loss == 100.0 => Reachability::NotReachable,
        _ => Reachability::Indeterminate,
    }
}

/// echo 프로브 출력에서 `N% packet loss`의 N을 찾습니다.
pub fn parse_packet_loss(output: &str) -> Option<f64> {
    const MARKER: &str = "% packet loss";
    output.lines().find_map(|line| {
        let idx = line.find(MARKER)?;
        let number = line[..idx]
            .rsplit(|c: char| c.is_whitespace() || c == ',')
            .next()?;
        number.parse::<f64>().ok()
    })
}

/// 도달성 프로버
pub struct ReachabilityProber<E: ExecChannel> {
    exec: Arc<E>,
    default_interface: String,
    count: u32,
    wait: PollSettings,
}

impl<E: ExecChannel> ReachabilityProber<E> {
    pub fn new(
        exec: Arc<E>,
        default_interface: impl Into<String>,
        count: u32,
        wait: PollSettings,
    ) -> Self {
        Self {
            exec,
            default_interface: default_interface.into(),
            count,
            wait,
        }
    }

    /// 프로브 명령
    pub fn command(&self, scope: &ProbeScope, destination: IpAddr) -> Vec<String> {
        vec![
            "ping".to_owned(),
            "-I".to_owned(),
            scope.device(&self.default_interface).to_owned(),
            format!("-c{}", self.count),
            destination.to_string(),
        ]
    }

    /// 프로브를 한 번 실행합니다. exec 채널 실패는 에러로 반환됩니다.
    pub async fn probe(
        &self,
        source: &WorkloadRef,
        scope: &ProbeScope,
        destination: IpAddr,
    ) -> Result<ProbeResult, ConformanceError> {
        let argv = self.command(scope, destination);
        let output = self.exec.exec(source, &argv).await?;
        let result = ProbeResult::from_output(&output);
        debug!(
            source = %source,
            scope = %scope,
            destination = %destination,
            classification = %result.classification,
            summary = result.summary.as_str(),
            "probe completed"
        );
        Ok(result)
    }

    /// `destination`이 도달 가능하다고 관측될 때까지 재시도합니다.
    pub async fn assert_reachable(
        &self,
        source: &WorkloadRef,
        scope: &ProbeScope,
        destination: IpAddr,
    ) -> Result<ProbeResult, ConformanceError> {
        self.assert_classification(source, scope, destination, Reachability::Reachable)
            .await
    }

    /// `destination`이 도달 불가능하다고 관측될 때까지 재시도합니다.
    pub async fn assert_not_reachable(
        &self,
        source: &WorkloadRef,
        scope: &ProbeScope,
        destination: IpAddr,
    ) -> Result<ProbeResult, ConformanceError> {
        self.assert_classification(source, scope, destination, Reachability::NotReachable)
            .await
    }

    async fn assert_classification(
        &self,
        source: &WorkloadRef,
        scope: &ProbeScope,
        destination: IpAddr,
        expected: Reachability,
    ) -> Result<ProbeResult, ConformanceError> {
        let what = format!("{destination} {expected} from {source} via {scope}");
        let result: Result<ProbeResult, PollError<ConformanceError>> =
            poll_until(&what, self.wait, || async move {
                match self.probe(source, scope, destination).await {
                    Ok(result) if result.classification == expected => {
                        Ok(Observation::Ready(result))
                    }
                    Ok(result) => Ok(Observation::Pending(format!(
                        "{} ({})",
                        result.classification, result.summary
                    ))),
                    Err(e) => Ok(Observation::Pending(format!("exec failed: {e}"))),
                }
            })
            .await;

        match result {
            Ok(result) => {
                info!(
                    source = %source,
                    scope = %scope,
                    destination = %destination,
                    expected = %expected,
                    "reachability verified"
                );
                Ok(result)
            }
            Err(PollError::Aborted(e)) => Err(e),
            Err(PollError::Expired(expired)) => {
                error!(
                    source = %source,
                    scope = %scope,
                    destination = %destination,
                    expected = %expected,
                    last_observed = expired.last_observed.as_str(),
                    "reachability expectation not met"
                );
                Err(ConformanceError::ReachabilityDefect {
                    source_workload: source.to_string(),
                    scope: scope.to_string(),
                    destination: destination.to_string(),
                    expected: match expected {
                        Reachability::Reachable => "reachable",
                        Reachability::NotReachable => "unreachable",
                        Reachability::Indeterminate => "indeterminate",
                    },
                    last_observed: expired.last_observed,
                })
            }
        }
    }
}
