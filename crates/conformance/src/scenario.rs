//! VRF 격리 시나리오 오케스트레이터
//!
//! 두 VRF에 겹치는 주소를 가진 클라이언트/서버 워크로드를 만들고,
//! 각 VRF의 라우트 테이블만으로 도달성이 결정되는지 검증합니다.
//!
//! # 상태 전이
//!
//! ```text
//! Init -> StackCheck -> Provisioned -> BothRunning -> ConfigValidated
//!      -> PositiveVerified -> ServerDeleted -> NegativeVerified
//!      -> CrossCheckVerified -> Done
//!
//! StackCheck -> Skipped
//! (any)      -> Failed
//! ```
//!
//! 시나리오 전체는 `scenario_timeout`으로 제한되며, 만료 시 진행 중이던
//! 상태와 함께 `ScenarioDeadline` 실패로 보고됩니다.

use std::fmt;
use std::net::IpAddr;
use std::sync::Arc;

use serde::Serialize;
use tokio::time::Instant;
use tracing::{error, info, warn};
use uuid::Uuid;
use vrfcheck_core::types::{InterfaceAddress, IpFamily, MacAddress, VrfName};

use crate::attachment::AttachmentRef;
use crate::config::{ConformanceConfig, ReservedPair};
use crate::error::ConformanceError;
use crate::lifecycle::WorkloadLifecycle;
use crate::platform::{ExecChannel, PlatformApi};
use crate::prober::{ProbeScope, ReachabilityProber};
use crate::stack::{SkipReason, StackDecision, StackResolver};
use crate::validator::{ConfigValidator, VrfBindingExpectation};
use crate::workload::{NET_RAW, NetworkSelection, WorkloadSpec, interface_name};

/// 주소 관측용 임시 워크로드 이름 접두어
pub const OVERLAP_CLIENT_PREFIX: &str = "overlap-client-ip-";
pub const OVERLAP_SERVER_PREFIX: &str = "overlap-server-ip-";
/// 시나리오 워크로드 이름 접두어
pub const CLIENT_PREFIX: &str = "client-vrf-";
pub const SERVER_PREFIX: &str = "server-vrf-";

/// 시나리오 상태
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ScenarioState {
    Init,
    StackCheck,
    Provisioned,
    BothRunning,
    ConfigValidated,
    PositiveVerified,
    ServerDeleted,
    NegativeVerified,
    CrossCheckVerified,
    Done,
    Skipped,
    Failed,
}

impl ScenarioState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Done | Self::Skipped | Self::Failed)
    }
}

impl fmt::Display for ScenarioState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Init => "Init",
            Self::StackCheck => "StackCheck",
            Self::Provisioned => "Provisioned",
            Self::BothRunning => "BothRunning",
            Self::ConfigValidated => "ConfigValidated",
            Self::PositiveVerified => "PositiveVerified",
            Self::ServerDeleted => "ServerDeleted",
            Self::NegativeVerified => "NegativeVerified",
            Self::CrossCheckVerified => "CrossCheckVerified",
            Self::Done => "Done",
            Self::Skipped => "Skipped",
            Self::Failed => "Failed",
        };
        f.write_str(name)
    }
}

/// 시나리오 결과
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ScenarioOutcome {
    Passed,
    Skipped,
    Failed,
}

impl fmt::Display for ScenarioOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Passed => write!(f, "PASS"),
            Self::Skipped => write!(f, "SKIP"),
            Self::Failed => write!(f, "FAIL"),
        }
    }
}

/// 상태 전이 기록
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StateTransition {
    pub state: ScenarioState,
    /// 시나리오 시작부터의 경과 시간 (밀리초)
    pub elapsed_ms: u64,
}

/// 시나리오 실행 보고서
#[derive(Debug, Clone, Serialize)]
pub struct ScenarioReport {
    pub run_id: String,
    pub family: IpFamily,
    pub outcome: ScenarioOutcome,
    pub transitions: Vec<StateTransition>,
    /// 실패 시 진행 중이던 상태
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failed_state: Option<ScenarioState>,
    /// 실패 범주 ([`ConformanceError::kind`])
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_kind: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub skip_reason: Option<SkipReason>,
    pub duration_ms: u64,
}

impl ScenarioReport {
    pub fn passed(&self) -> bool {
        self.outcome == ScenarioOutcome::Passed
    }

    pub fn failed(&self) -> bool {
        self.outcome == ScenarioOutcome::Failed
    }

    pub fn skipped(&self) -> bool {
        self.outcome == ScenarioOutcome::Skipped
    }

    /// 마지막으로 기록된 상태
    pub fn final_state(&self) -> ScenarioState {
        self.transitions
            .last()
            .map_or(ScenarioState::Init, |t| t.state)
    }

    /// 상태 경로 (전이 순서)
    pub fn states(&self) -> Vec<ScenarioState> {
        self.transitions.iter().map(|t| t.state).collect()
    }
}

/// 시나리오 실행 환경 (스위트 준비 단계에서 결정)
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ScenarioContext {
    pub namespace: String,
    pub node_name: String,
    pub primary: AttachmentRef,
    pub secondary: AttachmentRef,
}

/// 상태 전이 추적기
struct Progress {
    started: Instant,
    current: ScenarioState,
    transitions: Vec<StateTransition>,
}

impl Progress {
    fn new() -> Self {
        let mut progress = Self {
            started: Instant::now(),
            current: ScenarioState::Init,
            transitions: Vec::new(),
        };
        progress.record(ScenarioState::Init);
        progress
    }

    fn elapsed_ms(&self) -> u64 {
        u64::try_from(self.started.elapsed().as_millis()).unwrap_or(u64::MAX)
    }

    fn record(&mut self, state: ScenarioState) {
        self.current = state;
        self.transitions.push(StateTransition {
            state,
            elapsed_ms: self.elapsed_ms(),
        });
    }

    fn enter(&mut self, state: ScenarioState, run_id: &str) {
        info!(run_id, from = %self.current, to = %state, "scenario state transition");
        self.record(state);
    }
}

enum Completion {
    Done,
    Skipped(SkipReason),
}

/// 한 워크로드의 인터페이스별 주소
struct Endpoint {
    primary: InterfaceAddress,
    overlap: InterfaceAddress,
    primary_mac: MacAddress,
    secondary_mac: MacAddress,
}

/// VRF 격리 시나리오
pub struct VrfScenario<P: PlatformApi, E: ExecChannel> {
    config: Arc<ConformanceConfig>,
    resolver: StackResolver,
    lifecycle: WorkloadLifecycle<P>,
    validator: ConfigValidator<E>,
    prober: ReachabilityProber<E>,
}

impl<P: PlatformApi, E: ExecChannel> VrfScenario<P, E> {
    pub fn new(platform: Arc<P>, exec: Arc<E>, config: Arc<ConformanceConfig>) -> Self {
        let reserved = [IpFamily::Ipv4, IpFamily::Ipv6]
            .into_iter()
            .filter(|f| config.reserved_for(*f).is_some())
            .collect();
        Self {
            resolver: StackResolver::new(config.supported_families.clone(), reserved),
            lifecycle: WorkloadLifecycle::new(
                platform,
                config.workload_wait,
                config.deletion_wait,
            ),
            validator: ConfigValidator::new(Arc::clone(&exec), config.config_wait),
            prober: ReachabilityProber::new(
                exec,
                config.default_interface.clone(),
                config.probe_count,
                config.reachability_wait,
            ),
            config,
        }
    }

    /// 요청 패밀리로 시나리오를 실행하고 보고서를 반환합니다.
    ///
    /// 실패도 보고서로 표현되므로 이 함수는 에러를 반환하지 않습니다.
    pub async fn run(&self, ctx: &ScenarioContext, family: IpFamily) -> ScenarioReport {
        let run_id = Uuid::new_v4().to_string();
        let limit = self.config.scenario_timeout;
        let mut progress = Progress::new();
        info!(
            run_id = run_id.as_str(),
            family = %family,
            namespace = ctx.namespace.as_str(),
            node = ctx.node_name.as_str(),
            "scenario started"
        );

        let bounded =
            tokio::time::timeout(limit, self.execute(ctx, family, &run_id, &mut progress)).await;
        let result = match bounded {
            Ok(result) => result,
            Err(_elapsed) => Err(ConformanceError::ScenarioDeadline {
                state: progress.current.to_string(),
                limit_secs: limit.as_secs(),
            }),
        };

        let mut report = ScenarioReport {
            run_id: run_id.clone(),
            family,
            outcome: ScenarioOutcome::Passed,
            transitions: Vec::new(),
            failed_state: None,
            error_kind: None,
            error: None,
            skip_reason: None,
            duration_ms: 0,
        };

        match result {
            Ok(Completion::Done) => {
                progress.enter(ScenarioState::Done, &run_id);
                info!(run_id = run_id.as_str(), family = %family, "scenario passed");
            }
            Ok(Completion::Skipped(reason)) => {
                progress.enter(ScenarioState::Skipped, &run_id);
                warn!(
                    run_id = run_id.as_str(),
                    family = %family,
                    reason = %reason,
                    "scenario skipped"
                );
                report.outcome = ScenarioOutcome::Skipped;
                report.skip_reason = Some(reason);
            }
            Err(e) => {
                let failed_state = progress.current;
                progress.enter(ScenarioState::Failed, &run_id);
                error!(
                    run_id = run_id.as_str(),
                    family = %family,
                    state = %failed_state,
                    kind = e.kind(),
                    error = %e,
                    "scenario failed"
                );
                report.outcome = ScenarioOutcome::Failed;
                report.failed_state = Some(failed_state);
                report.error_kind = Some(e.kind());
                report.error = Some(e.to_string());
            }
        }

        report.duration_ms = progress.elapsed_ms();
        report.transitions = progress.transitions;
        report
    }

    async fn execute(
        &self,
        ctx: &ScenarioContext,
        family: IpFamily,
        run_id: &str,
        progress: &mut Progress,
    ) -> Result<Completion, ConformanceError> {
        progress.enter(ScenarioState::StackCheck, run_id);
        if let StackDecision::Skip(reason) = self.resolver.check_requested(family) {
            return Ok(Completion::Skipped(reason));
        }
        let reserved = *self
            .config
            .reserved_for(family)
            .ok_or_else(|| ConformanceError::Config {
                field: format!("scenario.{family}"),
                reason: "no reserved addresses".to_owned(),
            })?;

        // 플랫폼이 할당하는 기본 네트워크 주소를 두 번째 VRF의 겹치는 주소로 사용
        let client_probe = self.probe_workload(ctx, OVERLAP_CLIENT_PREFIX)?;
        let server_probe = self.probe_workload(ctx, OVERLAP_SERVER_PREFIX)?;
        let client_observed = self.observe_primary_ip(&client_probe).await?;
        let server_observed = self.observe_primary_ip(&server_probe).await?;

        let decision = self
            .resolver
            .resolve(family, &[&client_observed, &server_observed]);
        if let StackDecision::Skip(reason) = decision {
            return Ok(Completion::Skipped(reason));
        }
        let client_overlap = parse_observed(&client_observed)?;
        let server_overlap = parse_observed(&server_observed)?;
        info!(
            run_id,
            client_overlap = %client_overlap,
            server_overlap = %server_overlap,
            "overlapping addresses observed"
        );

        let client = self.endpoint(&reserved, true, client_overlap)?;
        let server = self.endpoint(&reserved, false, server_overlap)?;

        let client_spec = self.vrf_workload(ctx, CLIENT_PREFIX, &client)?;
        let server_spec = self.vrf_workload(ctx, SERVER_PREFIX, &server)?;
        let client_ref = self.lifecycle.submit(&client_spec).await?;
        let server_ref = self.lifecycle.submit(&server_spec).await?;
        progress.enter(ScenarioState::Provisioned, run_id);

        self.lifecycle.await_running(&client_ref).await?;
        self.lifecycle.await_running(&server_ref).await?;
        progress.enter(ScenarioState::BothRunning, run_id);

        self.validator
            .await_vrf_binding(&client_ref, &self.expectations(&client))
            .await?;
        self.validator
            .await_vrf_binding(&server_ref, &self.expectations(&server))
            .await?;
        progress.enter(ScenarioState::ConfigValidated, run_id);

        let primary = ProbeScope::Vrf(self.config.primary_vrf.clone());
        let secondary = ProbeScope::Vrf(self.config.secondary_vrf.clone());
        let server_primary = server.primary.ip();
        let server_overlap = server.overlap.ip();

        self.prober
            .assert_reachable(&client_ref, &secondary, server_overlap)
            .await?;
        self.prober
            .assert_reachable(&client_ref, &primary, server_primary)
            .await?;
        progress.enter(ScenarioState::PositiveVerified, run_id);

        self.lifecycle.delete_and_await_absent(&server_ref).await?;
        progress.enter(ScenarioState::ServerDeleted, run_id);

        self.prober
            .assert_not_reachable(&client_ref, &primary, server_primary)
            .await?;
        self.prober
            .assert_not_reachable(&client_ref, &secondary, server_overlap)
            .await?;
        progress.enter(ScenarioState::NegativeVerified, run_id);

        // 겹치는 주소는 여전히 주소 관측용 워크로드가 기본 네트워크에서 소유
        self.prober
            .assert_reachable(&client_ref, &ProbeScope::Default, server_overlap)
            .await?;
        progress.enter(ScenarioState::CrossCheckVerified, run_id);

        Ok(Completion::Done)
    }

    fn probe_workload(
        &self,
        ctx: &ScenarioContext,
        prefix: &str,
    ) -> Result<WorkloadSpec, ConformanceError> {
        WorkloadSpec::builder(ctx.namespace.clone(), prefix)
            .node(ctx.node_name.clone())
            .image(self.config.image.clone())
            .capability(NET_RAW)
            .build()
    }

    async fn observe_primary_ip(&self, spec: &WorkloadSpec) -> Result<String, ConformanceError> {
        let running = self.lifecycle.create_and_await_running(spec).await?;
        Ok(running.primary_ip.unwrap_or_default())
    }

    fn endpoint(
        &self,
        reserved: &ReservedPair,
        is_client: bool,
        overlap: IpAddr,
    ) -> Result<Endpoint, ConformanceError> {
        let macs = &self.config.macs;
        let (primary, primary_mac, secondary_mac) = if is_client {
            (reserved.client, &macs.client_primary, &macs.client_secondary)
        } else {
            (reserved.server, &macs.server_primary, &macs.server_secondary)
        };
        Ok(Endpoint {
            primary,
            overlap: InterfaceAddress::new(overlap, primary.prefix_len())?,
            primary_mac: primary_mac.clone(),
            secondary_mac: secondary_mac.clone(),
        })
    }

    fn vrf_workload(
        &self,
        ctx: &ScenarioContext,
        prefix: &str,
        endpoint: &Endpoint,
    ) -> Result<WorkloadSpec, ConformanceError> {
        WorkloadSpec::builder(ctx.namespace.clone(), prefix)
            .node(ctx.node_name.clone())
            .image(self.config.image.clone())
            .capability(NET_RAW)
            .network(NetworkSelection::new(
                &ctx.primary,
                endpoint.primary_mac.clone(),
                endpoint.primary,
            ))
            .network(NetworkSelection::new(
                &ctx.secondary,
                endpoint.secondary_mac.clone(),
                endpoint.overlap,
            ))
            .build()
    }

    fn expectations(&self, endpoint: &Endpoint) -> [VrfBindingExpectation; 2] {
        [
            binding(&self.config.primary_vrf, endpoint.primary.ip(), 0),
            binding(&self.config.secondary_vrf, endpoint.overlap.ip(), 1),
        ]
    }
}

fn binding(vrf: &VrfName, address: IpAddr, index: usize) -> VrfBindingExpectation {
    VrfBindingExpectation {
        vrf: vrf.clone(),
        address,
        interface: interface_name(index),
    }
}

/// 관측된 주소를 파싱합니다. IPv4-mapped IPv6는 IPv4로 정규화합니다.
fn parse_observed(observed: &str) -> Result<IpAddr, ConformanceError> {
    let addr = observed.trim().parse::<IpAddr>().map_err(|e| {
        vrfcheck_core::error::ValidationError::new("observed address", observed, e.to_string())
    })?;
    Ok(match addr {
        IpAddr::V6(v6) => v6.to_ipv4_mapped().map_or(addr, IpAddr::V4),
        IpAddr::V4(_) => addr,
    })
}
