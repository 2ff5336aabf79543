//! VRF 설정 검증
//!
//! 실행 중인 워크로드 안에서 두 가지를 확인합니다.
//!
//! 1. `ip addr show <interface>` 출력에 기대 주소가 있음
//! 2. `ip [-6] route show vrf <vrf>` 출력에 기대 주소를 `src`로 갖거나
//!    목적지 prefix로 포함하는 라우트가 있음
//!
//! 인터페이스 부재, exec 실패, 빈 라우트 테이블은 모두 "아직 아님"으로
//! 취급하고 기대값마다 제한 시간 안에서 재시도합니다.

use std::net::IpAddr;
use std::sync::Arc;

use tracing::{error, info};
use vrfcheck_core::types::VrfName;

use crate::error::ConformanceError;
use crate::platform::{ExecChannel, ExecOutput, WorkloadRef};
use crate::poll::{Observation, PollError, PollSettings, poll_until};

/// 마지막 관측 출력의 최대 길이
const MAX_OBSERVED_LEN: usize = 512;

/// 워크로드 하나의 VRF 소속 기대값
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VrfBindingExpectation {
    pub vrf: VrfName,
    pub address: IpAddr,
    /// 워크로드 안의 인터페이스 이름 (예: `net1`)
    pub interface: String,
}

/// 출력의 공백 구분 토큰 중 `address`와 같은 주소가 있는지 확인합니다.
///
/// `/prefix` 접미사는 무시하므로 `10.255.255.1/24`는 `10.255.255.1`과 같고,
/// `10.255.255.10`과는 다릅니다.
pub fn mentions_address(output: &str, address: IpAddr) -> bool {
    output.split_whitespace().any(|token| {
        let ip = token.split_once('/').map_or(token, |(ip, _)| ip);
        ip.parse::<IpAddr>().is_ok_and(|parsed| parsed == address)
    })
}

/// 라우트 출력 중 `address`를 다루는 라우트가 있는지 확인합니다.
///
/// IPv4 connected 라우트는 `src <addr>`을 갖지만, IPv6 커널 라우트
/// (`fd00:ffff::/64 dev net1 proto kernel metric 256 pref medium`)에는 없으므로
/// 각 줄의 목적지 prefix가 주소를 포함하는지도 봅니다. `default`와 `/0`은 제외.
pub fn route_covers(output: &str, address: IpAddr) -> bool {
    output.lines().any(|line| {
        let destination = line.split_whitespace().next().unwrap_or_default();
        prefix_contains(destination, address) || mentions_address(line, address)
    })
}

fn prefix_contains(cidr: &str, address: IpAddr) -> bool {
    let Some((network, len)) = cidr.split_once('/') else {
        return false;
    };
    let (Ok(network), Ok(len)) = (network.parse::<IpAddr>(), len.parse::<u32>()) else {
        return false;
    };
    match (network, address) {
        (IpAddr::V4(net), IpAddr::V4(addr)) if (1..=32).contains(&len) => {
            let mask = u32::MAX << (32 - len);
            u32::from(net) & mask == u32::from(addr) & mask
        }
        (IpAddr::V6(net), IpAddr::V6(addr)) if (1..=128).contains(&len) => {
            let mask = u128::MAX << (128 - len);
            u128::from(net) & mask == u128::from(addr) & mask
        }
        _ => false,
    }
}

/// `ip route show vrf <vrf>`는 IPv4 라우트만 나열하므로 IPv6는 `-6`을 붙입니다.
fn route_argv(vrf: &VrfName, address: IpAddr) -> Vec<String> {
    let mut argv = vec!["ip".to_owned()];
    if address.is_ipv6() {
        argv.push("-6".to_owned());
    }
    argv.extend(
        ["route", "show", "vrf", vrf.as_str()]
            .iter()
            .map(|s| (*s).to_owned()),
    );
    argv
}

/// 로그/에러용으로 출력을 한 줄로 줄입니다.
pub(crate) fn summarize(output: &str) -> String {
    let flat = output.split_whitespace().collect::<Vec<_>>().join(" ");
    if flat.len() <= MAX_OBSERVED_LEN {
        return flat;
    }
    let mut end = MAX_OBSERVED_LEN;
    while !flat.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}...", &flat[..end])
}

/// VRF 설정 검증기
pub struct ConfigValidator<E: ExecChannel> {
    exec: Arc<E>,
    wait: PollSettings,
}

impl<E: ExecChannel> ConfigValidator<E> {
    pub fn new(exec: Arc<E>, wait: PollSettings) -> Self {
        Self { exec, wait }
    }

    /// 모든 기대값이 관측될 때까지 기다립니다.
    pub async fn await_vrf_binding(
        &self,
        workload: &WorkloadRef,
        expectations: &[VrfBindingExpectation],
    ) -> Result<(), ConformanceError> {
        for expectation in expectations {
            self.await_interface_address(workload, expectation).await?;
            self.await_vrf_route(workload, expectation).await?;
            info!(
                workload = %workload,
                vrf = %expectation.vrf,
                interface = expectation.interface.as_str(),
                address = %expectation.address,
                "vrf binding verified"
            );
        }
        Ok(())
    }

    async fn await_interface_address(
        &self,
        workload: &WorkloadRef,
        expectation: &VrfBindingExpectation,
    ) -> Result<(), ConformanceError> {
        let argv = vec![
            "ip".to_owned(),
            "addr".to_owned(),
            "show".to_owned(),
            expectation.interface.clone(),
        ];
        let what = format!(
            "{} on {workload} interface {}",
            expectation.address, expectation.interface
        );
        self.await_output(workload, expectation, &what, &argv, |out| {
            if !out.exit.success() {
                return Observation::Pending(format!(
                    "interface {} not present ({}): {}",
                    expectation.interface,
                    out.exit,
                    summarize(&out.combined())
                ));
            }
            if mentions_address(&out.stdout, expectation.address) {
                Observation::Ready(())
            } else {
                Observation::Pending(format!(
                    "interface {} lacks {}: {}",
                    expectation.interface,
                    expectation.address,
                    summarize(&out.stdout)
                ))
            }
        })
        .await
    }

    async fn await_vrf_route(
        &self,
        workload: &WorkloadRef,
        expectation: &VrfBindingExpectation,
    ) -> Result<(), ConformanceError> {
        let argv = route_argv(&expectation.vrf, expectation.address);
        let what = format!("vrf {} route table on {workload}", expectation.vrf);
        self.await_output(workload, expectation, &what, &argv, |out| {
            if out.stdout.trim().is_empty() {
                return Observation::Pending(format!(
                    "route table for vrf {} is empty ({})",
                    expectation.vrf, out.exit
                ));
            }
            if route_covers(&out.stdout, expectation.address) {
                Observation::Ready(())
            } else {
                Observation::Pending(format!(
                    "route table for vrf {} does not cover {}: {}",
                    expectation.vrf,
                    expectation.address,
                    summarize(&out.stdout)
                ))
            }
        })
        .await
    }

    async fn await_output<F>(
        &self,
        workload: &WorkloadRef,
        expectation: &VrfBindingExpectation,
        what: &str,
        argv: &[String],
        classify: F,
    ) -> Result<(), ConformanceError>
    where
        F: Fn(&ExecOutput) -> Observation<()>,
    {
        let exec = &self.exec;
        let classify = &classify;
        let result: Result<(), PollError<ConformanceError>> =
            poll_until(what, self.wait, || async move {
                match exec.exec(workload, argv).await {
                    Ok(out) => Ok(classify(&out)),
                    Err(e) => Ok(Observation::Pending(format!("exec failed: {e}"))),
                }
            })
            .await;

        match result {
            Ok(()) => Ok(()),
            Err(PollError::Aborted(e)) => Err(e),
            Err(PollError::Expired(expired)) => {
                error!(
                    workload = %workload,
                    vrf = %expectation.vrf,
                    interface = expectation.interface.as_str(),
                    last_observed = expired.last_observed.as_str(),
                    "vrf configuration not observed"
                );
                Err(ConformanceError::ConfigurationDefect {
                    workload: workload.to_string(),
                    vrf: expectation.vrf.to_string(),
                    interface: expectation.interface.clone(),
                    address: expectation.address.to_string(),
                    last_observed: expired.last_observed,
                })
            }
        }
    }
}
