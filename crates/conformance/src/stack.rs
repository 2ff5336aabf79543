//! IP 스택 판별
//!
//! 요청된 패밀리를 클러스터가 지원하는지 판단합니다. 지원하지 않으면
//! 시나리오는 실패가 아니라 건너뜀으로 끝납니다.

use std::fmt;

use serde::Serialize;
use vrfcheck_core::types::IpFamily;

/// 시나리오를 건너뛰는 이유
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum SkipReason {
    /// 설정상 지원 목록에 없는 패밀리
    Unsupported { family: IpFamily },
    /// 패밀리에 대한 예약 주소가 없음
    NoReservedAddresses { family: IpFamily },
    /// 클러스터가 다른 패밀리의 주소를 할당함
    FamilyMismatch {
        requested: IpFamily,
        observed: IpFamily,
        address: String,
    },
    /// 관측된 주소의 패밀리를 판별할 수 없음
    UnknownFamily { observed: String },
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unsupported { family } => {
                write!(f, "unsupported protocol parameter: {family}")
            }
            Self::NoReservedAddresses { family } => {
                write!(f, "unsupported protocol parameter: no reserved {family} addresses")
            }
            Self::FamilyMismatch {
                requested,
                observed,
                address,
            } => write!(
                f,
                "environment does not support the requested configuration: requested {requested}, cluster assigned {observed} address {address}"
            ),
            Self::UnknownFamily { observed } => {
                write!(f, "unsupported: cannot determine ip family of '{observed}'")
            }
        }
    }
}

/// 판별 결과
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StackDecision {
    Proceed(IpFamily),
    Skip(SkipReason),
}

/// IP 스택 판별기
#[derive(Debug, Clone)]
pub struct StackResolver {
    supported: Vec<IpFamily>,
    reserved: Vec<IpFamily>,
}

impl StackResolver {
    /// `supported`: 설정상 지원 패밀리, `reserved`: 예약 주소가 있는 패밀리
    pub fn new(supported: Vec<IpFamily>, reserved: Vec<IpFamily>) -> Self {
        Self {
            supported,
            reserved,
        }
    }

    /// 워크로드를 만들기 전에 요청 패밀리를 검사합니다.
    pub fn check_requested(&self, requested: IpFamily) -> StackDecision {
        if !self.supported.contains(&requested) {
            return StackDecision::Skip(SkipReason::Unsupported { family: requested });
        }
        if !self.reserved.contains(&requested) {
            return StackDecision::Skip(SkipReason::NoReservedAddresses { family: requested });
        }
        StackDecision::Proceed(requested)
    }

    /// 플랫폼이 할당한 주소들로 요청 패밀리를 확인합니다.
    ///
    /// 모든 주소가 요청 패밀리여야 진행합니다.
    pub fn resolve(&self, requested: IpFamily, observed: &[&str]) -> StackDecision {
        if let StackDecision::Skip(reason) = self.check_requested(requested) {
            return StackDecision::Skip(reason);
        }
        for address in observed {
            match IpFamily::classify(address) {
                None => {
                    return StackDecision::Skip(SkipReason::UnknownFamily {
                        observed: (*address).to_owned(),
                    });
                }
                Some(family) if family != requested => {
                    return StackDecision::Skip(SkipReason::FamilyMismatch {
                        requested,
                        observed: family,
                        address: (*address).to_owned(),
                    });
                }
                Some(_) => {}
            }
        }
        StackDecision::Proceed(requested)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn v4_only() -> StackResolver {
        StackResolver::new(vec![IpFamily::Ipv4], vec![IpFamily::Ipv4, IpFamily::Ipv6])
    }

    #[test]
    fn ipv4_cluster_proceeds() {
        assert_eq!(
            v4_only().resolve(IpFamily::Ipv4, &["10.128.2.15", "10.128.2.16"]),
            StackDecision::Proceed(IpFamily::Ipv4)
        );
    }

    #[test]
    fn ipv6_cluster_skips_ipv4_request() {
        let decision = v4_only().resolve(IpFamily::Ipv4, &["fd01:0:0:5::2f"]);
        match decision {
            StackDecision::Skip(reason @ SkipReason::FamilyMismatch { .. }) => {
                assert!(reason.to_string().contains("does not support"));
            }
            other => panic!("expected mismatch skip, got {other:?}"),
        }
    }

    #[test]
    fn unknown_address_skips() {
        assert!(matches!(
            v4_only().resolve(IpFamily::Ipv4, &[""]),
            StackDecision::Skip(SkipReason::UnknownFamily { .. })
        ));
    }

    #[test]
    fn unsupported_family_skips_before_observation() {
        assert_eq!(
            v4_only().check_requested(IpFamily::Ipv6),
            StackDecision::Skip(SkipReason::Unsupported {
                family: IpFamily::Ipv6
            })
        );
        assert!(matches!(
            v4_only().resolve(IpFamily::Ipv6, &["fd01::1"]),
            StackDecision::Skip(SkipReason::Unsupported { .. })
        ));
    }

    #[test]
    fn missing_reserved_addresses_skip() {
        let resolver = StackResolver::new(vec![IpFamily::Ipv4, IpFamily::Ipv6], vec![IpFamily::Ipv4]);
        assert!(matches!(
            resolver.check_requested(IpFamily::Ipv6),
            StackDecision::Skip(SkipReason::NoReservedAddresses { .. })
        ));
    }

    #[test]
    fn mapped_ipv4_counts_as_ipv4() {
        assert_eq!(
            v4_only().resolve(IpFamily::Ipv4, &["::ffff:10.128.0.9"]),
            StackDecision::Proceed(IpFamily::Ipv4)
        );
    }

    #[test]
    fn skip_reason_serializes_with_tag() {
        let json = serde_json::to_value(SkipReason::Unsupported {
            family: IpFamily::Ipv6,
        })
        .unwrap();
        assert_eq!(json["reason"], "unsupported");
        assert_eq!(json["family"], "ipv6");
    }
}
