//! 도메인 타입 — 시스템 전역에서 사용되는 공통 타입
//!
//! 모든 값 타입은 생성 시점에 검증됩니다. 잘못된 VRF 이름이나 주소는
//! 사용 시점이 아니라 파싱/생성 시점에 [`ValidationError`]로 거부됩니다.

use std::fmt;
use std::net::IpAddr;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::ValidationError;

/// Linux 인터페이스 이름 최대 길이 (IFNAMSIZ - 1)
pub const MAX_VRF_NAME_LEN: usize = 15;

/// VRF 범위 대신 워크로드 기본 네트워크를 뜻하는 예약어
pub const DEFAULT_SCOPE: &str = "default";

/// IP 주소 패밀리
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IpFamily {
    /// IPv4
    Ipv4,
    /// IPv6
    Ipv6,
}

impl IpFamily {
    /// 주소가 속한 패밀리를 반환합니다.
    ///
    /// IPv4-mapped IPv6 주소(`::ffff:a.b.c.d`)는 IPv4로 분류합니다.
    pub fn of(addr: &IpAddr) -> Self {
        match addr {
            IpAddr::V4(_) => Self::Ipv4,
            IpAddr::V6(v6) if v6.to_ipv4_mapped().is_some() => Self::Ipv4,
            IpAddr::V6(_) => Self::Ipv6,
        }
    }

    /// 주소 문자열의 패밀리를 판별합니다. 주소로 파싱할 수 없으면 `None`.
    pub fn classify(observed: &str) -> Option<Self> {
        observed.trim().parse::<IpAddr>().ok().map(|a| Self::of(&a))
    }

    /// 설정/CLI에서 사용하는 소문자 이름
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Ipv4 => "ipv4",
            Self::Ipv6 => "ipv6",
        }
    }
}

impl fmt::Display for IpFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for IpFamily {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "ipv4" => Ok(Self::Ipv4),
            "ipv6" => Ok(Self::Ipv6),
            _ => Err(ValidationError::new(
                "ip family",
                s,
                "expected 'ipv4' or 'ipv6'",
            )),
        }
    }
}

/// VRF 이름
///
/// VRF는 커널에 네트워크 디바이스로 생성되므로 인터페이스 이름 규칙을 따릅니다.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct VrfName(String);

impl VrfName {
    /// VRF 이름을 검증하고 생성합니다.
    pub fn new(name: impl Into<String>) -> Result<Self, ValidationError> {
        let name = name.into();
        if name.is_empty() {
            return Err(ValidationError::new("vrf name", name, "must not be empty"));
        }
        if name.len() > MAX_VRF_NAME_LEN {
            return Err(ValidationError::new(
                "vrf name",
                name,
                format!("must be at most {MAX_VRF_NAME_LEN} bytes"),
            ));
        }
        if !name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
        {
            return Err(ValidationError::new(
                "vrf name",
                name,
                "only ASCII alphanumerics, '-' and '_' are allowed",
            ));
        }
        if name == DEFAULT_SCOPE {
            return Err(ValidationError::new(
                "vrf name",
                name,
                "'default' is reserved for the non-VRF scope",
            ));
        }
        Ok(Self(name))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for VrfName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for VrfName {
    type Error = ValidationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<VrfName> for String {
    fn from(value: VrfName) -> Self {
        value.0
    }
}

/// MAC 주소 (소문자 콜론 표기로 정규화)
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct MacAddress(String);

impl MacAddress {
    /// `aa:bb:cc:dd:ee:ff` 형식을 검증합니다. 대소문자는 구분하지 않습니다.
    pub fn new(mac: impl Into<String>) -> Result<Self, ValidationError> {
        let mac = mac.into();
        let octets: Vec<&str> = mac.split(':').collect();
        let well_formed = octets.len() == 6
            && octets
                .iter()
                .all(|o| o.len() == 2 && o.chars().all(|c| c.is_ascii_hexdigit()));
        if !well_formed {
            return Err(ValidationError::new(
                "mac address",
                mac,
                "expected six colon-separated hex octets",
            ));
        }
        Ok(Self(mac.to_ascii_lowercase()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for MacAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for MacAddress {
    type Error = ValidationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<MacAddress> for String {
    fn from(value: MacAddress) -> Self {
        value.0
    }
}

/// 인터페이스에 할당되는 주소 (CIDR 표기)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct InterfaceAddress {
    ip: IpAddr,
    prefix_len: u8,
}

impl InterfaceAddress {
    /// 프리픽스 길이를 주소 패밀리에 맞게 검증합니다.
    pub fn new(ip: IpAddr, prefix_len: u8) -> Result<Self, ValidationError> {
        let max = match ip {
            IpAddr::V4(_) => 32,
            IpAddr::V6(_) => 128,
        };
        if prefix_len > max {
            return Err(ValidationError::new(
                "interface address",
                format!("{ip}/{prefix_len}"),
                format!("prefix length must be 0-{max}"),
            ));
        }
        Ok(Self { ip, prefix_len })
    }

    pub fn ip(&self) -> IpAddr {
        self.ip
    }

    pub fn prefix_len(&self) -> u8 {
        self.prefix_len
    }

    pub fn family(&self) -> IpFamily {
        IpFamily::of(&self.ip)
    }
}

impl fmt::Display for InterfaceAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.ip, self.prefix_len)
    }
}

impl FromStr for InterfaceAddress {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (ip, prefix) = s.split_once('/').ok_or_else(|| {
            ValidationError::new("interface address", s, "expected <ip>/<prefix-length>")
        })?;
        let ip = ip
            .parse::<IpAddr>()
            .map_err(|e| ValidationError::new("interface address", s, e.to_string()))?;
        let prefix_len = prefix
            .parse::<u8>()
            .map_err(|e| ValidationError::new("interface address", s, e.to_string()))?;
        Self::new(ip, prefix_len)
    }
}

impl TryFrom<String> for InterfaceAddress {
    type Error = ValidationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<InterfaceAddress> for String {
    fn from(value: InterfaceAddress) -> Self {
        value.to_string()
    }
}

/// 워크로드 단계
///
/// 플랫폼이 보고하는 워크로드 상태입니다. 알 수 없는 값은 `Unknown`으로 매핑됩니다.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum WorkloadPhase {
    /// 스케줄링 또는 컨테이너 시작 대기 중
    #[default]
    Pending,
    /// 실행 중
    Running,
    /// 정상 종료
    Succeeded,
    /// 비정상 종료
    Failed,
    /// 플랫폼이 상태를 판단할 수 없음
    Unknown,
}

impl WorkloadPhase {
    /// 플랫폼 문자열에서 단계를 파싱합니다. 대소문자를 구분하지 않습니다.
    pub fn from_str_loose(s: &str) -> Self {
        match s.to_ascii_lowercase().as_str() {
            "pending" => Self::Pending,
            "running" => Self::Running,
            "succeeded" => Self::Succeeded,
            "failed" => Self::Failed,
            _ => Self::Unknown,
        }
    }

    /// 더 이상 Running으로 전이하지 않는 종료 단계인지 확인합니다.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Succeeded | Self::Failed)
    }
}

impl fmt::Display for WorkloadPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Pending => write!(f, "Pending"),
            Self::Running => write!(f, "Running"),
            Self::Succeeded => write!(f, "Succeeded"),
            Self::Failed => write!(f, "Failed"),
            Self::Unknown => write!(f, "Unknown"),
        }
    }
}
