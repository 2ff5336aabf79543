//! VRF 네트워크 어태치먼트
//!
//! 어태치먼트는 static IPAM macvlan 플러그인과 VRF 플러그인을 체인으로 묶은
//! CNI 설정을 담습니다. 설정 JSON은 타입이 있는 구조체에서만 직렬화됩니다.
//!
//! ```text
//! {"cniVersion":"0.4.0","name":"macvlan-vrf",
//!  "plugins":[{"type":"macvlan","ipam":{"type":"static"}},
//!             {"type":"vrf","vrfname":"blue"}]}
//! ```

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::info;
use vrfcheck_core::types::VrfName;

use crate::error::ConformanceError;
use crate::platform::PlatformApi;

/// 어태치먼트 CNI 설정 버전
pub const CNI_VERSION: &str = "0.4.0";

/// 어태치먼트 CNI 네트워크 이름
pub const CNI_NETWORK_NAME: &str = "macvlan-vrf";

/// CNI 체인 설정
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CniConfig {
    pub cni_version: String,
    pub name: String,
    pub plugins: Vec<CniPlugin>,
}

/// CNI 플러그인
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum CniPlugin {
    /// L2 macvlan 인터페이스
    Macvlan { ipam: Ipam },
    /// 인터페이스를 VRF 디바이스에 종속시킴
    Vrf { vrfname: VrfName },
}

/// IP 주소 관리 방식
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Ipam {
    /// 워크로드 네트워크 선택에 명시된 주소를 그대로 할당
    Static,
}

impl CniConfig {
    /// static macvlan + VRF 체인을 생성합니다.
    pub fn vrf_chain(vrf: &VrfName) -> Self {
        Self {
            cni_version: CNI_VERSION.to_owned(),
            name: CNI_NETWORK_NAME.to_owned(),
            plugins: vec![
                CniPlugin::Macvlan { ipam: Ipam::Static },
                CniPlugin::Vrf {
                    vrfname: vrf.clone(),
                },
            ],
        }
    }

    /// 체인에 포함된 VRF 이름
    pub fn vrf(&self) -> Option<&VrfName> {
        self.plugins.iter().find_map(|p| match p {
            CniPlugin::Vrf { vrfname } => Some(vrfname),
            CniPlugin::Macvlan { .. } => None,
        })
    }

    pub fn to_json(&self) -> Result<String, ConformanceError> {
        serde_json::to_string(self).map_err(|e| ConformanceError::platform("encode cni config", e))
    }
}

/// 생성 요청할 네트워크 어태치먼트
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NetworkAttachment {
    pub namespace: String,
    /// 이름 접두어 (최종 이름은 플랫폼이 생성)
    pub name_prefix: String,
    vrf: VrfName,
    config: CniConfig,
}

impl NetworkAttachment {
    pub fn new(
        namespace: impl Into<String>,
        name_prefix: impl Into<String>,
        vrf: &VrfName,
    ) -> Result<Self, ConformanceError> {
        let namespace = namespace.into();
        let name_prefix = name_prefix.into();
        if namespace.is_empty() {
            return Err(ConformanceError::Config {
                field: "attachment.namespace".to_owned(),
                reason: "must not be empty".to_owned(),
            });
        }
        if name_prefix.is_empty() {
            return Err(ConformanceError::Config {
                field: "attachment.name_prefix".to_owned(),
                reason: "must not be empty".to_owned(),
            });
        }
        Ok(Self {
            namespace,
            name_prefix,
            vrf: vrf.clone(),
            config: CniConfig::vrf_chain(vrf),
        })
    }

    pub fn vrf(&self) -> &VrfName {
        &self.vrf
    }

    pub fn config(&self) -> &CniConfig {
        &self.config
    }
}

/// 생성된 어태치먼트
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AttachmentRef {
    pub namespace: String,
    pub name: String,
    pub vrf: VrfName,
}

/// 어태치먼트 생성기
///
/// 테스트 실행당 VRF마다 한 번 호출됩니다. 매 호출은 새 이름으로 생성되므로
/// 기존 어태치먼트를 변경하지 않습니다.
pub struct AttachmentProvisioner<P: PlatformApi> {
    platform: Arc<P>,
    namespace: String,
}

impl<P: PlatformApi> AttachmentProvisioner<P> {
    pub fn new(platform: Arc<P>, namespace: impl Into<String>) -> Self {
        Self {
            platform,
            namespace: namespace.into(),
        }
    }

    /// `vrf`에 묶인 어태치먼트를 생성합니다.
    pub async fn ensure_attachment(
        &self,
        name_prefix: &str,
        vrf: &VrfName,
    ) -> Result<AttachmentRef, ConformanceError> {
        let attachment = NetworkAttachment::new(self.namespace.clone(), name_prefix, vrf)?;
        let created = self.platform.create_attachment(&attachment).await?;
        info!(
            namespace = created.namespace.as_str(),
            attachment = created.name.as_str(),
            vrf = %vrf,
            "network attachment created"
        );
        Ok(created)
    }
}
