//! 워크로드 정의
//!
//! [`WorkloadSpec`]은 플랫폼 독립적인 워크로드 정의입니다. 보조 인터페이스는
//! 어태치먼트 순서대로 `net1`, `net2`, ... 로 이름이 붙습니다.

use serde::{Deserialize, Serialize};
use vrfcheck_core::types::{InterfaceAddress, MacAddress};

use crate::attachment::AttachmentRef;
use crate::error::ConformanceError;

/// 네트워크 선택 어노테이션 키
pub const NETWORKS_ANNOTATION: &str = "k8s.v1.cni.cncf.io/networks";

/// 노드 고정에 사용하는 레이블
pub const HOSTNAME_LABEL: &str = "kubernetes.io/hostname";

/// echo 프로브에 필요한 capability
pub const NET_RAW: &str = "NET_RAW";

/// 기본 컨테이너 명령
pub const DEFAULT_COMMAND: [&str; 3] = ["/bin/bash", "-c", "sleep INF"];

/// 보조 인터페이스 이름 (0부터 시작하는 인덱스 -> `net1`, `net2`, ...)
pub fn interface_name(index: usize) -> String {
    format!("net{}", index + 1)
}

/// 워크로드의 보조 네트워크 하나
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetworkSelection {
    /// 어태치먼트 이름
    pub name: String,
    pub mac: MacAddress,
    pub ips: Vec<InterfaceAddress>,
}

impl NetworkSelection {
    pub fn new(attachment: &AttachmentRef, mac: MacAddress, address: InterfaceAddress) -> Self {
        Self {
            name: attachment.name.clone(),
            mac,
            ips: vec![address],
        }
    }
}

/// 플랫폼에 제출할 워크로드 정의
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkloadSpec {
    pub namespace: String,
    /// 이름 접두어 (최종 이름은 플랫폼이 생성)
    pub name_prefix: String,
    pub node_name: String,
    pub image: String,
    pub command: Vec<String>,
    pub capabilities: Vec<String>,
    pub networks: Vec<NetworkSelection>,
}

impl WorkloadSpec {
    pub fn builder(namespace: impl Into<String>, name_prefix: impl Into<String>) -> WorkloadSpecBuilder {
        WorkloadSpecBuilder::new(namespace, name_prefix)
    }

    /// 네트워크 선택 어노테이션 값. 보조 네트워크가 없으면 `None`.
    pub fn networks_annotation(&self) -> Result<Option<String>, ConformanceError> {
        if self.networks.is_empty() {
            return Ok(None);
        }
        serde_json::to_string(&self.networks)
            .map(Some)
            .map_err(|e| ConformanceError::platform("encode network selection", e))
    }

    /// 어태치먼트 이름에 대응하는 인터페이스 이름
    pub fn interface_for(&self, attachment: &str) -> Option<String> {
        self.networks
            .iter()
            .position(|n| n.name == attachment)
            .map(interface_name)
    }
}

/// [`WorkloadSpec`] 빌더
pub struct WorkloadSpecBuilder {
    spec: WorkloadSpec,
}

impl WorkloadSpecBuilder {
    fn new(namespace: impl Into<String>, name_prefix: impl Into<String>) -> Self {
        Self {
            spec: WorkloadSpec {
                namespace: namespace.into(),
                name_prefix: name_prefix.into(),
                node_name: String::new(),
                image: String::new(),
                command: DEFAULT_COMMAND.iter().map(|s| (*s).to_owned()).collect(),
                capabilities: Vec::new(),
                networks: Vec::new(),
            },
        }
    }

    /// 워크로드를 배치할 노드
    pub fn node(mut self, node_name: impl Into<String>) -> Self {
        self.spec.node_name = node_name.into();
        self
    }

    pub fn image(mut self, image: impl Into<String>) -> Self {
        self.spec.image = image.into();
        self
    }

    pub fn command(mut self, command: Vec<String>) -> Self {
        self.spec.command = command;
        self
    }

    /// capability를 추가합니다. 중복은 무시됩니다.
    pub fn capability(mut self, capability: impl Into<String>) -> Self {
        let capability = capability.into();
        if !self.spec.capabilities.contains(&capability) {
            self.spec.capabilities.push(capability);
        }
        self
    }

    /// 보조 네트워크를 추가합니다. 인터페이스 이름은 추가 순서로 결정됩니다.
    pub fn network(mut self, selection: NetworkSelection) -> Self {
        self.spec.networks.push(selection);
        self
    }

    pub fn build(self) -> Result<WorkloadSpec, ConformanceError> {
        let spec = self.spec;
        for (field, value) in [
            ("workload.namespace", &spec.namespace),
            ("workload.name_prefix", &spec.name_prefix),
            ("workload.node_name", &spec.node_name),
            ("workload.image", &spec.image),
        ] {
            if value.trim().is_empty() {
                return Err(ConformanceError::Config {
                    field: field.to_owned(),
                    reason: "must not be empty".to_owned(),
                });
            }
        }
        if spec.command.is_empty() {
            return Err(ConformanceError::Config {
                field: "workload.command".to_owned(),
                reason: "must not be empty".to_owned(),
            });
        }
        let mut seen = Vec::with_capacity(spec.networks.len());
        for selection in &spec.networks {
            if seen.contains(&&selection.name) {
                return Err(ConformanceError::Config {
                    field: "workload.networks".to_owned(),
                    reason: format!("attachment '{}' selected twice", selection.name),
                });
            }
            seen.push(&selection.name);
        }
        Ok(spec)
    }
}
