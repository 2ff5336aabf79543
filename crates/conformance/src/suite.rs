//! 적합성 스위트 -- 실행 단위 준비/정리
//!
//! 실행마다 한 번 네임스페이스 확인, 워커 노드 선택, VRF 어태치먼트 생성을
//! 수행하고, 요청된 패밀리마다 시나리오를 하나씩 실행합니다. 각 시나리오
//! 뒤에는 네임스페이스의 워크로드를 정리합니다.

use std::sync::Arc;

use serde::Serialize;
use tracing::{info, warn};
use vrfcheck_core::types::IpFamily;

use crate::attachment::AttachmentProvisioner;
use crate::config::ConformanceConfig;
use crate::error::ConformanceError;
use crate::platform::{ExecChannel, PlatformApi};
use crate::scenario::{ScenarioContext, ScenarioReport, VrfScenario};

/// 스위트 실행 결과
#[derive(Debug, Clone, Serialize)]
pub struct SuiteReport {
    pub namespace: String,
    pub node_name: String,
    pub scenarios: Vec<ScenarioReport>,
}

impl SuiteReport {
    pub fn passed(&self) -> usize {
        self.scenarios.iter().filter(|r| r.passed()).count()
    }

    pub fn failed(&self) -> usize {
        self.scenarios.iter().filter(|r| r.failed()).count()
    }

    pub fn skipped(&self) -> usize {
        self.scenarios.iter().filter(|r| r.skipped()).count()
    }

    pub fn has_failures(&self) -> bool {
        self.failed() > 0
    }
}

/// 적합성 스위트
pub struct ConformanceSuite<P: PlatformApi, E: ExecChannel> {
    platform: Arc<P>,
    config: Arc<ConformanceConfig>,
    scenario: VrfScenario<P, E>,
}

impl<P: PlatformApi, E: ExecChannel> ConformanceSuite<P, E> {
    pub fn new(platform: Arc<P>, exec: Arc<E>, config: ConformanceConfig) -> Self {
        let config = Arc::new(config);
        Self {
            scenario: VrfScenario::new(Arc::clone(&platform), exec, Arc::clone(&config)),
            platform,
            config,
        }
    }

    /// 네임스페이스, 노드, 어태치먼트를 준비합니다.
    pub async fn prepare(&self) -> Result<ScenarioContext, ConformanceError> {
        let namespace = self.config.namespace.clone();
        self.platform.ensure_namespace(&namespace).await?;

        let node_name = if self.config.node_name.is_empty() {
            let nodes = self
                .platform
                .list_nodes(&self.config.worker_selector)
                .await?;
            nodes.into_iter().next().ok_or_else(|| {
                ConformanceError::platform(
                    "select node",
                    format!("no nodes match '{}'", self.config.worker_selector),
                )
            })?
        } else {
            self.config.node_name.clone()
        };

        let provisioner = AttachmentProvisioner::new(Arc::clone(&self.platform), namespace.clone());
        let primary = provisioner
            .ensure_attachment(&self.config.primary_attachment, &self.config.primary_vrf)
            .await?;
        let secondary = provisioner
            .ensure_attachment(&self.config.secondary_attachment, &self.config.secondary_vrf)
            .await?;

        info!(
            namespace = namespace.as_str(),
            node = node_name.as_str(),
            primary = primary.name.as_str(),
            secondary = secondary.name.as_str(),
            "suite prepared"
        );
        Ok(ScenarioContext {
            namespace,
            node_name,
            primary,
            secondary,
        })
    }

    /// 요청된 패밀리마다 시나리오를 실행합니다.
    ///
    /// 준비 단계 실패만 에러로 반환하며, 시나리오 실패는 보고서에 담깁니다.
    pub async fn run(&self, families: &[IpFamily]) -> Result<SuiteReport, ConformanceError> {
        let ctx = self.prepare().await?;
        let mut scenarios = Vec::with_capacity(families.len());

        let mut seen = Vec::with_capacity(families.len());
        for family in families {
            if seen.contains(family) {
                continue;
            }
            seen.push(*family);

            let report = self.scenario.run(&ctx, *family).await;
            scenarios.push(report);
            self.cleanup(&ctx.namespace).await;
        }

        Ok(SuiteReport {
            namespace: ctx.namespace,
            node_name: ctx.node_name,
            scenarios,
        })
    }

    async fn cleanup(&self, namespace: &str) {
        if self.config.keep_workloads {
            info!(namespace, "keeping scenario workloads");
            return;
        }
        match self.platform.delete_all_workloads(namespace).await {
            Ok(()) => info!(namespace, "scenario workloads deleted"),
            Err(e) => warn!(namespace, error = %e, "failed to delete scenario workloads"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ConformanceConfigBuilder;
    use crate::platform::mock::MockPlatform;

    fn suite(
        platform: MockPlatform,
        node: &str,
    ) -> (Arc<MockPlatform>, ConformanceSuite<MockPlatform, MockPlatform>) {
        let platform = Arc::new(platform);
        let config = ConformanceConfigBuilder::new().node_name(node).build().unwrap();
        let suite = ConformanceSuite::new(Arc::clone(&platform), Arc::clone(&platform), config);
        (platform, suite)
    }

    #[tokio::test]
    async fn prepare_selects_first_worker_and_creates_attachments() {
        let (platform, suite) = suite(MockPlatform::new().with_nodes(&["worker-0", "worker-1"]), "");
        let ctx = suite.prepare().await.unwrap();
        assert_eq!(ctx.namespace, "vrf-testing");
        assert_eq!(ctx.node_name, "worker-0");
        assert_eq!(ctx.primary.vrf.as_str(), "blue");
        assert_eq!(ctx.secondary.vrf.as_str(), "red");
        assert!(ctx.primary.name.starts_with("test-vrf-blue"));
        assert_eq!(platform.attachments.lock().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn prepare_uses_configured_node() {
        let (_platform, suite) = suite(MockPlatform::new(), "worker-7");
        let ctx = suite.prepare().await.unwrap();
        assert_eq!(ctx.node_name, "worker-7");
    }

    #[tokio::test]
    async fn prepare_fails_without_workers() {
        let (_platform, suite) = suite(MockPlatform::new(), "");
        let err = suite.prepare().await.unwrap_err();
        assert_eq!(err.kind(), "provisioning");
        assert!(err.to_string().contains("no nodes match"));
    }

    #[tokio::test]
    async fn unsupported_family_is_reported_as_skip() {
        let (platform, suite) = suite(MockPlatform::new(), "worker-0");
        let report = suite.run(&[IpFamily::Ipv6, IpFamily::Ipv6]).await.unwrap();
        assert_eq!(report.scenarios.len(), 1);
        assert_eq!(report.skipped(), 1);
        assert!(!report.has_failures());
        // 건너뛴 시나리오는 워크로드를 만들지 않음
        assert!(platform.created.lock().unwrap().is_empty());
    }
}
