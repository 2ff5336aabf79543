//! kube-rs 기반 플랫폼 구현
//!
//! [`KubePlatform`]은 [`PlatformApi`]와 [`ExecChannel`]을 모두 구현합니다.
//! 네트워크 어태치먼트는 Multus `NetworkAttachmentDefinition`으로,
//! 워크로드는 노드에 고정된 단일 컨테이너 Pod로 표현됩니다.

use std::path::Path;
use std::time::Duration;

use k8s_openapi::api::core::v1::{
    Capabilities, Container, Event, Namespace, Node, Pod, PodSpec, SecurityContext,
};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::{ObjectMeta, Status};
use kube::api::{Api, AttachParams, DeleteParams, DynamicObject, ListParams, PostParams};
use kube::config::{KubeConfigOptions, Kubeconfig};
use kube::core::{ApiResource, GroupVersionKind};
use kube::{Client, Config};
use tokio::io::{AsyncRead, AsyncReadExt};
use tracing::{debug, info};
use vrfcheck_core::types::WorkloadPhase;

use crate::attachment::{AttachmentRef, NetworkAttachment};
use crate::error::ConformanceError;
use crate::platform::{
    ExecChannel, ExecOutput, ExitStatus, PlatformApi, WorkloadEvent, WorkloadRef, WorkloadStatus,
};
use crate::workload::{HOSTNAME_LABEL, NETWORKS_ANNOTATION, WorkloadSpec};

/// 이 도구가 생성한 객체에 붙이는 레이블
pub const MANAGED_BY_LABEL: &str = "app.kubernetes.io/managed-by";
pub const MANAGED_BY_VALUE: &str = "vrfcheck";

const NAD_GROUP: &str = "k8s.cni.cncf.io";
const NAD_VERSION: &str = "v1";
const NAD_KIND: &str = "NetworkAttachmentDefinition";
const NAD_PLURAL: &str = "network-attachment-definitions";

/// kube-rs 클라이언트 기반 플랫폼
#[derive(Clone)]
pub struct KubePlatform {
    client: Client,
}

impl KubePlatform {
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    /// 기본 규칙(KUBECONFIG, in-cluster)으로 클라이언트를 구성합니다.
    pub async fn try_default() -> Result<Self, ConformanceError> {
        let client = Client::try_default()
            .await
            .map_err(|e| ConformanceError::platform("connect", e))?;
        Ok(Self::new(client))
    }

    /// 지정한 kubeconfig 파일로 클라이언트를 구성합니다.
    pub async fn from_kubeconfig(path: &Path) -> Result<Self, ConformanceError> {
        let kubeconfig = Kubeconfig::read_from(path).map_err(|e| ConformanceError::Config {
            field: "cluster.kubeconfig".to_owned(),
            reason: format!("{}: {e}", path.display()),
        })?;
        let config = Config::from_custom_kubeconfig(kubeconfig, &KubeConfigOptions::default())
            .await
            .map_err(|e| ConformanceError::Config {
                field: "cluster.kubeconfig".to_owned(),
                reason: e.to_string(),
            })?;
        let client =
            Client::try_from(config).map_err(|e| ConformanceError::platform("connect", e))?;
        Ok(Self::new(client))
    }

    fn pods(&self, namespace: &str) -> Api<Pod> {
        Api::namespaced(self.client.clone(), namespace)
    }
}

/// `NetworkAttachmentDefinition` 리소스 정의
pub fn attachment_resource() -> ApiResource {
    let gvk = GroupVersionKind::gvk(NAD_GROUP, NAD_VERSION, NAD_KIND);
    ApiResource::from_gvk_with_plural(&gvk, NAD_PLURAL)
}

/// 어태치먼트 생성 요청 객체를 만듭니다.
pub fn attachment_manifest(attachment: &NetworkAttachment) -> Result<DynamicObject, ConformanceError> {
    let config = attachment.config().to_json()?;
    serde_json::from_value(serde_json::json!({
        "apiVersion": format!("{NAD_GROUP}/{NAD_VERSION}"),
        "kind": NAD_KIND,
        "metadata": {
            "generateName": attachment.name_prefix,
            "namespace": attachment.namespace,
            "labels": { MANAGED_BY_LABEL: MANAGED_BY_VALUE },
        },
        "spec": { "config": config },
    }))
    .map_err(|e| ConformanceError::platform("encode network attachment", e))
}

/// 워크로드 정의를 Pod 객체로 변환합니다.
pub fn pod_manifest(spec: &WorkloadSpec) -> Result<Pod, ConformanceError> {
    let annotations = spec
        .networks_annotation()?
        .map(|value| [(NETWORKS_ANNOTATION.to_owned(), value)].into());

    let security_context = (!spec.capabilities.is_empty()).then(|| SecurityContext {
        capabilities: Some(Capabilities {
            add: Some(spec.capabilities.clone()),
            drop: None,
        }),
        ..Default::default()
    });

    Ok(Pod {
        metadata: ObjectMeta {
            generate_name: Some(spec.name_prefix.clone()),
            namespace: Some(spec.namespace.clone()),
            labels: Some([(MANAGED_BY_LABEL.to_owned(), MANAGED_BY_VALUE.to_owned())].into()),
            annotations,
            ..Default::default()
        },
        spec: Some(PodSpec {
            node_selector: Some([(HOSTNAME_LABEL.to_owned(), spec.node_name.clone())].into()),
            termination_grace_period_seconds: Some(0),
            containers: vec![Container {
                name: "test".to_owned(),
                image: Some(spec.image.clone()),
                command: Some(spec.command.clone()),
                security_context,
                ..Default::default()
            }],
            ..Default::default()
        }),
        status: None,
    })
}

/// Pod 상태를 플랫폼 독립 스냅샷으로 변환합니다.
pub fn workload_status(pod: &Pod) -> WorkloadStatus {
    let status = pod.status.as_ref();
    WorkloadStatus {
        phase: status
            .and_then(|s| s.phase.as_deref())
            .map(WorkloadPhase::from_str_loose)
            .unwrap_or_default(),
        primary_ip: status.and_then(|s| s.pod_ip.clone()),
        node: pod.spec.as_ref().and_then(|s| s.node_name.clone()),
    }
}

/// exec 종료 상태 객체를 해석합니다.
///
/// 실패 시 종료 코드는 `details.causes`의 `ExitCode` 항목에 들어 있습니다.
pub fn exit_status(status: Option<&Status>) -> ExitStatus {
    let Some(status) = status else {
        return ExitStatus::Unknown("no status reported".to_owned());
    };
    if status.status.as_deref() == Some("Success") {
        return ExitStatus::Success;
    }
    let code = status
        .details
        .as_ref()
        .and_then(|d| d.causes.as_ref())
        .and_then(|causes| {
            causes
                .iter()
                .find(|c| c.reason.as_deref() == Some("ExitCode"))
                .and_then(|c| c.message.as_deref())
                .and_then(|m| m.trim().parse::<i32>().ok())
        });
    match code {
        Some(code) => ExitStatus::Code(code),
        None => ExitStatus::Unknown(
            status
                .message
                .clone()
                .unwrap_or_else(|| "unknown failure".to_owned()),
        ),
    }
}

fn map_kube_error(operation: &str, kind: &'static str, name: &str, err: kube::Error) -> ConformanceError {
    match err {
        kube::Error::Api(ae) if ae.code == 404 => ConformanceError::NotFound {
            kind,
            name: name.to_owned(),
        },
        other => ConformanceError::platform(operation, other),
    }
}

/// 비 UTF-8 바이트는 치환하고, 스트림 에러 시 그때까지 읽은 출력을 남깁니다.
async fn read_stream(stream: Option<impl AsyncRead + Unpin>) -> String {
    let mut buf = Vec::new();
    if let Some(mut stream) = stream {
        if let Err(e) = stream.read_to_end(&mut buf).await {
            debug!(error = %e, read = buf.len(), "exec stream ended with error");
        }
    }
    String::from_utf8_lossy(&buf).into_owned()
}

impl PlatformApi for KubePlatform {
    async fn ensure_namespace(&self, namespace: &str) -> Result<(), ConformanceError> {
        let api: Api<Namespace> = Api::all(self.client.clone());
        let ns = Namespace {
            metadata: ObjectMeta {
                name: Some(namespace.to_owned()),
                ..Default::default()
            },
            ..Default::default()
        };
        match api.create(&PostParams::default(), &ns).await {
            Ok(_) => {
                info!(namespace, "namespace created");
                Ok(())
            }
            Err(kube::Error::Api(ae)) if ae.code == 409 => {
                debug!(namespace, "namespace already exists");
                Ok(())
            }
            Err(e) => Err(ConformanceError::platform("create namespace", e)),
        }
    }

    async fn list_nodes(&self, selector: &str) -> Result<Vec<String>, ConformanceError> {
        let api: Api<Node> = Api::all(self.client.clone());
        let params = if selector.is_empty() {
            ListParams::default()
        } else {
            ListParams::default().labels(selector)
        };
        let nodes = api
            .list(&params)
            .await
            .map_err(|e| ConformanceError::platform("list nodes", e))?;
        let mut names: Vec<String> = nodes
            .items
            .into_iter()
            .filter_map(|node| node.metadata.name)
            .collect();
        names.sort();
        Ok(names)
    }

    async fn create_attachment(
        &self,
        attachment: &NetworkAttachment,
    ) -> Result<AttachmentRef, ConformanceError> {
        let resource = attachment_resource();
        let api: Api<DynamicObject> =
            Api::namespaced_with(self.client.clone(), &attachment.namespace, &resource);
        let manifest = attachment_manifest(attachment)?;
        let created = api
            .create(&PostParams::default(), &manifest)
            .await
            .map_err(|e| ConformanceError::platform("create network attachment", e))?;
        let name = created.metadata.name.ok_or_else(|| {
            ConformanceError::platform("create network attachment", "server returned no name")
        })?;
        Ok(AttachmentRef {
            namespace: attachment.namespace.clone(),
            name,
            vrf: attachment.vrf().clone(),
        })
    }

    async fn create_workload(&self, spec: &WorkloadSpec) -> Result<WorkloadRef, ConformanceError> {
        let pod = pod_manifest(spec)?;
        let created = self
            .pods(&spec.namespace)
            .create(&PostParams::default(), &pod)
            .await
            .map_err(|e| ConformanceError::platform("create workload", e))?;
        let name = created
            .metadata
            .name
            .ok_or_else(|| ConformanceError::platform("create workload", "server returned no name"))?;
        Ok(WorkloadRef::new(spec.namespace.clone(), name))
    }

    async fn get_workload(&self, workload: &WorkloadRef) -> Result<WorkloadStatus, ConformanceError> {
        let pod = self
            .pods(&workload.namespace)
            .get(&workload.name)
            .await
            .map_err(|e| map_kube_error("get workload", "workload", &workload.name, e))?;
        Ok(workload_status(&pod))
    }

    async fn delete_workload(
        &self,
        workload: &WorkloadRef,
        grace_period: Duration,
    ) -> Result<(), ConformanceError> {
        let params = DeleteParams {
            grace_period_seconds: Some(u32::try_from(grace_period.as_secs()).unwrap_or(u32::MAX)),
            ..Default::default()
        };
        self.pods(&workload.namespace)
            .delete(&workload.name, &params)
            .await
            .map_err(|e| map_kube_error("delete workload", "workload", &workload.name, e))?;
        Ok(())
    }

    async fn workload_events(
        &self,
        workload: &WorkloadRef,
    ) -> Result<Vec<WorkloadEvent>, ConformanceError> {
        let api: Api<Event> = Api::namespaced(self.client.clone(), &workload.namespace);
        let selector = format!("involvedObject.name={}", workload.name);
        let events = api
            .list(&ListParams::default().fields(&selector))
            .await
            .map_err(|e| ConformanceError::platform("list events", e))?;
        Ok(events
            .items
            .into_iter()
            .map(|e| WorkloadEvent {
                kind: e.type_.unwrap_or_default(),
                reason: e.reason.unwrap_or_default(),
                message: e.message.unwrap_or_default(),
            })
            .collect())
    }

    async fn delete_all_workloads(&self, namespace: &str) -> Result<(), ConformanceError> {
        let params = DeleteParams {
            grace_period_seconds: Some(0),
            ..Default::default()
        };
        let selector = format!("{MANAGED_BY_LABEL}={MANAGED_BY_VALUE}");
        self.pods(namespace)
            .delete_collection(&params, &ListParams::default().labels(&selector))
            .await
            .map_err(|e| ConformanceError::platform("delete workloads", e))?;
        Ok(())
    }
}

impl ExecChannel for KubePlatform {
    async fn exec(
        &self,
        workload: &WorkloadRef,
        argv: &[String],
    ) -> Result<ExecOutput, ConformanceError> {
        let exec_error = |reason: String| ConformanceError::Exec {
            workload: workload.to_string(),
            reason,
        };
        let params = AttachParams::default().stdin(false).stdout(true).stderr(true);
        let mut attached = self
            .pods(&workload.namespace)
            .exec(&workload.name, argv.to_vec(), &params)
            .await
            .map_err(|e| exec_error(e.to_string()))?;

        let status = attached.take_status();
        let stdout = attached.stdout();
        let stderr = attached.stderr();
        let (stdout, stderr) = tokio::join!(read_stream(stdout), read_stream(stderr));
        let status = match status {
            Some(status) => status.await,
            None => None,
        };
        attached.join().await.map_err(|e| exec_error(e.to_string()))?;

        Ok(ExecOutput {
            stdout,
            stderr,
            exit: exit_status(status.as_ref()),
        })
    }
}

#[cfg(test)]
mod tests {
    use k8s_openapi::apimachinery::pkg::apis::meta::v1::{StatusCause, StatusDetails};
    use vrfcheck_core::types::{InterfaceAddress, MacAddress, VrfName};

    use super::*;
    use crate::workload::{NET_RAW, NetworkSelection};

    fn attachment_ref(name: &str, vrf: &str) -> AttachmentRef {
        AttachmentRef {
            namespace: "vrf-testing".to_owned(),
            name: name.to_owned(),
            vrf: VrfName::new(vrf).unwrap(),
        }
    }

    fn client_spec() -> WorkloadSpec {
        WorkloadSpec::builder("vrf-testing", "client-vrf-")
            .node("worker-0")
            .image("quay.io/example/cnf-tests:latest")
            .capability(NET_RAW)
            .network(NetworkSelection::new(
                &attachment_ref("test-vrf-blueab12c", "blue"),
                MacAddress::new("20:04:0f:f1:88:01").unwrap(),
                InterfaceAddress::new("192.168.0.1".parse().unwrap(), 24).unwrap(),
            ))
            .build()
            .unwrap()
    }

    #[test]
    fn pod_manifest_pins_node_and_selects_networks() {
        let pod = pod_manifest(&client_spec()).unwrap();
        assert_eq!(pod.metadata.generate_name.as_deref(), Some("client-vrf-"));
        assert_eq!(pod.metadata.name, None);

        let spec = pod.spec.unwrap();
        let selector = spec.node_selector.unwrap();
        assert_eq!(selector.get(HOSTNAME_LABEL).map(String::as_str), Some("worker-0"));

        let annotations = pod.metadata.annotations.unwrap();
        let networks: serde_json::Value =
            serde_json::from_str(&annotations[NETWORKS_ANNOTATION]).unwrap();
        assert_eq!(networks[0]["name"], "test-vrf-blueab12c");
        assert_eq!(networks[0]["ips"][0], "192.168.0.1/24");

        let container = &spec.containers[0];
        let caps = container
            .security_context
            .as_ref()
            .and_then(|s| s.capabilities.as_ref())
            .and_then(|c| c.add.clone())
            .unwrap();
        assert_eq!(caps, vec![NET_RAW.to_owned()]);
    }

    #[test]
    fn probe_pod_has_no_network_annotation() {
        let spec = WorkloadSpec::builder("vrf-testing", "overlap-client-ip-")
            .node("worker-0")
            .image("img")
            .build()
            .unwrap();
        let pod = pod_manifest(&spec).unwrap();
        assert!(pod.metadata.annotations.is_none());
        assert!(pod.spec.unwrap().containers[0].security_context.is_none());
    }

    #[test]
    fn attachment_manifest_embeds_vrf_chain() {
        let attachment =
            NetworkAttachment::new("vrf-testing", "test-vrf-red", &VrfName::new("red").unwrap())
                .unwrap();
        let obj = attachment_manifest(&attachment).unwrap();
        assert_eq!(obj.metadata.generate_name.as_deref(), Some("test-vrf-red"));
        let config: serde_json::Value =
            serde_json::from_str(obj.data["spec"]["config"].as_str().unwrap()).unwrap();
        assert_eq!(config["plugins"][1]["type"], "vrf");
        assert_eq!(config["plugins"][1]["vrfname"], "red");
        assert_eq!(attachment_resource().plural, NAD_PLURAL);
    }

    #[test]
    fn status_conversion_reads_phase_ip_and_node() {
        let pod: Pod = serde_json::from_value(serde_json::json!({
            "metadata": { "name": "client-vrf-abcde" },
            "spec": { "nodeName": "worker-0", "containers": [] },
            "status": { "phase": "Running", "podIP": "10.128.2.15" },
        }))
        .unwrap();
        let status = workload_status(&pod);
        assert_eq!(status.phase, WorkloadPhase::Running);
        assert_eq!(status.primary_ip.as_deref(), Some("10.128.2.15"));
        assert_eq!(status.node.as_deref(), Some("worker-0"));

        assert_eq!(workload_status(&Pod::default()).phase, WorkloadPhase::Pending);
    }

    #[test]
    fn exit_status_reads_exit_code_cause() {
        let success = Status {
            status: Some("Success".to_owned()),
            ..Default::default()
        };
        assert_eq!(exit_status(Some(&success)), ExitStatus::Success);

        let failure = Status {
            status: Some("Failure".to_owned()),
            reason: Some("NonZeroExitCode".to_owned()),
            details: Some(StatusDetails {
                causes: Some(vec![StatusCause {
                    reason: Some("ExitCode".to_owned()),
                    message: Some("1".to_owned()),
                    field: None,
                }]),
                ..Default::default()
            }),
            ..Default::default()
        };
        assert_eq!(exit_status(Some(&failure)), ExitStatus::Code(1));
        assert!(matches!(exit_status(None), ExitStatus::Unknown(_)));
    }

    struct BrokenPipe;

    impl AsyncRead for BrokenPipe {
        fn poll_read(
            self: std::pin::Pin<&mut Self>,
            _cx: &mut std::task::Context<'_>,
            _buf: &mut tokio::io::ReadBuf<'_>,
        ) -> std::task::Poll<std::io::Result<()>> {
            std::task::Poll::Ready(Err(std::io::Error::from(std::io::ErrorKind::BrokenPipe)))
        }
    }

    #[tokio::test]
    async fn read_stream_keeps_output_with_invalid_utf8() {
        let bytes: &[u8] = b"5 packets transmitted, 5 received, 0% packet loss\n\xff\xfe";
        let out = read_stream(Some(bytes)).await;
        assert!(out.contains("0% packet loss"));
        assert!(out.ends_with('\u{FFFD}'));
    }

    #[tokio::test]
    async fn read_stream_keeps_partial_output_on_error() {
        let head: &[u8] = b"PING 10.255.255.2";
        let out = read_stream(Some(head.chain(BrokenPipe))).await;
        assert_eq!(out, "PING 10.255.255.2");
        assert_eq!(read_stream(None::<&[u8]>).await, "");
    }
}
