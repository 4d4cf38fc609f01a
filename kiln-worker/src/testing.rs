//! Test fixtures and in-memory collaborators

use anyhow::{Result, bail};
use async_trait::async_trait;
use kiln_core::domain::assembly::{Assembly, AssemblyStatus};
use kiln_core::domain::image::{Image, ImageStatus};
use kiln_core::domain::job::{BuildJob, RequestContext, SourceInfo};
use kiln_core::dto::build::BuildStatusUpdate;
use serde_json::Map;
use std::collections::HashMap;
use std::io::Write;
use std::path::Path;
use std::process::{Command, Stdio};
use std::sync::Mutex;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use uuid::Uuid;

use crate::credentials::PrivateKey;
use crate::repository::{
    DeploymentTrigger, Notifier, ObjectStore, RecordStore, SecretVault, ServiceCatalog,
};

pub fn request_context() -> RequestContext {
    RequestContext {
        auth_token: "token-abc".to_string(),
        auth_url: "http://identity:5000/v3".to_string(),
        tenant: "demo".to_string(),
    }
}

pub fn sample_job(test_cmd: Option<&str>) -> BuildJob {
    BuildJob {
        build_id: Uuid::new_v4(),
        source: SourceInfo {
            source_url: "https://example.com/app.git".to_string(),
            commit_sha: None,
            status_url: None,
            status_token: None,
        },
        name: "app".to_string(),
        base_image_id: "ubuntu".to_string(),
        source_format: "heroku".to_string(),
        image_format: "qcow2".to_string(),
        assembly_id: Some(Uuid::new_v4()),
        test_cmd: test_cmd.map(str::to_string),
        credential_ref: None,
    }
}

pub fn private_key(key: &str) -> PrivateKey {
    PrivateKey::new(key)
}

/// Writes an executable `/bin/sh` script, creating parent directories
///
/// The file is written by a child `sh`, so no writable descriptor to it is
/// ever open in the test process while other tests spawn scripts.
pub fn write_script(path: &Path, body: &str) {
    std::fs::create_dir_all(path.parent().unwrap()).unwrap();

    let mut child = Command::new("/bin/sh")
        .arg("-c")
        .arg("cat > \"$0\" && chmod 755 \"$0\"")
        .arg(path)
        .stdin(Stdio::piped())
        .spawn()
        .unwrap();
    {
        let mut stdin = child.stdin.take().unwrap();
        write!(stdin, "#!/bin/sh\n{}", body).unwrap();
    }
    assert!(child.wait().unwrap().success());
}

/// Local HTTP endpoint standing in for a commit-status API
///
/// Answers `requests` sequential requests with `status` and returns them raw.
pub async fn status_server(status: &'static str, requests: usize) -> (String, JoinHandle<Vec<String>>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let url = format!(
        "http://{}/repos/o/app/statuses/abc123",
        listener.local_addr().unwrap()
    );

    let handle = tokio::spawn(async move {
        let mut received = Vec::new();

        for _ in 0..requests {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut request = Vec::new();
            let mut chunk = [0u8; 1024];

            loop {
                let n = socket.read(&mut chunk).await.unwrap();
                if n == 0 {
                    break;
                }
                request.extend_from_slice(&chunk[..n]);

                if let Some(end) = request.windows(4).position(|w| w == b"\r\n\r\n") {
                    let head = String::from_utf8_lossy(&request[..end]).to_lowercase();
                    let body_len = head
                        .lines()
                        .find_map(|line| line.strip_prefix("content-length:"))
                        .map(|len| len.trim().parse::<usize>().unwrap())
                        .unwrap_or(0);
                    if request.len() >= end + 4 + body_len {
                        break;
                    }
                }
            }

            let response = format!(
                "HTTP/1.1 {}\r\ncontent-length: 0\r\nconnection: close\r\n\r\n",
                status
            );
            socket.write_all(response.as_bytes()).await.unwrap();
            received.push(String::from_utf8(request).unwrap());
        }

        received
    });

    (url, handle)
}

/// Lowercased request head and parsed JSON body
pub fn split_request(raw: &str) -> (String, serde_json::Value) {
    let (head, body) = raw.split_once("\r\n\r\n").unwrap();
    (head.to_lowercase(), serde_json::from_str(body).unwrap())
}

pub struct FailingCatalog;

#[async_trait]
impl ServiceCatalog for FailingCatalog {
    async fn image_endpoint(&self, _ctx: &RequestContext) -> Result<String> {
        bail!("token expired")
    }
}

pub struct StaticVault {
    payload: String,
}

impl StaticVault {
    pub fn new(payload: impl Into<String>) -> Self {
        Self {
            payload: payload.into(),
        }
    }
}

#[async_trait]
impl SecretVault for StaticVault {
    async fn get_secret(&self, _ctx: &RequestContext, _reference: &str) -> Result<String> {
        Ok(self.payload.clone())
    }
}

pub struct FailingVault;

#[async_trait]
impl SecretVault for FailingVault {
    async fn get_secret(&self, _ctx: &RequestContext, reference: &str) -> Result<String> {
        bail!("vault unavailable for {}", reference)
    }
}

/// Record store seeded with one job's assembly and image
#[derive(Default)]
pub struct InMemoryRecords {
    assemblies: Mutex<HashMap<Uuid, Assembly>>,
    images: Mutex<HashMap<Uuid, Image>>,
    history: Mutex<HashMap<Uuid, Vec<AssemblyStatus>>>,
}

impl InMemoryRecords {
    pub fn for_job(job: &BuildJob) -> Self {
        let records = Self::default();
        if let Some(id) = job.assembly_id {
            records.assemblies.lock().unwrap().insert(
                id,
                Assembly {
                    id,
                    status: AssemblyStatus::Queued,
                    plan_uri: None,
                    extra: Map::new(),
                },
            );
        }
        records.images.lock().unwrap().insert(
            job.build_id,
            Image {
                id: job.build_id,
                status: ImageStatus::Queued,
                created_image_id: None,
                extra: Map::new(),
            },
        );
        records
    }

    pub fn assembly(&self, id: Uuid) -> Assembly {
        self.assemblies.lock().unwrap()[&id].clone()
    }

    pub fn with_assembly(&self, id: Uuid, f: impl FnOnce(&mut Assembly)) {
        f(self.assemblies.lock().unwrap().get_mut(&id).unwrap());
    }

    pub fn image(&self, id: Uuid) -> Image {
        self.images.lock().unwrap()[&id].clone()
    }

    /// Every status saved for an assembly, in order
    pub fn assembly_history(&self, id: Uuid) -> Vec<AssemblyStatus> {
        self.history
            .lock()
            .unwrap()
            .get(&id)
            .cloned()
            .unwrap_or_default()
    }
}

#[async_trait]
impl RecordStore for InMemoryRecords {
    async fn get_assembly(&self, _ctx: &RequestContext, id: Uuid) -> Result<Assembly> {
        match self.assemblies.lock().unwrap().get(&id) {
            Some(assembly) => Ok(assembly.clone()),
            None => bail!("assembly {} not found", id),
        }
    }

    async fn save_assembly(&self, _ctx: &RequestContext, assembly: &Assembly) -> Result<()> {
        self.history
            .lock()
            .unwrap()
            .entry(assembly.id)
            .or_default()
            .push(assembly.status);
        self.assemblies
            .lock()
            .unwrap()
            .insert(assembly.id, assembly.clone());
        Ok(())
    }

    async fn get_image(&self, _ctx: &RequestContext, id: Uuid) -> Result<Image> {
        match self.images.lock().unwrap().get(&id) {
            Some(image) => Ok(image.clone()),
            None => bail!("image {} not found", id),
        }
    }

    async fn save_image(&self, _ctx: &RequestContext, image: &Image) -> Result<()> {
        self.images.lock().unwrap().insert(image.id, image.clone());
        Ok(())
    }
}

#[derive(Default)]
pub struct RecordingNotifier {
    updates: Mutex<Vec<(Uuid, BuildStatusUpdate)>>,
}

impl RecordingNotifier {
    pub fn updates(&self) -> Vec<(Uuid, BuildStatusUpdate)> {
        self.updates.lock().unwrap().clone()
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn notify(&self, build_id: Uuid, update: &BuildStatusUpdate) -> Result<()> {
        self.updates
            .lock()
            .unwrap()
            .push((build_id, update.clone()));
        Ok(())
    }
}

pub struct FailingNotifier;

#[async_trait]
impl Notifier for FailingNotifier {
    async fn notify(&self, _build_id: Uuid, _update: &BuildStatusUpdate) -> Result<()> {
        bail!("coordinator unreachable")
    }
}

#[derive(Default)]
pub struct RecordingDeployer {
    calls: Mutex<Vec<(Uuid, String)>>,
}

impl RecordingDeployer {
    pub fn calls(&self) -> Vec<(Uuid, String)> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl DeploymentTrigger for RecordingDeployer {
    async fn deploy(&self, assembly_id: Uuid, image_id: &str) -> Result<()> {
        self.calls
            .lock()
            .unwrap()
            .push((assembly_id, image_id.to_string()));
        Ok(())
    }
}

/// Remembers every `(container, key, body)` put
#[derive(Default)]
pub struct RecordingObjectStore {
    puts: Mutex<Vec<(String, String, Vec<u8>)>>,
}

impl RecordingObjectStore {
    pub fn puts(&self) -> Vec<(String, String, Vec<u8>)> {
        self.puts.lock().unwrap().clone()
    }
}

#[async_trait]
impl ObjectStore for RecordingObjectStore {
    async fn put_object(
        &self,
        _ctx: &RequestContext,
        container: &str,
        key: &str,
        body: Vec<u8>,
    ) -> Result<()> {
        self.puts
            .lock()
            .unwrap()
            .push((container.to_string(), key.to_string(), body));
        Ok(())
    }
}

pub struct FailingObjectStore;

#[async_trait]
impl ObjectStore for FailingObjectStore {
    async fn put_object(
        &self,
        _ctx: &RequestContext,
        _container: &str,
        _key: &str,
        _body: Vec<u8>,
    ) -> Result<()> {
        bail!("object store unavailable")
    }
}
