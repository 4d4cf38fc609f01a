//! Log uploader
//!
//! Ships a captured task log to its durable home once a stage finishes. The
//! strategy is fixed at startup from configuration. Every failure is logged
//! and swallowed.

use kiln_core::domain::job::{RequestContext, Stage};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::config::LogUploadStrategy;
use crate::error::{Result, WorkerError};
use crate::repository::ObjectStore;

/// Where a log goes, identified by assembly, run and stage
pub fn object_key(assembly_id: Uuid, run_id: Uuid, stage: Stage) -> String {
    format!("{}/{}/{}.log", assembly_id, run_id, stage.as_str())
}

enum Target {
    Local(PathBuf),
    Object {
        store: Arc<dyn ObjectStore>,
        container: String,
    },
    Noop,
}

pub struct LogUploader {
    target: Target,
}

impl LogUploader {
    pub fn new(strategy: &LogUploadStrategy, object_store: Arc<dyn ObjectStore>) -> Self {
        let target = match strategy {
            LogUploadStrategy::Local { dir } => Target::Local(dir.clone()),
            LogUploadStrategy::ObjectStorage { container, .. } => Target::Object {
                store: object_store,
                container: container.clone(),
            },
            LogUploadStrategy::Disabled { requested } => {
                info!("Log upload strategy '{}' is not supported, logs stay local", requested);
                Target::Noop
            }
        };

        Self { target }
    }

    /// Uploads `local_path`, logging instead of failing
    pub async fn upload(
        &self,
        ctx: &RequestContext,
        assembly_id: Uuid,
        run_id: Uuid,
        stage: Stage,
        local_path: &Path,
    ) {
        match self
            .try_upload(ctx, assembly_id, run_id, stage, local_path)
            .await
        {
            Ok(()) => debug!("Uploaded {} log {}", stage, local_path.display()),
            Err(e) => warn!("{}", e),
        }
    }

    async fn try_upload(
        &self,
        ctx: &RequestContext,
        assembly_id: Uuid,
        run_id: Uuid,
        stage: Stage,
        local_path: &Path,
    ) -> Result<()> {
        let key = object_key(assembly_id, run_id, stage);
        let fail = |message: String| WorkerError::LogUpload { stage, message };

        match &self.target {
            Target::Local(dir) => {
                let dest = dir.join(&key);
                if let Some(parent) = dest.parent() {
                    tokio::fs::create_dir_all(parent)
                        .await
                        .map_err(|e| fail(format!("{}: {}", parent.display(), e)))?;
                }
                tokio::fs::copy(local_path, &dest)
                    .await
                    .map_err(|e| fail(format!("{}: {}", dest.display(), e)))?;
                Ok(())
            }
            Target::Object { store, container } => {
                let body = tokio::fs::read(local_path)
                    .await
                    .map_err(|e| fail(format!("{}: {}", local_path.display(), e)))?;
                store
                    .put_object(ctx, container, &key, body)
                    .await
                    .map_err(|e| fail(format!("{:#}", e)))
            }
            Target::Noop => Ok(()),
        }
    }
}
