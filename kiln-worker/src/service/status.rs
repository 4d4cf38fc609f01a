//! Status coordinator
//!
//! Applies assembly and image state changes for one job and tells the remote
//! coordinator about each build phase. Record writes follow the ownership
//! contract of the shared records: read the current record, change only the
//! fields the worker owns, write it back.
//!
//! Nothing here returns an error to the job handler. Store and notification
//! failures are logged and the job carries on with the state it has already
//! applied locally.

use chrono::Utc;
use kiln_core::domain::assembly::AssemblyStatus;
use kiln_core::domain::image::ImageStatus;
use kiln_core::dto::build::BuildStatusUpdate;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

use crate::context::JobContext;
use crate::error::{Result, WorkerError};
use crate::repository::{DeploymentTrigger, Notifier, RecordStore};

pub const BUILD_STARTED: &str = "Starting the image build";
pub const BUILD_SUCCEEDED: &str = "built successfully";

pub struct StatusCoordinator {
    records: Arc<dyn RecordStore>,
    notifier: Arc<dyn Notifier>,
    deployer: Arc<dyn DeploymentTrigger>,
}

impl StatusCoordinator {
    pub fn new(
        records: Arc<dyn RecordStore>,
        notifier: Arc<dyn Notifier>,
        deployer: Arc<dyn DeploymentTrigger>,
    ) -> Self {
        Self {
            records,
            notifier,
            deployer,
        }
    }

    /// Moves the job's assembly to `status`
    ///
    /// The transition is checked against the last status this job applied.
    /// A rejected transition leaves both the record and the context alone.
    /// Once accepted, the new status is the job's local state even if the
    /// record write fails.
    pub async fn set_assembly_status(
        &self,
        ctx: &mut JobContext,
        status: AssemblyStatus,
    ) -> Result<()> {
        let current = ctx.assembly_status();
        if !current.can_transition_to(status) {
            return Err(WorkerError::InvalidTransition {
                from: current,
                to: status,
            });
        }
        ctx.record_assembly_status(status);

        let Some(assembly_id) = ctx.assembly_id else {
            debug!("No assembly attached, skipping {} write", status);
            return Ok(());
        };

        let mut assembly = self
            .records
            .get_assembly(&ctx.request, assembly_id)
            .await
            .map_err(|e| WorkerError::Record(format!("{:#}", e)))?;

        assembly.status = status;

        self.records
            .save_assembly(&ctx.request, &assembly)
            .await
            .map_err(|e| WorkerError::Record(format!("{:#}", e)))?;

        info!("Assembly {} is now {}", assembly_id, status);
        Ok(())
    }

    /// Writes the image record for this build
    ///
    /// The image record shares its id with the build.
    pub async fn set_image_status(
        &self,
        ctx: &JobContext,
        status: ImageStatus,
        created_image_id: Option<&str>,
    ) -> Result<()> {
        let mut image = self
            .records
            .get_image(&ctx.request, ctx.build_id)
            .await
            .map_err(|e| WorkerError::Record(format!("{:#}", e)))?;

        image.status = status;
        if let Some(id) = created_image_id {
            image.created_image_id = Some(id.to_string());
        }

        self.records
            .save_image(&ctx.request, &image)
            .await
            .map_err(|e| WorkerError::Record(format!("{:#}", e)))?;

        debug!("Image {} is now {}", ctx.build_id, status.as_str());
        Ok(())
    }

    /// Sends one progress notification
    pub async fn notify(
        &self,
        ctx: &JobContext,
        state: ImageStatus,
        description: &str,
        created_image_id: Option<&str>,
    ) -> Result<()> {
        let update = BuildStatusUpdate {
            state,
            description: description.to_string(),
            created_image_id: created_image_id.map(str::to_string),
            assembly_id: ctx.assembly_id,
            timestamp: Utc::now(),
        };

        self.notifier
            .notify(ctx.build_id, &update)
            .await
            .map_err(|e| WorkerError::NotificationDelivery(format!("{:#}", e)))
    }

    /// Entering the unit-test phase
    pub async fn begin_unittest(&self, ctx: &mut JobContext) {
        self.apply_assembly(ctx, AssemblyStatus::UnitTesting).await;
    }

    /// The test command ran and failed; the job stops here
    pub async fn unittest_failed(&self, ctx: &mut JobContext) {
        self.apply_assembly(ctx, AssemblyStatus::UnitTestingFailed)
            .await;
    }

    /// Entering the build phase
    pub async fn begin_build(&self, ctx: &mut JobContext) {
        self.apply_assembly(ctx, AssemblyStatus::Building).await;
        self.apply_image(ctx, ImageStatus::Building, None).await;
        self.send(ctx, ImageStatus::Building, BUILD_STARTED, None)
            .await;
    }

    /// Terminates the job in `ERROR`
    ///
    /// The error's message is the description sent to the coordinator.
    pub async fn fail(&self, ctx: &mut JobContext, err: &WorkerError) {
        error!("Job failed: {}", err);
        self.apply_assembly(ctx, AssemblyStatus::Error).await;
        self.apply_image(ctx, ImageStatus::Error, None).await;
        self.send(ctx, ImageStatus::Error, &err.to_string(), None)
            .await;
    }

    /// Terminates the job in `COMPLETE` and hands the image to deployment
    pub async fn complete(&self, ctx: &mut JobContext, image_id: &str) {
        info!("Build produced image {}", image_id);
        self.apply_image(ctx, ImageStatus::Complete, Some(image_id))
            .await;
        self.apply_assembly(ctx, AssemblyStatus::Complete).await;
        self.send(ctx, ImageStatus::Complete, BUILD_SUCCEEDED, Some(image_id))
            .await;

        match ctx.assembly_id {
            Some(assembly_id) => {
                if let Err(e) = self.deployer.deploy(assembly_id, image_id).await {
                    error!("Failed to trigger deployment of {}: {:#}", image_id, e);
                }
            }
            None => warn!("No assembly attached, image {} is not deployed", image_id),
        }
    }

    async fn apply_assembly(&self, ctx: &mut JobContext, status: AssemblyStatus) {
        if let Err(e) = self.set_assembly_status(ctx, status).await {
            error!("Failed to set assembly status {}: {}", status, e);
        }
    }

    async fn apply_image(&self, ctx: &JobContext, status: ImageStatus, id: Option<&str>) {
        if let Err(e) = self.set_image_status(ctx, status, id).await {
            error!("Failed to set image status {}: {}", status.as_str(), e);
        }
    }

    async fn send(&self, ctx: &JobContext, state: ImageStatus, description: &str, id: Option<&str>) {
        if let Err(e) = self.notify(ctx, state, description, id).await {
            warn!("{}", e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{
        FailingNotifier, InMemoryRecords, RecordingDeployer, RecordingNotifier, request_context,
        sample_job,
    };

    struct Fixture {
        records: Arc<InMemoryRecords>,
        notifier: Arc<RecordingNotifier>,
        deployer: Arc<RecordingDeployer>,
        coordinator: StatusCoordinator,
        ctx: JobContext,
    }

    fn fixture() -> Fixture {
        let job = sample_job(None);
        let records = Arc::new(InMemoryRecords::for_job(&job));
        let notifier = Arc::new(RecordingNotifier::default());
        let deployer = Arc::new(RecordingDeployer::default());
        let coordinator =
            StatusCoordinator::new(records.clone(), notifier.clone(), deployer.clone());
        Fixture {
            records,
            notifier,
            deployer,
            coordinator,
            ctx: JobContext::new(request_context(), &job),
        }
    }

    #[tokio::test]
    async fn test_assembly_write_preserves_other_fields() {
        let mut f = fixture();
        let id = f.ctx.assembly_id.unwrap();
        f.records.with_assembly(id, |a| {
            a.extra.insert("description".into(), "owned elsewhere".into());
        });

        f.coordinator
            .set_assembly_status(&mut f.ctx, AssemblyStatus::Building)
            .await
            .unwrap();

        let stored = f.records.assembly(id);
        assert_eq!(stored.status, AssemblyStatus::Building);
        assert_eq!(stored.extra["description"], "owned elsewhere");
    }

    #[tokio::test]
    async fn test_rejects_regression() {
        let mut f = fixture();
        f.coordinator
            .set_assembly_status(&mut f.ctx, AssemblyStatus::Building)
            .await
            .unwrap();

        let err = f
            .coordinator
            .set_assembly_status(&mut f.ctx, AssemblyStatus::UnitTesting)
            .await
            .unwrap_err();

        assert!(matches!(err, WorkerError::InvalidTransition { .. }));
        assert_eq!(f.ctx.assembly_status(), AssemblyStatus::Building);
        assert_eq!(
            f.records.assembly(f.ctx.assembly_id.unwrap()).status,
            AssemblyStatus::Building
        );
    }

    #[tokio::test]
    async fn test_begin_build_notifies_once() {
        let mut f = fixture();
        f.coordinator.begin_build(&mut f.ctx).await;

        let sent = f.notifier.updates();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].0, f.ctx.build_id);
        assert_eq!(sent[0].1.state, ImageStatus::Building);
        assert_eq!(sent[0].1.description, BUILD_STARTED);
        assert_eq!(sent[0].1.assembly_id, f.ctx.assembly_id);
        assert_eq!(f.records.image(f.ctx.build_id).status, ImageStatus::Building);
    }

    #[tokio::test]
    async fn test_complete_records_image_and_deploys() {
        let mut f = fixture();
        let image_id = "3fa85f64-5717-4562-b3fc-2c963f66afa6";
        f.coordinator.begin_build(&mut f.ctx).await;
        f.coordinator.complete(&mut f.ctx, image_id).await;

        let image = f.records.image(f.ctx.build_id);
        assert_eq!(image.status, ImageStatus::Complete);
        assert_eq!(image.created_image_id.as_deref(), Some(image_id));
        assert_eq!(
            f.records.assembly(f.ctx.assembly_id.unwrap()).status,
            AssemblyStatus::Complete
        );

        let last = f.notifier.updates().pop().unwrap().1;
        assert_eq!(last.state, ImageStatus::Complete);
        assert_eq!(last.created_image_id.as_deref(), Some(image_id));
        assert_eq!(
            f.deployer.calls(),
            vec![(f.ctx.assembly_id.unwrap(), image_id.to_string())]
        );
    }

    #[tokio::test]
    async fn test_fail_describes_error() {
        let mut f = fixture();
        f.coordinator
            .fail(&mut f.ctx, &WorkerError::BuildArtifactMissing)
            .await;

        let sent = f.notifier.updates();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].1.state, ImageStatus::Error);
        assert_eq!(sent[0].1.description, "image not created");
        assert_eq!(
            f.records.assembly(f.ctx.assembly_id.unwrap()).status,
            AssemblyStatus::Error
        );
        assert!(f.deployer.calls().is_empty());
    }

    #[tokio::test]
    async fn test_notification_failure_keeps_state() {
        let job = sample_job(None);
        let records = Arc::new(InMemoryRecords::for_job(&job));
        let coordinator = StatusCoordinator::new(
            records.clone(),
            Arc::new(FailingNotifier),
            Arc::new(RecordingDeployer::default()),
        );
        let mut ctx = JobContext::new(request_context(), &job);

        coordinator.begin_build(&mut ctx).await;

        assert_eq!(ctx.assembly_status(), AssemblyStatus::Building);
        assert_eq!(
            records.assembly(job.assembly_id.unwrap()).status,
            AssemblyStatus::Building
        );
    }

    #[tokio::test]
    async fn test_no_assembly_skips_record_and_deploy() {
        let mut job = sample_job(None);
        job.assembly_id = None;
        let records = Arc::new(InMemoryRecords::for_job(&job));
        let deployer = Arc::new(RecordingDeployer::default());
        let coordinator = StatusCoordinator::new(
            records.clone(),
            Arc::new(RecordingNotifier::default()),
            deployer.clone(),
        );
        let mut ctx = JobContext::new(request_context(), &job);

        coordinator.begin_build(&mut ctx).await;
        coordinator
            .complete(&mut ctx, "3fa85f64-5717-4562-b3fc-2c963f66afa6")
            .await;

        assert_eq!(ctx.assembly_status(), AssemblyStatus::Complete);
        assert!(deployer.calls().is_empty());
    }
}
