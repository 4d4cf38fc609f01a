//! Job handler
//!
//! Entry point for work delivered by the dispatch layer. A build job runs an
//! optional unit-test phase and then the image build; a unittest job runs
//! only the test phase. Every job gets its own `JobContext` and `job` span.
//!
//! The handler never returns an error. Whatever goes wrong is logged,
//! reported to the coordinator, and reflected in the final assembly and
//! image status.

use kiln_core::domain::assembly::AssemblyStatus;
use kiln_core::domain::job::{BuildJob, JobEnvelope, JobRequest, RequestContext, Stage};
use tracing::{Instrument, debug, info, warn};

use crate::command::CommandResolver;
use crate::context::JobContext;
use crate::credentials::CredentialResolver;
use crate::environment::EnvironmentBuilder;
use crate::error::{Result, WorkerError};
use crate::process::{ProcessExecutor, ProcessOutput, find_marker_line, parse_created_image_id};
use crate::service::{CommitStatusReporter, LogUploader, StatusCoordinator};

pub struct JobHandler {
    environment: EnvironmentBuilder,
    credentials: CredentialResolver,
    commands: CommandResolver,
    executor: ProcessExecutor,
    status: StatusCoordinator,
    logs: LogUploader,
    commit_status: CommitStatusReporter,
}

impl JobHandler {
    pub fn new(
        environment: EnvironmentBuilder,
        credentials: CredentialResolver,
        commands: CommandResolver,
        status: StatusCoordinator,
        logs: LogUploader,
        commit_status: CommitStatusReporter,
    ) -> Self {
        Self {
            environment,
            credentials,
            commands,
            executor: ProcessExecutor::new(),
            status,
            logs,
            commit_status,
        }
    }

    /// Routes one dispatched job
    pub async fn dispatch(&self, envelope: JobEnvelope) {
        match envelope.request {
            JobRequest::Build { job } => {
                self.build(envelope.context, job).await;
            }
            JobRequest::Unittest { job } => {
                self.unittest(envelope.context, job).await;
            }
            JobRequest::Echo { message } => self.echo(&message),
        }
    }

    /// Diagnostic no-op
    pub fn echo(&self, message: &str) {
        info!("echo: {}", message);
    }

    /// Runs the test phase (when a test command is set) and then the build
    ///
    /// Returns the last assembly status the job applied.
    pub async fn build(&self, request: RequestContext, job: BuildJob) -> AssemblyStatus {
        let mut ctx = JobContext::new(request, &job);

        if job.test_cmd.is_some() {
            let span = ctx.span(Stage::Unittest);
            if !self.run_unittest(&mut ctx, &job).instrument(span).await {
                return ctx.assembly_status();
            }
        } else {
            debug!("No test command for build {}, skipping unit tests", job.build_id);
        }

        let span = ctx.span(Stage::Build);
        self.run_build(&mut ctx, &job).instrument(span).await;
        ctx.assembly_status()
    }

    /// Runs only the test phase
    pub async fn unittest(&self, request: RequestContext, job: BuildJob) -> AssemblyStatus {
        let mut ctx = JobContext::new(request, &job);

        if job.test_cmd.is_none() {
            debug!("No test command for build {}, nothing to run", job.build_id);
            return ctx.assembly_status();
        }

        let span = ctx.span(Stage::Unittest);
        self.run_unittest(&mut ctx, &job).instrument(span).await;
        ctx.assembly_status()
    }

    /// Whether the job may go on to the build phase
    async fn run_unittest(&self, ctx: &mut JobContext, job: &BuildJob) -> bool {
        info!("Running unit tests");
        self.status.begin_unittest(ctx).await;
        self.commit_status.pending(&job.source).await;

        match self.run_stage(ctx, job, Stage::Unittest).await {
            Ok(output) if output.success() => {
                info!("Unit tests passed");
                self.commit_status.finished(&job.source, true).await;
                true
            }
            Ok(output) => {
                warn!("{}", WorkerError::TestFailure { code: output.exit_code });
                self.commit_status.finished(&job.source, false).await;
                self.status.unittest_failed(ctx).await;
                false
            }
            Err(e) => {
                self.commit_status.finished(&job.source, false).await;
                self.status.fail(ctx, &e).await;
                false
            }
        }
    }

    async fn run_build(&self, ctx: &mut JobContext, job: &BuildJob) {
        info!("Building image for {}", job.name);
        self.status.begin_build(ctx).await;

        let result = match self.run_stage(ctx, job, Stage::Build).await {
            Ok(output) => created_image(ctx, &output),
            Err(e) => Err(e),
        };

        match result {
            Ok(image_id) => self.status.complete(ctx, &image_id).await,
            Err(e) => self.status.fail(ctx, &e).await,
        }
    }

    /// Prepares and runs one toolchain script, then ships its log
    async fn run_stage(
        &self,
        ctx: &mut JobContext,
        job: &BuildJob,
        stage: Stage,
    ) -> Result<ProcessOutput> {
        let private_key = self
            .credentials
            .resolve(
                &ctx.request,
                job.credential_ref.as_deref(),
                &job.source.source_url,
            )
            .await?;

        let command = self
            .commands
            .resolve(stage, job, &ctx.request.tenant, &private_key);
        ctx.support_info(&format!("{}_cmd", stage), command.redacted());

        let env = self.environment.build(&ctx.request).await?;
        ctx.support_info("environment", env.redacted());

        let output = self
            .executor
            .run(&command, &env, stage == Stage::Build)
            .await?;

        match (ctx.assembly_id, output.log_path.as_deref()) {
            (Some(assembly_id), Some(path)) => {
                self.logs
                    .upload(&ctx.request, assembly_id, env.run_id(), stage, path)
                    .await
            }
            _ => debug!("No assembly or captured log, skipping {} log upload", stage),
        }

        Ok(output)
    }
}

/// Interprets a finished build
fn created_image(ctx: &mut JobContext, output: &ProcessOutput) -> Result<String> {
    if let Some(line) = find_marker_line(&output.stdout) {
        ctx.support_info("build_out_line", line);
    }

    if !output.success() {
        return Err(WorkerError::BuildScriptFailed {
            code: output.exit_code,
        });
    }

    parse_created_image_id(&output.stdout)
}
