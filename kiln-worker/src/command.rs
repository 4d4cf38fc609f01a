//! Command resolver
//!
//! Maps a job's source and image formats onto a toolchain script and builds
//! the argument vector the script expects. The argument order is the
//! contract with the external toolchain:
//!
//! - unittest: `[script, source_uri, commit_sha, tenant, private_key, test_cmd]`
//! - build:    `[script, source_uri, name, tenant, base_image_id, private_key]`

use kiln_core::domain::job::{BuildJob, Stage};
use std::fmt;
use std::path::{Path, PathBuf};

use crate::credentials::PrivateKey;

pub const UNITTEST_SCRIPT: &str = "unittest-app";
pub const BUILD_SCRIPT: &str = "build-app";

pub const DEFAULT_TOOLCHAIN: &str = "lp-cedarish";
pub const DEFAULT_BUILDER: &str = "vm-slug";

/// Base image used when a qcow2 job asks for `auto`
pub const DEFAULT_BASE_IMAGE: &str = "cedarish";
pub const AUTO_BASE_IMAGE: &str = "auto";

/// Toolchain path component for a source format
pub fn toolchain_for(source_format: &str) -> &'static str {
    match source_format {
        "heroku" => "lp-cedarish",
        "dib" => "diskimage-builder",
        "dockerfile" => "lp-dockerfile",
        "chef" => "lp-chef",
        _ => DEFAULT_TOOLCHAIN,
    }
}

/// Builder path component for an image format
pub fn builder_for(image_format: &str) -> &'static str {
    match image_format {
        "docker" => "docker",
        "qcow2" => "vm-slug",
        _ => DEFAULT_BUILDER,
    }
}

/// Substitutes the default base image for `auto` qcow2 builds
pub fn resolve_base_image<'a>(base_image_id: &'a str, image_format: &str) -> &'a str {
    if base_image_id == AUTO_BASE_IMAGE && image_format == "qcow2" {
        DEFAULT_BASE_IMAGE
    } else {
        base_image_id
    }
}

/// A resolved toolchain invocation
#[derive(Clone)]
pub struct ToolchainCommand {
    program: PathBuf,
    args: Vec<String>,
    /// Position of the private key in `args`
    secret_arg: usize,
}

impl ToolchainCommand {
    pub fn program(&self) -> &Path {
        &self.program
    }

    pub fn args(&self) -> &[String] {
        &self.args
    }

    /// Command line with the private key replaced, for logs and support info
    pub fn redacted(&self) -> String {
        let mut parts = vec![self.program.to_string_lossy().to_string()];
        for (idx, arg) in self.args.iter().enumerate() {
            if idx == self.secret_arg && !arg.is_empty() {
                parts.push("<redacted>".to_string());
            } else {
                parts.push(arg.clone());
            }
        }
        parts.join(" ")
    }
}

impl fmt::Debug for ToolchainCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ToolchainCommand({})", self.redacted())
    }
}

impl fmt::Display for ToolchainCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.redacted())
    }
}

pub struct CommandResolver {
    toolchain_dir: PathBuf,
}

impl CommandResolver {
    pub fn new(toolchain_dir: impl AsRef<Path>) -> Self {
        Self {
            toolchain_dir: toolchain_dir.as_ref().to_path_buf(),
        }
    }

    /// Directory holding the scripts for a format pair
    pub fn script_dir(&self, source_format: &str, image_format: &str) -> PathBuf {
        self.toolchain_dir
            .join(toolchain_for(source_format))
            .join(builder_for(image_format))
    }

    pub fn resolve(
        &self,
        stage: Stage,
        job: &BuildJob,
        tenant: &str,
        private_key: &PrivateKey,
    ) -> ToolchainCommand {
        let dir = self.script_dir(&job.source_format, &job.image_format);
        let source_uri = job.source.source_url.clone();

        match stage {
            Stage::Unittest => ToolchainCommand {
                program: dir.join(UNITTEST_SCRIPT),
                args: vec![
                    source_uri,
                    job.source.commit_sha.clone().unwrap_or_default(),
                    tenant.to_string(),
                    private_key.expose().to_string(),
                    job.test_cmd.clone().unwrap_or_default(),
                ],
                secret_arg: 3,
            },
            Stage::Build => ToolchainCommand {
                program: dir.join(BUILD_SCRIPT),
                args: vec![
                    source_uri,
                    job.name.clone(),
                    tenant.to_string(),
                    resolve_base_image(&job.base_image_id, &job.image_format).to_string(),
                    private_key.expose().to_string(),
                ],
                secret_arg: 4,
            },
        }
    }
}
