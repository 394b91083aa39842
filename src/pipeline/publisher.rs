// ABOUTME: ArtifactPublisher capability: build the artifact, publish the image.
// ABOUTME: CommandPublisher shells out to the build tool and the docker CLI.

use async_trait::async_trait;
use serde::Serialize;
use snafu::{ResultExt, Snafu, ensure};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use tokio::process::Command;

use crate::types::ImageRef;

/// A built artifact on the local filesystem.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ArtifactRef {
    pub path: PathBuf,
}

#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum PublishError {
    #[snafu(display("failed to run {program}: {source}"))]
    Spawn {
        program: String,
        source: std::io::Error,
    },

    #[snafu(display("{program} exited with {status}: {stderr}"))]
    Exited {
        program: String,
        status: String,
        stderr: String,
    },

    #[snafu(display("build finished but artifact {} does not exist", path.display()))]
    MissingArtifact { path: PathBuf },
}

/// Builds and publishes the application artifact.
#[async_trait]
pub trait ArtifactPublisher: Send + Sync {
    async fn build(&self) -> Result<ArtifactRef, PublishError>;

    /// Package the artifact into an image and push it, returning the pushed reference.
    async fn publish(&self, artifact: &ArtifactRef) -> Result<ImageRef, PublishError>;
}

/// Publishes through external commands: the configured build command, then
/// `docker build` and `docker push`.
#[derive(Debug, Clone)]
pub struct CommandPublisher {
    workdir: PathBuf,
    build_command: Vec<String>,
    env: HashMap<String, String>,
    artifact: PathBuf,
    image: ImageRef,
    context: PathBuf,
    dockerfile: Option<PathBuf>,
    docker: String,
}

impl CommandPublisher {
    pub fn new(workdir: impl Into<PathBuf>, artifact: impl Into<PathBuf>, image: ImageRef) -> Self {
        Self {
            workdir: workdir.into(),
            build_command: Vec::new(),
            env: HashMap::new(),
            artifact: artifact.into(),
            image,
            context: PathBuf::from("."),
            dockerfile: None,
            docker: "docker".to_string(),
        }
    }

    /// Program and arguments, e.g. `["mvn", "-B", "package"]`. Empty means nothing to build.
    pub fn build_command(mut self, command: Vec<String>) -> Self {
        self.build_command = command;
        self
    }

    /// Extra environment for the build command.
    pub fn env(mut self, env: HashMap<String, String>) -> Self {
        self.env = env;
        self
    }

    pub fn artifact(mut self, artifact: impl Into<PathBuf>) -> Self {
        self.artifact = artifact.into();
        self
    }

    pub fn context(mut self, context: impl Into<PathBuf>) -> Self {
        self.context = context.into();
        self
    }

    pub fn dockerfile(mut self, dockerfile: Option<PathBuf>) -> Self {
        self.dockerfile = dockerfile;
        self
    }

    pub fn docker(mut self, program: impl Into<String>) -> Self {
        self.docker = program.into();
        self
    }

    pub fn image(&self) -> &ImageRef {
        &self.image
    }

    fn docker_build_args(&self) -> Vec<String> {
        let mut args = vec!["build".to_string(), "-t".to_string(), self.image.to_string()];
        if let Some(ref dockerfile) = self.dockerfile {
            args.push("-f".to_string());
            args.push(self.workdir.join(dockerfile).display().to_string());
        }
        args.push(self.workdir.join(&self.context).display().to_string());
        args
    }

    async fn run(&self, program: &str, args: &[String]) -> Result<(), PublishError> {
        tracing::info!(program, ?args, "running command");

        let output = Command::new(program)
            .args(args)
            .envs(&self.env)
            .current_dir(&self.workdir)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .output()
            .await
            .context(SpawnSnafu { program })?;

        ensure!(
            output.status.success(),
            ExitedSnafu {
                program,
                status: output.status.to_string(),
                stderr: last_lines(&String::from_utf8_lossy(&output.stderr), 5),
            }
        );
        Ok(())
    }
}

/// The tail of a command's stderr, where the error usually is.
fn last_lines(text: &str, count: usize) -> String {
    let lines: Vec<&str> = text.trim_end().lines().collect();
    lines[lines.len().saturating_sub(count)..].join("\n")
}

fn resolve(workdir: &Path, path: &Path) -> PathBuf {
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        workdir.join(path)
    }
}

#[async_trait]
impl ArtifactPublisher for CommandPublisher {
    async fn build(&self) -> Result<ArtifactRef, PublishError> {
        if let Some((program, args)) = self.build_command.split_first() {
            self.run(program, args).await?;
        }

        let path = resolve(&self.workdir, &self.artifact);
        ensure!(path.exists(), MissingArtifactSnafu { path });
        Ok(ArtifactRef { path })
    }

    async fn publish(&self, artifact: &ArtifactRef) -> Result<ImageRef, PublishError> {
        tracing::debug!(artifact = %artifact.path.display(), image = %self.image, "publishing image");
        self.run(&self.docker, &self.docker_build_args()).await?;
        self.run(&self.docker, &["push".to_string(), self.image.to_string()])
            .await?;
        Ok(self.image.clone())
    }
}
