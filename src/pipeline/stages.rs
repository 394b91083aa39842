// ABOUTME: Built-in pipeline stages: build, publish, deploy and verify.
// ABOUTME: Deploy delegates to the rollout engine; verify re-reads cluster state.

use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;

use super::publisher::ArtifactPublisher;
use super::stage::{Stage, StageContext, StageError};
use crate::cluster::{ClusterClient, ClusterError};
use crate::error::ErrorKind;
use crate::manifest::Manifest;
use crate::rollout::{RolloutEngine, RolloutPhase};

/// Builds the application artifact.
pub struct BuildStage<P: ArtifactPublisher + ?Sized> {
    publisher: Arc<P>,
}

impl<P: ArtifactPublisher + ?Sized> BuildStage<P> {
    pub fn new(publisher: Arc<P>) -> Self {
        Self { publisher }
    }
}

#[async_trait]
impl<P: ArtifactPublisher + ?Sized> Stage for BuildStage<P> {
    fn name(&self) -> &str {
        "build"
    }

    async fn execute(&self, ctx: &mut StageContext) -> Result<(), StageError> {
        let artifact = self.publisher.build().await?;
        tracing::info!(artifact = %artifact.path.display(), "artifact built");
        ctx.artifact = Some(artifact);
        Ok(())
    }
}

/// Packages the built artifact into an image and pushes it.
pub struct PublishStage<P: ArtifactPublisher + ?Sized> {
    publisher: Arc<P>,
}

impl<P: ArtifactPublisher + ?Sized> PublishStage<P> {
    pub fn new(publisher: Arc<P>) -> Self {
        Self { publisher }
    }
}

#[async_trait]
impl<P: ArtifactPublisher + ?Sized> Stage for PublishStage<P> {
    fn name(&self) -> &str {
        "publish"
    }

    async fn execute(&self, ctx: &mut StageContext) -> Result<(), StageError> {
        let artifact = ctx
            .artifact
            .as_ref()
            .ok_or_else(|| StageError::new(ErrorKind::Artifact, "no artifact has been built"))?;
        let image = self.publisher.publish(artifact).await?;
        tracing::info!(image = %image, "image published");
        ctx.image = Some(image);
        Ok(())
    }
}

/// Rolls out one manifest, then applies its services once the workload converged.
pub struct DeployStage<C: ClusterClient + ?Sized> {
    name: String,
    engine: Arc<RolloutEngine<C>>,
    manifest: Manifest,
    timeout: Duration,
    use_published_image: bool,
}

impl<C: ClusterClient + ?Sized> DeployStage<C> {
    /// A stage named `deploy-<workload>`.
    pub fn new(engine: Arc<RolloutEngine<C>>, manifest: Manifest, timeout: Duration) -> Self {
        Self {
            name: format!("deploy-{}", manifest.deployment.name),
            engine,
            manifest,
            timeout,
            use_published_image: false,
        }
    }

    /// Roll out the image published earlier in the run instead of the manifest's.
    pub fn use_published_image(mut self, enabled: bool) -> Self {
        self.use_published_image = enabled;
        self
    }
}

#[async_trait]
impl<C: ClusterClient + ?Sized> Stage for DeployStage<C> {
    fn name(&self) -> &str {
        &self.name
    }

    async fn execute(&self, ctx: &mut StageContext) -> Result<(), StageError> {
        let spec = if self.use_published_image {
            let image = ctx.image.clone().ok_or_else(|| {
                StageError::new(
                    ErrorKind::Validation,
                    "use_published_image is set but no image was published",
                )
            })?;
            self.manifest.deployment.with_image(image)
        } else {
            self.manifest.deployment.clone()
        };

        let record = self.engine.roll_out(spec, self.timeout).await?;
        let phase = record.phase();
        let failure = record.failure.clone();
        ctx.records.push(record);

        if phase != RolloutPhase::Succeeded {
            let (kind, message) = match failure {
                Some(failure) => (failure.kind, failure.message),
                None => (ErrorKind::Convergence, "rollout did not converge".to_string()),
            };
            return Err(StageError::new(kind, format!("rollout {}: {}", phase, message)));
        }

        for service in &self.manifest.services {
            self.engine.expose(service).await?;
        }
        Ok(())
    }
}

/// Checks the cluster still matches the manifests after deployment.
pub struct VerifyStage<C: ClusterClient + ?Sized> {
    engine: Arc<RolloutEngine<C>>,
    manifests: Vec<Manifest>,
}

impl<C: ClusterClient + ?Sized> VerifyStage<C> {
    pub fn new(engine: Arc<RolloutEngine<C>>, manifests: Vec<Manifest>) -> Self {
        Self { engine, manifests }
    }

    async fn verify(&self, manifest: &Manifest) -> Result<(), StageError> {
        let spec = &manifest.deployment;
        let status = self
            .engine
            .workload_status(&spec.name)
            .await
            .map_err(verification_error)?;

        if !status.is_converged(spec.replicas) {
            return Err(StageError::verification(format!(
                "{}: {} of {} replicas ready, expected {}",
                spec.name, status.ready_replicas, status.desired_replicas, spec.replicas
            )));
        }

        for service in &manifest.services {
            let observed = self
                .engine
                .service_status(&service.name)
                .await
                .map_err(verification_error)?;

            let expected = (service.port, service.target_port, service.exposure);
            let actual = (observed.port, observed.target_port, observed.exposure);
            if expected != actual {
                return Err(StageError::verification(format!(
                    "service {}: expected {} port {} -> {}, found {} port {} -> {}",
                    service.name,
                    service.exposure,
                    service.port,
                    service.target_port,
                    observed.exposure,
                    observed.port,
                    observed.target_port
                )));
            }
        }

        tracing::info!(workload = %spec.name, services = manifest.services.len(), "verified");
        Ok(())
    }
}

/// Anything but an unreachable cluster means the deployment is not what it should be.
fn verification_error(err: ClusterError) -> StageError {
    match err {
        ClusterError::Unreachable(_) => err.into(),
        other => StageError::verification(other.to_string()),
    }
}

#[async_trait]
impl<C: ClusterClient + ?Sized> Stage for VerifyStage<C> {
    fn name(&self) -> &str {
        "verify"
    }

    async fn execute(&self, _ctx: &mut StageContext) -> Result<(), StageError> {
        for manifest in &self.manifests {
            self.verify(manifest).await?;
        }
        Ok(())
    }
}
