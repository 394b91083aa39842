// ABOUTME: Pipeline coordinator: sequential stages with first-failure short-circuit.
// ABOUTME: Build, publish, deploy and verify stages plus the artifact publisher seam.

mod coordinator;
mod publisher;
mod run;
mod stage;
mod stages;

pub use coordinator::{Coordinator, Pipeline, run_concurrent};
pub use publisher::{ArtifactPublisher, ArtifactRef, CommandPublisher, PublishError};
pub use run::{PipelineRun, RunStatus, StageFailure, StageOutcome, StageResult};
pub use stage::{Stage, StageContext, StageError};
pub use stages::{BuildStage, DeployStage, PublishStage, VerifyStage};
