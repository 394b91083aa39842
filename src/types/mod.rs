// ABOUTME: Type-safe identifiers and validated domain types.
// ABOUTME: Names and image references are checked on construction.

mod id;
mod image_ref;
mod name;

pub use id::{Id, IdKind, RolloutId, RolloutKind, RunId, RunKind};
pub use image_ref::{ImageRef, ParseImageRefError};
pub use name::{NameError, ServiceName, WorkloadName};
