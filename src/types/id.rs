// ABOUTME: Identifiers for rollouts and pipeline runs, distinct at the type level.
// ABOUTME: Each kind carries the prefix used when generating fresh ids.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::hash::{Hash, Hasher};
use std::marker::PhantomData;

/// What an [`Id`] identifies.
pub trait IdKind {
    /// Shown by `Debug`, e.g. `RolloutId("web-1700000000000")`.
    const NAME: &'static str;
}

#[derive(Debug)]
pub enum RolloutKind {}

#[derive(Debug)]
pub enum RunKind {}

impl IdKind for RolloutKind {
    const NAME: &'static str = "RolloutId";
}

impl IdKind for RunKind {
    const NAME: &'static str = "RunId";
}

pub type RolloutId = Id<RolloutKind>;
pub type RunId = Id<RunKind>;

#[must_use]
#[derive(Serialize, Deserialize)]
#[serde(transparent, bound = "")]
pub struct Id<K> {
    value: String,
    #[serde(skip)]
    kind: PhantomData<fn() -> K>,
}

impl<K> Id<K> {
    pub fn new(value: String) -> Self {
        Self {
            value,
            kind: PhantomData,
        }
    }

    /// `<prefix>-<unix millis>`; the prefix is usually the workload or "run".
    pub fn generate(prefix: &str) -> Self {
        Self::new(format!("{}-{}", prefix, Utc::now().timestamp_millis()))
    }

    pub fn as_str(&self) -> &str {
        &self.value
    }

    pub fn into_inner(self) -> String {
        self.value
    }
}

// Derives would demand bounds on the uninhabited kind types.

impl<K: IdKind> fmt::Debug for Id<K> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple(K::NAME).field(&self.value).finish()
    }
}

impl<K> fmt::Display for Id<K> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.value)
    }
}

impl<K> Clone for Id<K> {
    fn clone(&self) -> Self {
        Self::new(self.value.clone())
    }
}

impl<K> PartialEq for Id<K> {
    fn eq(&self, other: &Self) -> bool {
        self.value == other.value
    }
}

impl<K> Eq for Id<K> {}

impl<K> Hash for Id<K> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.value.hash(state);
    }
}
