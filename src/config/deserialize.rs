// ABOUTME: Custom serde deserializers for config types.
// ABOUTME: Handles manifest lists and build commands given as string or argv.

use nonempty::NonEmpty;
use serde::Deserialize;
use std::path::PathBuf;

use super::sections::ManifestEntry;

pub fn deserialize_manifests<'de, D>(deserializer: D) -> Result<NonEmpty<ManifestEntry>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let values: Vec<ManifestItem> = Vec::deserialize(deserializer)?;
    let entries = values.into_iter().map(ManifestItem::into_entry).collect();

    NonEmpty::from_vec(entries)
        .ok_or_else(|| serde::de::Error::custom("at least one manifest is required"))
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum ManifestItem {
    Simple(PathBuf),
    Detailed(ManifestEntry),
}

impl ManifestItem {
    fn into_entry(self) -> ManifestEntry {
        match self {
            ManifestItem::Simple(path) => ManifestEntry {
                path,
                use_published_image: None,
            },
            ManifestItem::Detailed(entry) => entry,
        }
    }
}

/// Accepts `"mvn -B package"` or `["mvn", "-B", "package"]`.
pub fn deserialize_command<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Command {
        Shell(String),
        Argv(Vec<String>),
    }

    let argv = match Command::deserialize(deserializer)? {
        Command::Shell(line) => line.split_whitespace().map(str::to_string).collect(),
        Command::Argv(argv) => argv,
    };
    Ok(argv)
}
