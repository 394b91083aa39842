// ABOUTME: Validate command implementation.
// ABOUTME: Parses manifests and optionally prints their Kubernetes rendering.

use std::env;
use std::path::{Path, PathBuf};

use rollwright::config::Config;
use rollwright::error::Result;
use rollwright::manifest::Manifest;
use rollwright::output::Output;

/// Validate the given manifests, or every manifest the configuration lists.
pub fn validate(paths: &[PathBuf], render: bool, output: &Output) -> Result<()> {
    let manifests: Vec<(PathBuf, Manifest)> = if paths.is_empty() {
        let cwd = env::current_dir()?;
        Config::discover(&cwd)?
            .load_manifests()?
            .into_iter()
            .map(|source| (source.path, source.manifest))
            .collect()
    } else {
        paths
            .iter()
            .map(|path| -> Result<(PathBuf, Manifest)> {
                Ok((path.clone(), Manifest::load(path)?))
            })
            .collect::<Result<_>>()?
    };

    for (path, manifest) in &manifests {
        report(path, manifest, output);
        if render {
            println!("{}", manifest.to_resource_yaml()?);
        }
    }

    output.success(&format!("{} manifest(s) valid", manifests.len()));
    Ok(())
}

fn report(path: &Path, manifest: &Manifest, output: &Output) {
    output.progress(&format!(
        "  ✓ {}: {} ({} x {}), {} service(s)",
        path.display(),
        manifest.deployment.name,
        manifest.deployment.replicas,
        manifest.deployment.image,
        manifest.services.len()
    ));
}
