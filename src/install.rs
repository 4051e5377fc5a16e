//! # Dependency Installer
//!
//! A resource may declare external packages it needs
//! (name → version requirement). The [`Installer`] collaborator resolves
//! which are missing locally and performs the installation; the registry
//! drives the [`DependencyGate`](crate::gate::DependencyGate) from its
//! completion so deferred calls resume once everything is present.
//!
//! [`ProcessInstaller`] is the production implementation: it spawns an
//! external package manager as a child process, inheriting stdout/stderr.
//! Tests plug in their own [`Installer`] to control completion timing.

use std::collections::BTreeMap;
use std::path::PathBuf;

use async_trait::async_trait;
use tracing::{info, warn};

use crate::error::InstallError;

/// Resolves and installs external packages for a resource.
#[async_trait]
pub trait Installer: Send + Sync {
    /// The subset of `dependencies` not available locally, as
    /// (name, version requirement) pairs in declaration order.
    fn missing(&self, dependencies: &BTreeMap<String, String>) -> Vec<(String, String)>;

    /// Installs the given packages, reporting completion asynchronously.
    async fn install(&self, packages: &[(String, String)]) -> Result<(), InstallError>;
}

/// Installs packages by spawning an external package manager.
pub struct ProcessInstaller {
    program: String,
    modules_dir: PathBuf,
}

impl ProcessInstaller {
    /// A package manager invoked as `<program> install name@version ...`,
    /// with local availability checked under `modules_dir`.
    pub fn new(program: impl Into<String>, modules_dir: impl Into<PathBuf>) -> Self {
        ProcessInstaller {
            program: program.into(),
            modules_dir: modules_dir.into(),
        }
    }
}

impl Default for ProcessInstaller {
    fn default() -> Self {
        ProcessInstaller::new("npm", "node_modules")
    }
}

#[async_trait]
impl Installer for ProcessInstaller {
    fn missing(&self, dependencies: &BTreeMap<String, String>) -> Vec<(String, String)> {
        dependencies
            .iter()
            .filter(|(name, _)| !self.modules_dir.join(name).exists())
            .map(|(name, version)| (name.clone(), version.clone()))
            .collect()
    }

    async fn install(&self, packages: &[(String, String)]) -> Result<(), InstallError> {
        let mut command = tokio::process::Command::new(&self.program);
        command.arg("install");
        for (name, version) in packages {
            command.arg(format!("{}@{}", name, version));
        }
        warn!(program = %self.program, count = packages.len(), "spawning installer");

        let status = command.status().await.map_err(|source| InstallError::Spawn {
            program: self.program.clone(),
            source,
        })?;
        if !status.success() {
            return Err(InstallError::Failed {
                code: status.code(),
            });
        }
        info!(program = %self.program, "installation complete");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_checks_the_modules_dir() {
        let dir = std::env::temp_dir().join(format!("resourceful-install-{}", std::process::id()));
        std::fs::create_dir_all(dir.join("present")).unwrap();

        let installer = ProcessInstaller::new("true", &dir);
        let mut deps = BTreeMap::new();
        deps.insert("present".to_string(), "*".to_string());
        deps.insert("absent".to_string(), "1.0.0".to_string());

        let missing = installer.missing(&deps);
        assert_eq!(missing, vec![("absent".to_string(), "1.0.0".to_string())]);

        std::fs::remove_dir_all(&dir).unwrap();
    }

    #[tokio::test]
    async fn spawn_failure_is_typed() {
        let installer = ProcessInstaller::new("definitely-not-a-real-binary", "node_modules");
        let err = installer
            .install(&[("colors".to_string(), "*".to_string())])
            .await
            .unwrap_err();
        assert!(matches!(err, InstallError::Spawn { .. }));
    }
}
