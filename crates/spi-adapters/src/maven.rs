//! Regenerates JaCoCo reports when a test run left none behind.

use spi_core::coverage;
use std::io;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;
use tracing::{info, warn};

/// Limit for one `mvn jacoco:report` invocation.
pub const REPORT_TIMEOUT: Duration = Duration::from_secs(60);

#[derive(Debug, thiserror::Error)]
pub enum MavenError {
    #[error("Maven command not found")]
    NotFound,

    #[error("{module} failed (exit code {code}) - {stderr}")]
    Failed { module: String, code: i32, stderr: String },

    #[error("{module} timed out after {secs}s")]
    Timeout { module: String, secs: u64 },

    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}

/// Module directories worth running `jacoco:report` in for `profiles`.
///
/// Falls back to the service root when no profile module exists.
pub fn report_modules(base: &Path, service: &str, profiles: &[String]) -> Vec<PathBuf> {
    let mut modules: Vec<PathBuf> = Vec::new();
    for profile in profiles {
        for module in coverage::profile_modules(base, service, profile) {
            if !modules.contains(&module) {
                modules.push(module);
            }
        }
    }
    if modules.is_empty() {
        modules.push(base.to_path_buf());
    }
    modules
}

/// Runs `mvn jacoco:report -DskipTests` in each module.
///
/// Returns the modules that succeeded. A missing `mvn` stops immediately;
/// module failures are collected and logged so the remaining modules still run.
pub async fn regenerate_reports(
    command: &str,
    modules: &[PathBuf],
    timeout: Duration,
) -> Result<Vec<PathBuf>, MavenError> {
    let mut succeeded = Vec::new();
    for module in modules {
        match run_report(command, module, timeout).await {
            Ok(()) => {
                info!(module = %module.display(), "Coverage report generated");
                succeeded.push(module.clone());
            }
            Err(MavenError::NotFound) => return Err(MavenError::NotFound),
            Err(e) => warn!(error = %e, "Coverage report generation failed"),
        }
    }
    Ok(succeeded)
}

async fn run_report(command: &str, module: &Path, timeout: Duration) -> Result<(), MavenError> {
    let label = module.display().to_string();
    let mut cmd = Command::new(command);
    cmd.args(["jacoco:report", "-DskipTests"])
        .current_dir(module)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);

    let output = match tokio::time::timeout(timeout, cmd.output()).await {
        Ok(Ok(output)) => output,
        Ok(Err(e)) if e.kind() == io::ErrorKind::NotFound => return Err(MavenError::NotFound),
        Ok(Err(e)) => return Err(MavenError::Io(e)),
        Err(_) => {
            return Err(MavenError::Timeout {
                module: label,
                secs: timeout.as_secs(),
            });
        }
    };

    if output.status.success() {
        Ok(())
    } else {
        let stderr = String::from_utf8_lossy(&output.stderr);
        let preview: String = if stderr.trim().is_empty() {
            "No stderr".to_string()
        } else {
            stderr.chars().take(500).collect()
        };
        Err(MavenError::Failed {
            module: label,
            code: output.status.code().unwrap_or(1),
            stderr: preview,
        })
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn falls_back_to_service_root() {
        let temp = TempDir::new().unwrap();
        let modules = report_modules(temp.path(), "legal", &["azure".to_string()]);
        assert_eq!(modules, vec![temp.path().to_path_buf()]);
    }

    #[tokio::test]
    async fn missing_maven_stops_early() {
        let temp = TempDir::new().unwrap();
        let err = regenerate_reports("no-such-mvn-binary", &[temp.path().to_path_buf()], REPORT_TIMEOUT)
            .await
            .unwrap_err();
        assert!(matches!(err, MavenError::NotFound));
    }

    #[tokio::test]
    async fn failing_module_is_skipped() {
        let temp = TempDir::new().unwrap();
        let good = temp.path().join("good");
        let bad = temp.path().join("bad");
        fs::create_dir_all(&good).unwrap();
        fs::create_dir_all(&bad).unwrap();
        let script = temp.path().join("mvn");
        fs::write(&script, "#!/bin/sh\ncase \"$PWD\" in */bad) echo nope >&2; exit 1;; esac\nexit 0\n").unwrap();
        {
            use std::os::unix::fs::PermissionsExt;
            fs::set_permissions(&script, fs::Permissions::from_mode(0o755)).unwrap();
        }

        let ok = regenerate_reports(
            script.to_str().unwrap(),
            &[good.clone(), bad],
            Duration::from_secs(10),
        )
        .await
        .unwrap();
        assert_eq!(ok, vec![good]);
    }
}
