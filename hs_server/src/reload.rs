//! Admission mode hot-reload.
//!
//! On SIGHUP the admission file is read again and the new mode swapped into
//! the shared [`AdmissionConfig`]. Registrations already past the gate keep
//! the mode they observed; an unreadable file leaves the current mode in place.

use std::path::{Path, PathBuf};

use hydraulisc::{AdmissionConfig, AdmissionMode, admission::AdmissionConfigError};
use tracing::{info, warn};

/// Re-read the admission file once
///
/// Returns the previous and the current mode.
pub fn reload_admission(
    config_path: &Path,
    admission: &AdmissionConfig,
) -> Result<(AdmissionMode, AdmissionMode), AdmissionConfigError> {
    let previous = admission.mode();
    let current = admission.reload_from(config_path)?;
    Ok((previous, current))
}

/// Spawn a task that reloads the admission file on every SIGHUP
#[cfg(unix)]
pub fn spawn_sighup_handler(config_path: PathBuf, admission: AdmissionConfig) {
    use tokio::signal::unix::{SignalKind, signal};

    tokio::spawn(async move {
        let mut signal = match signal(SignalKind::hangup()) {
            Ok(s) => s,
            Err(e) => {
                tracing::error!(error = %e, "Failed to install SIGHUP handler for admission reload");
                return;
            }
        };

        info!(config_path = %config_path.display(), "SIGHUP admission reload handler started");

        while signal.recv().await.is_some() {
            info!("Received SIGHUP, reloading admission config");

            match reload_admission(&config_path, &admission) {
                Ok((previous, current)) if previous == current => {
                    info!(mode = %current, "SIGHUP reload: admission mode unchanged");
                }
                Ok((previous, current)) => {
                    info!(from = %previous, to = %current, "SIGHUP reload: admission mode updated");
                }
                Err(e) => {
                    warn!(error = %e, "SIGHUP reload failed, keeping current admission mode");
                }
            }
        }
    });
}

/// Signals are unavailable; the mode stays as loaded at startup
#[cfg(not(unix))]
pub fn spawn_sighup_handler(config_path: PathBuf, _admission: AdmissionConfig) {
    warn!(
        config_path = %config_path.display(),
        "SIGHUP reload is not supported on this platform"
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write_temp(name: &str, contents: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("hs_server_reload_{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join(name);
        std::fs::write(&path, contents).unwrap();
        path
    }

    #[test]
    fn test_reload_swaps_mode() {
        let path = write_temp("swap.json", r#"{"admissionMode": "open"}"#);
        let admission = AdmissionConfig::new(AdmissionMode::Closed);

        let (previous, current) = reload_admission(&path, &admission).unwrap();
        assert_eq!(previous, AdmissionMode::Closed);
        assert_eq!(current, AdmissionMode::Open);
        assert_eq!(admission.mode(), AdmissionMode::Open);

        std::fs::write(&path, r#"{"isPublic": true, "inviteMode": true}"#).unwrap();
        let (_, current) = reload_admission(&path, &admission).unwrap();
        assert_eq!(current, AdmissionMode::InviteOnly);
    }

    #[test]
    fn test_failed_reload_keeps_mode() {
        let path = write_temp("broken.json", "{ not json");
        let admission = AdmissionConfig::new(AdmissionMode::InviteOnly);

        assert!(reload_admission(&path, &admission).is_err());
        assert_eq!(admission.mode(), AdmissionMode::InviteOnly);

        let missing = path.with_file_name("does_not_exist.json");
        assert!(matches!(
            reload_admission(&missing, &admission),
            Err(AdmissionConfigError::Io(_))
        ));
        assert_eq!(admission.mode(), AdmissionMode::InviteOnly);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_spawned_handler_starts() {
        let path = write_temp("spawn.json", r#"{"admissionMode": "closed"}"#);
        let admission = AdmissionConfig::new(AdmissionMode::Closed);
        spawn_sighup_handler(path, admission.clone());
        tokio::task::yield_now().await;
        assert_eq!(admission.mode(), AdmissionMode::Closed);
    }
}
