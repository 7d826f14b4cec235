//! Periodic cleanup of expired sessions and stale rate limit entries.

use std::{sync::Arc, time::Duration};

use hydraulisc::AuthManager;

use crate::{logging::log_maintenance, metrics};

/// Default pause between cleanup passes
pub const DEFAULT_CLEANUP_INTERVAL: Duration = Duration::from_secs(300);

/// Run one cleanup pass, returning the number of sessions removed
pub async fn run_cleanup_pass(auth_manager: &AuthManager) -> u64 {
    let sessions = match auth_manager.purge_expired_sessions().await {
        Ok(removed) => removed,
        Err(e) => {
            tracing::warn!(error = %e, "Expired session purge failed");
            0
        }
    };
    metrics::sessions_expired_total(sessions);
    log_maintenance("expired_sessions", sessions);

    let limiter_keys = auth_manager.rate_limiter().cleanup_expired().await;
    log_maintenance("rate_limit_entries", limiter_keys as u64);

    sessions
}

/// Spawn the cleanup loop
pub fn spawn_cleanup_task(auth_manager: Arc<AuthManager>, interval: Duration) {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        // First tick completes immediately
        ticker.tick().await;

        loop {
            ticker.tick().await;
            run_cleanup_pass(&auth_manager).await;
        }
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use hydraulisc::{AdmissionMode, auth::RegisterRequest, db::Stores};

    #[tokio::test]
    async fn test_cleanup_pass_removes_only_expired_sessions() {
        let stores = Stores::in_memory();
        let auth = AuthManager::new(&stores, "maintenance_pepper_value".to_string())
            .with_session_ttl(chrono::Duration::seconds(-1));

        let (_, expired) = auth
            .register(
                RegisterRequest {
                    display_name: "Ami".to_string(),
                    password: "longpassword1".to_string(),
                    invite_code: None,
                },
                AdmissionMode::Open,
                "127.0.0.1",
            )
            .await
            .unwrap();

        assert_eq!(run_cleanup_pass(&auth).await, 1);
        assert!(auth.authenticate(&expired.token).await.is_err());
        assert_eq!(run_cleanup_pass(&auth).await, 0);
    }
}
