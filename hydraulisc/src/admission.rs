//! Admission control: who may register.
//!
//! The mode is configuration, not code. [`AdmissionConfig`] is a shared
//! handle that request handlers read once per registration and pass into
//! [`AuthManager::register`](crate::auth::AuthManager::register); a reload
//! task swaps the value from outside the request path.

use std::{
    fmt, fs, io,
    path::Path,
    str::FromStr,
    sync::{Arc, PoisonError, RwLock},
};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::auth::{AuthError, AuthResult};

/// Registration admission mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum AdmissionMode {
    /// Anyone may register; supplied invite codes are ignored
    Open,
    /// A valid unused invite code is required and consumed
    InviteOnly,
    /// Registration disabled
    Closed,
}

impl fmt::Display for AdmissionMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            AdmissionMode::Open => "open",
            AdmissionMode::InviteOnly => "inviteOnly",
            AdmissionMode::Closed => "closed",
        };
        f.write_str(s)
    }
}

impl FromStr for AdmissionMode {
    type Err = AdmissionConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "open" => Ok(AdmissionMode::Open),
            "inviteOnly" | "invite-only" | "invite_only" => Ok(AdmissionMode::InviteOnly),
            "closed" => Ok(AdmissionMode::Closed),
            other => Err(AdmissionConfigError::UnknownMode(other.to_string())),
        }
    }
}

/// Outcome of evaluating a registration against the admission mode
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AdmissionDecision {
    pub may_proceed: bool,
    pub requires_invite_consumption: bool,
}

/// Pure admission predicate, evaluated before any mutation
pub struct AdmissionPolicy;

impl AdmissionPolicy {
    /// Decide whether a registration may proceed
    pub fn evaluate(mode: AdmissionMode, invite_code: Option<&str>) -> AdmissionDecision {
        match mode {
            AdmissionMode::Closed => AdmissionDecision {
                may_proceed: false,
                requires_invite_consumption: false,
            },
            AdmissionMode::InviteOnly => AdmissionDecision {
                may_proceed: invite_code.is_some_and(|code| !code.trim().is_empty()),
                requires_invite_consumption: true,
            },
            AdmissionMode::Open => AdmissionDecision {
                may_proceed: true,
                requires_invite_consumption: false,
            },
        }
    }

    /// [`evaluate`](Self::evaluate) turned into the matching error
    ///
    /// # Errors
    ///
    /// * `AuthError::AdmissionDenied` - mode is closed
    /// * `AuthError::InvalidInvite` - invite-only without a code
    pub fn check(mode: AdmissionMode, invite_code: Option<&str>) -> AuthResult<AdmissionDecision> {
        let decision = Self::evaluate(mode, invite_code);
        if decision.may_proceed {
            return Ok(decision);
        }

        match mode {
            AdmissionMode::InviteOnly => Err(AuthError::InvalidInvite),
            _ => Err(AuthError::AdmissionDenied),
        }
    }
}

/// Admission configuration errors
#[derive(Debug, Error)]
pub enum AdmissionConfigError {
    #[error("Failed to read admission config: {0}")]
    Io(#[from] io::Error),

    #[error("Failed to parse admission config: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("Unknown admission mode: {0}")]
    UnknownMode(String),
}

/// On-disk admission settings
///
/// Accepts both the explicit form `{"admissionMode": "inviteOnly"}` and the
/// flag form `{"isPublic": true, "inviteMode": false}`; the explicit key wins.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AdmissionFile {
    admission_mode: Option<AdmissionMode>,
    #[serde(default)]
    is_public: bool,
    #[serde(default)]
    invite_mode: bool,
}

impl AdmissionFile {
    fn mode(&self) -> AdmissionMode {
        match self.admission_mode {
            Some(mode) => mode,
            None if self.invite_mode => AdmissionMode::InviteOnly,
            None if self.is_public => AdmissionMode::Open,
            None => AdmissionMode::Closed,
        }
    }
}

/// Parse admission settings from JSON text
pub fn parse_admission_json(json: &str) -> Result<AdmissionMode, AdmissionConfigError> {
    let file: AdmissionFile = serde_json::from_str(json)?;
    Ok(file.mode())
}

/// Shared, reloadable admission mode
#[derive(Debug, Clone)]
pub struct AdmissionConfig {
    mode: Arc<RwLock<AdmissionMode>>,
}

impl AdmissionConfig {
    pub fn new(mode: AdmissionMode) -> Self {
        Self {
            mode: Arc::new(RwLock::new(mode)),
        }
    }

    /// Load the initial mode from a JSON file
    pub fn load_file(path: impl AsRef<Path>) -> Result<Self, AdmissionConfigError> {
        let mode = read_mode(path.as_ref())?;
        Ok(Self::new(mode))
    }

    /// Current mode
    pub fn mode(&self) -> AdmissionMode {
        *self.mode.read().unwrap_or_else(PoisonError::into_inner)
    }

    /// Replace the mode, returning the previous one
    pub fn set_mode(&self, mode: AdmissionMode) -> AdmissionMode {
        let mut guard = self.mode.write().unwrap_or_else(PoisonError::into_inner);
        std::mem::replace(&mut *guard, mode)
    }

    /// Re-read a JSON file and swap the mode in
    ///
    /// On error the current mode is kept.
    pub fn reload_from(&self, path: impl AsRef<Path>) -> Result<AdmissionMode, AdmissionConfigError> {
        let mode = read_mode(path.as_ref())?;
        let previous = self.set_mode(mode);
        if previous != mode {
            log::info!("Admission mode changed from {previous} to {mode}");
        }
        Ok(mode)
    }
}

impl Default for AdmissionConfig {
    fn default() -> Self {
        Self::new(AdmissionMode::Closed)
    }
}

fn read_mode(path: &Path) -> Result<AdmissionMode, AdmissionConfigError> {
    let text = fs::read_to_string(path)?;
    parse_admission_json(&text)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_closed_never_proceeds() {
        for code in [None, Some(""), Some("abc")] {
            let decision = AdmissionPolicy::evaluate(AdmissionMode::Closed, code);
            assert!(!decision.may_proceed);
            assert!(matches!(
                AdmissionPolicy::check(AdmissionMode::Closed, code),
                Err(AuthError::AdmissionDenied)
            ));
        }
    }

    #[test]
    fn test_invite_only_needs_a_code() {
        let with_code = AdmissionPolicy::evaluate(AdmissionMode::InviteOnly, Some("abc"));
        assert!(with_code.may_proceed);
        assert!(with_code.requires_invite_consumption);

        for code in [None, Some(""), Some("   ")] {
            assert!(matches!(
                AdmissionPolicy::check(AdmissionMode::InviteOnly, code),
                Err(AuthError::InvalidInvite)
            ));
        }
    }

    #[test]
    fn test_open_ignores_code() {
        for code in [None, Some("abc")] {
            let decision = AdmissionPolicy::evaluate(AdmissionMode::Open, code);
            assert!(decision.may_proceed);
            assert!(!decision.requires_invite_consumption);
        }
    }

    #[test]
    fn test_mode_parsing() {
        assert_eq!("open".parse::<AdmissionMode>().unwrap(), AdmissionMode::Open);
        assert_eq!("inviteOnly".parse::<AdmissionMode>().unwrap(), AdmissionMode::InviteOnly);
        assert_eq!("invite-only".parse::<AdmissionMode>().unwrap(), AdmissionMode::InviteOnly);
        assert_eq!(" closed ".parse::<AdmissionMode>().unwrap(), AdmissionMode::Closed);
        assert!("public".parse::<AdmissionMode>().is_err());

        for mode in [AdmissionMode::Open, AdmissionMode::InviteOnly, AdmissionMode::Closed] {
            assert_eq!(mode.to_string().parse::<AdmissionMode>().unwrap(), mode);
        }
    }

    #[test]
    fn test_flag_form_json() {
        let cases = [
            (r#"{"isPublic": true, "inviteMode": false}"#, AdmissionMode::Open),
            (r#"{"isPublic": true, "inviteMode": true}"#, AdmissionMode::InviteOnly),
            (r#"{"isPublic": false, "inviteMode": true}"#, AdmissionMode::InviteOnly),
            (r#"{"isPublic": false, "inviteMode": false}"#, AdmissionMode::Closed),
            ("{}", AdmissionMode::Closed),
        ];
        for (json, expected) in cases {
            assert_eq!(parse_admission_json(json).unwrap(), expected, "{json}");
        }
    }

    #[test]
    fn test_explicit_mode_wins() {
        let json = r#"{"admissionMode": "closed", "isPublic": true, "inviteMode": true}"#;
        assert_eq!(parse_admission_json(json).unwrap(), AdmissionMode::Closed);
        assert!(parse_admission_json(r#"{"admissionMode": "sometimes"}"#).is_err());
        assert!(parse_admission_json("not json").is_err());
    }

    #[test]
    fn test_reload_swaps_mode_and_keeps_it_on_error() {
        let dir = std::env::temp_dir().join(format!("hydraulisc-admission-{}", std::process::id()));
        fs::create_dir_all(&dir).unwrap();
        let path = dir.join("admission.json");

        fs::write(&path, r#"{"admissionMode": "open"}"#).unwrap();
        let config = AdmissionConfig::load_file(&path).unwrap();
        assert_eq!(config.mode(), AdmissionMode::Open);

        let handle = config.clone();
        fs::write(&path, r#"{"inviteMode": true}"#).unwrap();
        assert_eq!(config.reload_from(&path).unwrap(), AdmissionMode::InviteOnly);
        assert_eq!(handle.mode(), AdmissionMode::InviteOnly);

        fs::write(&path, "{ broken").unwrap();
        assert!(config.reload_from(&path).is_err());
        assert_eq!(config.mode(), AdmissionMode::InviteOnly);

        fs::remove_dir_all(&dir).unwrap();
    }
}
