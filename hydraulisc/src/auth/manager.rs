//! Authentication manager implementation.

use std::sync::Arc;

use chrono::{Duration, Utc};

use super::{
    errors::{AuthError, AuthResult},
    models::{Account, LoginRequest, NewAccount, ProfileDefaults, RegisterRequest, Session},
    password::{CredentialHasher, validate_password},
};
use crate::admission::{AdmissionMode, AdmissionPolicy};
use crate::db::{AccountRepository, SessionRepository, Stores};
use crate::identity::{DiscriminatorAllocator, Identity, validate_display_name};
use crate::invites::{InviteCode, InviteLedger};
use crate::security::{
    RateLimiter, random_hex,
    rate_limiter::{LOGIN_ENDPOINT, REGISTER_ENDPOINT},
};

/// Session lifetime in seconds, extended on every authenticated request
pub const DEFAULT_SESSION_TTL_SECS: i64 = 24 * 60 * 60;

/// Allocation + insert attempts before a lost race is reported
pub const MAX_IDENTITY_ATTEMPTS: usize = 3;

/// Random bytes per session token (256 bits)
const SESSION_TOKEN_BYTES: usize = 32;

/// Authentication manager
#[derive(Clone)]
pub struct AuthManager {
    accounts: Arc<dyn AccountRepository>,
    sessions: Arc<dyn SessionRepository>,
    ledger: InviteLedger,
    allocator: DiscriminatorAllocator,
    hasher: CredentialHasher,
    rate_limiter: Arc<RateLimiter>,
    profile_defaults: ProfileDefaults,
    session_ttl: Duration,
}

impl AuthManager {
    /// Create a new authentication manager
    ///
    /// # Arguments
    ///
    /// * `stores` - Repositories to authenticate against
    /// * `pepper` - Server-side pepper for password hashing
    pub fn new(stores: &Stores, pepper: String) -> Self {
        Self {
            accounts: Arc::clone(&stores.accounts),
            sessions: Arc::clone(&stores.sessions),
            ledger: InviteLedger::new(Arc::clone(&stores.invites)),
            allocator: DiscriminatorAllocator::new(Arc::clone(&stores.accounts)),
            hasher: CredentialHasher::new(pepper),
            rate_limiter: Arc::new(RateLimiter::new()),
            profile_defaults: ProfileDefaults::default(),
            session_ttl: Duration::seconds(DEFAULT_SESSION_TTL_SECS),
        }
    }

    pub fn with_session_ttl(mut self, ttl: Duration) -> Self {
        self.session_ttl = ttl;
        self
    }

    pub fn with_profile_defaults(mut self, defaults: ProfileDefaults) -> Self {
        self.profile_defaults = defaults;
        self
    }

    pub fn with_rate_limiter(mut self, rate_limiter: Arc<RateLimiter>) -> Self {
        self.rate_limiter = rate_limiter;
        self
    }

    pub fn session_ttl(&self) -> Duration {
        self.session_ttl
    }

    pub fn rate_limiter(&self) -> &Arc<RateLimiter> {
        &self.rate_limiter
    }

    /// Register a new account and open a session for it
    ///
    /// `client` keys the rate limiter, typically the peer address. The very
    /// first account ever stored is created as administrator.
    ///
    /// # Errors
    ///
    /// * `AuthError::RateLimited` - too many attempts from `client`
    /// * `AuthError::InvalidDisplayName` / `AuthError::WeakCredential` - bad input
    /// * `AuthError::AdmissionDenied` - registration is closed
    /// * `AuthError::InvalidInvite` - invite-only and the code is missing or spent
    /// * `AuthError::IdentityExhausted` - all discriminators taken for the name
    /// * `AuthError::DuplicateIdentity` - concurrent registrations kept winning
    /// * `AuthError::Internal` - the account could not be stored after the
    ///   invite was spent
    pub async fn register(
        &self,
        request: RegisterRequest,
        mode: AdmissionMode,
        client: &str,
    ) -> AuthResult<(Account, Session)> {
        self.rate_limiter.enforce(REGISTER_ENDPOINT, client).await?;

        let display_name = validate_display_name(&request.display_name)?;
        validate_password(&request.password)?;

        let invite_code = request.invite_code.as_deref();
        let decision = AdmissionPolicy::check(mode, invite_code).inspect_err(|err| {
            log::warn!("Registration of {display_name} refused in {mode} mode: {err}");
        })?;

        let password_hash = self.hasher.hash(&request.password).await?;

        // Exhaustion is reported before the invite is spent
        let discriminator = self.allocator.allocate(&display_name).await?;

        let consumed = match invite_code {
            Some(code) if decision.requires_invite_consumption => {
                self.ledger.consume(code).await?;
                Some(code.trim())
            }
            _ => None,
        };

        let new_account = NewAccount {
            display_name,
            discriminator,
            password_hash,
            profile: self.profile_defaults.clone(),
        };

        let account = match (self.create_account(new_account).await, consumed) {
            (Ok(account), _) => account,
            // A retry would present a spent code, so nothing here is retriable
            (Err(err), Some(code)) => {
                let redacted = InviteCode::redact(code);
                log::error!("Invite {redacted} consumed but account creation failed: {err}");
                return Err(AuthError::Internal(format!(
                    "account creation failed after consuming invite {redacted}"
                )));
            }
            (Err(err), None) => return Err(err),
        };

        if account.is_admin {
            log::info!("Bootstrap administrator {} registered", account.identity());
        } else {
            log::info!("Account {} registered", account.identity());
        }

        let session = self.establish_session(&account).await?;
        Ok((account, session))
    }

    /// Insert, re-allocating the discriminator when a concurrent
    /// registration took it first
    async fn create_account(&self, mut new_account: NewAccount) -> AuthResult<Account> {
        for attempt in 1..=MAX_IDENTITY_ATTEMPTS {
            match self.accounts.create_bootstrapping(new_account.clone()).await {
                Ok(account) => return Ok(account),
                Err(AuthError::DuplicateIdentity) if attempt < MAX_IDENTITY_ATTEMPTS => {
                    log::debug!(
                        "Identity {}#{} taken concurrently, retrying",
                        new_account.display_name,
                        new_account.discriminator
                    );
                    new_account.discriminator =
                        self.allocator.allocate(&new_account.display_name).await?;
                }
                Err(err) => return Err(err),
            }
        }

        Err(AuthError::DuplicateIdentity)
    }

    /// Login with a `Name#DDDD` identity
    ///
    /// # Errors
    ///
    /// * `AuthError::RateLimited` - too many attempts from `client`
    /// * `AuthError::MalformedIdentity` - identity is not `Name#DDDD`
    /// * `AuthError::UserNotFound` - no such identity
    /// * `AuthError::BadCredential` - wrong password
    pub async fn login(&self, request: LoginRequest, client: &str) -> AuthResult<(Account, Session)> {
        self.rate_limiter.enforce(LOGIN_ENDPOINT, client).await?;

        let identity: Identity = request.identity.trim().parse()?;

        let Some((account, password_hash)) = self
            .accounts
            .find_credentials(&identity.display_name, &identity.discriminator)
            .await?
        else {
            self.hasher.verify_dummy(&request.password).await?;
            log::warn!("Failed login for unknown identity {identity}");
            return Err(AuthError::UserNotFound);
        };

        if let Err(err) = self.hasher.verify(&request.password, password_hash).await {
            log::warn!("Failed login for {identity}: {err}");
            return Err(err);
        }

        let session = self.establish_session(&account).await?;
        log::info!("Account {identity} logged in");
        Ok((account, session))
    }

    /// Destroy a session
    ///
    /// # Errors
    ///
    /// * `AuthError::Unauthenticated` - no token, or no such session
    pub async fn logout(&self, token: Option<&str>) -> AuthResult<()> {
        let token = token.ok_or(AuthError::Unauthenticated)?;

        if self.sessions.delete(token).await? {
            Ok(())
        } else {
            Err(AuthError::Unauthenticated)
        }
    }

    /// Resolve a token to its session and extend its expiry
    ///
    /// # Errors
    ///
    /// * `AuthError::Unauthenticated` - unknown token
    /// * `AuthError::SessionExpired` - the session lapsed; it is removed
    pub async fn authenticate(&self, token: &str) -> AuthResult<Session> {
        let now = Utc::now();
        let session = self
            .sessions
            .find(token)
            .await?
            .ok_or(AuthError::Unauthenticated)?;

        if session.is_expired(now) {
            self.sessions.delete(token).await?;
            return Err(AuthError::SessionExpired);
        }

        let refreshed = session.refreshed(now, self.session_ttl);
        if !self.sessions.replace(&refreshed).await? {
            // Logged out in between
            return Err(AuthError::Unauthenticated);
        }

        Ok(refreshed)
    }

    /// Remove every expired session
    pub async fn purge_expired_sessions(&self) -> AuthResult<u64> {
        let removed = self.sessions.delete_expired(Utc::now()).await?;
        if removed > 0 {
            log::debug!("Purged {removed} expired sessions");
        }
        Ok(removed)
    }

    async fn establish_session(&self, account: &Account) -> AuthResult<Session> {
        let token = random_hex(SESSION_TOKEN_BYTES);
        let session = Session::for_account(account, token, Utc::now(), self.session_ttl);
        self.sessions.insert(&session).await?;
        Ok(session)
    }
}
