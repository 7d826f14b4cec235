//! Integration tests for registration, admission, invites and sessions.
//!
//! Runs against the in-memory stores so no database is needed.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use hydraulisc::admin::AdminAuthority;
use hydraulisc::admission::{AdmissionConfig, AdmissionMode};
use hydraulisc::auth::{AuthError, AuthManager, LoginRequest, ProfileUpdate, RegisterRequest};
use hydraulisc::content::{NewPost, PostManager};
use hydraulisc::db::Stores;
use hydraulisc::identity::ProfileManager;
use hydraulisc::invites::InviteLedger;
use hydraulisc::security::{RateLimitConfig, RateLimiter};
use tokio::task::JoinSet;

fn unlimited() -> Arc<RateLimiter> {
    let mut configs = HashMap::new();
    for endpoint in ["login", "register"] {
        configs.insert(
            endpoint.to_string(),
            RateLimitConfig::new(10_000, Duration::from_secs(60)),
        );
    }
    Arc::new(RateLimiter::with_configs(configs))
}

fn setup() -> (Stores, AuthManager) {
    let stores = Stores::in_memory();
    let auth = AuthManager::new(&stores, "integration_test_pepper".to_string())
        .with_rate_limiter(unlimited());
    (stores, auth)
}

fn request(name: &str, password: &str, code: Option<&str>) -> RegisterRequest {
    RegisterRequest {
        display_name: name.to_string(),
        password: password.to_string(),
        invite_code: code.map(str::to_string),
    }
}

async fn mint_one(stores: &Stores) -> String {
    InviteLedger::new(Arc::clone(&stores.invites))
        .generate(1)
        .await
        .expect("Failed to mint invite")
        .remove(0)
        .code
}

#[tokio::test]
async fn test_invite_only_end_to_end() {
    let (stores, auth) = setup();
    let config = AdmissionConfig::new(AdmissionMode::InviteOnly);

    let first_code = mint_one(&stores).await;
    let (ami, _) = auth
        .register(
            request("Ami", "longpassword1", Some(&first_code)),
            config.mode(),
            "client",
        )
        .await
        .expect("First registration should succeed");
    assert_eq!(ami.identity(), "Ami#0001");
    assert!(ami.is_admin, "First account is the bootstrap admin");

    let reused = auth
        .register(
            request("Ami", "anotherpass1", Some(&first_code)),
            config.mode(),
            "client",
        )
        .await;
    assert!(matches!(reused, Err(AuthError::InvalidInvite)));

    let second_code = mint_one(&stores).await;
    let (second, _) = auth
        .register(
            request("Ami", "anotherpass1", Some(&second_code)),
            config.mode(),
            "client",
        )
        .await
        .expect("Registration with a fresh code should succeed");
    assert_eq!(second.identity(), "Ami#0002");
    assert!(!second.is_admin);
}

#[tokio::test]
async fn test_sequential_discriminators_ascend_from_0001() {
    let (_, auth) = setup();

    for expected in 1..=12u16 {
        let (account, _) = auth
            .register(request("Rin", "longpassword1", None), AdmissionMode::Open, "c")
            .await
            .unwrap();
        assert_eq!(account.discriminator, format!("{expected:04}"));
    }
}

#[tokio::test]
async fn test_closed_mode_rejects_valid_invite() {
    let (stores, auth) = setup();
    let code = mint_one(&stores).await;

    let result = auth
        .register(
            request("Ami", "longpassword1", Some(&code)),
            AdmissionMode::Closed,
            "c",
        )
        .await;

    assert!(matches!(result, Err(AuthError::AdmissionDenied)));
    assert!(!stores.invites.find(&code).await.unwrap().unwrap().used);
    assert_eq!(stores.accounts.count_all().await.unwrap(), 0);
}

#[tokio::test]
async fn test_invite_only_requires_code() {
    let (_, auth) = setup();

    for code in [None, Some(""), Some("ffffffffffffffffffffffffffffffff")] {
        let result = auth
            .register(
                request("Ami", "longpassword1", code),
                AdmissionMode::InviteOnly,
                "c",
            )
            .await;
        assert!(matches!(result, Err(AuthError::InvalidInvite)), "{code:?}");
    }
}

#[tokio::test]
async fn test_concurrent_consumption_single_winner() {
    let (stores, _) = setup();
    let ledger = InviteLedger::new(Arc::clone(&stores.invites));
    let code = ledger.generate(1).await.unwrap().remove(0).code;

    let mut join_set = JoinSet::new();
    for _ in 0..32 {
        let ledger = ledger.clone();
        let code = code.clone();
        join_set.spawn(async move { ledger.consume(&code).await });
    }

    let mut successes = 0;
    while let Some(result) = join_set.join_next().await {
        match result.unwrap() {
            Ok(()) => successes += 1,
            Err(err) => assert!(matches!(err, AuthError::InvalidInvite)),
        }
    }
    assert_eq!(successes, 1);
}

#[tokio::test]
async fn test_concurrent_registrations_with_one_code() {
    let (stores, auth) = setup();
    let code = mint_one(&stores).await;

    let mut join_set = JoinSet::new();
    for i in 0..8 {
        let auth = auth.clone();
        let code = code.clone();
        join_set.spawn(async move {
            auth.register(
                request(&format!("racer{i}"), "longpassword1", Some(&code)),
                AdmissionMode::InviteOnly,
                "c",
            )
            .await
        });
    }

    let mut successes = 0;
    while let Some(result) = join_set.join_next().await {
        if result.unwrap().is_ok() {
            successes += 1;
        }
    }
    assert_eq!(successes, 1);
    assert_eq!(stores.accounts.count_all().await.unwrap(), 1);
}

#[tokio::test]
async fn test_concurrent_same_name_gets_distinct_identities() {
    let (stores, auth) = setup();

    let mut join_set = JoinSet::new();
    for _ in 0..6 {
        let auth = auth.clone();
        join_set.spawn(async move {
            auth.register(request("Ami", "longpassword1", None), AdmissionMode::Open, "c")
                .await
        });
    }

    let mut discriminators = Vec::new();
    let mut admins = 0;
    while let Some(result) = join_set.join_next().await {
        match result.unwrap() {
            Ok((account, _)) => {
                if account.is_admin {
                    admins += 1;
                }
                discriminators.push(account.discriminator);
            }
            // Lost every allocation race; retriable by contract
            Err(err) => assert!(err.is_retriable(), "unexpected error {err}"),
        }
    }

    let before = discriminators.len();
    discriminators.sort();
    discriminators.dedup();
    assert_eq!(discriminators.len(), before, "identities must be unique");
    assert_eq!(admins, 1, "exactly one bootstrap admin");
    assert_eq!(stores.accounts.count_all().await.unwrap() as usize, before);
}

#[tokio::test]
async fn test_first_registration_race_yields_one_admin() {
    let (stores, auth) = setup();

    let mut join_set = JoinSet::new();
    for i in 0..10 {
        let auth = auth.clone();
        join_set.spawn(async move {
            auth.register(
                request(&format!("user{i}"), "longpassword1", None),
                AdmissionMode::Open,
                "c",
            )
            .await
        });
    }

    while let Some(result) = join_set.join_next().await {
        result.unwrap().expect("distinct names never collide");
    }

    let admins = stores
        .accounts
        .list_all()
        .await
        .unwrap()
        .iter()
        .filter(|account| account.is_admin)
        .count();
    assert_eq!(admins, 1);
}

#[tokio::test]
async fn test_wrong_suffix_and_wrong_password_look_the_same() {
    let (_, auth) = setup();
    auth.register(request("Ami", "longpassword1", None), AdmissionMode::Open, "c")
        .await
        .unwrap();

    let login = |identity: &str, password: &str| LoginRequest {
        identity: identity.to_string(),
        password: password.to_string(),
    };

    let a = auth.login(login("Ami#0009", "longpassword1"), "c").await.unwrap_err();
    let b = auth.login(login("Ami#0001", "notthepassword"), "c").await.unwrap_err();
    assert_eq!(a.client_message(), b.client_message());
    assert_eq!(a.client_message(), "Invalid credentials");

    let (account, session) = auth.login(login("Ami#0001", "longpassword1"), "c").await.unwrap();
    assert_eq!(session.account_id, account.id);
    assert!(session.is_admin);
}

#[tokio::test]
async fn test_admin_gating_and_takedown() {
    let (stores, auth) = setup();
    let admin_authority = AdminAuthority::new(&stores);
    let posts = PostManager::new(Arc::clone(&stores.posts));

    let (_, admin) = auth
        .register(request("Boss", "longpassword1", None), AdmissionMode::Open, "c")
        .await
        .unwrap();
    let (_, user) = auth
        .register(request("Ami", "longpassword1", None), AdmissionMode::Open, "c")
        .await
        .unwrap();

    assert!(matches!(
        admin_authority.generate_invites(Some(&user), 1).await,
        Err(AuthError::Forbidden)
    ));
    assert!(matches!(
        admin_authority.generate_invites(None, 1).await,
        Err(AuthError::Unauthenticated)
    ));
    let codes = admin_authority.generate_invites(Some(&admin), 3).await.unwrap();
    assert_eq!(codes.len(), 3);

    let post = posts
        .create_post(
            Some(&user),
            NewPost {
                title: "hello".to_string(),
                filename: "uploads/hello.png".to_string(),
            },
        )
        .await
        .unwrap();

    // Owner-only delete refuses the admin, the takedown path does not
    assert!(matches!(
        posts.delete_post(Some(&admin), post.id).await,
        Err(AuthError::Forbidden)
    ));
    admin_authority
        .force_delete_post(Some(&admin), post.id)
        .await
        .unwrap();
    assert!(posts.list_posts_by(user.account_id).await.unwrap().is_empty());

    let accounts = admin_authority.list_accounts(Some(&admin)).await.unwrap();
    assert_eq!(accounts.len(), 2);
}

#[tokio::test]
async fn test_profile_update_owner_or_admin() {
    let (stores, auth) = setup();
    let profiles = ProfileManager::new(Arc::clone(&stores.accounts));

    let (_, admin) = auth
        .register(request("Boss", "longpassword1", None), AdmissionMode::Open, "c")
        .await
        .unwrap();
    let (ami, ami_session) = auth
        .register(request("Ami", "longpassword1", None), AdmissionMode::Open, "c")
        .await
        .unwrap();
    let (_, other) = auth
        .register(request("Rin", "longpassword1", None), AdmissionMode::Open, "c")
        .await
        .unwrap();

    assert_eq!(ami.biography, "User has not written their Bio.");

    let update = ProfileUpdate {
        biography: Some("hi".to_string()),
        ..Default::default()
    };

    assert!(matches!(
        profiles.update_profile(Some(&other), ami.id, update.clone()).await,
        Err(AuthError::Forbidden)
    ));
    let updated = profiles
        .update_profile(Some(&ami_session), ami.id, update)
        .await
        .unwrap();
    assert_eq!(updated.biography, "hi");

    let theme = ProfileUpdate {
        theme: Some("dark".to_string()),
        ..Default::default()
    };
    let updated = profiles.update_profile(Some(&admin), ami.id, theme).await.unwrap();
    assert_eq!(updated.theme, "dark");
    assert_eq!(updated.biography, "hi");
}

#[tokio::test]
async fn test_purge_expired_sessions() {
    let stores = Stores::in_memory();
    let auth = AuthManager::new(&stores, "integration_test_pepper".to_string())
        .with_rate_limiter(unlimited())
        .with_session_ttl(chrono::Duration::milliseconds(10));

    auth.register(request("Ami", "longpassword1", None), AdmissionMode::Open, "c")
        .await
        .unwrap();
    tokio::time::sleep(Duration::from_millis(30)).await;

    assert_eq!(auth.purge_expired_sessions().await.unwrap(), 1);
    assert_eq!(auth.purge_expired_sessions().await.unwrap(), 0);
}
