#![allow(dead_code)]

use std::{
    env,
    sync::{Arc, Mutex, MutexGuard, OnceLock},
    time::{SystemTime, UNIX_EPOCH},
};

use mongodb::Client;

use saccodesk::config::AppConfig;
use saccodesk::models::User;
use saccodesk::state::{AppState, create_member_user, find_user, init_state};

/// Global lock so integration tests that mutate the DB run one-at-a-time.
static TEST_DB_LOCK: OnceLock<Mutex<()>> = OnceLock::new();

pub const ADMIN_EMAIL: &str = "treasurer@mitewa.local";

pub struct TestContext {
    pub state: Arc<AppState>,
    pub db_name: String,
    uri: String,
    _guard: MutexGuard<'static, ()>,
}

impl TestContext {
    pub async fn admin(&self) -> User {
        find_user(&self.state, ADMIN_EMAIL)
            .await
            .unwrap()
            .expect("seeded admin present")
    }

    pub async fn member(&self, email: &str) -> User {
        create_member_user(&self.state, email, Some("Test Member"))
            .await
            .unwrap()
    }
}

fn test_uri() -> String {
    let base = env::var("MONGODB_URI").unwrap_or_else(|_| "mongodb://localhost:27017".to_string());
    let sep = if base.contains('?') { '&' } else { '?' };
    format!("{base}{sep}serverSelectionTimeoutMS=2000")
}

pub async fn setup_state() -> Option<TestContext> {
    let guard = TEST_DB_LOCK
        .get_or_init(|| Mutex::new(()))
        .lock()
        .unwrap_or_else(|poisoned| poisoned.into_inner());

    let uri = test_uri();
    let db_name = format!(
        "saccodesktest_{}",
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap()
            .as_millis()
    );

    let client = match Client::with_uri_str(&uri).await {
        Ok(c) => c,
        Err(err) => {
            eprintln!("Skipping test; cannot connect to MongoDB: {err:?}");
            return None;
        }
    };
    if let Err(err) = client.database(&db_name).drop().await {
        eprintln!("Skipping test; cannot drop test DB: {err:?}");
        return None;
    }

    let config = AppConfig::from_lookup(|key| match key {
        "MONGODB_URI" => Some(uri.clone()),
        "MONGODB_DB" => Some(db_name.clone()),
        "USERS_FILE" => Some(concat!(env!("CARGO_MANIFEST_DIR"), "/data/users.json").to_string()),
        "ROSTER_FILE" => Some(
            concat!(env!("CARGO_MANIFEST_DIR"), "/data/default_members.json").to_string(),
        ),
        _ => None,
    })
    .ok()?;

    match init_state(config).await {
        Ok(state) => Some(TestContext {
            state: Arc::new(state),
            db_name,
            uri,
            _guard: guard,
        }),
        Err(err) => {
            eprintln!("Skipping test; init_state failed: {err:?}");
            None
        }
    }
}

pub async fn teardown(ctx: Option<TestContext>) {
    if let Some(ctx) = ctx {
        if let Ok(client) = Client::with_uri_str(&ctx.uri).await {
            let _ = client.database(&ctx.db_name).drop().await;
        }
        drop(ctx);
    }
}
