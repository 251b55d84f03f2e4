//! Common test utilities for nutricoach integration tests.

#![allow(dead_code)] // Some utilities are used by different test files

use std::sync::Arc;

use axum::http::{HeaderName, HeaderValue};
use axum::Router;
use axum_test::TestServer;

use nutricoach_core::{Handle, UserId};
use nutricoach_service::{create_router, sign_init_data, AppState, ServiceConfig};
use nutricoach_store::{MemoryStore, Store};

/// Bot token the harness signs init data with.
pub const BOT_TOKEN: &str = "123456:TEST-TOKEN";

/// Service key the harness configures for bot routes.
pub const SERVICE_API_KEY: &str = "test-service-key";

/// Admin handle the harness configures.
pub const ADMIN_HANDLE: &str = "coach";

/// `X-Api-Key` header name.
pub fn x_api_key() -> HeaderName {
    HeaderName::from_static("x-api-key")
}

/// Test harness containing everything needed for integration tests.
pub struct TestHarness {
    /// The test server for making HTTP requests.
    pub server: TestServer,
    /// The store behind the server, for arranging and inspecting state.
    pub store: Arc<MemoryStore>,
    /// A test user for authenticated requests.
    pub user_id: UserId,
}

impl TestHarness {
    /// Create a new test harness with an empty store and no AI client.
    pub fn new() -> Self {
        Self::with_config(|_| {})
    }

    /// Create a harness after adjusting the default test configuration.
    pub fn with_config(adjust: impl FnOnce(&mut ServiceConfig)) -> Self {
        let mut config = ServiceConfig {
            listen_addr: "127.0.0.1:0".into(),
            bot_secret: BOT_TOKEN.into(),
            admin_handle: Handle::parse(ADMIN_HANDLE),
            service_api_key: Some(SERVICE_API_KEY.into()),
            // Nothing listens here; notifications fail and are logged.
            telegram_api_url: "http://127.0.0.1:9".into(),
            ..ServiceConfig::default()
        };
        adjust(&mut config);

        let store = Arc::new(MemoryStore::new());
        let state = AppState::new(Arc::clone(&store) as Arc<dyn Store>, config);
        let router: Router = create_router(state);

        let server = TestServer::new(router).expect("Failed to create test server");

        Self {
            server,
            store,
            user_id: UserId::new(1001),
        }
    }

    /// Signed init data for `user_id`, optionally with a username.
    pub fn init_data(user_id: UserId, username: Option<&str>) -> String {
        let user = match username {
            Some(name) => format!(r#"{{"id":{user_id},"first_name":"Test","username":"{name}"}}"#),
            None => format!(r#"{{"id":{user_id},"first_name":"Test"}}"#),
        };
        sign_init_data(
            &[
                ("auth_date", "1700000000"),
                ("query_id", "AAHdF6IQAAAAAN0XohDhrOrc"),
                ("user", &user),
            ],
            BOT_TOKEN,
        )
    }

    /// `Authorization` value for an arbitrary user.
    pub fn tma_for(user_id: UserId, username: Option<&str>) -> HeaderValue {
        HeaderValue::from_str(&format!("tma {}", Self::init_data(user_id, username)))
            .expect("init data is a valid header value")
    }

    /// `Authorization` value for the harness user.
    pub fn user_auth(&self) -> HeaderValue {
        Self::tma_for(self.user_id, Some("tester"))
    }

    /// `Authorization` value for the admin.
    pub fn admin_auth() -> HeaderValue {
        Self::tma_for(UserId::new(1), Some("Coach"))
    }

    /// `X-Api-Key` value for bot routes.
    pub fn service_key() -> HeaderValue {
        HeaderValue::from_static(SERVICE_API_KEY)
    }
}

impl Default for TestHarness {
    fn default() -> Self {
        Self::new()
    }
}
