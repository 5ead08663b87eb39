#![allow(dead_code)]

use axum::{
    body::Body,
    http::{header, Request, StatusCode},
    Router,
};
use complaint_service::{
    build_router,
    config::{
        Environment, GeminiConfig, GmailConfig, JwtConfig, MongoConfig, PasswordConfig,
        RateLimitConfig, SecurityConfig, ServiceConfig,
    },
    models::{Department, NewUser, User, UserRole},
    services::{MemoryComplaintStore, MemoryUserDirectory, MockNotifier, UserDirectory},
    utils::password::{hash_password, Password},
    AppState,
};
use http_body_util::BodyExt;
use serde_json::Value;
use std::sync::Arc;
use tower::util::ServiceExt;

pub const PASSWORD: &str = "secret123";

const CHEAP: PasswordConfig = PasswordConfig {
    hash_cost: 1,
    hash_memory_kib: 64,
};

pub fn test_config() -> ServiceConfig {
    ServiceConfig {
        common: service_core::config::Config::default(),
        environment: Environment::Dev,
        service_name: "complaint-service-test".to_string(),
        service_version: "0.0.0".to_string(),
        log_level: "debug".to_string(),
        otlp_endpoint: None,
        mongodb: MongoConfig {
            uri: "mongodb://localhost:27017".to_string(),
            database: "complaints_test".to_string(),
        },
        jwt: JwtConfig {
            access_secret: "test-access-secret".to_string(),
            refresh_secret: "test-refresh-secret".to_string(),
            access_ttl_seconds: 3600,
            refresh_ttl_seconds: 604_800,
            reset_ttl_seconds: 600,
        },
        password: CHEAP,
        gmail: GmailConfig {
            user: "noreply@example.com".to_string(),
            app_password: "unused".to_string(),
        },
        gemini: GeminiConfig {
            api_key: None,
            model: "gemini-1.5-flash".to_string(),
        },
        reset_pass_ui_link: "http://localhost:3000/reset-password".to_string(),
        super_admin: None,
        security: SecurityConfig {
            allowed_origins: vec!["http://localhost:3000".to_string()],
        },
        rate_limit: RateLimitConfig {
            login_attempts: 3,
            login_window_seconds: 60,
            password_reset_attempts: 2,
            password_reset_window_seconds: 60,
        },
    }
}

/// Router over in-memory stores plus handles to inspect them.
pub struct TestApp {
    pub router: Router,
    pub users: MemoryUserDirectory,
    pub complaints: MemoryComplaintStore,
    pub notifier: MockNotifier,
}

/// Parsed response: status, headers and JSON body (`Null` when empty).
pub struct TestResponse {
    pub status: StatusCode,
    pub headers: axum::http::HeaderMap,
    pub body: Value,
}

impl TestResponse {
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }

    /// `name=value` of the refresh cookie set by the response, if any.
    pub fn refresh_cookie(&self) -> Option<String> {
        self.headers
            .get_all(header::SET_COOKIE)
            .iter()
            .filter_map(|v| v.to_str().ok())
            .find(|c| c.starts_with("refreshToken="))
            .map(|c| c.split(';').next().unwrap_or_default().to_string())
    }
}

impl TestApp {
    pub async fn new() -> Self {
        Self::with_config(test_config()).await
    }

    pub async fn with_config(config: ServiceConfig) -> Self {
        let users = MemoryUserDirectory::new();
        let complaints = MemoryComplaintStore::new();
        let notifier = MockNotifier::new();

        let state = AppState::new(
            config,
            Arc::new(users.clone()),
            Arc::new(complaints.clone()),
            Arc::new(notifier.clone()),
            None,
        );
        let router = build_router(state).await.unwrap();

        Self {
            router,
            users,
            complaints,
            notifier,
        }
    }

    /// Insert an account directly, bypassing signup.
    pub async fn seed_user(
        &self,
        email: &str,
        role: UserRole,
        department: Option<Department>,
    ) -> User {
        let hash = hash_password(&Password::new(PASSWORD), &CHEAP).unwrap();
        let user = User::new(
            NewUser {
                first_name: "Test".to_string(),
                last_name: role.as_str().to_string(),
                email: email.to_string(),
                phone: "01700000000".to_string(),
                designation: None,
                department,
                post_code: "1207".to_string(),
                thana: "Dhanmondi".to_string(),
                district: "Dhaka".to_string(),
                division: "Dhaka".to_string(),
                address: "House 7, Road 3, Dhanmondi".to_string(),
                role,
                profile_img: None,
            },
            hash.into_string(),
        );
        self.users.insert(user).await.unwrap()
    }

    pub async fn request(
        &self,
        method: &str,
        uri: &str,
        token: Option<&str>,
        body: Option<Value>,
    ) -> TestResponse {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
        }
        let body = match body {
            Some(json) => {
                builder = builder.header(header::CONTENT_TYPE, "application/json");
                Body::from(json.to_string())
            }
            None => Body::empty(),
        };
        self.send(builder.body(body).unwrap()).await
    }

    pub async fn send(&self, request: Request<Body>) -> TestResponse {
        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let headers = response.headers().clone();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let body = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or(Value::Null)
        };
        TestResponse {
            status,
            headers,
            body,
        }
    }

    pub async fn login_response(&self, email: &str, password: &str) -> TestResponse {
        self.request(
            "POST",
            "/api/v1/auth/login",
            None,
            Some(serde_json::json!({ "email": email, "password": password })),
        )
        .await
    }

    /// Access token for a seeded account.
    pub async fn login(&self, email: &str) -> String {
        let res = self.login_response(email, PASSWORD).await;
        assert_eq!(res.status, StatusCode::OK, "login failed: {}", res.body);
        res.body["data"]["accessToken"]
            .as_str()
            .unwrap()
            .to_string()
    }
}

pub fn complaint_body(title: &str, department: &str, visibility: &str) -> Value {
    serde_json::json!({
        "title": title,
        "description": "The drain on our road has been overflowing for a week",
        "category": "drainage",
        "postCode": "1207",
        "thana": "Dhanmondi",
        "district": "Dhaka",
        "division": "Dhaka",
        "address": "House 7, Road 3, Dhanmondi",
        "department": department,
        "visibility": visibility,
        "priority": "high"
    })
}

/// Pull the `token` query parameter out of a mailed reset link.
pub fn token_from_mail(html: &str) -> String {
    let start = html.find("token=").unwrap() + "token=".len();
    html[start..]
        .chars()
        .take_while(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'))
        .collect()
}
