//! Common test utilities and helpers
//!
//! - Application fixtures over the in-memory store
//! - User creation with hashed passwords
//! - Hub receive helpers with a timeout

#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use axum_test::TestServer;
use chrono::Utc;
use inventory_ws::backend::auth::hash_password;
use inventory_ws::backend::realtime::ClientChannel;
use inventory_ws::backend::server::{create_app_with_stores, App};
use inventory_ws::backend::store::{MemoryStore, UserStore};
use inventory_ws::shared::models::{privileges, NewUser, User};
use inventory_ws::shared::{AppConfig, RealtimeEvent};
use serde_json::json;

pub const PASSWORD: &str = "password123";

pub fn test_config() -> AppConfig {
    AppConfig::builder()
        .jwt_secret("integration-test-secret")
        .utc_offset_minutes(0)
        .build()
        .unwrap()
}

/// An application over a fresh in-memory store
pub struct TestApp {
    pub app: App,
    pub store: MemoryStore,
}

impl TestApp {
    pub async fn new() -> Self {
        Self::with_config(test_config()).await
    }

    pub async fn with_config(config: AppConfig) -> Self {
        let store = MemoryStore::new();
        let app = create_app_with_stores(
            config,
            Arc::new(store.clone()),
            Arc::new(store.clone()),
            Arc::new(store.clone()),
        )
        .await
        .unwrap();
        Self { app, store }
    }

    pub fn server(&self) -> TestServer {
        TestServer::new(self.app.router.clone()).unwrap()
    }

    pub async fn admin(&self, name: &str) -> User {
        create_user(&self.store, name, &privileges::ALL).await
    }

    pub async fn staff(&self, name: &str) -> User {
        create_user(&self.store, name, &[privileges::TRANSACTION_VIEW]).await
    }
}

pub async fn create_user(store: &MemoryStore, name: &str, codes: &[&str]) -> User {
    store
        .insert_user(
            NewUser {
                email: email_for(name),
                password_hash: hash_password(PASSWORD).unwrap(),
                full_name: name.to_string(),
                role_code: None,
                is_active: true,
                privileges: codes.iter().map(|c| c.to_string()).collect(),
            },
            Utc::now(),
        )
        .await
        .unwrap()
}

pub fn email_for(name: &str) -> String {
    format!("{}@example.com", name.to_lowercase())
}

/// Log in through the API and return the bearer token
pub async fn login(server: &TestServer, user: &User) -> String {
    let response = server
        .post("/api/v1/auth/login")
        .json(&json!({ "email": user.email, "password": PASSWORD }))
        .await;
    response.assert_status_ok();
    let body: serde_json::Value = response.json();
    body["token"].as_str().unwrap().to_string()
}

/// Next event on a hub connection, failing the test after one second
pub async fn next_event(client: &mut ClientChannel) -> RealtimeEvent {
    let text = tokio::time::timeout(Duration::from_secs(1), client.outbound.recv())
        .await
        .expect("timed out waiting for hub event")
        .expect("hub closed the connection");
    serde_json::from_str(&text).unwrap()
}

/// Assert nothing arrives on a hub connection for a short while
pub async fn assert_silent(client: &mut ClientChannel) {
    let received = tokio::time::timeout(Duration::from_millis(100), client.outbound.recv()).await;
    assert!(received.is_err(), "unexpected hub event: {:?}", received);
}
