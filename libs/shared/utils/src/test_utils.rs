use std::sync::Arc;

use chrono::Utc;
use uuid::Uuid;

use shared_config::AppConfig;
use shared_models::auth::{Role, User};

use crate::jwt::issue_session_token;

pub struct TestConfig {
    pub session_secret: String,
    pub snapshot_path: std::path::PathBuf,
}

impl Default for TestConfig {
    fn default() -> Self {
        Self {
            session_secret: "test-secret-key-for-session-validation-must-be-long-enough"
                .to_string(),
            snapshot_path: std::env::temp_dir()
                .join(format!("clinic-test-{}.json", Uuid::new_v4())),
        }
    }
}

impl TestConfig {
    pub fn to_app_config(&self) -> AppConfig {
        AppConfig {
            bind_addr: "127.0.0.1:0".to_string(),
            snapshot_path: self.snapshot_path.clone(),
            session_secret: self.session_secret.clone(),
            session_ttl_hours: 1,
            seed_doctors: true,
        }
    }

    pub fn to_arc(&self) -> Arc<AppConfig> {
        Arc::new(self.to_app_config())
    }
}

pub struct TestUser {
    pub id: String,
    pub name: String,
    pub phone: String,
    pub role: Role,
}

impl TestUser {
    pub fn patient(phone: &str) -> Self {
        Self {
            id: format!("p-{}", Uuid::new_v4()),
            name: "Test Patient".to_string(),
            phone: phone.to_string(),
            role: Role::Patient,
        }
    }

    /// Doctor users share their id with the doctor record.
    pub fn doctor(doctor_id: &str, phone: &str) -> Self {
        Self {
            id: doctor_id.to_string(),
            name: format!("Dr. {}", doctor_id),
            phone: phone.to_string(),
            role: Role::Doctor,
        }
    }

    pub fn to_user(&self) -> User {
        User {
            id: self.id.clone(),
            name: self.name.clone(),
            phone: self.phone.clone(),
            role: self.role,
        }
    }

    pub fn bearer(&self, secret: &str) -> String {
        let (token, _) = issue_session_token(&self.to_user(), secret, Utc::now(), 1)
            .expect("test secret must not be empty");
        format!("Bearer {}", token)
    }
}
