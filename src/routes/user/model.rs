use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::models::{UserRecord, UserUpdate};

#[derive(Debug, Deserialize)]
pub struct CreateUserRequest {
    pub user_id: i64,
    pub username: String,
    pub email: String,
    #[serde(default)]
    pub phone: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateUserRequest {
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct HomeResponse {
    #[serde(rename = "Welcome")]
    pub welcome: &'static str,
}

impl CreateUserRequest {
    /// 返回第一条校验失败的原因
    pub fn validate(&self) -> Result<(), &'static str> {
        if self.user_id <= 0 {
            return Err("user_id must be a positive integer.");
        }
        validate_username(&self.username)?;
        validate_email(&self.email)?;
        Ok(())
    }

    pub fn into_record(self) -> UserRecord {
        UserRecord {
            user_id: self.user_id,
            username: self.username.trim().to_string(),
            email: self.email.trim().to_string(),
            phone: self.phone,
            created_at: Utc::now(),
        }
    }
}

impl UpdateUserRequest {
    pub fn validate(&self) -> Result<(), &'static str> {
        if let Some(username) = &self.username {
            validate_username(username)?;
        }
        if let Some(email) = &self.email {
            validate_email(email)?;
        }
        Ok(())
    }

    pub fn into_update(self) -> UserUpdate {
        UserUpdate {
            username: self.username.map(|s| s.trim().to_string()),
            email: self.email.map(|s| s.trim().to_string()),
            phone: self.phone,
        }
    }
}

fn validate_username(username: &str) -> Result<(), &'static str> {
    let len = username.trim().chars().count();
    if len == 0 || len > 64 {
        return Err("username must be between 1 and 64 characters.");
    }
    Ok(())
}

fn validate_email(email: &str) -> Result<(), &'static str> {
    match email.trim().split_once('@') {
        Some((local, domain)) if !local.is_empty() && domain.contains('.') => Ok(()),
        _ => Err("email is not a valid address."),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request() -> CreateUserRequest {
        CreateUserRequest {
            user_id: 42,
            username: " alice ".into(),
            email: "alice@example.com".into(),
            phone: None,
        }
    }

    #[test]
    fn create_request_validation() {
        assert!(request().validate().is_ok());

        let mut bad = request();
        bad.user_id = 0;
        assert!(bad.validate().is_err());

        let mut bad = request();
        bad.email = "alice.example.com".into();
        assert!(bad.validate().is_err());

        let mut bad = request();
        bad.username = "   ".into();
        assert!(bad.validate().is_err());
    }

    #[test]
    fn into_record_trims_fields() {
        let record = request().into_record();
        assert_eq!(record.user_id, 42);
        assert_eq!(record.username, "alice");
    }
}
