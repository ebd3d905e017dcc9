use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// 用户记录，同时也是缓存里保存的快照
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct UserRecord {
    pub user_id: i64,
    pub username: String,
    pub email: String,
    pub phone: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// 部分更新，None 表示保持原值
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UserUpdate {
    pub username: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
}

impl UserUpdate {
    pub fn is_empty(&self) -> bool {
        self.username.is_none() && self.email.is_none() && self.phone.is_none()
    }

    pub fn apply_to(&self, record: &mut UserRecord) {
        if let Some(username) = &self.username {
            record.username = username.clone();
        }
        if let Some(email) = &self.email {
            record.email = email.clone();
        }
        if let Some(phone) = &self.phone {
            record.phone = Some(phone.clone());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn apply_keeps_unset_fields() {
        let mut record = UserRecord {
            user_id: 7,
            username: "alice".into(),
            email: "alice@example.com".into(),
            phone: None,
            created_at: Utc::now(),
        };
        let update = UserUpdate {
            email: Some("alice@example.org".into()),
            ..Default::default()
        };
        assert!(!update.is_empty());

        update.apply_to(&mut record);
        assert_eq!(record.username, "alice");
        assert_eq!(record.email, "alice@example.org");
        assert_eq!(record.phone, None);
    }
}
