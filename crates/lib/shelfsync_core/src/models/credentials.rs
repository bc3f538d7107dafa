//! Account credential models.

use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

/// Database row for `account_credentials`.
#[derive(Debug, Clone, PartialEq, Serialize, sqlx::FromRow)]
pub struct AccountCredential {
    pub id: Uuid,
    pub name: String,
    pub environment: String,
    #[serde(skip_serializing)]
    pub secret_encrypted: String,
    pub is_active: bool,
    pub seller_id: Option<String>,
    pub seller_name: Option<String>,
    pub trade_mark: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Fields supplied when registering an account.
#[derive(Debug, Clone)]
pub struct NewAccountCredential {
    pub name: String,
    pub environment: String,
    pub secret_encrypted: String,
    pub seller_id: Option<String>,
    pub seller_name: Option<String>,
    pub trade_mark: Option<String>,
}
