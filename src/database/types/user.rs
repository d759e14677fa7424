use serde::{Deserialize, Serialize};

/// A row in the `users` table. Created and owned by the web application;
/// this bot only flips the verification fields.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct UserRecord {
    pub id: String,
    #[serde(rename = "phoneVerified", default)]
    pub phone_verified: bool,
    #[serde(rename = "telegramUsername")]
    pub telegram_username: Option<String>,
    #[serde(rename = "telegramId")]
    pub telegram_id: Option<i64>,
}
