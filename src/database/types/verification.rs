use serde::{Deserialize, Serialize};

/// A pending verification in the `telegramVerifications` table, keyed by the
/// single-use code handed out by the web flow.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct VerificationRecord {
    pub code: String,
    #[serde(rename = "userId")]
    pub user_id: Option<String>,
    pub phone: Option<String>,
}

impl VerificationRecord {
    // An empty userId is treated the same as a missing one.
    pub fn user_id(&self) -> Option<&str> {
        self.user_id.as_deref().filter(|id| !id.is_empty())
    }
}
