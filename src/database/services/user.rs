use super::super::types::UserRecord;
use super::DatabaseError;
use super::DatabaseService;

impl DatabaseService {
    // Fetch a user by application user id
    pub async fn get_user(&self, user_id: &str) -> Result<Option<UserRecord>, DatabaseError> {
        let response = self
            .client
            .from("users")
            .select("*")
            .eq("id", user_id)
            .single()
            .execute()
            .await
            .map_err(|e| DatabaseError::QueryError(e.to_string()))?;

        if response.status() == 406 {
            // No rows found
            return Ok(None);
        }

        let user: UserRecord = response
            .json()
            .await
            .map_err(|e| DatabaseError::QueryError(e.to_string()))?;

        Ok(Some(user))
    }

    // Mark the user's phone as verified and link the telegram identity
    pub async fn set_phone_verified(
        &self,
        user_id: &str,
        telegram_id: i64,
        telegram_username: Option<&str>,
    ) -> Result<(), DatabaseError> {
        let update_data = serde_json::json!({
            "phoneVerified": true,
            "telegramUsername": telegram_username,
            "telegramId": telegram_id
        });

        let response = self
            .client
            .from("users")
            .update(update_data.to_string())
            .eq("id", user_id)
            .execute()
            .await
            .map_err(|e| DatabaseError::QueryError(e.to_string()))?;

        if !response.status().is_success() {
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(DatabaseError::QueryError(format!(
                "Update failed with status: {}",
                error_text
            )));
        }

        Ok(())
    }

    // All users linked to a telegram id; the store gives no ordering guarantee
    pub async fn get_users_by_telegram_id(
        &self,
        telegram_id: i64,
    ) -> Result<Vec<UserRecord>, DatabaseError> {
        let response = self
            .client
            .from("users")
            .select("*")
            .eq("telegramId", telegram_id.to_string())
            .execute()
            .await
            .map_err(|e| DatabaseError::QueryError(e.to_string()))?;

        let users: Vec<UserRecord> = response
            .json()
            .await
            .map_err(|e| DatabaseError::QueryError(e.to_string()))?;

        Ok(users)
    }
}
