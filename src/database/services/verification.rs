use super::super::types::VerificationRecord;
use super::DatabaseError;
use super::DatabaseService;

impl DatabaseService {
    // Look up a pending verification by its single-use code
    pub async fn get_verification(
        &self,
        code: &str,
    ) -> Result<Option<VerificationRecord>, DatabaseError> {
        let response = self
            .client
            .from("telegramVerifications")
            .select("*")
            .eq("code", code)
            .single()
            .execute()
            .await
            .map_err(|e| DatabaseError::QueryError(e.to_string()))?;

        if response.status() == 406 {
            // No rows found
            return Ok(None);
        }

        let record: VerificationRecord = response
            .json()
            .await
            .map_err(|e| DatabaseError::QueryError(e.to_string()))?;

        Ok(Some(record))
    }

    // Range scan on the phone column; both bounds inclusive
    pub async fn get_verifications_in_phone_range(
        &self,
        start: &str,
        end: &str,
    ) -> Result<Vec<VerificationRecord>, DatabaseError> {
        let response = self
            .client
            .from("telegramVerifications")
            .select("*")
            .gte("phone", start)
            .lte("phone", end)
            .execute()
            .await
            .map_err(|e| DatabaseError::QueryError(e.to_string()))?;

        let records: Vec<VerificationRecord> = response
            .json()
            .await
            .map_err(|e| DatabaseError::QueryError(e.to_string()))?;

        Ok(records)
    }

    // Delete a verification so its code cannot be redeemed twice
    pub async fn delete_verification(&self, code: &str) -> Result<(), DatabaseError> {
        let response = self
            .client
            .from("telegramVerifications")
            .delete()
            .eq("code", code)
            .execute()
            .await
            .map_err(|e| DatabaseError::QueryError(e.to_string()))?;

        if !response.status().is_success() {
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(DatabaseError::QueryError(format!(
                "Delete failed with status: {}",
                error_text
            )));
        }

        Ok(())
    }
}
