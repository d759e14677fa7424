use crate::database::{DatabaseError, DatabaseService};
use thiserror::Error;
use tracing::info;

/// Upper bound appended to a normalized phone number to turn the store's
/// inclusive range filter into a prefix scan. U+F8FF sorts above every
/// character that can appear in a phone number.
const PHONE_RANGE_SENTINEL: char = '\u{f8ff}';

#[derive(Error, Debug)]
pub enum VerificationError {
    #[error("Store error: {0}")]
    StoreError(#[from] DatabaseError),
}

/// The requesting chat user, as reported by the transport.
#[derive(Debug, Clone)]
pub struct TelegramIdentity {
    pub telegram_id: i64,
    pub username: Option<String>,
}

/// A shared contact card. `user_id` is only present when the contact is
/// linked to a telegram account.
#[derive(Debug, Clone)]
pub struct ContactPayload {
    pub phone_number: String,
    pub user_id: Option<i64>,
}

#[derive(Debug, PartialEq, Eq)]
pub enum CodeVerification {
    Verified,
    UnknownCode,
    IncompleteRecord,
    UnknownUser,
}

#[derive(Debug, PartialEq, Eq)]
pub enum ContactVerification {
    Verified { users: usize },
    NotOwnContact,
    MissingPhone,
    NoPendingVerification,
}

#[derive(Debug, PartialEq, Eq)]
pub enum VerificationStatus {
    Verified,
    NotVerified,
}

pub struct VerificationService {
    db: DatabaseService,
}

impl VerificationService {
    pub fn new(db: DatabaseService) -> Self {
        Self { db }
    }

    /// Redeem a single-use verification code for the requesting user.
    pub async fn verify_code(
        &self,
        code: &str,
        identity: &TelegramIdentity,
    ) -> Result<CodeVerification, VerificationError> {
        let Some(record) = self.db.get_verification(code).await? else {
            return Ok(CodeVerification::UnknownCode);
        };

        let Some(user_id) = record.user_id() else {
            return Ok(CodeVerification::IncompleteRecord);
        };

        if self.db.get_user(user_id).await?.is_none() {
            return Ok(CodeVerification::UnknownUser);
        }

        // Update before delete: a failed delete leaves the user verified and
        // the code still redeemable, which is the accepted degraded state.
        self.db
            .set_phone_verified(user_id, identity.telegram_id, identity.username.as_deref())
            .await?;
        self.db.delete_verification(code).await?;

        info!("User {} verified successfully via code", user_id);
        Ok(CodeVerification::Verified)
    }

    /// Match a shared contact card against pending verifications. Every
    /// pending record whose phone has the normalized number as a prefix is
    /// consumed in one pass.
    pub async fn verify_contact(
        &self,
        contact: &ContactPayload,
        identity: &TelegramIdentity,
    ) -> Result<ContactVerification, VerificationError> {
        // Reject forwarded contacts before touching the store. The check only
        // fires when the transport supplies an id with the contact.
        if let Some(owner_id) = contact.user_id {
            if owner_id != identity.telegram_id {
                return Ok(ContactVerification::NotOwnContact);
            }
        }

        if contact.phone_number.is_empty() {
            return Ok(ContactVerification::MissingPhone);
        }

        let normalized = normalize_phone(&contact.phone_number);
        let records = self
            .db
            .get_verifications_in_phone_range(normalized, &phone_range_end(normalized))
            .await?;

        let mut users = 0;
        for record in &records {
            let Some(user_id) = record.user_id() else {
                continue;
            };

            self.db
                .set_phone_verified(user_id, identity.telegram_id, identity.username.as_deref())
                .await?;
            self.db.delete_verification(&record.code).await?;

            users += 1;
            info!("User {} verified successfully via contact sharing", user_id);
        }

        if users > 0 {
            Ok(ContactVerification::Verified { users })
        } else {
            Ok(ContactVerification::NoPendingVerification)
        }
    }

    /// Whether any user record linked to this telegram id is phone-verified.
    pub async fn status(
        &self,
        identity: &TelegramIdentity,
    ) -> Result<VerificationStatus, VerificationError> {
        let users = self
            .db
            .get_users_by_telegram_id(identity.telegram_id)
            .await?;

        if users.iter().any(|user| user.phone_verified) {
            Ok(VerificationStatus::Verified)
        } else {
            Ok(VerificationStatus::NotVerified)
        }
    }
}

// A single leading '+' is stripped; no other canonicalization happens, so
// matching stays a literal string-prefix scan.
fn normalize_phone(phone: &str) -> &str {
    phone.strip_prefix('+').unwrap_or(phone)
}

fn phone_range_end(normalized: &str) -> String {
    format!("{}{}", normalized, PHONE_RANGE_SENTINEL)
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::Matcher;
    use postgrest::Postgrest;

    fn identity() -> TelegramIdentity {
        TelegramIdentity {
            telegram_id: 42,
            username: Some("tester".to_string()),
        }
    }

    fn service(server: &mockito::ServerGuard) -> VerificationService {
        VerificationService::new(DatabaseService {
            client: Postgrest::new(server.url()),
        })
    }

    #[test]
    fn test_normalize_phone() {
        assert_eq!(normalize_phone("+15551234567"), "15551234567");
        assert_eq!(normalize_phone("15551234567"), "15551234567");
        // Only one leading '+' is stripped
        assert_eq!(normalize_phone("++1555"), "+1555");
    }

    #[test]
    fn test_phone_range_end() {
        let end = phone_range_end("1555");
        assert_eq!(end, "1555\u{f8ff}");
        // Any phone with the normalized number as prefix sorts inside the range
        assert!("1555" < end.as_str());
        assert!("15551234567" < end.as_str());
        assert!("1556" > end.as_str());
    }

    #[tokio::test]
    async fn test_verify_code_unknown_code_performs_no_mutation() {
        let mut server = mockito::Server::new_async().await;
        let lookup = server
            .mock("GET", "/telegramVerifications")
            .match_query(Matcher::Any)
            .with_status(406)
            .create_async()
            .await;
        let update = server
            .mock("PATCH", "/users")
            .match_query(Matcher::Any)
            .expect(0)
            .create_async()
            .await;
        let delete = server
            .mock("DELETE", "/telegramVerifications")
            .match_query(Matcher::Any)
            .expect(0)
            .create_async()
            .await;

        let result = service(&server)
            .verify_code("NOPE", &identity())
            .await
            .unwrap();

        assert_eq!(result, CodeVerification::UnknownCode);
        lookup.assert_async().await;
        update.assert_async().await;
        delete.assert_async().await;
    }

    #[tokio::test]
    async fn test_verify_code_record_without_user_id() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/telegramVerifications")
            .match_query(Matcher::Any)
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"code": "ABC123", "userId": null, "phone": "15551234567"}"#)
            .create_async()
            .await;

        let result = service(&server)
            .verify_code("ABC123", &identity())
            .await
            .unwrap();

        assert_eq!(result, CodeVerification::IncompleteRecord);
    }

    #[tokio::test]
    async fn test_verify_code_unknown_user() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/telegramVerifications")
            .match_query(Matcher::Any)
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"code": "ABC123", "userId": "u1", "phone": null}"#)
            .create_async()
            .await;
        server
            .mock("GET", "/users")
            .match_query(Matcher::Any)
            .with_status(406)
            .create_async()
            .await;

        let result = service(&server)
            .verify_code("ABC123", &identity())
            .await
            .unwrap();

        assert_eq!(result, CodeVerification::UnknownUser);
    }

    #[tokio::test]
    async fn test_verify_code_success_consumes_code() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/telegramVerifications")
            .match_query(Matcher::Any)
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"code": "ABC123", "userId": "u1", "phone": "15551234567"}"#)
            .create_async()
            .await;
        server
            .mock("GET", "/users")
            .match_query(Matcher::Any)
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"id": "u1", "phoneVerified": false, "telegramUsername": null, "telegramId": null}"#)
            .create_async()
            .await;
        let update = server
            .mock("PATCH", "/users")
            .match_query(Matcher::Any)
            .match_body(Matcher::AllOf(vec![
                Matcher::Regex("phoneVerified".to_string()),
                Matcher::Regex("tester".to_string()),
            ]))
            .with_status(204)
            .expect(1)
            .create_async()
            .await;
        let delete = server
            .mock("DELETE", "/telegramVerifications")
            .match_query(Matcher::Any)
            .with_status(204)
            .expect(1)
            .create_async()
            .await;

        let result = service(&server)
            .verify_code("ABC123", &identity())
            .await
            .unwrap();

        assert_eq!(result, CodeVerification::Verified);
        update.assert_async().await;
        delete.assert_async().await;
    }

    #[tokio::test]
    async fn test_verify_contact_rejects_foreign_contact_before_store_access() {
        let mut server = mockito::Server::new_async().await;
        let any_get = server
            .mock("GET", Matcher::Any)
            .expect(0)
            .create_async()
            .await;

        let contact = ContactPayload {
            phone_number: "+15551234567".to_string(),
            user_id: Some(7),
        };
        let result = service(&server)
            .verify_contact(&contact, &identity())
            .await
            .unwrap();

        assert_eq!(result, ContactVerification::NotOwnContact);
        any_get.assert_async().await;
    }

    #[tokio::test]
    async fn test_verify_contact_missing_phone() {
        let server = mockito::Server::new_async().await;

        let contact = ContactPayload {
            phone_number: String::new(),
            user_id: Some(42),
        };
        let result = service(&server)
            .verify_contact(&contact, &identity())
            .await
            .unwrap();

        assert_eq!(result, ContactVerification::MissingPhone);
    }

    #[tokio::test]
    async fn test_verify_contact_no_pending_verification() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/telegramVerifications")
            .match_query(Matcher::Any)
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body("[]")
            .create_async()
            .await;
        let update = server
            .mock("PATCH", "/users")
            .match_query(Matcher::Any)
            .expect(0)
            .create_async()
            .await;

        let contact = ContactPayload {
            phone_number: "+19998887766".to_string(),
            user_id: None,
        };
        let result = service(&server)
            .verify_contact(&contact, &identity())
            .await
            .unwrap();

        assert_eq!(result, ContactVerification::NoPendingVerification);
        update.assert_async().await;
    }

    #[tokio::test]
    async fn test_verify_contact_consumes_every_matching_record() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/telegramVerifications")
            // The '+' is stripped and both range bounds go out as postgrest
            // filters. Matcher::UrlEncoded collapses duplicate query keys, so
            // match both `phone` params against the raw query string instead.
            .match_query(Matcher::AllOf(vec![
                Matcher::Regex("phone=gte\\.15551234567(&|$)".into()),
                Matcher::Regex("phone=lte\\.15551234567%EF%A3%BF".into()),
            ]))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(
                r#"[
                    {"code": "AAA", "userId": "u1", "phone": "15551234567"},
                    {"code": "BBB", "userId": "u2", "phone": "15551234567"}
                ]"#,
            )
            .create_async()
            .await;
        let update = server
            .mock("PATCH", "/users")
            .match_query(Matcher::Any)
            .with_status(204)
            .expect(2)
            .create_async()
            .await;
        let delete = server
            .mock("DELETE", "/telegramVerifications")
            .match_query(Matcher::Any)
            .with_status(204)
            .expect(2)
            .create_async()
            .await;

        let contact = ContactPayload {
            phone_number: "+15551234567".to_string(),
            user_id: Some(42),
        };
        let result = service(&server)
            .verify_contact(&contact, &identity())
            .await
            .unwrap();

        assert_eq!(result, ContactVerification::Verified { users: 2 });
        update.assert_async().await;
        delete.assert_async().await;
    }

    #[tokio::test]
    async fn test_verify_contact_skips_records_without_user_id() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/telegramVerifications")
            .match_query(Matcher::Any)
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"[{"code": "AAA", "userId": "", "phone": "15551234567"}]"#)
            .create_async()
            .await;
        let update = server
            .mock("PATCH", "/users")
            .match_query(Matcher::Any)
            .expect(0)
            .create_async()
            .await;

        let contact = ContactPayload {
            phone_number: "15551234567".to_string(),
            user_id: None,
        };
        let result = service(&server)
            .verify_contact(&contact, &identity())
            .await
            .unwrap();

        assert_eq!(result, ContactVerification::NoPendingVerification);
        update.assert_async().await;
    }

    #[tokio::test]
    async fn test_status_without_linked_user() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/users")
            .match_query(Matcher::Any)
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body("[]")
            .create_async()
            .await;

        let result = service(&server).status(&identity()).await.unwrap();

        assert_eq!(result, VerificationStatus::NotVerified);
    }

    #[tokio::test]
    async fn test_status_verified_user() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/users")
            .match_query(Matcher::Any)
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(
                r#"[
                    {"id": "u1", "phoneVerified": false, "telegramUsername": null, "telegramId": 42},
                    {"id": "u2", "phoneVerified": true, "telegramUsername": "tester", "telegramId": 42}
                ]"#,
            )
            .create_async()
            .await;

        let result = service(&server).status(&identity()).await.unwrap();

        assert_eq!(result, VerificationStatus::Verified);
    }

    #[tokio::test]
    async fn test_store_failure_surfaces_as_error() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/telegramVerifications")
            .match_query(Matcher::Any)
            .with_status(500)
            .with_body("Internal Server Error")
            .create_async()
            .await;

        let result = service(&server).verify_code("ABC123", &identity()).await;

        assert!(matches!(
            result,
            Err(VerificationError::StoreError(DatabaseError::QueryError(_)))
        ));
    }
}
