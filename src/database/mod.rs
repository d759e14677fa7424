pub mod errors;
pub mod services;
pub mod types;

pub use errors::DatabaseError;
pub use services::DatabaseService;
pub use types::{UserRecord, VerificationRecord};
