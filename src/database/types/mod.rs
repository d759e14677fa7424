mod user;
mod verification;

pub use user::UserRecord;
pub use verification::VerificationRecord;
