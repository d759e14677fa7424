use crate::communication::telegram::Response;
use crate::verification::VerificationError;

pub fn map_verification_error_to_user_message(error: &VerificationError) -> String {
    match error {
        VerificationError::StoreError(_) => {
            "An error occurred during verification. Please try again.".to_string()
        }
    }
}

pub fn create_error_response(error: &VerificationError) -> Response {
    Response {
        text: map_verification_error_to_user_message(error),
        request_contact: false,
    }
}
