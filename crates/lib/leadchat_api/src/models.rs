//! Response bodies shared by the handlers.

use serde::Serialize;

/// Standard JSON error body.
#[derive(Debug, Clone, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub message: String,
}

/// `GET /health` reply.
#[derive(Debug, Clone, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
}

pub const CONTACT_SUCCESS_MESSAGE: &str = "Contact request submitted successfully";
pub const CONTACT_FAILURE_MESSAGE: &str = "Failed to submit contact request";

/// `POST /contact` reply envelope.
#[derive(Debug, Clone, Serialize)]
pub struct ContactResponse {
    pub success: bool,
    pub message: String,
}

impl ContactResponse {
    pub fn success() -> Self {
        Self {
            success: true,
            message: CONTACT_SUCCESS_MESSAGE.to_string(),
        }
    }

    pub fn failure() -> Self {
        Self {
            success: false,
            message: CONTACT_FAILURE_MESSAGE.to_string(),
        }
    }
}
