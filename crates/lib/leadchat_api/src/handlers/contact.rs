//! Contact intake handler.

use axum::Json;
use axum::extract::State;
use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use chrono::Utc;
use tracing::{error, warn};

use leadchat_core::lead::ContactLead;

use crate::AppState;
use crate::models::ContactResponse;

/// `POST /contact`: accept a lead from the inline contact form.
///
/// A body that is not JSON at all is a `500`. JSON of the wrong shape, or a
/// lead missing its name or a usable email, is a `400`. Both carry the
/// failure envelope.
pub async fn contact_handler(
    State(state): State<AppState>,
    payload: Result<Json<ContactLead>, JsonRejection>,
) -> (StatusCode, Json<ContactResponse>) {
    let lead = match payload {
        Ok(Json(lead)) => lead,
        Err(JsonRejection::JsonDataError(e)) => {
            warn!(error = %e.body_text(), "contact payload has the wrong shape");
            return failure(StatusCode::BAD_REQUEST);
        }
        Err(e) => {
            error!(error = %e.body_text(), "contact payload rejected");
            return failure(StatusCode::INTERNAL_SERVER_ERROR);
        }
    };

    if let Err(e) = lead.validate() {
        warn!(error = %e, "contact lead failed validation");
        return failure(StatusCode::BAD_REQUEST);
    }

    match state.leads.submit(&lead, Utc::now()).await {
        Ok(()) => (StatusCode::OK, Json(ContactResponse::success())),
        Err(e) => {
            error!(error = %e, "contact lead sink failed");
            failure(StatusCode::INTERNAL_SERVER_ERROR)
        }
    }
}

fn failure(status: StatusCode) -> (StatusCode, Json<ContactResponse>) {
    (status, Json(ContactResponse::failure()))
}
