use axum::{extract::State, response::Json};

use super::error::{Result as WebResult, WebError};
use crate::session::SessionDetails;
use crate::state::AppState;

pub async fn create_session_handler(
    State(app_state): State<AppState>,
) -> WebResult<Json<SessionDetails>> {
    tracing::info!("HTTP: Received create_session request");

    let details = app_state
        .session_manager
        .create_session()
        .await
        .map_err(|e| {
            tracing::error!("Failed to create session: {}", e);
            WebError::InternalServerError(e)
        })?;

    Ok(Json(details))
}
