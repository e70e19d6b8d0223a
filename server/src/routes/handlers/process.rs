use axum::{extract::State, Json};
use serde::Deserialize;

use crate::error::{AppError, AppJsonResult};
use crate::pipeline::orchestrator::{process_email_batch, BatchOutcome};
use crate::server_config::cfg;
use crate::ServerState;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProcessBatchBody {
    pub email_ids: Vec<String>,
}

pub async fn process_batch(
    State(state): State<ServerState>,
    Json(body): Json<ProcessBatchBody>,
) -> AppJsonResult<BatchOutcome> {
    if body.email_ids.is_empty() {
        return Err(AppError::BadRequest("emailIds must not be empty".into()));
    }
    let max = cfg.settings.max_batch_size;
    if body.email_ids.len() > max {
        return Err(AppError::BadRequest(format!(
            "batch size {} exceeds the maximum of {}",
            body.email_ids.len(),
            max
        )));
    }

    let outcome = process_email_batch(state.conn.as_ref(), &state.gateway, &body.email_ids).await?;

    Ok(Json(outcome))
}
