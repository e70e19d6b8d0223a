use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use serde::{Deserialize, Serialize};

use crate::db_core::prelude::*;
use crate::error::{AppError, AppJsonResult, AppResult};
use crate::model::email::EmailCtrl;
use crate::model::email_metadata::EmailMetadataCtrl;
use crate::model::task::TaskCtrl;
use crate::pipeline::review::{self, review_state, ConfirmDecision, ReviewState};
use crate::ServerState;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EmailDetail {
    pub email: email::Model,
    pub metadata: Option<email_metadata::Model>,
    pub tasks: Vec<task::Model>,
    pub review_state: ReviewState,
}

pub async fn get_email(
    State(state): State<ServerState>,
    Path(id): Path<String>,
) -> AppJsonResult<EmailDetail> {
    let email = EmailCtrl::get_by_id(state.conn.as_ref(), &id)
        .await?
        .ok_or_else(|| AppError::NotFound("Email not found".to_string()))?;
    let metadata = EmailMetadataCtrl::get_by_email_id(state.conn.as_ref(), &id).await?;
    let tasks = TaskCtrl::get_by_email_id(state.conn.as_ref(), &id).await?;
    let review_state = review_state(&email, metadata.is_some());

    Ok(Json(EmailDetail {
        email,
        metadata,
        tasks,
        review_state,
    }))
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PendingEmail {
    pub email: email::Model,
    pub metadata: email_metadata::Model,
}

/// Emails whose analysis is awaiting operator confirmation, oldest first.
pub async fn get_pending(State(state): State<ServerState>) -> AppJsonResult<Vec<PendingEmail>> {
    let rows = EmailCtrl::get_pending_review(state.conn.as_ref()).await?;

    Ok(Json(
        rows.into_iter()
            .map(|(email, metadata)| PendingEmail { email, metadata })
            .collect(),
    ))
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfirmResponse {
    pub status: &'static str,
}

pub async fn confirm(
    State(state): State<ServerState>,
    Path(id): Path<String>,
) -> AppJsonResult<ConfirmResponse> {
    let decision = review::confirm_email(state.conn.as_ref(), &id).await?;
    let status = match decision {
        ConfirmDecision::Confirm => "confirmed",
        ConfirmDecision::AlreadyConfirmed => "alreadyConfirmed",
    };

    Ok(Json(ConfirmResponse { status }))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RejectBody {
    pub reason: String,
}

pub async fn reject(
    State(state): State<ServerState>,
    Path(id): Path<String>,
    Json(body): Json<RejectBody>,
) -> AppResult<StatusCode> {
    review::reject_email(state.conn.as_ref(), &id, &body.reason).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn approve(
    State(state): State<ServerState>,
    Path(id): Path<String>,
) -> AppResult<StatusCode> {
    review::approve_email(state.conn.as_ref(), &id).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn clear_approval(
    State(state): State<ServerState>,
    Path(id): Path<String>,
) -> AppResult<StatusCode> {
    review::clear_approval(state.conn.as_ref(), &id).await?;
    Ok(StatusCode::NO_CONTENT)
}
