use chrono::Utc;
use sea_orm::DatabaseConnection;
use serde::Serialize;
use serde_json::json;

use crate::db_core::{flatten_transaction_error, prelude::*};
use crate::error::{AppError, AppResult};
use crate::model::email::EmailCtrl;
use crate::model::email_metadata::EmailMetadataCtrl;
use crate::model::task::TaskCtrl;

/// Operator-facing lifecycle of one email's AI output.
///
/// A rejection verdict wins over everything else, then confirmation, then
/// the presence of an unreviewed analysis.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum ReviewState {
    Unprocessed,
    PendingReview,
    Confirmed,
    Rejected,
}

pub fn review_state(email: &email::Model, has_metadata: bool) -> ReviewState {
    if email.rejection_reason.is_some() {
        return ReviewState::Rejected;
    }
    if email.processed_at.is_some() {
        return ReviewState::Confirmed;
    }
    if has_metadata {
        return ReviewState::PendingReview;
    }
    ReviewState::Unprocessed
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfirmDecision {
    AlreadyConfirmed,
    Confirm,
}

/// Confirming twice is a no-op, confirming nothing is an operator error.
pub fn decide_confirm(email: &email::Model, has_metadata: bool) -> AppResult<ConfirmDecision> {
    if email.processed_at.is_some() {
        return Ok(ConfirmDecision::AlreadyConfirmed);
    }
    if !has_metadata {
        return Err(AppError::PreconditionFailed(
            "email has no analysis to confirm".to_string(),
        ));
    }
    Ok(ConfirmDecision::Confirm)
}

pub fn decide_reject(email: &email::Model, has_metadata: bool, reason: &str) -> AppResult<()> {
    if reason.trim().is_empty() {
        return Err(AppError::PreconditionFailed(
            "rejection requires a non-empty reason".to_string(),
        ));
    }
    if !has_metadata {
        return Err(AppError::PreconditionFailed(
            "email has no analysis to reject".to_string(),
        ));
    }
    if email.approved_at.is_some() {
        return Err(AppError::PreconditionFailed(
            "approval must be cleared before rejecting".to_string(),
        ));
    }
    Ok(())
}

pub fn decide_approve(email: &email::Model) -> AppResult<()> {
    if email.processed_at.is_none() {
        return Err(AppError::PreconditionFailed(
            "only a confirmed email can be approved".to_string(),
        ));
    }
    if email.approved_at.is_some() {
        return Err(AppError::PreconditionFailed(
            "email is already approved".to_string(),
        ));
    }
    Ok(())
}

pub fn decide_clear_approval(email: &email::Model) -> AppResult<()> {
    if email.approved_at.is_none() {
        return Err(AppError::PreconditionFailed(
            "email has no approval to clear".to_string(),
        ));
    }
    Ok(())
}

/// Frozen copy of the AI output at rejection time, stored on the email row
/// so the discarded analysis stays auditable.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisSnapshot {
    pub category: String,
    pub priority: String,
    pub summary: String,
    pub contact_name: String,
    pub tasks: Vec<SnapshotTask>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SnapshotTask {
    pub description: String,
    pub status: String,
    pub due_date: Option<DateTimeUtc>,
    pub tags: Json,
    pub participants: Json,
}

pub fn snapshot_from_models(
    metadata: &email_metadata::Model,
    tasks: &[task::Model],
) -> AnalysisSnapshot {
    AnalysisSnapshot {
        category: metadata.category.clone(),
        priority: metadata.priority.clone(),
        summary: metadata.summary.clone(),
        contact_name: metadata.contact_name.clone(),
        tasks: tasks
            .iter()
            .map(|t| SnapshotTask {
                description: t.description.clone(),
                status: t.status.clone(),
                due_date: t.due_date,
                tags: t.tags.clone(),
                participants: t.participants.clone(),
            })
            .collect(),
    }
}

pub async fn confirm_email(conn: &DatabaseConnection, id: &str) -> AppResult<ConfirmDecision> {
    let email = EmailCtrl::get_by_id(conn, id)
        .await?
        .ok_or_else(|| AppError::NotFound("Email not found".to_string()))?;
    if email.processed_at.is_some() {
        return Ok(ConfirmDecision::AlreadyConfirmed);
    }

    let metadata = EmailMetadataCtrl::get_by_email_id(conn, id).await?;
    let decision = decide_confirm(&email, metadata.is_some())?;
    if decision == ConfirmDecision::Confirm {
        EmailCtrl::set_processed_at(conn, id, Some(Utc::now())).await?;
    }

    Ok(decision)
}

/// Reject the current analysis: freeze it into `previous_ai_result`, record
/// the reason, and remove the metadata and tasks so the email reads as
/// unprocessed again.
pub async fn reject_email(conn: &DatabaseConnection, id: &str, reason: &str) -> AppResult<()> {
    let email = EmailCtrl::get_by_id(conn, id)
        .await?
        .ok_or_else(|| AppError::NotFound("Email not found".to_string()))?;
    let Some(metadata) = EmailMetadataCtrl::get_by_email_id(conn, id).await? else {
        return Err(AppError::PreconditionFailed(
            "email has no analysis to reject".to_string(),
        ));
    };
    decide_reject(&email, true, reason)?;

    let tasks = TaskCtrl::get_by_email_id(conn, id).await?;
    if email.previous_ai_result.is_some() {
        tracing::info!("Rejection of {} supersedes an earlier snapshot", id);
    }
    let snapshot = json!(snapshot_from_models(&metadata, &tasks));

    let id_owned = id.to_string();
    let reason_owned = reason.to_string();
    conn.transaction::<_, (), DbErr>(|txn| {
        Box::pin(async move {
            EmailCtrl::set_rejection(txn, &id_owned, &reason_owned, snapshot).await?;
            TaskCtrl::delete_by_email_id(txn, &id_owned).await?;
            EmailMetadataCtrl::delete_by_email_id(txn, &id_owned).await?;
            Ok(())
        })
    })
    .await
    .map_err(flatten_transaction_error)?;

    Ok(())
}

pub async fn approve_email(conn: &DatabaseConnection, id: &str) -> AppResult<()> {
    let email = EmailCtrl::get_by_id(conn, id)
        .await?
        .ok_or_else(|| AppError::NotFound("Email not found".to_string()))?;
    decide_approve(&email)?;
    EmailCtrl::set_approved_at(conn, id, Some(Utc::now())).await?;
    Ok(())
}

pub async fn clear_approval(conn: &DatabaseConnection, id: &str) -> AppResult<()> {
    let email = EmailCtrl::get_by_id(conn, id)
        .await?
        .ok_or_else(|| AppError::NotFound("Email not found".to_string()))?;
    decide_clear_approval(&email)?;
    EmailCtrl::set_approved_at(conn, id, None).await?;
    Ok(())
}
