use std::collections::{HashMap, HashSet};

use sea_orm::DatabaseConnection;
use serde::Serialize;

use crate::db_core::{flatten_transaction_error, prelude::*};
use crate::email::normalized_input::EmailInput;
use crate::error::{AppError, AppResult};
use crate::model::email::EmailCtrl;
use crate::model::email_metadata::{EmailMetadataCtrl, MetadataFields};
use crate::model::task::TaskCtrl;
use crate::prompt::gateway::LlmGateway;
use crate::prompt::parse::{is_email_address, parse_and_validate, ParsedBatch};
use crate::prompt::{EmailAnalysis, TaskStatus};

/// Pseudo id for failures that concern the whole batch rather than one email.
pub const BATCH_ERROR_ID: &str = "(batch)";

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct BatchItemError {
    pub email_id: String,
    pub reason: String,
}

/// Wire-level result of one batch run. `processed` is a count; the ids that
/// made it through are listed separately under `processedIds`.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchOutcome {
    pub processed: usize,
    pub processed_ids: Vec<String>,
    pub errors: Vec<BatchItemError>,
    pub model_used: String,
}

/// Run a batch end to end: normalize, prompt, parse, then reconcile each
/// surviving analysis into the database. One email's failure never blocks
/// the rest of the batch.
pub async fn process_email_batch(
    conn: &DatabaseConnection,
    gateway: &LlmGateway,
    email_ids: &[String],
) -> AppResult<BatchOutcome> {
    if email_ids.is_empty() {
        return Err(AppError::BadRequest(
            "emailIds must not be empty".to_string(),
        ));
    }

    let emails = EmailCtrl::get_many_by_ids(conn, email_ids).await?;
    if emails.is_empty() {
        return Err(AppError::NotFound(
            "none of the requested emails exist".to_string(),
        ));
    }

    let found_ids: HashSet<&str> = emails.iter().map(|e| e.id.as_str()).collect();
    let missing_errors: Vec<BatchItemError> = email_ids
        .iter()
        .filter(|id| !found_ids.contains(id.as_str()))
        .map(|id| BatchItemError {
            email_id: id.clone(),
            reason: "email not found".to_string(),
        })
        .collect();

    let inputs: Vec<EmailInput> = emails.iter().map(EmailInput::from_model).collect();
    let completion = gateway.process_batch(&inputs).await?;
    let parsed = parse_and_validate(&completion.raw_text, inputs.len());

    let mut outcome = apply_analyses(conn, &emails, parsed).await;
    outcome.errors.extend(missing_errors);
    outcome.model_used = completion.model_used;

    Ok(outcome)
}

/// Reconcile validated analyses against the requested emails. Analyses for
/// ids outside the batch are reported and never persisted.
async fn apply_analyses(
    conn: &DatabaseConnection,
    emails: &[email::Model],
    parsed: ParsedBatch,
) -> BatchOutcome {
    let by_id: HashMap<&str, &email::Model> =
        emails.iter().map(|e| (e.id.as_str(), e)).collect();

    let mut errors = Vec::new();
    let mut invalid: HashMap<String, String> = HashMap::new();
    for issue in parsed.issues {
        match issue.email_id {
            Some(id) if by_id.contains_key(id.as_str()) => {
                invalid.entry(id).or_insert(issue.message);
            }
            _ => errors.push(BatchItemError {
                email_id: BATCH_ERROR_ID.to_string(),
                reason: issue.message,
            }),
        }
    }

    let mut analyses: HashMap<String, EmailAnalysis> = HashMap::new();
    for analysis in parsed.analyses {
        if !by_id.contains_key(analysis.email_id.as_str()) {
            errors.push(BatchItemError {
                email_id: analysis.email_id.clone(),
                reason: "analysis id is not part of the requested batch".to_string(),
            });
            continue;
        }
        analyses.insert(analysis.email_id.clone(), analysis);
    }

    let mut processed_ids = Vec::new();
    for email in emails {
        if let Some(message) = invalid.get(&email.id) {
            errors.push(BatchItemError {
                email_id: email.id.clone(),
                reason: format!("analysis failed validation: {}", message),
            });
            continue;
        }
        let Some(mut analysis) = analyses.remove(&email.id) else {
            errors.push(BatchItemError {
                email_id: email.id.clone(),
                reason: "model returned no analysis for this email".to_string(),
            });
            continue;
        };

        with_sender_participant(&mut analysis, &email.sender_address);

        match persist_analysis(conn, analysis).await {
            Ok(()) => processed_ids.push(email.id.clone()),
            Err(e) => {
                tracing::error!("Failed to persist analysis for {}: {}", email.id, e);
                errors.push(BatchItemError {
                    email_id: email.id.clone(),
                    reason: format!("failed to persist analysis: {}", e),
                });
            }
        }
    }

    BatchOutcome {
        processed: processed_ids.len(),
        processed_ids,
        errors,
        model_used: String::new(),
    }
}

/// The sender is always a participant of their own tasks. Keep them first so
/// clients can treat position zero as the owner.
fn with_sender_participant(analysis: &mut EmailAnalysis, sender_address: &str) {
    if !is_email_address(sender_address) {
        return;
    }
    for task in &mut analysis.tasks {
        let already_present = task
            .participants
            .iter()
            .any(|p| p.eq_ignore_ascii_case(sender_address));
        if !already_present {
            task.participants.insert(0, sender_address.to_string());
        }
    }
}

/// Write one analysis inside a transaction: metadata upsert with the legacy
/// single-task mirror, wholesale task replacement, rejection verdict cleared.
/// `processed_at` is untouched; confirmation is the operator's call.
async fn persist_analysis(conn: &DatabaseConnection, analysis: EmailAnalysis) -> Result<(), DbErr> {
    conn.transaction::<_, (), DbErr>(|txn| {
        Box::pin(async move {
            let email_id = analysis.email_id.clone();
            let has_task = !analysis.tasks.is_empty();

            EmailMetadataCtrl::upsert(
                txn,
                MetadataFields {
                    email_id: email_id.clone(),
                    category: analysis.category.to_string(),
                    priority: analysis.priority.to_string(),
                    summary: analysis.summary.clone(),
                    contact_name: analysis.contact_name.clone(),
                    has_task,
                    task_description: analysis.tasks.first().map(|t| t.description.clone()),
                    task_status: has_task.then(|| TaskStatus::Todo.to_string()),
                },
            )
            .await?;

            TaskCtrl::delete_by_email_id(txn, &email_id).await?;
            TaskCtrl::insert_many(txn, &email_id, &analysis.tasks).await?;
            EmailCtrl::clear_rejection(txn, &email_id).await?;

            Ok(())
        })
    })
    .await
    .map_err(flatten_transaction_error)
}
