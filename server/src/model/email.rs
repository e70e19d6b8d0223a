use std::collections::HashMap;

use sea_orm::sea_query::Expr;

use crate::db_core::prelude::*;
use crate::error::AppResult;

pub struct EmailCtrl;

impl EmailCtrl {
    pub async fn get_by_id(
        conn: &DatabaseConnection,
        id: &str,
    ) -> AppResult<Option<email::Model>> {
        let found = Email::find_by_id(id).one(conn).await?;
        Ok(found)
    }

    /// Fetch a batch preserving the requested order. Ids with no matching
    /// row are simply absent from the result.
    pub async fn get_many_by_ids(
        conn: &DatabaseConnection,
        ids: &[String],
    ) -> AppResult<Vec<email::Model>> {
        let found = Email::find()
            .filter(email::Column::Id.is_in(ids.to_vec()))
            .all(conn)
            .await?;

        let mut by_id: HashMap<String, email::Model> =
            found.into_iter().map(|m| (m.id.clone(), m)).collect();

        Ok(ids.iter().filter_map(|id| by_id.remove(id)).collect())
    }

    /// Emails awaiting operator review: fresh AI output, not yet confirmed.
    pub async fn get_pending_review(
        conn: &DatabaseConnection,
    ) -> AppResult<Vec<(email::Model, email_metadata::Model)>> {
        let rows = Email::find()
            .filter(email::Column::ProcessedAt.is_null())
            .find_also_related(EmailMetadata)
            .order_by_asc(email::Column::ReceivedAt)
            .all(conn)
            .await?;

        Ok(rows
            .into_iter()
            .filter_map(|(email, metadata)| metadata.map(|m| (email, m)))
            .collect())
    }

    pub async fn set_processed_at<C: ConnectionTrait>(
        conn: &C,
        id: &str,
        at: Option<DateTimeUtc>,
    ) -> Result<(), DbErr> {
        Email::update_many()
            .col_expr(email::Column::ProcessedAt, Expr::value(at))
            .filter(email::Column::Id.eq(id))
            .exec(conn)
            .await?;

        Ok(())
    }

    pub async fn set_approved_at<C: ConnectionTrait>(
        conn: &C,
        id: &str,
        at: Option<DateTimeUtc>,
    ) -> Result<(), DbErr> {
        Email::update_many()
            .col_expr(email::Column::ApprovedAt, Expr::value(at))
            .filter(email::Column::Id.eq(id))
            .exec(conn)
            .await?;

        Ok(())
    }

    /// A fresh analysis supersedes any prior rejection verdict.
    pub async fn clear_rejection<C: ConnectionTrait>(conn: &C, id: &str) -> Result<(), DbErr> {
        Email::update_many()
            .col_expr(
                email::Column::RejectionReason,
                Expr::value(None::<String>),
            )
            .filter(email::Column::Id.eq(id))
            .exec(conn)
            .await?;

        Ok(())
    }

    /// Record a rejection: reason set, snapshot frozen, `processed_at`
    /// returned to null so the email is eligible for reprocessing.
    pub async fn set_rejection<C: ConnectionTrait>(
        conn: &C,
        id: &str,
        reason: &str,
        snapshot: Json,
    ) -> Result<(), DbErr> {
        Email::update_many()
            .col_expr(
                email::Column::RejectionReason,
                Expr::value(Some(reason.to_string())),
            )
            .col_expr(
                email::Column::PreviousAiResult,
                Expr::value(Some(snapshot)),
            )
            .col_expr(
                email::Column::ProcessedAt,
                Expr::value(None::<DateTimeUtc>),
            )
            .filter(email::Column::Id.eq(id))
            .exec(conn)
            .await?;

        Ok(())
    }
}
