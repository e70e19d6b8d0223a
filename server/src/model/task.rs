use chrono::Utc;
use serde_json::json;

use crate::db_core::prelude::*;
use crate::prompt::{TaskDraft, TaskStatus};

pub struct TaskCtrl;

impl TaskCtrl {
    pub async fn get_by_email_id<C: ConnectionTrait>(
        conn: &C,
        email_id: &str,
    ) -> Result<Vec<task::Model>, DbErr> {
        Task::find()
            .filter(task::Column::EmailId.eq(email_id))
            .order_by_asc(task::Column::Id)
            .all(conn)
            .await
    }

    pub async fn delete_by_email_id<C: ConnectionTrait>(
        conn: &C,
        email_id: &str,
    ) -> Result<u64, DbErr> {
        let result = Task::delete_many()
            .filter(task::Column::EmailId.eq(email_id))
            .exec(conn)
            .await?;

        Ok(result.rows_affected)
    }

    /// Insert a fresh task set. Callers delete the previous set first; task
    /// lists are replaced together, never patched.
    pub async fn insert_many<C: ConnectionTrait>(
        conn: &C,
        email_id: &str,
        drafts: &[TaskDraft],
    ) -> Result<(), DbErr> {
        if drafts.is_empty() {
            return Ok(());
        }

        let now = Utc::now();
        let rows = drafts.iter().map(|draft| task::ActiveModel {
            id: NotSet,
            email_id: Set(email_id.to_string()),
            description: Set(draft.description.clone()),
            status: Set(TaskStatus::Todo.to_string()),
            due_date: Set(draft.due_date),
            tags: Set(json!(draft.tags)),
            participants: Set(json!(draft.participants)),
            created_at: Set(now),
        });

        Task::insert_many(rows).exec_without_returning(conn).await?;

        Ok(())
    }
}
