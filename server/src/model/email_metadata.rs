use chrono::Utc;

use crate::db_core::prelude::*;

/// Replacement field set for one email's metadata row. The legacy
/// `has_task`/`task_description`/`task_status` mirror is derived from the
/// fresh task list by the caller.
#[derive(Debug, Clone)]
pub struct MetadataFields {
    pub email_id: String,
    pub category: String,
    pub priority: String,
    pub summary: String,
    pub contact_name: String,
    pub has_task: bool,
    pub task_description: Option<String>,
    pub task_status: Option<String>,
}

pub struct EmailMetadataCtrl;

impl EmailMetadataCtrl {
    pub async fn get_by_email_id<C: ConnectionTrait>(
        conn: &C,
        email_id: &str,
    ) -> Result<Option<email_metadata::Model>, DbErr> {
        EmailMetadata::find()
            .filter(email_metadata::Column::EmailId.eq(email_id))
            .one(conn)
            .await
    }

    /// Insert-or-update keyed on `email_id`. Fields are replaced wholesale;
    /// re-running a batch never merges with a previous analysis.
    pub async fn upsert<C: ConnectionTrait>(
        conn: &C,
        fields: MetadataFields,
    ) -> Result<(), DbErr> {
        let active_model = email_metadata::ActiveModel {
            id: NotSet,
            email_id: Set(fields.email_id),
            category: Set(fields.category),
            priority: Set(fields.priority),
            summary: Set(fields.summary),
            contact_name: Set(fields.contact_name),
            has_task: Set(fields.has_task),
            task_description: Set(fields.task_description),
            task_status: Set(fields.task_status),
            updated_at: Set(Utc::now()),
        };

        EmailMetadata::insert(active_model)
            .on_conflict(
                OnConflict::column(email_metadata::Column::EmailId)
                    .update_columns([
                        email_metadata::Column::Category,
                        email_metadata::Column::Priority,
                        email_metadata::Column::Summary,
                        email_metadata::Column::ContactName,
                        email_metadata::Column::HasTask,
                        email_metadata::Column::TaskDescription,
                        email_metadata::Column::TaskStatus,
                        email_metadata::Column::UpdatedAt,
                    ])
                    .to_owned(),
            )
            .exec_without_returning(conn)
            .await?;

        Ok(())
    }

    pub async fn delete_by_email_id<C: ConnectionTrait>(
        conn: &C,
        email_id: &str,
    ) -> Result<u64, DbErr> {
        let result = EmailMetadata::delete_many()
            .filter(email_metadata::Column::EmailId.eq(email_id))
            .exec(conn)
            .await?;

        Ok(result.rows_affected)
    }
}
