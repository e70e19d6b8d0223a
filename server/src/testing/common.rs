use std::collections::VecDeque;
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{TimeZone, Utc};
use sea_orm::{DatabaseBackend, MockDatabase, MockExecResult};
use serde_json::json;

use crate::email::normalized_input::EmailInput;
use crate::error::AppResult;
use crate::prompt::gateway::{ChatCompleter, ChatCompletion};
use crate::prompt::PromptUsage;

pub fn mock_db() -> MockDatabase {
    MockDatabase::new(DatabaseBackend::Postgres)
}

pub fn exec_ok(rows_affected: u64) -> MockExecResult {
    MockExecResult {
        last_insert_id: 0,
        rows_affected,
    }
}

pub fn test_email(id: &str) -> entity::email::Model {
    let at = Utc.with_ymd_and_hms(2025, 3, 4, 9, 0, 0).unwrap();
    entity::email::Model {
        id: id.to_string(),
        sender_address: "sender@corp.example".to_string(),
        subject: "Revised quote needed".to_string(),
        body: "Could you send over the revised quote before Friday?".to_string(),
        received_at: at,
        processed_at: None,
        approved_at: None,
        rejection_reason: None,
        previous_ai_result: None,
        created_at: at,
    }
}

pub fn test_metadata(email_id: &str) -> entity::email_metadata::Model {
    let at = Utc.with_ymd_and_hms(2025, 3, 4, 9, 0, 0).unwrap();
    entity::email_metadata::Model {
        id: 1,
        email_id: email_id.to_string(),
        category: "client".to_string(),
        priority: "high".to_string(),
        summary: "Client asks for revised quote".to_string(),
        contact_name: "Dana Smith".to_string(),
        has_task: true,
        task_description: Some("Send the revised quote to Dana".to_string()),
        task_status: Some("todo".to_string()),
        updated_at: at,
    }
}

pub fn test_task(email_id: &str) -> entity::task::Model {
    let at = Utc.with_ymd_and_hms(2025, 3, 4, 9, 0, 0).unwrap();
    entity::task::Model {
        id: 1,
        email_id: email_id.to_string(),
        description: "Send the revised quote to Dana".to_string(),
        status: "todo".to_string(),
        due_date: None,
        tags: json!(["quote"]),
        participants: json!(["dana@client.example"]),
        created_at: at,
    }
}

pub fn completion(content: &str) -> ChatCompletion {
    ChatCompletion {
        content: content.to_string(),
        usage: PromptUsage {
            prompt_tokens: 100,
            completion_tokens: 50,
            total_tokens: 150,
        },
    }
}

pub fn one_input(id: &str) -> EmailInput {
    EmailInput {
        id: id.to_string(),
        sender_address: "sender@corp.example".to_string(),
        received_at: "2025-03-04T09:00:00Z".to_string(),
        subject: "Revised quote needed".to_string(),
        body: "Could you send over the revised quote before Friday?".to_string(),
    }
}

/// Chat double that records which model each call asked for and replays a
/// scripted sequence of responses.
pub struct ScriptedCompleter {
    calls: Mutex<Vec<String>>,
    responses: Mutex<VecDeque<AppResult<ChatCompletion>>>,
}

impl ScriptedCompleter {
    pub fn new(responses: Vec<AppResult<ChatCompletion>>) -> Self {
        Self {
            calls: Mutex::new(Vec::new()),
            responses: Mutex::new(responses.into()),
        }
    }

    pub fn models_called(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl ChatCompleter for ScriptedCompleter {
    async fn complete(&self, model: &str, _system: &str, _user: &str) -> AppResult<ChatCompletion> {
        self.calls.lock().unwrap().push(model.to_string());
        self.responses
            .lock()
            .unwrap()
            .pop_front()
            .expect("scripted completer ran out of responses")
    }
}
