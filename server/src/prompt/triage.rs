use indoc::{formatdoc, indoc};

use crate::email::normalized_input::EmailInput;

/// Bumped whenever the instruction text or output contract changes, so a
/// stored result can be traced back to the prompt that produced it.
pub const PROMPT_VERSION: &str = "triage-v1";

const DECISION_CRITERIA: &str = indoc! {r#"
    Categories (authoritative):
    - "client": correspondence from an existing client about ongoing work.
    - "lead": a prospective customer inquiring about products or services.
    - "internal": communication between colleagues. If the sender's domain
      matches the recipient organization's domain, choose "internal" over
      any other category.
    - "spam": unsolicited bulk or promotional content. When torn between
      "lead" and "spam", unsolicited mass mail is "spam".

    Priorities:
    - "high": urgency language (urgent, asap, immediately) or a deadline
      within 48 hours of the received date.
    - "medium": a concrete request without a pressing deadline.
    - "low": informational, no action requested."#
};

const OUTPUT_CONTRACT: &str = indoc! {r#"
    For every email return one object:
    {"email_id": string, "category": string, "priority": string,
     "summary": string (one line, 5-100 characters),
     "contact_name": string (2-80 characters),
     "tasks": [{"description": string (10-150 characters),
                "due_date": ISO-8601 UTC datetime string or null,
                "tags": up to 3 short lowercase slugs,
                "participants": email addresses, always including the sender}]}"#
};

const WORKED_EXAMPLE: &str = indoc! {r#"
    Example input:
    {"id":"eml_1","sender_address":"anna@acme.com","received_at":"2025-03-04T09:00:00Z","subject":"Invoice overdue - need this resolved ASAP","body":"Hi, invoice #1042 is overdue. Please send the corrected invoice by tomorrow morning."}

    Example output:
    [{"email_id":"eml_1","category":"client","priority":"high","summary":"Client requests corrected invoice #1042 by tomorrow morning","contact_name":"Anna","tasks":[{"description":"Send corrected invoice #1042 to Anna at Acme","due_date":"2025-03-05T09:00:00Z","tags":["invoice","billing"],"participants":["anna@acme.com"]}]}]"#
};

pub fn system_prompt() -> String {
    formatdoc! {r#"
        You are an email triage engine for a small-business inbox.
        Your task is to classify each email in the given batch and extract
        actionable structured data for review by a human operator.

        Instructions:
        - Read each email carefully (sender, subject, body, received date).
        - Judge the sender's intent, not the recipient's reaction.
        - Echo each email's "id" back as "email_id", byte for byte. Never
          invent, alter, or drop an id: it is the join key for your answer.

        {criteria}

        {contract}

        {example}

        Constraints:
        - Respond with a single JSON array and nothing else. No prose, no
          markdown fences.
        - Keep the array in the same order as the input batch.
        - All datetimes must be UTC with an explicit "Z" designator.
        - Prompt version: {version}."#,
        criteria = DECISION_CRITERIA,
        contract = OUTPUT_CONTRACT,
        example = WORKED_EXAMPLE,
        version = PROMPT_VERSION,
    }
}

/// Serialize the batch for the user message. Pure: the same ordered batch
/// always yields byte-identical text.
pub fn batch_user_prompt(inputs: &[EmailInput]) -> String {
    let serialized = inputs
        .iter()
        .map(|input| serde_json::to_string(input).expect("EmailInput serializes"))
        .collect::<Vec<_>>()
        .join("\n");

    formatdoc! {r#"
        Analyze the following batch of {count} emails. Respond with a JSON array
        of exactly {count} elements, one per input line, in the same order.

        {serialized}"#,
        count = inputs.len(),
        serialized = serialized,
    }
}

/// Full prompt text, for audit logs and caching keys.
pub fn build_prompt(inputs: &[EmailInput]) -> String {
    format!("{}\n\n{}", system_prompt(), batch_user_prompt(inputs))
}
