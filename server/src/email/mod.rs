pub mod normalized_input;
pub mod redaction;
