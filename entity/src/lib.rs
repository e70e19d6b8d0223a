pub mod prelude;

pub mod email;
pub mod email_metadata;
pub mod task;
