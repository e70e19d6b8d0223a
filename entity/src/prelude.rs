pub use super::email::Entity as Email;
pub use super::email_metadata::Entity as EmailMetadata;
pub use super::task::Entity as Task;
