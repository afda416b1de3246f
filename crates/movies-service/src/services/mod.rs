//! Service layer.
//!
//! - `token_service` - issue, validate and revoke scoped tokens
//! - `user_service` - registration, activation, login
//! - `grants` - permission lookups for the authorizer
//! - `mailer` - outbound mail collaborator

pub mod grants;
pub mod mailer;
pub mod token_service;
pub mod user_service;

pub use grants::{GrantSource, StoreGrantSource};
pub use mailer::{LogMailer, Mailer, MailerError, SmtpMailer};
