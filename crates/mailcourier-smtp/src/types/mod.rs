//! Core SMTP types.

mod extension;
mod reply;

pub use extension::{AuthMethod, Extension, ServerInfo};
pub use reply::{Reply, ReplyCode};
