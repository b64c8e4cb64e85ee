//! Session service and refresh-token store.

mod models;
mod repo;
mod service;

pub use models::{Principal, Role, TokenPair};
pub use service::{AuthError, SessionService};
