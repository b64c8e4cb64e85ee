//! API handlers for the auth, session, and verification surface.

pub mod auth;
pub mod health;
pub mod me;
pub mod root;
