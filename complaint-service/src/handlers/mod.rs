//! HTTP handlers: translate requests into service calls and wrap results in
//! the response envelope.

pub mod ai;
pub mod auth;
pub mod complaint;
pub mod user;
