//! Services layer for the complaint backend.
//!
//! Business logic for sessions, access control, users, complaints and AI
//! analysis, written against the store and notifier seams in `store` and
//! `email`.

pub mod ai;
mod auth;
mod complaint;
pub mod email;
pub mod error;
mod gate;
pub mod jwt;
pub mod query;
pub mod store;
mod user;

pub use ai::{AnalysisService, GeminiSummarizer, LocationFilter, Summarizer};
pub use auth::{AuthService, LoginOutcome, RefreshOutcome};
pub use complaint::{
    complaint_json, AdminDashboard, CitizenDashboard, ComplaintService, SuperAdminDashboard,
    COMPLAINT_SCHEMA,
};
pub use email::{EmailService, MockNotifier, Notifier};
pub use error::ServiceError;
pub use gate::{bearer_token, AccessGate};
pub use jwt::{IdentityClaims, JwtService, TokenCodec};
pub use query::{QueryResult, QuerySpec};
pub use store::{
    ComplaintStore, MemoryComplaintStore, MemoryUserDirectory, MongoComplaintStore, MongoDb,
    MongoUserDirectory, UserDirectory, UserPatch,
};
pub use user::{UserService, USER_SCHEMA};
