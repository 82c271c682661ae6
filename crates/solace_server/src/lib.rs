pub mod auth;
pub mod server;
pub mod types;

pub use auth::{IdentityResolver, TokenMap};
pub use server::SolaceServer;
pub use types::{ChatRequest, ErrorBody, InsightRequest, InsightResponse};
