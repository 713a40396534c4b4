//! Caller identity for Liveroom.
//!
//! Liveroom never issues credentials. A request arrives with an
//! `Authorization: Bearer <token>` header, the token is handed to an
//! [`Authenticator`], and whatever [`UserId`](liveroom_protocol::UserId) it
//! returns is trusted verbatim by the engine.
//!
//! ```text
//! "Bearer abc" ──bearer_token()──→ "abc" ──Authenticator──→ UserId
//! ```

mod auth;
mod error;
mod header;
mod table;

pub use auth::Authenticator;
pub use error::IdentityError;
pub use header::bearer_token;
pub use table::TokenTable;
