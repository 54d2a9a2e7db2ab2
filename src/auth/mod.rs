//! Bearer token acquisition for outbound calls.

mod client_credentials;
mod token_cache;
mod traits;

pub use client_credentials::ClientCredentials;
pub use token_cache::{BearerToken, TokenCache};
pub use traits::{TokenSet, TokenSource};
