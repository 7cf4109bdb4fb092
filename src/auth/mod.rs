//! UAA authentication for the Ops Manager API.
//!
//! - `credential`: credential variants, tokens and the opaque bearer handle
//! - `exchange`: password and client-credentials grants
//! - `provider`: token cache with single-flight acquisition

pub mod credential;
pub mod exchange;
pub mod provider;

pub use credential::{BearerToken, Credential, Token};
pub use exchange::{TokenExchange, UaaTokenExchange};
pub use provider::CredentialProvider;
