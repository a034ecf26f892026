//! Session state and identity derivation for the console client.
//! Keep the public surface thin and split implementation across sub-modules.
//!
//! Claims are read from the bearer token WITHOUT signature verification. The
//! resolved role only drives client-side routing and menu visibility; the API
//! server remains responsible for authorizing every request.

mod store;
mod token_store;
mod claims;
mod role;

pub use store::{KeyValueStore, MemoryStore, FileStore};
pub use token_store::{TokenStore, Invalidation, KEY_TOKEN, KEY_USER_NAME, KEY_USER_ROLE};
pub use claims::{DecodedClaims, MalformedTokenError, decode, is_expired, now_ms};
pub use role::{ROLE_CLAIM_KEYS, RoleResolver, resolve_role};
