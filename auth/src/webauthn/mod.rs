//! `WebAuthn` / passkey ceremonies.
//!
//! - [`options`]: JSON payloads for `navigator.credentials.create()` / `.get()`
//! - [`relying_party`]: per-request RP id and origin derivation
//! - [`ceremony`]: the controller tying challenges, verification, counters,
//!   and credential persistence together

pub mod ceremony;
pub mod options;
pub mod relying_party;

pub use ceremony::{AuthenticatedCredential, CeremonyController, counter_advanced};
pub use options::{CeremonyOptions, CreationOptions, RequestOptions};
pub use relying_party::RelyingParty;
