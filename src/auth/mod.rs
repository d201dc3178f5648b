//! Authenticated identity: the session, the holder that owns it, and the
//! identity-provider seam that populates it.
//!
//! The OIDC redirect exchange lives behind [`IdentityProvider`]; this crate
//! only consumes the resulting session.

pub mod holder;
pub mod provider;
pub mod session;

pub use holder::{TokenHolder, spawn_expiry_watch};
pub use provider::{IdentityProvider, StaticTokenProvider};
pub use session::{AuthState, Session};
