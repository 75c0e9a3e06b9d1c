//! Per-device session layer: identity resolution, the live match view, and
//! the local player's countdown loop.

/// Live match view bound to one local identity.
pub mod controller;
/// Cancellable once-per-second countdown task.
pub mod timer;

use crate::model::Identity;

pub use controller::ClientController;
pub use timer::{PlayerTimer, Tick, next_tick};

/// Supplies the current session's identity. Consumed at create/join time
/// only; the engine never caches or refreshes identities on its own.
pub trait IdentityProvider: Send + Sync {
    /// The signed-in identity, or `None` when there is no session.
    fn current_identity(&self) -> Option<Identity>;
}

/// Identity provider backed by a fixed identity, for tests and embedders that
/// resolve authentication elsewhere.
pub struct StaticIdentity(pub Identity);

impl IdentityProvider for StaticIdentity {
    fn current_identity(&self) -> Option<Identity> {
        Some(self.0.clone())
    }
}
