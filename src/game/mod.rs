//! Match simulation modules

pub mod bot;
pub mod combatant;
pub mod projectile;
pub mod session;
pub mod snapshot;
pub mod zone;

pub use combatant::{Combatant, Controller};
pub use session::{MatchOutcome, MatchSession};
