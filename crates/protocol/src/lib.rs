//! Wire protocol shared by the Harmony credential exchanger, the hub
//! session client and the hub simulator.

pub mod constants;
pub mod envelope;
pub mod messages;
pub mod types;

// Re-export primary types for convenience.
pub use constants::MessageType;
pub use envelope::{Message, ResponseStatus};
pub use types::{Activity, Configuration, ControlGroup, Device, Function, HubAddress};
