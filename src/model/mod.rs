//! Pure data structures (DTOs) that travel between the relay's components.
//!
//! Everything here serializes to the JSON stored in the TTL store or sent over
//! the wire. None of it holds behavior beyond construction and conversion.

pub mod event;
pub mod identity;
pub mod record;
pub mod request;
pub mod result;
pub mod subscriber;

pub use event::*;
pub use identity::*;
pub use record::*;
pub use request::*;
pub use result::*;
pub use subscriber::*;
