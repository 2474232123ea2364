//! Wire protocol shared by the VAC client and the Host tool.
//!
//! Every frame is a JSON text frame tagged by a `command` field.

pub mod constants;
pub mod messages;
pub mod types;

pub use constants::PROTOCOL_VERSION;
pub use messages::{ClientFrame, Hello};
pub use types::{Edge, NavigatorSnapshot};
