pub use error::{FrameError, ProtocolError};
pub use message::{Message, RoomRequest};

pub mod connection;
mod error;
mod message;
