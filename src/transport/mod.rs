pub mod traits;
pub mod websocket;

#[cfg(test)]
pub mod memory;

pub use traits::{Frame, FrameStream, StreamConnector};
pub use websocket::{WsConnector, WsFrameStream};
