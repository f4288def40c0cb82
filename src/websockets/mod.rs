// Browser-facing websocket transport
//
// Bridges websocket frames onto broker sessions: inbound frames become
// requests, acknowledgements and room events flow back out as frames.

// Public API - what other modules can use
pub use handler::websocket_handler;
pub use messages::{Frame, FrameType};
pub use socket::{Connection, SocketError, SocketWrapper};

// Internal modules
mod handler;
mod messages;
mod socket;
