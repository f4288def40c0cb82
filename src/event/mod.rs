// Event distribution between the broker and connected clients
//
// This module provides the event types fanned out to room members and the
// router that delivers them to each client's event channel.

// Public API - what other modules can use
pub use events::RoomEvent;
pub use router::{BroadcastRouter, EventSink, InMemoryRouter};

// Internal modules
mod events;
mod router;
