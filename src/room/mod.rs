// Public API - what other modules can use
pub use cleanup_task::{start_cleanup_task, CleanupConfig};
pub use code::{InvalidRoomCode, RoomCode};
pub use models::Room;
pub use registry::{
    Created, Departure, JoinOutcome, RegistryError, RegistrySettings, RoomRegistry,
};

// Internal modules
mod cleanup_task;
pub mod code;
pub mod models;
pub mod registry;
