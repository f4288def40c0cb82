pub mod assertions;
pub mod setup;

// Re-export main utilities for use by test files
#[allow(unused_imports)]
pub use assertions::{expect_event, expect_no_event};
pub use setup::TestBroker;
