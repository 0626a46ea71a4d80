#[cfg(test)]
#[path = "fakes_test.rs"]
pub mod fakes;
mod session_controller;
mod sessions_poller;
mod stream_reducer;

pub use session_controller::*;
pub use sessions_poller::*;
pub use stream_reducer::*;
