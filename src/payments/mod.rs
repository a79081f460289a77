mod api;
mod poller;

pub use api::*;
pub use poller::*;
