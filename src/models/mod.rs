mod payment;
mod signaling;

pub use payment::*;
pub use signaling::*;
