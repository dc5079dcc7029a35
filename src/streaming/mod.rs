//! Response streaming
//!
//! Buffer pool plus the flush scheduler that relays backend bytes to the
//! client under backpressure.

pub mod pool;
pub mod relay;

pub use pool::{BufferPool, PooledBuffer};
pub use relay::{client_body, ClientSink, RelayConfig, RelayOutcome, RelayTermination, StreamRelay};
