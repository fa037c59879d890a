pub mod endpoint;
pub mod error;
pub mod framed;
pub mod handshake;
pub mod packet;
pub mod relay;
pub mod server;

pub use error::{SpliceError, StartupError};
pub use server::{serve, ProxyOptions};
