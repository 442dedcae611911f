//! Transport implementations
//!
//! Contains DatagramTransport and StreamTransport.

mod datagram;
mod stream;

pub use self::datagram::DatagramTransport;
pub use self::stream::StreamTransport;
