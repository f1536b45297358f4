//! Framed typed-value messaging over TCP and UDP.
//!
//! A frame carries a one-byte command and an ordered list of typed
//! arguments (integers, floats, booleans, text, byte arrays), wrapped in
//! control bytes with an XOR checksum. The same frame format travels over
//! TCP streams and UDP datagrams.
//!
//! # Crate Structure
//!
//! - [`transport`]: socket abstraction over TCP streams and UDP datagrams
//! - [`frame`]: wire codec and resumable frame parser
//! - [`peer`]: connections, receive loops, stall watchdog and listeners (behind `peer` feature)

/// Re-export transport types.
pub mod transport {
    pub use netcomm_transport::*;
}

/// Re-export frame types.
pub mod frame {
    pub use netcomm_frame::*;
}

/// Re-export peer types (requires `peer` feature).
#[cfg(feature = "peer")]
pub mod peer {
    pub use netcomm_peer::*;
}
