//! Minimal echo server: accepts one TCP peer and echoes its frames back.
//!
//! Run with:
//!   cargo run --example echo-server --features peer
//!
//! In another terminal:
//!   cargo run --features cli -- send 127.0.0.1:10001 \
//!     --arg int:-256 --arg str:Hello --wait --wait-timeout 3s

use netcomm::peer::{ConnectionEvent, Listener};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let listener = Listener::bind("127.0.0.1:10001")?;
    eprintln!("Listening on {}", listener.local_addr());

    let peer = listener.accept()?;
    eprintln!("Peer connected: {:?}", peer.peer_addr());

    let reply = peer.try_clone()?;
    peer.run_receiver(move |event| match event {
        ConnectionEvent::FrameReceived { frame, .. } => {
            eprintln!("Received {frame}");
            if let Err(e) = reply.send_frame(i64::from(frame.command), &frame.values) {
                eprintln!("Echo failed: {e}");
            }
        }
        ConnectionEvent::Interrupted { .. } => eprintln!("Frame stalled"),
        ConnectionEvent::ParseError { error, .. } => eprintln!("Invalid frame: {error}"),
        ConnectionEvent::Closed { .. } => eprintln!("Peer disconnected"),
    })?;

    Ok(())
}
