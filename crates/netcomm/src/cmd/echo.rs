use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use netcomm_peer::{bind_with_config, Connection, ConnectionEvent, Listener, PeerError};

use crate::cmd::{install_ctrlc_handler, EchoArgs, RunContext};
use crate::exit::{peer_error, CliResult, SUCCESS};

const IDLE_POLL: Duration = Duration::from_millis(100);

pub fn run(args: EchoArgs, ctx: &RunContext) -> CliResult<i32> {
    let running = Arc::new(AtomicBool::new(true));
    install_ctrlc_handler(running.clone())?;

    if args.udp {
        let conn = bind_with_config(&args.addr, ctx.connection.clone())
            .map_err(|err| peer_error("bind failed", err))?;
        tracing::info!(local_addr = %conn.local_addr(), "echoing udp datagrams");
        start_echo(&conn).map_err(|err| peer_error("receiver start failed", err))?;
        wait_until_stopped(&running);
        let _ = conn.close();
        return Ok(SUCCESS);
    }

    let listener = Listener::bind(&args.addr)
        .map_err(|err| peer_error("bind failed", err))?
        .with_config(ctx.connection.clone());
    let handle = listener
        .spawn_accept_loop(|conn| {
            if let Err(err) = start_echo(&conn) {
                tracing::warn!(error = %err, "failed to start echo receiver");
            }
        })
        .map_err(|err| peer_error("accept loop failed", err))?;

    wait_until_stopped(&running);
    handle.shutdown();
    Ok(SUCCESS)
}

/// Reply to every received frame with an identical frame.
///
/// Datagram replies go to the sender of the frame; stream replies go back
/// over the same connection.
fn start_echo(conn: &Connection) -> Result<(), PeerError> {
    let reply = conn.try_clone()?;
    conn.spawn_receiver(move |event| match event {
        ConnectionEvent::FrameReceived { frame, remote } => {
            tracing::info!(
                command = frame.command,
                values = frame.values.len(),
                ?remote,
                "echoing frame"
            );
            let command = i64::from(frame.command);
            let sent = match (reply.peer_addr(), remote) {
                (None, Some(sender)) => reply.send_frame_to(command, &frame.values, sender),
                _ => reply.send_frame(command, &frame.values),
            };
            if let Err(err) = sent {
                tracing::warn!(error = %err, "echo send failed");
            }
        }
        ConnectionEvent::Interrupted { remote } => {
            tracing::warn!(?remote, "frame stalled");
        }
        ConnectionEvent::ParseError { error, remote } => {
            tracing::warn!(%error, ?remote, "closing peer after invalid frame");
            let _ = reply.close();
        }
        ConnectionEvent::Closed { remote } => {
            tracing::debug!(?remote, "peer closed");
        }
    })?;
    Ok(())
}

fn wait_until_stopped(running: &AtomicBool) {
    while running.load(Ordering::SeqCst) {
        thread::sleep(IDLE_POLL);
    }
}
