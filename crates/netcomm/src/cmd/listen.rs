use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::sync::Arc;
use std::time::Duration;

use netcomm_peer::{bind_with_config, Connection, ConnectionEvent, Listener};
use netcomm_transport::Protocol;

use crate::cmd::{install_ctrlc_handler, ListenArgs, RunContext};
use crate::exit::{peer_error, CliResult, SUCCESS};
use crate::output::print_frame;

const POLL_INTERVAL: Duration = Duration::from_millis(100);

pub fn run(args: ListenArgs, ctx: &RunContext) -> CliResult<i32> {
    let running = Arc::new(AtomicBool::new(true));
    install_ctrlc_handler(running.clone())?;

    let (tx, rx) = mpsc::channel();

    if args.udp {
        let conn = bind_with_config(&args.addr, ctx.connection.clone())
            .map_err(|err| peer_error("bind failed", err))?;
        tracing::info!(local_addr = %conn.local_addr(), "listening on udp socket");
        forward_events(&conn, tx).map_err(|err| peer_error("receiver start failed", err))?;
        let code = print_events(&rx, Protocol::Udp, &args, ctx, &running);
        let _ = conn.close();
        return Ok(code);
    }

    let listener = Listener::bind(&args.addr)
        .map_err(|err| peer_error("bind failed", err))?
        .with_config(ctx.connection.clone());
    let handle = listener
        .spawn_accept_loop(move |conn| {
            if let Err(err) = forward_events(&conn, tx.clone()) {
                tracing::warn!(error = %err, "failed to start receiver");
            }
        })
        .map_err(|err| peer_error("accept loop failed", err))?;

    let code = print_events(&rx, Protocol::Tcp, &args, ctx, &running);
    handle.shutdown();
    Ok(code)
}

/// Start `conn`'s receive loop, forwarding every event into `tx`.
pub fn forward_events(
    conn: &Connection,
    tx: Sender<ConnectionEvent>,
) -> netcomm_peer::Result<()> {
    conn.spawn_receiver(move |event| {
        let _ = tx.send(event);
    })?;
    Ok(())
}

fn print_events(
    events: &Receiver<ConnectionEvent>,
    protocol: Protocol,
    args: &ListenArgs,
    ctx: &RunContext,
    running: &AtomicBool,
) -> i32 {
    let mut printed = 0usize;

    while running.load(Ordering::SeqCst) {
        let event = match events.recv_timeout(POLL_INTERVAL) {
            Ok(event) => event,
            Err(RecvTimeoutError::Timeout) => continue,
            Err(RecvTimeoutError::Disconnected) => break,
        };

        match event {
            ConnectionEvent::FrameReceived { frame, remote } => {
                print_frame(&frame, remote, protocol, ctx.format);
                printed = printed.saturating_add(1);
                if args.count.is_some_and(|count| printed >= count) {
                    break;
                }
            }
            ConnectionEvent::Interrupted { remote } => {
                tracing::warn!(?remote, "frame stalled");
            }
            ConnectionEvent::ParseError { error, remote } => {
                tracing::warn!(%error, ?remote, "stopped reading from peer after invalid frame");
            }
            ConnectionEvent::Closed { remote } => {
                tracing::debug!(?remote, "peer closed");
            }
        }
    }

    SUCCESS
}
