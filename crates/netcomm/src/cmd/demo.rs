use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, RecvTimeoutError};
use std::sync::Arc;
use std::time::{Duration, Instant};

use netcomm_frame::Value;
use netcomm_peer::{bind_with_config, connect_with_config, ConnectionEvent, Listener};
use netcomm_transport::Protocol;

use crate::cmd::listen::forward_events;
use crate::cmd::{install_ctrlc_handler, parse_duration, DemoArgs, RunContext};
use crate::exit::{peer_error, CliResult, SUCCESS};
use crate::output::print_frame;

const DEMO_COMMAND: i64 = 0x88;

fn demo_values() -> Vec<Value> {
    vec![
        Value::integer(-256),
        Value::Boolean(true),
        Value::text("Hello"),
        Value::float(-1.1),
        Value::bytes(vec![0x41, 0x42, 0x43]),
    ]
}

/// Loopback demo: a UDP socket that sends to itself and a TCP client that
/// talks to a listener on the same port, once per interval.
pub fn run(args: DemoArgs, ctx: &RunContext) -> CliResult<i32> {
    let interval = parse_duration(&args.interval)?;
    let running = Arc::new(AtomicBool::new(true));
    install_ctrlc_handler(running.clone())?;

    let addr = format!("{}:{}", args.host, args.port);
    let (tx, rx) = mpsc::channel();

    let udp = bind_with_config(&addr, ctx.connection.clone())
        .map_err(|err| peer_error("udp bind failed", err))?;
    let udp_addr = udp.local_addr();
    forward_events(&udp, tx.clone()).map_err(|err| peer_error("receiver start failed", err))?;

    let listener = Listener::bind(&addr)
        .map_err(|err| peer_error("tcp bind failed", err))?
        .with_config(ctx.connection.clone());
    let tcp_addr = listener.local_addr();
    let server_tx = tx.clone();
    let handle = listener
        .spawn_accept_loop(move |conn| {
            if let Err(err) = forward_events(&conn, server_tx.clone()) {
                tracing::warn!(error = %err, "failed to start receiver");
            }
        })
        .map_err(|err| peer_error("accept loop failed", err))?;
    drop(tx);

    let client = connect_with_config(&tcp_addr.to_string(), ctx.connection.clone())
        .map_err(|err| peer_error("tcp connect failed", err))?;
    tracing::info!(%udp_addr, %tcp_addr, "demo running");

    let values = demo_values();
    let mut rounds = 0usize;
    while running.load(Ordering::SeqCst) && !args.count.is_some_and(|count| rounds >= count) {
        udp.send_frame_to(DEMO_COMMAND, &values, udp_addr)
            .map_err(|err| peer_error("udp send failed", err))?;
        client
            .send_frame(DEMO_COMMAND, &values)
            .map_err(|err| peer_error("tcp send failed", err))?;
        rounds += 1;

        let deadline = Instant::now() + interval;
        let mut received = 0usize;
        while running.load(Ordering::SeqCst) {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                break;
            }
            let event = match rx.recv_timeout(remaining.min(Duration::from_millis(100))) {
                Ok(event) => event,
                Err(RecvTimeoutError::Timeout) => continue,
                Err(RecvTimeoutError::Disconnected) => break,
            };
            match event {
                ConnectionEvent::FrameReceived { frame, remote } => {
                    let protocol = match remote {
                        Some(remote) if remote == udp_addr => Protocol::Udp,
                        _ => Protocol::Tcp,
                    };
                    print_frame(&frame, remote, protocol, ctx.format);
                    received += 1;
                    // Last round: leave as soon as both frames are in.
                    if received == 2 && args.count == Some(rounds) {
                        break;
                    }
                }
                ConnectionEvent::Interrupted { remote } => {
                    tracing::warn!(?remote, "frame stalled");
                }
                ConnectionEvent::ParseError { error, remote } => {
                    tracing::warn!(%error, ?remote, "invalid frame");
                }
                ConnectionEvent::Closed { remote } => {
                    tracing::debug!(?remote, "peer closed");
                }
            }
        }
    }

    let _ = client.close();
    let _ = udp.close();
    handle.shutdown();
    Ok(SUCCESS)
}
