use std::net::{SocketAddr, ToSocketAddrs};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError};
use std::time::{Duration, Instant};

use bytes::BytesMut;
use netcomm_frame::Frame;
use netcomm_peer::{bind_with_config, connect_with_config, Connection, ConnectionEvent};

use crate::cmd::{parse_duration, RunContext, SendArgs};
use crate::exit::{
    frame_error, io_error, peer_error, CliError, CliResult, DATA_INVALID, FAILURE, SUCCESS,
    TIMEOUT, USAGE,
};
use crate::output::print_frame;

pub fn run(args: SendArgs, ctx: &RunContext) -> CliResult<i32> {
    let wait_timeout = parse_duration(&args.wait_timeout)?;

    // Encode first so a bad frame never opens a socket.
    let wire = encode_request(&args)?;

    let (conn, dest) = if args.udp {
        let dest = resolve(&args.addr)?;
        let local = if dest.is_ipv4() { "0.0.0.0:0" } else { "[::]:0" };
        let conn = bind_with_config(local, ctx.connection.clone())
            .map_err(|err| peer_error("bind failed", err))?;
        (conn, Some(dest))
    } else {
        let conn = connect_with_config(&args.addr, ctx.connection.clone())
            .map_err(|err| peer_error("connect failed", err))?;
        (conn, None)
    };

    let replies = if args.wait {
        Some(subscribe(&conn)?)
    } else {
        None
    };

    match dest {
        Some(dest) => conn.send_to(&wire, dest),
        None => conn.send(&wire),
    }
    .map_err(|err| peer_error("send failed", err))?;
    tracing::debug!(bytes = wire.len(), addr = %args.addr, "frame sent");

    if let Some(replies) = replies {
        let (frame, remote) = wait_for_reply(&replies, wait_timeout)?;
        print_frame(&frame, remote, conn.protocol(), ctx.format);
    }

    let _ = conn.close();
    Ok(SUCCESS)
}

fn encode_request(args: &SendArgs) -> CliResult<BytesMut> {
    let mut buf = BytesMut::new();
    netcomm_frame::encode_frame(args.command, &args.values, &mut buf)
        .map_err(|err| frame_error("invalid frame", err))?;
    Ok(buf)
}

fn resolve(addr: &str) -> CliResult<SocketAddr> {
    addr.to_socket_addrs()
        .map_err(|err| io_error(&format!("cannot resolve {addr}"), err))?
        .next()
        .ok_or_else(|| CliError::new(USAGE, format!("cannot resolve {addr}")))
}

fn subscribe(conn: &Connection) -> CliResult<Receiver<ConnectionEvent>> {
    let (tx, rx) = mpsc::channel();
    conn.spawn_receiver(move |event| {
        let _ = tx.send(event);
    })
    .map_err(|err| peer_error("receiver start failed", err))?;
    Ok(rx)
}

fn wait_for_reply(
    events: &Receiver<ConnectionEvent>,
    timeout: Duration,
) -> CliResult<(Frame, Option<SocketAddr>)> {
    let deadline = Instant::now() + timeout;
    loop {
        let remaining = deadline.saturating_duration_since(Instant::now());
        let event = match events.recv_timeout(remaining) {
            Ok(event) => event,
            Err(RecvTimeoutError::Timeout) => {
                return Err(CliError::new(
                    TIMEOUT,
                    format!("no reply within {timeout:?}"),
                ))
            }
            Err(RecvTimeoutError::Disconnected) => {
                return Err(CliError::new(FAILURE, "receiver stopped before a reply"))
            }
        };

        match event {
            ConnectionEvent::FrameReceived { frame, remote } => return Ok((frame, remote)),
            ConnectionEvent::Interrupted { remote } => {
                tracing::warn!(?remote, "reply stalled mid-frame, still waiting");
            }
            ConnectionEvent::ParseError { error, .. } => {
                return Err(CliError::new(
                    DATA_INVALID,
                    format!("invalid reply: {error}"),
                ))
            }
            ConnectionEvent::Closed { .. } => {
                return Err(CliError::new(
                    FAILURE,
                    "connection closed before a reply",
                ))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use netcomm_frame::{DecodeError, Value};

    use super::*;

    fn scripted(events: Vec<ConnectionEvent>) -> Receiver<ConnectionEvent> {
        let (tx, rx) = mpsc::channel();
        for event in events {
            tx.send(event).unwrap();
        }
        rx
    }

    #[test]
    fn wait_for_reply_skips_interrupted() {
        let frame = Frame::new(1, vec![Value::text("ok")]);
        let rx = scripted(vec![
            ConnectionEvent::Interrupted { remote: None },
            ConnectionEvent::FrameReceived {
                frame: frame.clone(),
                remote: None,
            },
        ]);
        let (reply, _) = wait_for_reply(&rx, Duration::from_secs(1)).unwrap();
        assert_eq!(reply, frame);
    }

    #[test]
    fn wait_for_reply_maps_terminal_events() {
        let rx = scripted(vec![ConnectionEvent::Closed { remote: None }]);
        assert_eq!(wait_for_reply(&rx, Duration::from_secs(1)).unwrap_err().code, FAILURE);

        let rx = scripted(vec![ConnectionEvent::ParseError {
            error: DecodeError::EmptyText,
            remote: None,
        }]);
        assert_eq!(
            wait_for_reply(&rx, Duration::from_secs(1)).unwrap_err().code,
            DATA_INVALID
        );
    }

    #[test]
    fn wait_for_reply_times_out() {
        let (_tx, rx) = mpsc::channel::<ConnectionEvent>();
        let err = wait_for_reply(&rx, Duration::from_millis(20)).unwrap_err();
        assert_eq!(err.code, TIMEOUT);
    }

    #[test]
    fn out_of_range_command_is_rejected_before_connecting() {
        let args = SendArgs {
            addr: "127.0.0.1:1".to_string(),
            udp: false,
            command: 256,
            values: Vec::new(),
            wait: false,
            wait_timeout: "1s".to_string(),
        };
        assert_eq!(encode_request(&args).unwrap_err().code, DATA_INVALID);
    }
}
