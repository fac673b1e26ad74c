//! msgpack-rpc transport over a blocking TCP stream.
//!
//! Request frame: `[0, msgid, method, [params...]]`.
//! Response frame: `[1, msgid, error, result]`.
//! Calls are strictly sequential; one request is in flight at a time.

use std::io::{BufReader, BufWriter, ErrorKind, Write};
use std::net::{TcpStream, ToSocketAddrs};
use std::time::Duration;

use airsim_core::error::{Result, SimError};
use rmpv::Value;
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::{debug, trace, warn};

const REQUEST: u8 = 0;
const RESPONSE: u64 = 1;

/// A connected msgpack-rpc session.
pub struct RpcTransport {
    reader: BufReader<TcpStream>,
    writer: BufWriter<TcpStream>,
    next_id: u32,
    rpc_timeout: Duration,
    closed: Option<String>,
}

impl RpcTransport {
    /// Open a TCP connection to `host:port`, giving up after `connect_timeout`.
    ///
    /// Every resolved address is tried in turn. Failure is reported as
    /// [`SimError::Connection`].
    pub fn connect(
        host: &str,
        port: u16,
        connect_timeout: Duration,
        rpc_timeout: Duration,
    ) -> Result<Self> {
        let unreachable = |detail: String| {
            SimError::Connection(format!(
                "could not reach the simulator at {}:{} within {}s ({}). \
                 Is AirSim running with the RPC server enabled?",
                host,
                port,
                connect_timeout.as_secs_f64(),
                detail
            ))
        };

        let addrs: Vec<_> = (host, port)
            .to_socket_addrs()
            .map_err(|e| unreachable(format!("address lookup failed: {}", e)))?
            .collect();

        let mut last_err = String::from("no addresses resolved");
        for addr in addrs {
            debug!(%addr, "connecting to simulator");
            match TcpStream::connect_timeout(&addr, connect_timeout) {
                Ok(stream) => return Self::from_stream(stream, rpc_timeout),
                Err(e) => last_err = e.to_string(),
            }
        }

        Err(unreachable(last_err))
    }

    /// Wrap an already-connected stream.
    pub fn from_stream(stream: TcpStream, rpc_timeout: Duration) -> Result<Self> {
        stream.set_nodelay(true)?;
        stream.set_read_timeout(Some(rpc_timeout))?;
        stream.set_write_timeout(Some(rpc_timeout))?;
        let reader = BufReader::new(stream.try_clone()?);
        let writer = BufWriter::new(stream);
        Ok(Self {
            reader,
            writer,
            next_id: 0,
            rpc_timeout,
            closed: None,
        })
    }

    /// Invoke `method` with positional `params` and decode the result as `R`.
    ///
    /// `params` must serialize to a msgpack array (a tuple or slice).
    ///
    /// A timeout, a dropped stream, or an unreadable response frame leaves the
    /// stream out of step with the request ids. The session is closed at that
    /// point: the failing call and every later one return
    /// [`SimError::Connection`].
    pub fn call<P, R>(&mut self, method: &str, params: &P) -> Result<R>
    where
        P: Serialize + ?Sized,
        R: DeserializeOwned,
    {
        if let Some(reason) = &self.closed {
            return Err(SimError::Connection(format!(
                "cannot call '{}': session closed after {}; reconnect to continue",
                method, reason
            )));
        }

        let id = self.next_id;
        self.next_id = self.next_id.wrapping_add(1);

        trace!(method, id, "rpc request");
        let mut request = Vec::new();
        rmp_serde::encode::write_named(&mut request, &(REQUEST, id, method, params))
            .map_err(|e| SimError::rpc(method, format!("failed to encode request: {}", e)))?;
        if let Err(e) = self
            .writer
            .write_all(&request)
            .and_then(|()| self.writer.flush())
        {
            return Err(self.io_failure(method, e));
        }

        let frame = match rmpv::decode::read_value(&mut self.reader) {
            Ok(frame) => frame,
            Err(
                rmpv::decode::Error::InvalidMarkerRead(io)
                | rmpv::decode::Error::InvalidDataRead(io),
            ) => return Err(self.io_failure(method, io)),
            Err(other) => {
                return Err(self.close(method, format!("malformed response ({})", other)));
            }
        };

        let result = match decode_response(method, id, frame) {
            Ok(result) => result,
            Err(SimError::Rpc { message, .. }) => return Err(self.close(method, message)),
            Err(e) => return Err(e),
        };
        rmpv::ext::from_value(result)
            .map_err(|e| SimError::rpc(method, format!("unexpected result shape: {}", e)))
    }

    /// `true` once a failure has desynchronised the stream.
    pub fn is_closed(&self) -> bool {
        self.closed.is_some()
    }

    fn io_failure(&mut self, method: &str, e: std::io::Error) -> SimError {
        let reason = match e.kind() {
            ErrorKind::WouldBlock | ErrorKind::TimedOut => {
                format!("no reply within {}s", self.rpc_timeout.as_secs_f64())
            }
            ErrorKind::UnexpectedEof | ErrorKind::ConnectionReset | ErrorKind::BrokenPipe => {
                "the simulator closed the connection".to_string()
            }
            _ => e.to_string(),
        };
        self.close(method, reason)
    }

    fn close(&mut self, method: &str, reason: String) -> SimError {
        warn!(method, %reason, "closing simulator session");
        let reason = format!("'{}' failed: {}", method, reason);
        let err = SimError::Connection(reason.clone());
        self.closed = Some(reason);
        err
    }
}

/// Validate a response frame and return its result payload.
///
/// Framing problems are [`SimError::Rpc`]; an error payload from the
/// simulator is [`SimError::Remote`].
fn decode_response(method: &str, expected_id: u32, frame: Value) -> Result<Value> {
    let Value::Array(mut parts) = frame else {
        return Err(SimError::rpc(method, "response is not an array"));
    };
    if parts.len() != 4 {
        return Err(SimError::rpc(
            method,
            format!("response has {} elements, expected 4", parts.len()),
        ));
    }

    let result = parts.pop().unwrap_or(Value::Nil);
    let error = parts.pop().unwrap_or(Value::Nil);

    if parts[0].as_u64() != Some(RESPONSE) {
        return Err(SimError::rpc(method, format!("unexpected message type {}", parts[0])));
    }
    if parts[1].as_u64() != Some(u64::from(expected_id)) {
        return Err(SimError::rpc(
            method,
            format!("response id {} does not match request id {}", parts[1], expected_id),
        ));
    }
    if !error.is_nil() {
        return Err(SimError::remote(method, error_message(&error)));
    }

    Ok(result)
}

/// Server errors arrive either as a bare string or wrapped in an array.
fn error_message(error: &Value) -> String {
    match error {
        Value::String(s) => s.as_str().unwrap_or("<non-utf8 error>").to_string(),
        Value::Array(items) => items
            .iter()
            .map(error_message)
            .collect::<Vec<_>>()
            .join(": "),
        other => other.to_string(),
    }
}
