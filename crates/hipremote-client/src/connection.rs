use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use hipremote_transport::{RemoteStream, WorkerSocket};
use hipremote_wire::body::SmiInitRequest;
use hipremote_wire::{
    Flags, Message, MessageReader, MessageWriter, OpCode, WireBody, DEFAULT_MAX_PAYLOAD,
};
use tracing::{debug, info, warn};

use crate::config::ClientConfig;
use crate::error::{ClientError, Result};

/// How long [`Connection::disconnect`] waits for the shutdown ack.
const SHUTDOWN_ACK_TIMEOUT: Duration = Duration::from_secs(1);

/// First request sent on every fresh connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Handshake {
    /// `INIT`, for runtime sessions.
    Runtime,
    /// `SMI_INIT` with the given init flags, for telemetry sessions.
    Telemetry { init_flags: u64 },
}

struct Session {
    reader: MessageReader<RemoteStream>,
    writer: MessageWriter<RemoteStream>,
}

impl Session {
    fn open(config: &ClientConfig) -> Result<Self> {
        let stream = WorkerSocket::connect(&config.host, config.port, &config.connect_options())?;
        let reader_stream = stream.try_clone()?;
        Ok(Self {
            reader: MessageReader::new(reader_stream),
            writer: MessageWriter::new(stream),
        })
    }

    fn is_stale(&self) -> bool {
        self.writer.get_ref().is_stale()
    }

    fn exchange<B: WireBody>(
        &mut self,
        op: OpCode,
        request_id: u32,
        body: &B,
        inline: &[u8],
    ) -> Result<Message> {
        self.writer
            .send_request(op, request_id, Flags::NONE, body, inline)?;
        let response = self.reader.read_message()?;
        check_response(op, request_id, &response)?;
        Ok(response)
    }
}

struct State {
    session: Option<Session>,
    next_request_id: u32,
    last_status: i32,
    sessions_opened: u64,
}

impl State {
    fn next_request_id(&mut self) -> u32 {
        let id = self.next_request_id;
        self.next_request_id = self.next_request_id.wrapping_add(1).max(1);
        id
    }
}

/// One logical connection to a worker.
///
/// All requests are serialized behind a single lock: one request is in
/// flight at a time and its response is fully read before the next request
/// is written. Any transport or protocol failure discards the session; the
/// next request opens a new one and repeats the handshake.
pub struct Connection {
    config: ClientConfig,
    handshake: Handshake,
    state: Mutex<State>,
}

impl Connection {
    pub fn new(config: ClientConfig, handshake: Handshake) -> Self {
        Self {
            config,
            handshake,
            state: Mutex::new(State {
                session: None,
                next_request_id: 1,
                last_status: 0,
                sessions_opened: 0,
            }),
        }
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Connect and handshake unless a live session already exists.
    pub fn ensure_connected(&self) -> Result<()> {
        let mut state = self.lock();
        self.ensure_session(&mut state)
    }

    pub fn is_connected(&self) -> bool {
        self.lock().session.is_some()
    }

    /// Number of sessions opened so far, including the current one.
    pub fn sessions_opened(&self) -> u64 {
        self.lock().sessions_opened
    }

    /// Raw status of the most recent response.
    pub fn last_status(&self) -> i32 {
        self.lock().last_status
    }

    /// Send a request and wait for its response.
    ///
    /// The response's status is not interpreted here; a remote failure is
    /// still a successful exchange.
    pub fn request<B: WireBody>(&self, op: OpCode, body: &B, inline: &[u8]) -> Result<Message> {
        check_payload_size::<B>(op, inline)?;
        let mut state = self.lock();
        self.ensure_session(&mut state)?;
        let request_id = state.next_request_id();
        let session = live_session(&mut state)?;

        debug!(%op, request_id, inline = inline.len(), "request");
        let result = session.exchange(op, request_id, body, inline);
        self.settle(&mut state, result)
    }

    /// Send a request whose response carries inline data after a fixed body.
    ///
    /// Copies up to `out.len()` bytes of the inline tail into `out` and
    /// returns the response with the number of bytes copied. The whole
    /// response is consumed regardless, so a short buffer never leaves
    /// unread bytes on the stream.
    pub fn request_receive_data<B: WireBody>(
        &self,
        op: OpCode,
        body: &B,
        response_body_size: usize,
        out: &mut [u8],
    ) -> Result<(Message, usize)> {
        let response = self.request(op, body, &[])?;
        let start = (4 + response_body_size).min(response.payload.len());
        let data = &response.payload[start..];
        let copied = data.len().min(out.len());
        out[..copied].copy_from_slice(&data[..copied]);
        Ok((response, copied))
    }

    /// Send a request flagged `NO_REPLY` and return once it is written.
    ///
    /// Failures of the operation itself are reported by the worker at the
    /// next synchronizing call.
    pub fn send_no_reply<B: WireBody>(&self, op: OpCode, body: &B, inline: &[u8]) -> Result<()> {
        if !op.accepts_no_reply() {
            return Err(ClientError::InvalidArgument(format!(
                "{op} cannot be sent without a reply"
            )));
        }
        check_payload_size::<B>(op, inline)?;

        let mut state = self.lock();
        self.ensure_session(&mut state)?;
        let request_id = state.next_request_id();
        let session = live_session(&mut state)?;

        debug!(%op, request_id, inline = inline.len(), "request (no reply)");
        let result = session
            .writer
            .send_request(op, request_id, Flags::NO_REPLY, body, inline)
            .map_err(ClientError::from);
        if let Err(err) = &result {
            warn!(%op, error = %err, "send failed; dropping session");
            state.session = None;
        }
        result
    }

    /// Close the session, telling the worker first when possible.
    ///
    /// Best-effort: errors are logged and swallowed.
    pub fn disconnect(&self) {
        let mut state = self.lock();
        let Some(mut session) = state.session.take() else {
            return;
        };
        let request_id = state.next_request_id();

        let _ = session.reader.get_ref().set_read_timeout(Some(SHUTDOWN_ACK_TIMEOUT));
        match session.exchange(OpCode::Shutdown, request_id, &(), &[]) {
            Ok(_) => debug!("worker acknowledged shutdown"),
            Err(err) => debug!(error = %err, "shutdown not acknowledged"),
        }
        let _ = session.writer.get_ref().shutdown();
        info!(host = %self.config.host, port = self.config.port, "disconnected from worker");
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn ensure_session(&self, state: &mut State) -> Result<()> {
        if state.session.as_ref().is_some_and(Session::is_stale) {
            info!("worker closed the session; reconnecting");
            state.session = None;
        }

        if state.session.is_none() {
            let request_id = state.next_request_id();
            let session = self.open_session(request_id)?;
            state.sessions_opened += 1;
            state.session = Some(session);
        }
        Ok(())
    }

    fn open_session(&self, request_id: u32) -> Result<Session> {
        let mut session = Session::open(&self.config)?;
        let response = match self.handshake {
            Handshake::Runtime => session.exchange(OpCode::Init, request_id, &(), &[]),
            Handshake::Telemetry { init_flags } => session.exchange(
                OpCode::SmiInit,
                request_id,
                &SmiInitRequest { init_flags },
                &[],
            ),
        }
        .map_err(|err| ClientError::HandshakeFailed(err.to_string()))?;

        let status = response
            .raw_status()
            .map_err(|err| ClientError::HandshakeFailed(err.to_string()))?;
        if status != 0 {
            return Err(ClientError::HandshakeFailed(format!(
                "worker rejected session (status {status})"
            )));
        }

        info!(
            host = %self.config.host,
            port = self.config.port,
            handshake = ?self.handshake,
            "connected to worker"
        );
        Ok(session)
    }

    fn settle(&self, state: &mut State, result: Result<Message>) -> Result<Message> {
        match result {
            Ok(response) => {
                state.last_status = response.raw_status().unwrap_or(0);
                Ok(response)
            }
            Err(err) => {
                if err.is_connection_fatal() {
                    warn!(error = %err, "exchange failed; dropping session");
                    state.session = None;
                }
                Err(err)
            }
        }
    }
}

impl Drop for Connection {
    fn drop(&mut self) {
        self.disconnect();
    }
}

impl std::fmt::Debug for Connection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Connection")
            .field("host", &self.config.host)
            .field("port", &self.config.port)
            .field("handshake", &self.handshake)
            .field("connected", &self.is_connected())
            .finish()
    }
}

fn live_session(state: &mut State) -> Result<&mut Session> {
    state
        .session
        .as_mut()
        .ok_or_else(|| ClientError::HandshakeFailed("session unavailable".to_string()))
}

/// Reject a request the writer would refuse, before the session sees it.
fn check_payload_size<B: WireBody>(op: OpCode, inline: &[u8]) -> Result<()> {
    let size = B::SIZE + inline.len();
    if size > DEFAULT_MAX_PAYLOAD {
        return Err(ClientError::InvalidArgument(format!(
            "{op} payload of {size} bytes exceeds the {DEFAULT_MAX_PAYLOAD} byte limit"
        )));
    }
    Ok(())
}

fn check_response(op: OpCode, request_id: u32, response: &Message) -> Result<()> {
    if response.header.op_code != op.code() || !response.flags().contains(Flags::RESPONSE) {
        return Err(ClientError::UnexpectedResponse {
            sent: op,
            received: response.header.op_code,
        });
    }
    if response.header.request_id != request_id {
        debug!(
            sent = request_id,
            received = response.header.request_id,
            "response request id differs"
        );
    }
    Ok(())
}
