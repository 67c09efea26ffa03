//! Record delivery to the collector.
//!
//! [`DeliveryTask`] is a non-blocking state machine that drains the delivery
//! ring buffer one record at a time. Each record is POSTed over a stream
//! connection and the ring's read position only moves once the collector's
//! response settles the record: either the record is echoed back or the
//! collector answers `400 Bad Request`. Anything else closes the connection
//! and the same record is retried after a cool-down.
//!
//! ```text
//! Idle → Create → Connect → AddData → Write → Read → EvalResponse → Close → Idle
//!                              ↑                          │
//!                              └──── next record ─────────┘
//! ```
//!
//! `Close` is reachable from every state. The state machine never blocks: a
//! step that has to wait reports [`TaskStatus::Busy`] and is retried on the
//! next scheduler cycle, bounded by the max-state timer.

pub mod request;
pub mod transport;

use crate::clock::{Clock, SystemClock};
use crate::config::DeliveryConfig;
use crate::data::ring_buffer::RingBuffer;
use crate::data::PipelineBuffers;
use crate::error::{AppResult, GatewayError};
use crate::tasks::{Task, TaskStatus};
use request::ResponseCheck;
use std::fmt;
use std::io;
use std::time::{Duration, Instant};
use tracing::{debug, error, info, trace, warn};
use transport::{is_transient, Connection, Transport};

pub use transport::{TcpConnection, TcpTransport};

/// Protocol state of the delivery session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeliveryState {
    /// Waiting for a record.
    Idle,
    /// Opening a connection endpoint.
    Create,
    /// Connecting to the collector.
    Connect,
    /// Building the request for the oldest record.
    AddData,
    /// Sending the request.
    Write,
    /// Collecting the response.
    Read,
    /// Deciding what the response means for the record.
    EvalResponse,
    /// Releasing the connection.
    Close,
}

impl fmt::Display for DeliveryState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            DeliveryState::Idle => "idle",
            DeliveryState::Create => "create",
            DeliveryState::Connect => "connect",
            DeliveryState::AddData => "add_data",
            DeliveryState::Write => "write",
            DeliveryState::Read => "read",
            DeliveryState::EvalResponse => "eval_response",
            DeliveryState::Close => "close",
        };
        f.write_str(name)
    }
}

/// Result of one state handler.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Step {
    ChangedState,
    NoChange,
    Idle,
}

/// Running totals, mostly for logs and tests.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DeliveryStats {
    /// Records confirmed by an echo.
    pub delivered: u64,
    /// Records the collector rejected with `400 Bad Request`.
    pub rejected: u64,
    /// Exchanges that ended without settling the record.
    pub retried: u64,
    /// Times the max-state timer forced a close.
    pub timeouts: u64,
}

/// The delivery state machine as a scheduler task.
pub struct DeliveryTask<T: Transport, C = SystemClock> {
    transport: T,
    connection: Option<T::Connection>,
    clock: C,
    state: DeliveryState,

    host: String,
    path: String,
    record: Vec<u8>,
    request: Vec<u8>,
    response: Box<[u8]>,
    bytes_sent: usize,
    bytes_read: usize,
    prev_read_had_data: bool,

    max_state_time: Duration,
    retry_time: Duration,
    state_entered: Instant,
    retry_started: Option<Instant>,

    stats: DeliveryStats,
}

impl<T: Transport> DeliveryTask<T, SystemClock> {
    /// Create the task with the wall clock.
    pub fn new(transport: T, config: &DeliveryConfig) -> Self {
        Self::with_clock(transport, config, SystemClock)
    }
}

impl<T: Transport, C: Clock> DeliveryTask<T, C> {
    /// Create the task with an explicit clock.
    pub fn with_clock(transport: T, config: &DeliveryConfig, clock: C) -> Self {
        let now = clock.now();
        Self {
            transport,
            connection: None,
            clock,
            state: DeliveryState::Idle,
            host: config.host.clone(),
            path: config.path.clone(),
            record: Vec::with_capacity(config.record_size),
            request: Vec::new(),
            response: vec![0u8; config.response_capacity].into_boxed_slice(),
            bytes_sent: 0,
            bytes_read: 0,
            prev_read_had_data: false,
            max_state_time: config.max_state_time,
            retry_time: config.retry_time,
            state_entered: now,
            retry_started: None,
            stats: DeliveryStats::default(),
        }
    }

    /// Current protocol state.
    pub fn state(&self) -> DeliveryState {
        self.state
    }

    /// Running totals.
    pub fn stats(&self) -> DeliveryStats {
        self.stats
    }

    /// True while a connection endpoint is held.
    pub fn has_connection(&self) -> bool {
        self.connection.is_some()
    }

    /// True while the post-close cool-down is running.
    pub fn is_cooling_down(&self) -> bool {
        self.retry_started
            .is_some_and(|started| self.clock.now().saturating_duration_since(started) < self.retry_time)
    }

    fn step(&mut self, buffers: &mut PipelineBuffers) -> AppResult<TaskStatus> {
        if self.is_cooling_down() {
            return Ok(TaskStatus::Busy);
        }
        self.retry_started = None;

        let step = match self.state {
            DeliveryState::Idle => self.idle(&buffers.delivery),
            DeliveryState::Create => self.create(),
            DeliveryState::Connect => self.connect(),
            DeliveryState::AddData => self.add_data(&buffers.delivery),
            DeliveryState::Write => self.write(),
            DeliveryState::Read => self.read()?,
            DeliveryState::EvalResponse => self.evaluate(&mut buffers.delivery)?,
            DeliveryState::Close => self.close(),
        };

        match step {
            Step::ChangedState => {
                self.state_entered = self.clock.now();
                Ok(TaskStatus::Busy)
            }
            Step::NoChange => {
                let elapsed = self.clock.now().saturating_duration_since(self.state_entered);
                if elapsed > self.max_state_time {
                    warn!(
                        state = %self.state,
                        elapsed = ?elapsed,
                        "max time in state exceeded, closing connection"
                    );
                    self.stats.timeouts += 1;
                    self.transition(DeliveryState::Close);
                    self.state_entered = self.clock.now();
                }
                Ok(TaskStatus::Busy)
            }
            Step::Idle => {
                self.state_entered = self.clock.now();
                Ok(TaskStatus::Idle)
            }
        }
    }

    fn transition(&mut self, next: DeliveryState) -> Step {
        trace!(from = %self.state, to = %next, "delivery state change");
        self.state = next;
        Step::ChangedState
    }

    fn fail(&mut self, what: &str, err: &io::Error) -> Step {
        warn!(state = %self.state, error = %err, "{what}");
        self.transition(DeliveryState::Close)
    }

    fn idle(&mut self, delivery: &RingBuffer) -> Step {
        if delivery.is_empty() {
            Step::Idle
        } else {
            self.transition(DeliveryState::Create)
        }
    }

    fn create(&mut self) -> Step {
        match self.transport.open() {
            Ok(connection) => {
                self.connection = Some(connection);
                self.transition(DeliveryState::Connect)
            }
            Err(e) => self.fail("could not create connection", &e),
        }
    }

    fn connect(&mut self) -> Step {
        let result = match self.connection.as_mut() {
            Some(connection) => connection.connect(),
            None => Err(io::ErrorKind::NotConnected.into()),
        };

        match result {
            Ok(()) => {
                debug!(host = %self.host, "connected to collector");
                self.transition(DeliveryState::AddData)
            }
            Err(e) if is_transient(&e) => Step::NoChange,
            Err(e) => self.fail("connect failed", &e),
        }
    }

    fn add_data(&mut self, delivery: &RingBuffer) -> Step {
        self.bytes_sent = 0;
        self.bytes_read = 0;
        self.prev_read_had_data = false;
        self.response.fill(0);
        self.record.clear();

        match delivery.peek() {
            Some(record) => self.record.extend_from_slice(record),
            None => {
                warn!("delivery buffer emptied while preparing a request");
                return self.transition(DeliveryState::Close);
            }
        }

        self.request = request::format_request(&self.host, &self.path, &self.record);
        trace!(bytes = self.request.len(), "request prepared");
        self.transition(DeliveryState::Write)
    }

    fn write(&mut self) -> Step {
        let result = match self.connection.as_mut() {
            Some(connection) => connection.send(&self.request[self.bytes_sent..]),
            None => Err(io::ErrorKind::NotConnected.into()),
        };

        match result {
            Ok(0) => self.fail("write failed", &io::ErrorKind::WriteZero.into()),
            Ok(n) => {
                self.bytes_sent += n;
                if self.bytes_sent >= self.request.len() {
                    self.transition(DeliveryState::Read)
                } else {
                    Step::NoChange
                }
            }
            Err(e) if is_transient(&e) => Step::NoChange,
            Err(e) => self.fail("write failed", &e),
        }
    }

    fn read(&mut self) -> AppResult<Step> {
        let result = match self.connection.as_mut() {
            Some(connection) => connection.receive(&mut self.response[self.bytes_read..]),
            None => Err(io::ErrorKind::NotConnected.into()),
        };

        match result {
            Ok(0) if self.bytes_read > 0 => Ok(self.transition(DeliveryState::EvalResponse)),
            Ok(0) => {
                warn!("collector closed the connection without responding");
                Ok(self.transition(DeliveryState::Close))
            }
            Ok(n) => {
                self.bytes_read += n;
                self.prev_read_had_data = true;
                if self.bytes_read >= self.response.len() {
                    error!(
                        capacity = self.response.len(),
                        "response filled the whole response buffer"
                    );
                    return Err(GatewayError::ResponseTooLarge {
                        capacity: self.response.len(),
                    });
                }
                Ok(Step::NoChange)
            }
            Err(e) if is_transient(&e) => {
                if self.prev_read_had_data {
                    Ok(self.transition(DeliveryState::EvalResponse))
                } else {
                    Ok(Step::NoChange)
                }
            }
            Err(e) => Ok(self.fail("read failed", &e)),
        }
    }

    fn evaluate(&mut self, delivery: &mut RingBuffer) -> AppResult<Step> {
        let response = &self.response[..self.bytes_read];
        let check = ResponseCheck::inspect(response, &self.record);

        if check.ok {
            info!("Received response code 200, continue with next request");
        }

        if !check.resolves_record() {
            warn!(
                request = %String::from_utf8_lossy(&self.request),
                response = %String::from_utf8_lossy(response),
                "response did not confirm the record, retrying later"
            );
            self.stats.retried += 1;
            return Ok(self.transition(DeliveryState::Close));
        }

        if check.echoed {
            self.stats.delivered += 1;
        } else {
            warn!(
                request = %String::from_utf8_lossy(&self.request),
                response = %String::from_utf8_lossy(response),
                "collector rejected the record, skipping it"
            );
            self.stats.rejected += 1;
        }

        delivery.advance_read().map_err(|e| {
            error!(error = %e, "could not advance the delivery buffer");
            e
        })?;

        if delivery.is_empty() {
            Ok(self.transition(DeliveryState::Close))
        } else {
            Ok(self.transition(DeliveryState::AddData))
        }
    }

    fn close(&mut self) -> Step {
        match self.connection.take().map(|mut connection| connection.close()) {
            Some(Ok(())) => debug!("connection closed"),
            Some(Err(e)) if e.kind() == io::ErrorKind::NotConnected => {
                debug!("connection was never established")
            }
            Some(Err(e)) => warn!(error = %e, "close failed"),
            None => trace!("no connection to close"),
        }
        self.retry_started = Some(self.clock.now());
        self.transition(DeliveryState::Idle)
    }
}

impl<T: Transport, C: Clock> Task for DeliveryTask<T, C> {
    fn name(&self) -> &'static str {
        "delivery"
    }

    fn run(&mut self, buffers: &mut PipelineBuffers) -> TaskStatus {
        self.step(buffers).into()
    }
}
