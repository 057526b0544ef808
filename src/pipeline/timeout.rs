//! Request-timeout stage (server only).
//!
//! Keeps the FIFO of in-flight exchanges: a request joins on its message
//! start and leaves when a response message start passes downward, which
//! pairs pipelined responses with requests in wire order. When the oldest
//! unanswered request outlives the configured timeout, a single
//! [`Event::RequestTimeout`] is emitted upward; the application is still
//! expected to answer it.
//!
//! The stage also terminates parse failures: the error is answered with a
//! rendered status response and the connection is closed, flushing first.

use crate::pipeline::{CloseReason, Command, Event, Stage, StageContext};
use crate::protocol::{MessageItem, ParseError, ResponseHead};
use bytes::Bytes;
use std::collections::VecDeque;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

struct InFlight {
    started_at: Instant,
    timed_out: bool,
}

pub struct RequestTimeoutStage {
    /// `None` disables the timeout; the exchange FIFO is still maintained
    timeout: Option<Duration>,
    in_flight: VecDeque<InFlight>,
}

impl RequestTimeoutStage {
    pub fn new(timeout: Option<Duration>) -> Self {
        Self { timeout, in_flight: VecDeque::new() }
    }

    fn check_expiry(&mut self, now: Instant, ctx: &mut StageContext<'_>) {
        let Some(timeout) = self.timeout else { return };
        if let Some(oldest) = self.in_flight.front_mut() {
            if !oldest.timed_out && now.duration_since(oldest.started_at) >= timeout {
                oldest.timed_out = true;
                warn!(?timeout, "request timed out before a response was dispatched");
                ctx.send_up(Event::RequestTimeout);
            }
        }
    }
}

impl Stage for RequestTimeoutStage {
    fn on_command(&mut self, command: Command, ctx: &mut StageContext<'_>) {
        if let Command::SendResponsePart(part) = &command {
            if part.is_message_start() {
                // response dispatched: the pending timer is cancelled
                self.in_flight.pop_front();
            }
        }
        ctx.send_down(command);
    }

    fn on_event(&mut self, event: Event, ctx: &mut StageContext<'_>) {
        match &event {
            Event::RequestPart(part) if part.is_message_start() => {
                self.in_flight.push_back(InFlight { started_at: Instant::now(), timed_out: false });
            }
            Event::Tick(now) => self.check_expiry(*now, ctx),
            Event::ParseFailed(error) => {
                debug!(%error, status = %error.status(), "answering parse failure and closing");
                ctx.send_down(Command::SendResponsePart(error_response(error)));
                ctx.send_down(Command::Close(CloseReason::ConfirmedClose));
            }
            _ => {}
        }
        ctx.send_up(event);
    }
}

/// The error response a terminal parse failure is answered with: the status
/// the error carries and its reason as a plain-text body.
fn error_response(error: &ParseError) -> MessageItem<ResponseHead> {
    let mut head = ResponseHead::new(error.status());
    head.push_header("content-type".parse().unwrap(), "text/plain".parse().unwrap());
    head.push_header("connection".parse().unwrap(), "close".parse().unwrap());
    MessageItem::Complete { head, body: Bytes::from(error.to_string()) }
}
