//! Per-connection stage pipeline.
//!
//! A connection is processed by a stack of [`Stage`]s: commands travel
//! downward (toward the socket), events travel upward (toward the
//! application). Each stage may transform, observe, or originate traffic in
//! either direction. Construction order fixes traversal order: the first
//! stage handed to the builder sits at the bottom, the last at the top — the
//! top stage is the application itself.
//!
//! Dispatch is a FIFO queue drained to completion, so stages never recurse
//! into each other and everything stays strictly serialized per connection.
//! The only state shared across connections is the [`ServerStats`] counter
//! set.

mod framing;
mod rendering;
mod stats;
mod timeout;

pub use framing::FramingStage;
pub use rendering::RenderingStage;
pub use stats::{ServerStats, StatsSnapshot, StatsStage};
pub use timeout::RequestTimeoutStage;

use crate::config::ServerConfig;
use crate::protocol::{MessageItem, ParseError, RequestHead, ResponseHead};
use bytes::Bytes;
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Instant;
use tracing::trace;

/// Why a connection is being (or has been) closed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CloseReason {
    IdleTimeout,
    RequestTimeout,
    PeerClosed,
    ConfirmedClose,
    IoError,
}

/// Upward traffic: from the socket toward the application.
#[derive(Debug, Clone)]
pub enum Event {
    /// Raw bytes read from the socket
    Received(Bytes),
    /// A parsed request part
    RequestPart(MessageItem<RequestHead>),
    /// The parser reached a terminal error state
    ParseFailed(ParseError),
    /// The oldest in-flight request exceeded the configured request timeout
    RequestTimeout,
    /// A previously submitted write reached the socket
    SendCompleted,
    /// Periodic wall-clock tick from the driver
    Tick(Instant),
    /// The connection is closed
    Closed(CloseReason),
}

/// Downward traffic: from the application toward the socket.
#[derive(Debug, Clone)]
pub enum Command {
    /// A response part to render and send
    SendResponsePart(MessageItem<ResponseHead>),
    /// Rendered bytes to write to the socket
    SendBytes(Bytes),
    /// Stop reading from the socket (backpressure)
    StopReading,
    /// Resume reading from the socket
    ResumeReading,
    /// Close the connection; `ConfirmedClose` flushes first
    Close(CloseReason),
}

/// A bidirectional transformer over the command and event streams.
pub trait Stage: Send {
    fn on_command(&mut self, command: Command, ctx: &mut StageContext<'_>);
    fn on_event(&mut self, event: Event, ctx: &mut StageContext<'_>);
}

/// Hands a stage its two adjacent pipelines while it processes one item.
pub struct StageContext<'a> {
    ups: &'a mut Vec<Event>,
    downs: &'a mut Vec<Command>,
}

impl StageContext<'_> {
    /// Emits an event to the stage above.
    pub fn send_up(&mut self, event: Event) {
        self.ups.push(event);
    }

    /// Emits a command to the stage below.
    pub fn send_down(&mut self, command: Command) {
        self.downs.push(command);
    }
}

enum Travel {
    Up { index: usize, event: Event },
    Down { index: usize, command: Command },
}

/// A composed stack of stages for one connection.
pub struct Pipeline {
    stages: Vec<Box<dyn Stage>>,
    travels: VecDeque<Travel>,
    outbound: VecDeque<Command>,
}

impl Pipeline {
    pub fn builder() -> PipelineBuilder {
        PipelineBuilder { stages: Vec::new() }
    }

    /// Feeds an event in at the bottom and runs the pipeline to quiescence.
    pub fn fire_event(&mut self, event: Event) {
        if self.stages.is_empty() {
            return;
        }
        self.travels.push_back(Travel::Up { index: 0, event });
        self.run();
    }

    /// Injects a command as if sent from above the top stage.
    pub fn fire_command(&mut self, command: Command) {
        self.enqueue_down(self.stages.len(), command);
        self.run();
    }

    /// Next command that traversed the whole stack and awaits the driver.
    pub fn next_outbound(&mut self) -> Option<Command> {
        self.outbound.pop_front()
    }

    fn enqueue_down(&mut self, from: usize, command: Command) {
        if from == 0 {
            self.outbound.push_back(command);
        } else {
            self.travels.push_back(Travel::Down { index: from - 1, command });
        }
    }

    fn run(&mut self) {
        while let Some(travel) = self.travels.pop_front() {
            let mut ups = Vec::new();
            let mut downs = Vec::new();
            let index = {
                let mut ctx = StageContext { ups: &mut ups, downs: &mut downs };
                match travel {
                    Travel::Up { index, event } => {
                        self.stages[index].on_event(event, &mut ctx);
                        index
                    }
                    Travel::Down { index, command } => {
                        self.stages[index].on_command(command, &mut ctx);
                        index
                    }
                }
            };

            for event in ups {
                if index + 1 < self.stages.len() {
                    self.travels.push_back(Travel::Up { index: index + 1, event });
                } else {
                    // past the application; nobody is listening
                    trace!(?event, "event passed the top of the pipeline");
                }
            }
            for command in downs {
                self.enqueue_down(index, command);
            }
        }
    }
}

pub struct PipelineBuilder {
    stages: Vec<Box<dyn Stage>>,
}

impl PipelineBuilder {
    /// Appends a stage above the ones added so far.
    pub fn stage(mut self, stage: impl Stage + 'static) -> Self {
        self.stages.push(Box::new(stage));
        self
    }

    pub fn build(self) -> Pipeline {
        Pipeline { stages: self.stages, travels: VecDeque::new(), outbound: VecDeque::new() }
    }
}

/// The standard server composition: rendering at the bottom, then framing,
/// request-timeout and statistics, with the application on top.
pub fn server_pipeline(
    config: &ServerConfig,
    stats: Arc<ServerStats>,
    app: impl Stage + 'static,
) -> Pipeline {
    Pipeline::builder()
        .stage(RenderingStage::new())
        .stage(FramingStage::new(Arc::new(config.parser.clone())))
        .stage(RequestTimeoutStage::new(config.request_timeout_duration()))
        .stage(StatsStage::new(stats))
        .stage(app)
        .build()
}
