//! Per-connection driver.
//!
//! Owns the socket halves and the stage pipeline. The run loop is the only
//! task that ever touches this connection: it reads from the socket (unless
//! backpressure paused it), feeds bytes into the pipeline, executes the
//! commands that reach the bottom, and fires the wall-clock tick that drives
//! the timeout stages. Close semantics: `ConfirmedClose` writes out what is
//! already queued and flushes before shutdown, every other reason closes
//! immediately and discards queued output.

use crate::config::ServerConfig;
use crate::pipeline::{CloseReason, Command, Event, Pipeline};
use crate::protocol::{HttpError, SendError};
use bytes::BytesMut;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::select;
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info};

/// Granularity of the timeout clock.
const TICK_INTERVAL: Duration = Duration::from_millis(100);

pub struct HttpConnection<R, W> {
    reader: R,
    writer: W,
    pipeline: Pipeline,
    config: Arc<ServerConfig>,
}

impl<R, W> HttpConnection<R, W>
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    pub fn new(reader: R, writer: W, pipeline: Pipeline, config: Arc<ServerConfig>) -> Self {
        Self { reader, writer, pipeline, config }
    }

    /// Drives the connection until it closes.
    pub async fn run(mut self) -> Result<(), HttpError> {
        let mut read_buf = BytesMut::with_capacity(self.config.read_buffer_size);
        let idle_timeout = self.config.idle_timeout_duration();
        let mut last_activity = Instant::now();
        let mut paused = false;

        let mut tick = tokio::time::interval(TICK_INTERVAL);
        tick.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            if let Some(reason) = self.execute_commands(&mut paused, &mut last_activity).await? {
                return self.shutdown(reason).await;
            }

            if read_buf.capacity() < self.config.read_buffer_size {
                read_buf.reserve(self.config.read_buffer_size);
            }

            select! {
                biased;

                result = self.reader.read_buf(&mut read_buf), if !paused => match result {
                    Ok(0) => {
                        debug!("peer closed the connection");
                        return self.shutdown(CloseReason::PeerClosed).await;
                    }
                    Ok(_) => {
                        last_activity = Instant::now();
                        self.pipeline.fire_event(Event::Received(read_buf.split().freeze()));
                    }
                    Err(e) => {
                        error!("read failed, cause {}, closing connection", e);
                        self.pipeline.fire_event(Event::Closed(CloseReason::IoError));
                        let _ = self.writer.shutdown().await;
                        return Err(SendError::io(e).into());
                    }
                },

                _ = tick.tick() => {
                    let now = Instant::now();
                    if let Some(idle) = idle_timeout {
                        if now.duration_since(last_activity) >= idle {
                            info!("closing idle connection");
                            return self.shutdown(CloseReason::IdleTimeout).await;
                        }
                    }
                    self.pipeline.fire_event(Event::Tick(now));
                }
            }
        }
    }

    /// Executes the commands that reached the bottom of the pipeline.
    ///
    /// Returns the close reason when a `Close` command was seen; commands
    /// queued after it are discarded.
    async fn execute_commands(
        &mut self,
        paused: &mut bool,
        last_activity: &mut Instant,
    ) -> Result<Option<CloseReason>, HttpError> {
        while let Some(command) = self.pipeline.next_outbound() {
            match command {
                Command::SendBytes(bytes) => {
                    if let Err(e) = self.writer.write_all(&bytes).await {
                        error!("write failed, cause {}, closing connection", e);
                        self.pipeline.fire_event(Event::Closed(CloseReason::IoError));
                        return Err(SendError::io(e).into());
                    }
                    *last_activity = Instant::now();
                    if self.config.confirm_sends {
                        self.pipeline.fire_event(Event::SendCompleted);
                    }
                }
                Command::StopReading => *paused = true,
                Command::ResumeReading => *paused = false,
                Command::Close(reason) => {
                    while self.pipeline.next_outbound().is_some() {}
                    return Ok(Some(reason));
                }
                Command::SendResponsePart(_) => {
                    // only reachable when the pipeline was built without a
                    // rendering stage
                    error!("un-rendered response part reached the driver, dropping");
                }
            }
        }
        Ok(None)
    }

    async fn shutdown(&mut self, reason: CloseReason) -> Result<(), HttpError> {
        self.pipeline.fire_event(Event::Closed(reason));
        // the close notification may produce final writes; honour them only
        // for a confirmed close
        loop {
            match self.pipeline.next_outbound() {
                Some(Command::SendBytes(bytes)) if reason == CloseReason::ConfirmedClose => {
                    self.writer.write_all(&bytes).await.map_err(SendError::io)?;
                }
                Some(_) => {}
                None => break,
            }
        }
        if reason == CloseReason::ConfirmedClose {
            self.writer.flush().await.map_err(SendError::io)?;
        }
        let _ = self.writer.shutdown().await;
        info!(?reason, "connection closed");
        Ok(())
    }
}
