//! Framing stage: feeds raw socket bytes into the request parser and emits
//! the resulting message parts upward.
//!
//! Owns the per-connection [`RequestDecoder`], which installs a fresh parser
//! state for each message by itself. A parse error is emitted upward exactly
//! once; afterwards the stage discards further input, since the byte stream
//! has lost synchronization and the connection is about to close.

use crate::codec::RequestDecoder;
use crate::pipeline::{Command, Event, Stage, StageContext};
use crate::protocol::ParserSettings;
use bytes::BytesMut;
use std::sync::Arc;
use tokio_util::codec::Decoder;
use tracing::trace;

pub struct FramingStage {
    decoder: RequestDecoder,
    buffer: BytesMut,
    failed: bool,
}

impl FramingStage {
    pub fn new(settings: Arc<ParserSettings>) -> Self {
        Self { decoder: RequestDecoder::with_settings(settings), buffer: BytesMut::new(), failed: false }
    }
}

impl Stage for FramingStage {
    fn on_command(&mut self, command: Command, ctx: &mut StageContext<'_>) {
        ctx.send_down(command);
    }

    fn on_event(&mut self, event: Event, ctx: &mut StageContext<'_>) {
        let bytes = match event {
            Event::Received(bytes) => bytes,
            other => return ctx.send_up(other),
        };

        if self.failed {
            trace!(len = bytes.len(), "discarding bytes after parse failure");
            return;
        }

        self.buffer.extend_from_slice(&bytes);
        loop {
            match self.decoder.decode(&mut self.buffer) {
                Ok(Some(part)) => ctx.send_up(Event::RequestPart(part)),
                Ok(None) => break,
                Err(e) => {
                    self.failed = true;
                    ctx.send_up(Event::ParseFailed(e));
                    break;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::Pipeline;
    use crate::protocol::MessageItem;
    use bytes::Bytes;
    use std::sync::Mutex;

    struct Collect {
        events: Arc<Mutex<Vec<Event>>>,
    }

    impl Stage for Collect {
        fn on_command(&mut self, command: Command, ctx: &mut StageContext<'_>) {
            ctx.send_down(command);
        }

        fn on_event(&mut self, event: Event, _ctx: &mut StageContext<'_>) {
            self.events.lock().unwrap().push(event);
        }
    }

    fn framed_pipeline() -> (Pipeline, Arc<Mutex<Vec<Event>>>) {
        let events = Arc::new(Mutex::new(Vec::new()));
        let pipeline = Pipeline::builder()
            .stage(FramingStage::new(Arc::new(ParserSettings::default())))
            .stage(Collect { events: events.clone() })
            .build();
        (pipeline, events)
    }

    #[test]
    fn bytes_become_request_parts() {
        let (mut pipeline, events) = framed_pipeline();

        pipeline.fire_event(Event::Received(Bytes::from_static(b"GET / HTTP/1.1\r\nHo")));
        pipeline.fire_event(Event::Received(Bytes::from_static(b"st: a\r\n\r\n")));

        let events = events.lock().unwrap();
        assert_eq!(events.len(), 1);
        match &events[0] {
            Event::RequestPart(MessageItem::Complete { head, .. }) => {
                assert_eq!(&head.target()[..], b"/")
            }
            other => panic!("unexpected event {other:?}"),
        }
    }

    #[test]
    fn a_parse_error_is_emitted_once_then_input_is_discarded() {
        let (mut pipeline, events) = framed_pipeline();

        pipeline.fire_event(Event::Received(Bytes::from_static(b"GET / HTTP/9.9\r\n\r\n")));
        pipeline.fire_event(Event::Received(Bytes::from_static(b"GET / HTTP/1.1\r\nHost: a\r\n\r\n")));

        let events = events.lock().unwrap();
        assert_eq!(events.len(), 1);
        assert!(matches!(&events[0], Event::ParseFailed(_)));
    }

    #[test]
    fn non_byte_events_pass_through() {
        let (mut pipeline, events) = framed_pipeline();
        pipeline.fire_event(Event::SendCompleted);
        assert!(matches!(events.lock().unwrap()[0], Event::SendCompleted));
    }
}
