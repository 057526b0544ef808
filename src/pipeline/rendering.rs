//! Rendering stage: turns outbound response parts into wire bytes.
//!
//! Sits at the bottom of the server pipeline so every response — including
//! the ones the timeout stage generates for parse failures — reaches the
//! driver as a single `SendBytes` command per part.

use crate::codec::ResponseEncoder;
use crate::pipeline::{CloseReason, Command, Event, Stage, StageContext};
use bytes::BytesMut;
use tokio_util::codec::Encoder;
use tracing::error;

pub struct RenderingStage {
    encoder: ResponseEncoder,
    buffer: BytesMut,
}

impl RenderingStage {
    pub fn new() -> Self {
        Self { encoder: ResponseEncoder::new(), buffer: BytesMut::new() }
    }
}

impl Default for RenderingStage {
    fn default() -> Self {
        Self::new()
    }
}

impl Stage for RenderingStage {
    fn on_command(&mut self, command: Command, ctx: &mut StageContext<'_>) {
        let part = match command {
            Command::SendResponsePart(part) => part,
            other => return ctx.send_down(other),
        };

        match self.encoder.encode(part, &mut self.buffer) {
            Ok(()) => ctx.send_down(Command::SendBytes(self.buffer.split().freeze())),
            Err(e) => {
                error!("failed to render response part, cause {}, closing connection", e);
                ctx.send_down(Command::Close(CloseReason::IoError));
            }
        }
    }

    fn on_event(&mut self, event: Event, ctx: &mut StageContext<'_>) {
        ctx.send_up(event);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::Pipeline;
    use crate::protocol::{MessageItem, ResponseHead};
    use bytes::Bytes;
    use http::StatusCode;

    #[test]
    fn response_parts_leave_the_pipeline_as_bytes() {
        let mut pipeline = Pipeline::builder().stage(RenderingStage::new()).build();

        pipeline.fire_command(Command::SendResponsePart(MessageItem::Complete {
            head: ResponseHead::new(StatusCode::OK),
            body: Bytes::from_static(b"ok"),
        }));

        match pipeline.next_outbound() {
            Some(Command::SendBytes(bytes)) => {
                assert_eq!(&bytes[..], &b"HTTP/1.1 200 OK\r\ncontent-length: 2\r\n\r\nok"[..]);
            }
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn out_of_order_parts_close_the_connection() {
        let mut pipeline = Pipeline::builder().stage(RenderingStage::new()).build();

        pipeline.fire_command(Command::SendResponsePart(MessageItem::ChunkedEnd(Default::default())));

        assert!(matches!(pipeline.next_outbound(), Some(Command::Close(CloseReason::IoError))));
    }
}
