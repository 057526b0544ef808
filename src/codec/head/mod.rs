//! Start-line and header-block state machines.

mod header_section;
mod request_head_decoder;
mod response_head_decoder;

pub(crate) use header_section::HeaderSectionDecoder;
pub(crate) use request_head_decoder::RequestHeadDecoder;
pub(crate) use response_head_decoder::ResponseHeadDecoder;
