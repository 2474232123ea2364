//! Tasks that move frames between a WebSocket and its [`Link`](crate::transport::Link).

pub(crate) mod read;
pub(crate) mod write;
