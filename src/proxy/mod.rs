//! Request relay: backend dispatch and response streaming.

mod body;
mod http_proxy;

pub use body::{DeadlineExceeded, StreamingBody};
pub use http_proxy::{
    BoxError, HttpProxyError, RelayBody, RelayConfig, RelayOutcome, build_outbound_request,
    error_response, relay_request,
};
