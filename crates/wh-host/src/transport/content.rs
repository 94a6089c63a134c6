//! Invocation request bodies

use bytes::Bytes;
use futures::StreamExt;
use reqwest::Body;
use tokio_util::io::ReaderStream;

use wh_core::Result;
use wh_protocol::{InvocationRequest, MODULE_BOUNDARY};

/// Builds the HTTP body for an invocation
pub trait ContentBuilder: Send + Sync {
    /// Consume `request` and produce the body to post
    fn build(&self, request: InvocationRequest) -> Result<Body>;
}

/// Default body layout
///
/// The request JSON, followed for stream sources by [`MODULE_BOUNDARY`] and
/// the raw module bytes.
#[derive(Debug, Default, Clone, Copy)]
pub struct InvocationContent;

impl ContentBuilder for InvocationContent {
    fn build(&self, request: InvocationRequest) -> Result<Body> {
        let (mut head, stream) = request.into_parts()?;

        let Some(stream) = stream else {
            return Ok(Body::from(head));
        };

        head.extend_from_slice(MODULE_BOUNDARY);
        let head = futures::stream::once(async move { Ok::<_, std::io::Error>(Bytes::from(head)) });
        Ok(Body::wrap_stream(head.chain(ReaderStream::new(stream))))
    }
}
