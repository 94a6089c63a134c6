//! Decoding successful invocation responses
//!
//! The result type of an invocation selects how the response body is read.

use std::fmt;
use std::io;
use std::marker::PhantomData;
use std::pin::Pin;
use std::task::{Context, Poll};

use async_trait::async_trait;
use bytes::Bytes;
use futures::stream::BoxStream;
use futures::{Stream, StreamExt};
use serde::de::DeserializeOwned;
use tokio_util::io::StreamReader;

use wh_core::{HostError, Result};

/// How to turn a `200 OK` response into a value
#[async_trait]
pub trait InvocationOutput {
    /// Value handed back to the caller
    type Output: Send;

    /// Consume the response body
    async fn decode(response: reqwest::Response) -> Result<Self::Output>;
}

/// Deserialize the body as JSON into `T`
pub struct Json<T>(PhantomData<fn() -> T>);

#[async_trait]
impl<T> InvocationOutput for Json<T>
where
    T: DeserializeOwned + Send + 'static,
{
    type Output = T;

    async fn decode(response: reqwest::Response) -> Result<T> {
        let body = response.bytes().await?;
        serde_json::from_slice(&body).map_err(|e| HostError::Decode(e.to_string()))
    }
}

/// Body text, as-is
#[async_trait]
impl InvocationOutput for String {
    type Output = String;

    async fn decode(response: reqwest::Response) -> Result<String> {
        Ok(response.text().await?)
    }
}

/// Discard the body
#[async_trait]
impl InvocationOutput for () {
    type Output = ();

    async fn decode(response: reqwest::Response) -> Result<()> {
        response.bytes().await?;
        Ok(())
    }
}

/// Body as a byte stream, handed to the caller unread
#[async_trait]
impl InvocationOutput for ResponseStream {
    type Output = ResponseStream;

    async fn decode(response: reqwest::Response) -> Result<ResponseStream> {
        Ok(ResponseStream::new(response))
    }
}

/// Streaming response body
///
/// The caller owns the stream; dropping it closes the connection.
pub struct ResponseStream {
    inner: BoxStream<'static, io::Result<Bytes>>,
}

impl ResponseStream {
    fn new(response: reqwest::Response) -> Self {
        Self {
            inner: response.bytes_stream().map(|chunk| chunk.map_err(io::Error::other)).boxed(),
        }
    }

    /// Read the body through [`tokio::io::AsyncRead`]
    pub fn into_reader(self) -> StreamReader<Self, Bytes> {
        StreamReader::new(self)
    }

    /// Collect the remaining body into memory
    pub async fn collect_bytes(mut self) -> io::Result<Vec<u8>> {
        let mut body = Vec::new();
        while let Some(chunk) = self.inner.next().await {
            body.extend_from_slice(&chunk?);
        }
        Ok(body)
    }
}

impl Stream for ResponseStream {
    type Item = io::Result<Bytes>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.inner.poll_next_unpin(cx)
    }
}

impl fmt::Debug for ResponseStream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResponseStream").finish_non_exhaustive()
    }
}
