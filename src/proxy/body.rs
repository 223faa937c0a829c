//! Outbound calls timed from the end of the request body.
//!
//! A response-header timeout that starts with the call would count a slow
//! upload against the target. `send_with_header_timeout` starts the clock
//! only once the request body has been fully handed to the connection.

use std::pin::Pin;
use std::task::{Context, Poll};
use std::time::Duration;

use axum::body::{Body, Bytes};
use axum::http::{Request, Response};
use hyper::body::{Body as HttpBody, Frame, Incoming, SizeHint};
use thiserror::Error;
use tokio::sync::oneshot;

use crate::proxy::transport::ProxyClient;

#[derive(Debug, Error)]
pub enum CallError {
    #[error("timed out waiting for response headers after {}s", .0.as_secs())]
    HeaderTimeout(Duration),

    #[error("{}", error_chain(.0))]
    Request(#[from] hyper_util::client::legacy::Error),
}

/// Request body that reports when its last frame has been read.
pub struct SignalOnEnd {
    inner: Body,
    done: Option<oneshot::Sender<()>>,
}

impl SignalOnEnd {
    pub fn new(inner: Body) -> (Self, oneshot::Receiver<()>) {
        let (tx, rx) = oneshot::channel();
        let mut body = Self {
            inner,
            done: Some(tx),
        };
        // hyper never polls a body that is already at its end.
        if body.inner.is_end_stream() {
            body.finish();
        }
        (body, rx)
    }

    fn finish(&mut self) {
        if let Some(done) = self.done.take() {
            let _ = done.send(());
        }
    }
}

impl HttpBody for SignalOnEnd {
    type Data = Bytes;
    type Error = axum::Error;

    fn poll_frame(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
    ) -> Poll<Option<Result<Frame<Self::Data>, Self::Error>>> {
        let polled = Pin::new(&mut self.inner).poll_frame(cx);
        match &polled {
            Poll::Ready(None) => self.finish(),
            Poll::Ready(Some(Ok(_))) if self.inner.is_end_stream() => self.finish(),
            _ => {}
        }
        polled
    }

    fn is_end_stream(&self) -> bool {
        self.inner.is_end_stream()
    }

    fn size_hint(&self) -> SizeHint {
        self.inner.size_hint()
    }
}

/// Send `request`, allowing `timeout` for response headers once the body is out.
///
/// A target that answers before reading the whole body is not timed at all
/// until the body ends or is dropped; dial and handshake stay bounded by the
/// connector.
pub async fn send_with_header_timeout(
    client: &ProxyClient,
    request: Request<Body>,
    timeout: Duration,
) -> Result<Response<Incoming>, CallError> {
    let (parts, body) = request.into_parts();
    let (body, sent) = SignalOnEnd::new(body);
    let call = client.request(Request::from_parts(parts, Body::new(body)));
    tokio::pin!(call);

    let deadline = async {
        // Err means the body was dropped, which also ends the upload.
        let _ = sent.await;
        tokio::time::sleep(timeout).await;
    };

    tokio::select! {
        result = &mut call => Ok(result?),
        _ = deadline => Err(CallError::HeaderTimeout(timeout)),
    }
}

/// `err` followed by each of its sources, so TLS and connect causes survive.
pub fn error_chain(err: &(dyn std::error::Error + 'static)) -> String {
    let mut message = err.to_string();
    let mut source = err.source();
    while let Some(cause) = source {
        message.push_str(": ");
        message.push_str(&cause.to_string());
        source = cause.source();
    }
    message
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::convert::Infallible;

    fn chunked(chunks: Vec<&'static str>, delay: Duration) -> Body {
        let (tx, rx) = tokio::sync::mpsc::channel::<Result<Frame<Bytes>, Infallible>>(1);
        tokio::spawn(async move {
            for chunk in chunks {
                tokio::time::sleep(delay).await;
                if tx.send(Ok(Frame::data(Bytes::from_static(chunk.as_bytes())))).await.is_err() {
                    return;
                }
            }
        });
        Body::new(ChannelBody(rx))
    }

    struct ChannelBody(tokio::sync::mpsc::Receiver<Result<Frame<Bytes>, Infallible>>);

    impl HttpBody for ChannelBody {
        type Data = Bytes;
        type Error = Infallible;

        fn poll_frame(
            mut self: Pin<&mut Self>,
            cx: &mut Context<'_>,
        ) -> Poll<Option<Result<Frame<Self::Data>, Self::Error>>> {
            self.0.poll_recv(cx)
        }
    }

    #[tokio::test]
    async fn test_empty_body_signals_immediately() {
        let (_body, sent) = SignalOnEnd::new(Body::empty());
        tokio::time::timeout(Duration::from_millis(100), sent)
            .await
            .unwrap()
            .unwrap();
    }

    #[tokio::test]
    async fn test_signal_after_last_frame() {
        let (body, mut sent) = SignalOnEnd::new(chunked(vec!["a", "b"], Duration::from_millis(10)));
        assert!(sent.try_recv().is_err());

        let collected = axum::body::to_bytes(Body::new(body), 1024).await.unwrap();
        assert_eq!(&collected[..], b"ab");
        sent.await.unwrap();
    }

    #[test]
    fn test_error_chain_includes_sources() {
        let inner = std::io::Error::new(std::io::ErrorKind::InvalidData, "invalid peer certificate");
        let outer = std::io::Error::other(Wrapped(inner));
        let message = error_chain(&outer);
        assert!(message.contains("invalid peer certificate"), "{message}");
    }

    #[derive(Debug)]
    struct Wrapped(std::io::Error);

    impl std::fmt::Display for Wrapped {
        fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            f.write_str("connect failed")
        }
    }

    impl std::error::Error for Wrapped {
        fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
            Some(&self.0)
        }
    }
}
