//! Timeout enforcement.
//!
//! # Responsibilities
//! - Bound the time a streamed body may sit idle on either leg
//! - Bound the time to receive the downstream response head once the request
//!   body has been sent (see `http::relay`)
//!
//! # Design Decisions
//! - Uses Tokio's timer facilities
//! - The idle clock only runs while the source has nothing to yield, so a slow
//!   reader on the other side never trips it
//! - A timeout surfaces as a body error, which aborts the stream it belongs to

use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};
use std::time::Duration;

use axum::body::{Body, Bytes};
use http_body::{Body as _, Frame, SizeHint};
use thiserror::Error;
use tokio::sync::oneshot;
use tokio::time::{Instant, Sleep};

type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// A body stream produced no frame within the idle window.
#[derive(Debug, Error)]
#[error("body idle for more than {0:?}")]
pub struct IdleTimeout(pub Duration);

/// Body wrapper that fails once the inner body stays pending for longer than `timeout`.
pub struct IdleTimeoutBody<B> {
    inner: Pin<Box<B>>,
    timeout: Duration,
    deadline: Pin<Box<Sleep>>,
    waiting: bool,
}

impl<B> IdleTimeoutBody<B> {
    pub fn new(inner: B, timeout: Duration) -> Self {
        Self {
            inner: Box::pin(inner),
            timeout,
            deadline: Box::pin(tokio::time::sleep(timeout)),
            waiting: false,
        }
    }
}

impl<B> http_body::Body for IdleTimeoutBody<B>
where
    B: http_body::Body<Data = Bytes>,
    B::Error: Into<BoxError>,
{
    type Data = Bytes;
    type Error = BoxError;

    fn poll_frame(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
    ) -> Poll<Option<Result<Frame<Self::Data>, Self::Error>>> {
        let this = self.get_mut();

        match this.inner.as_mut().poll_frame(cx) {
            Poll::Ready(frame) => {
                this.waiting = false;
                Poll::Ready(frame.map(|result| result.map_err(Into::into)))
            }
            Poll::Pending => {
                if !this.waiting {
                    this.waiting = true;
                    this.deadline.as_mut().reset(Instant::now() + this.timeout);
                }
                match this.deadline.as_mut().poll(cx) {
                    Poll::Ready(()) => Poll::Ready(Some(Err(IdleTimeout(this.timeout).into()))),
                    Poll::Pending => Poll::Pending,
                }
            }
        }
    }

    fn is_end_stream(&self) -> bool {
        self.inner.is_end_stream()
    }

    fn size_hint(&self) -> SizeHint {
        self.inner.size_hint()
    }
}

/// Wrap `body` with an idle timeout when one is configured.
pub fn with_idle_timeout<B>(body: B, timeout: Option<Duration>) -> Body
where
    B: http_body::Body<Data = Bytes> + Send + 'static,
    B::Error: Into<BoxError>,
{
    match timeout {
        Some(timeout) => Body::new(IdleTimeoutBody::new(body, timeout)),
        None => Body::new(body),
    }
}

/// Body wrapper that reports when the inner body has been fully read.
///
/// The receiver also resolves (with an error) if the body is dropped early.
pub struct EndOfStreamBody<B> {
    inner: Pin<Box<B>>,
    done: Option<oneshot::Sender<()>>,
}

impl<B> EndOfStreamBody<B>
where
    B: http_body::Body,
{
    pub fn new(inner: B) -> (Self, oneshot::Receiver<()>) {
        let (tx, rx) = oneshot::channel();
        let mut body = Self {
            inner: Box::pin(inner),
            done: Some(tx),
        };
        // An empty body may never be polled.
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

impl<B> http_body::Body for EndOfStreamBody<B>
where
    B: http_body::Body<Data = Bytes>,
    B::Error: Into<BoxError>,
{
    type Data = Bytes;
    type Error = BoxError;

    fn poll_frame(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
    ) -> Poll<Option<Result<Frame<Self::Data>, Self::Error>>> {
        let this = self.get_mut();

        let polled = this.inner.as_mut().poll_frame(cx);
        match &polled {
            Poll::Ready(None) | Poll::Ready(Some(Err(_))) => this.finish(),
            Poll::Ready(Some(Ok(_))) if this.inner.is_end_stream() => this.finish(),
            _ => {}
        }
        polled.map(|frame| frame.map(|result| result.map_err(Into::into)))
    }

    fn is_end_stream(&self) -> bool {
        self.inner.is_end_stream()
    }

    fn size_hint(&self) -> SizeHint {
        self.inner.size_hint()
    }
}

/// Wrap `body` so the returned receiver resolves once it has been sent in full.
pub fn notify_end_of_stream<B>(body: B) -> (Body, oneshot::Receiver<()>)
where
    B: http_body::Body<Data = Bytes> + Send + 'static,
    B::Error: Into<BoxError>,
{
    let (body, done) = EndOfStreamBody::new(body);
    (Body::new(body), done)
}
