//! Carrier wrappers that inject specific, repeatable faults on command:
//! a read side that a test can cut to permanent EOF at a chosen moment,
//! and a write side whose next call can have one byte flipped before it
//! reaches the peer. Both wrap any `AsyncRead`/`AsyncWrite` carrier and
//! pass the untouched direction straight through.

use std::{
    io,
    pin::Pin,
    sync::{
        Arc, Mutex,
        atomic::{AtomicBool, Ordering},
    },
    task::{Context, Poll},
};

use tokio::io::{AsyncRead, AsyncWrite, ReadBuf};

/// Handle used to cut a [`CutReadOnCommand`] carrier to permanent EOF.
#[derive(Clone)]
pub struct EofHandle(Arc<AtomicBool>);

impl EofHandle {
    /// Every read after this call returns EOF, even if the underlying
    /// carrier still has buffered bytes waiting.
    pub fn cut_now(&self) {
        tracing::debug!("cutting carrier to permanent EOF");
        self.0.store(true, Ordering::SeqCst);
    }
}

/// A carrier whose read side an [`EofHandle`] can cut to permanent EOF
/// at any moment, simulating a peer that disappears mid-frame. Writes
/// always pass straight through.
pub struct CutReadOnCommand<C> {
    inner: C,
    cut: Arc<AtomicBool>,
}

impl<C> CutReadOnCommand<C> {
    /// Wrap `inner`, returning the wrapped carrier and the handle that
    /// cuts it.
    pub fn new(inner: C) -> (Self, EofHandle) {
        let cut = Arc::new(AtomicBool::new(false));
        (Self { inner, cut: Arc::clone(&cut) }, EofHandle(cut))
    }
}

impl<C: AsyncRead + Unpin> AsyncRead for CutReadOnCommand<C> {
    fn poll_read(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        let this = self.get_mut();
        if this.cut.load(Ordering::SeqCst) {
            return Poll::Ready(Ok(()));
        }
        Pin::new(&mut this.inner).poll_read(cx, buf)
    }
}

impl<C: AsyncWrite + Unpin> AsyncWrite for CutReadOnCommand<C> {
    fn poll_write(self: Pin<&mut Self>, cx: &mut Context<'_>, buf: &[u8]) -> Poll<io::Result<usize>> {
        Pin::new(&mut self.get_mut().inner).poll_write(cx, buf)
    }

    fn poll_flush(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Pin::new(&mut self.get_mut().inner).poll_flush(cx)
    }

    fn poll_shutdown(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Pin::new(&mut self.get_mut().inner).poll_shutdown(cx)
    }
}

/// Handle used to arm a [`FlipByteOnNextWrite`] carrier.
#[derive(Clone)]
pub struct FlipHandle(Arc<Mutex<Option<usize>>>);

impl FlipHandle {
    /// Flip the byte at `offset` within whichever `poll_write` call
    /// happens next, then disarm. Panics never occur if `offset` falls
    /// outside that write; the byte is simply left untouched.
    pub fn arm(&self, offset: usize) {
        tracing::debug!(offset, "arming next write for a single bit flip");
        #[allow(clippy::expect_used)]
        { *self.0.lock().expect("flip handle mutex is never poisoned") = Some(offset); }
    }
}

/// A carrier whose write side a [`FlipHandle`] can arm to corrupt one
/// byte of the next write, simulating bit-level corruption in transit.
pub struct FlipByteOnNextWrite<C> {
    inner: C,
    armed: Arc<Mutex<Option<usize>>>,
}

impl<C> FlipByteOnNextWrite<C> {
    /// Wrap `inner`, returning the wrapped carrier and the handle that
    /// arms it.
    pub fn new(inner: C) -> (Self, FlipHandle) {
        let armed = Arc::new(Mutex::new(None));
        (Self { inner, armed: Arc::clone(&armed) }, FlipHandle(armed))
    }
}

impl<C: AsyncRead + Unpin> AsyncRead for FlipByteOnNextWrite<C> {
    fn poll_read(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        Pin::new(&mut self.get_mut().inner).poll_read(cx, buf)
    }
}

impl<C: AsyncWrite + Unpin> AsyncWrite for FlipByteOnNextWrite<C> {
    fn poll_write(self: Pin<&mut Self>, cx: &mut Context<'_>, buf: &[u8]) -> Poll<io::Result<usize>> {
        let this = self.get_mut();
        #[allow(clippy::expect_used)]
        let offset = this.armed.lock().expect("flip handle mutex is never poisoned").take();

        match offset {
            Some(offset) if offset < buf.len() => {
                let mut mutated = buf.to_vec();
                mutated[offset] ^= 0xFF;
                Pin::new(&mut this.inner).poll_write(cx, &mutated)
            },
            _ => Pin::new(&mut this.inner).poll_write(cx, buf),
        }
    }

    fn poll_flush(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Pin::new(&mut self.get_mut().inner).poll_flush(cx)
    }

    fn poll_shutdown(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Pin::new(&mut self.get_mut().inner).poll_shutdown(cx)
    }
}
