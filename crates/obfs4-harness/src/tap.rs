//! A carrier wrapper that counts bytes written through it, so a test can
//! assert an exact wire size without parsing the frame itself.

use std::{
    io,
    pin::Pin,
    sync::{Arc, Mutex},
    task::{Context, Poll},
};

use tokio::io::{AsyncRead, AsyncWrite, ReadBuf};

/// Handle used to read back (and reset) the running byte count observed
/// by a [`CountWrites`] carrier.
#[derive(Clone)]
pub struct TapHandle(Arc<Mutex<usize>>);

impl TapHandle {
    /// Bytes written through the tapped carrier since the last
    /// [`reset`](Self::reset).
    pub fn bytes_written(&self) -> usize {
        #[allow(clippy::expect_used)]
        { *self.0.lock().expect("tap handle mutex is never poisoned") }
    }

    /// Zero the running count, e.g. after the handshake has finished
    /// writing and before the write under test.
    pub fn reset(&self) {
        #[allow(clippy::expect_used)]
        { *self.0.lock().expect("tap handle mutex is never poisoned") = 0; }
    }
}

/// A carrier whose write side a [`TapHandle`] can observe without
/// altering any bytes. Reads pass straight through.
pub struct CountWrites<C> {
    inner: C,
    count: Arc<Mutex<usize>>,
}

impl<C> CountWrites<C> {
    /// Wrap `inner`, returning the wrapped carrier and the handle that
    /// reads its running byte count.
    pub fn new(inner: C) -> (Self, TapHandle) {
        let count = Arc::new(Mutex::new(0));
        (Self { inner, count: Arc::clone(&count) }, TapHandle(count))
    }
}

impl<C: AsyncRead + Unpin> AsyncRead for CountWrites<C> {
    fn poll_read(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        Pin::new(&mut self.get_mut().inner).poll_read(cx, buf)
    }
}

impl<C: AsyncWrite + Unpin> AsyncWrite for CountWrites<C> {
    fn poll_write(self: Pin<&mut Self>, cx: &mut Context<'_>, buf: &[u8]) -> Poll<io::Result<usize>> {
        let this = self.get_mut();
        let result = Pin::new(&mut this.inner).poll_write(cx, buf);
        if let Poll::Ready(Ok(n)) = &result {
            #[allow(clippy::expect_used)]
            { *this.count.lock().expect("tap handle mutex is never poisoned") += n; }
        }
        result
    }

    fn poll_flush(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Pin::new(&mut self.get_mut().inner).poll_flush(cx)
    }

    fn poll_shutdown(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Pin::new(&mut self.get_mut().inner).poll_shutdown(cx)
    }
}
