//! Host side of the wire.
//!
//! The chip only deals in raw Ethernet frames (`Vec<u8>`). Outbound frames are handed to
//! [`NetworkBackend::transmit`] on transmit completion; inbound frames are either pushed directly
//! with [`crate::Dp8390::receive_frame`] or pulled from [`NetworkBackend::poll_receive`] by
//! [`crate::Dp8390::poll`].

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

/// Default number of inbound frames drained by one [`crate::Dp8390::poll`] call.
pub const DEFAULT_MAX_FRAMES_PER_POLL: usize = 256;

/// Network backend bridging frames between the emulated chip and the host network stack.
pub trait NetworkBackend {
    /// Transmit a guest → host Ethernet frame.
    fn transmit(&mut self, frame: Vec<u8>);

    /// Poll for a host → guest Ethernet frame.
    fn poll_receive(&mut self) -> Option<Vec<u8>> {
        None
    }
}

impl<T: NetworkBackend + ?Sized> NetworkBackend for &mut T {
    fn transmit(&mut self, frame: Vec<u8>) {
        <T as NetworkBackend>::transmit(&mut **self, frame);
    }

    fn poll_receive(&mut self) -> Option<Vec<u8>> {
        <T as NetworkBackend>::poll_receive(&mut **self)
    }
}

impl NetworkBackend for () {
    fn transmit(&mut self, _frame: Vec<u8>) {}
}

impl<T: NetworkBackend + ?Sized> NetworkBackend for Arc<Mutex<T>> {
    fn transmit(&mut self, frame: Vec<u8>) {
        self.lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .transmit(frame);
    }

    fn poll_receive(&mut self) -> Option<Vec<u8>> {
        self.lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .poll_receive()
    }
}

/// Thread-safe FIFO of raw frames.
///
/// Clones share the same queue, so a host thread can keep one handle and push frames while the
/// execution thread drains them through a [`QueueBackend`].
#[derive(Debug, Clone, Default)]
pub struct FrameQueue {
    inner: Arc<Mutex<VecDeque<Vec<u8>>>>,
}

impl FrameQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&self, frame: Vec<u8>) {
        self.lock().push_back(frame);
    }

    pub fn pop(&self) -> Option<Vec<u8>> {
        self.lock().pop_front()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// Removes and returns every queued frame in order.
    pub fn drain(&self) -> Vec<Vec<u8>> {
        self.lock().drain(..).collect()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, VecDeque<Vec<u8>>> {
        self.inner
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

/// Backend that reads inbound frames from a shared [`FrameQueue`] and forwards outbound frames to
/// an inner backend.
#[derive(Debug, Clone, Default)]
pub struct QueueBackend<T = ()> {
    rx: FrameQueue,
    tx: T,
}

impl QueueBackend<()> {
    /// Inbound-only backend; transmitted frames are discarded.
    pub fn new(rx: FrameQueue) -> Self {
        Self { rx, tx: () }
    }
}

impl<T> QueueBackend<T> {
    pub fn with_tx(rx: FrameQueue, tx: T) -> Self {
        Self { rx, tx }
    }

    pub fn rx_queue(&self) -> &FrameQueue {
        &self.rx
    }

    pub fn tx(&self) -> &T {
        &self.tx
    }

    pub fn tx_mut(&mut self) -> &mut T {
        &mut self.tx
    }
}

impl<T: NetworkBackend> NetworkBackend for QueueBackend<T> {
    fn transmit(&mut self, frame: Vec<u8>) {
        self.tx.transmit(frame);
    }

    fn poll_receive(&mut self) -> Option<Vec<u8>> {
        self.rx.pop()
    }
}

impl NetworkBackend for FrameQueue {
    /// Pushes outbound frames onto the queue, which lets a `FrameQueue` act as a capture sink.
    fn transmit(&mut self, frame: Vec<u8>) {
        self.push(frame);
    }

    fn poll_receive(&mut self) -> Option<Vec<u8>> {
        self.pop()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct Backend {
        tx: Vec<Vec<u8>>,
        rx: VecDeque<Vec<u8>>,
    }

    impl NetworkBackend for Backend {
        fn transmit(&mut self, frame: Vec<u8>) {
            self.tx.push(frame);
        }

        fn poll_receive(&mut self) -> Option<Vec<u8>> {
            self.rx.pop_front()
        }
    }

    #[test]
    fn network_backend_is_implemented_for_arc_mutex() {
        let inner = Arc::new(Mutex::new(Backend::default()));
        let mut backend = inner.clone();
        backend.transmit(vec![4, 5]);
        assert_eq!(inner.lock().unwrap().tx, vec![vec![4, 5]]);
    }

    #[test]
    fn frame_queue_is_shared_between_threads() {
        let queue = FrameQueue::new();
        let producer = queue.clone();
        std::thread::spawn(move || {
            producer.push(vec![1]);
            producer.push(vec![2]);
        })
        .join()
        .unwrap();

        let mut backend = QueueBackend::with_tx(queue.clone(), Backend::default());
        assert_eq!(backend.poll_receive(), Some(vec![1]));
        backend.transmit(vec![7]);
        assert_eq!(backend.tx().tx, vec![vec![7]]);
        assert_eq!(queue.len(), 1);
        assert_eq!(queue.drain(), vec![vec![2]]);
        assert!(queue.is_empty());
    }
}
