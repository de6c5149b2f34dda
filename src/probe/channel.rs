//! Per-host sample channel between a probe and the coordinator.
//!
//! Each host gets exactly one channel: the probe holds the [`SampleSender`],
//! the coordinator holds the [`SampleChannel`]. Pushing never blocks the
//! probe. With [`ChannelPolicy::DropOldest`] a slow consumer loses the oldest
//! unread samples instead of stalling the producer, and the loss is counted.

use tokio::sync::{broadcast, mpsc};

use crate::data::Sample;

/// Capacity policy for a sample channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ChannelPolicy {
    /// Never drops; memory grows if the consumer stops draining.
    #[default]
    Unbounded,
    /// Keeps at most `capacity` unread samples, discarding the oldest.
    ///
    /// The capacity is rounded up to the next power of two.
    DropOldest { capacity: usize },
}

impl ChannelPolicy {
    /// `0` means unbounded, anything else a drop-oldest ring of that size.
    pub fn from_capacity(capacity: usize) -> Self {
        if capacity == 0 {
            ChannelPolicy::Unbounded
        } else {
            ChannelPolicy::DropOldest { capacity }
        }
    }
}

/// Returned by [`SampleSender::push`] once the consumer is gone.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChannelClosed;

/// Producing half, owned by a single probe.
#[derive(Debug)]
pub struct SampleSender {
    inner: SenderInner,
}

#[derive(Debug)]
enum SenderInner {
    Unbounded(mpsc::UnboundedSender<Sample>),
    DropOldest(broadcast::Sender<Sample>),
}

impl SampleSender {
    /// Enqueue a sample without blocking.
    pub fn push(&self, sample: Sample) -> Result<(), ChannelClosed> {
        match &self.inner {
            SenderInner::Unbounded(tx) => tx.send(sample).map_err(|_| ChannelClosed),
            SenderInner::DropOldest(tx) => tx.send(sample).map(|_| ()).map_err(|_| ChannelClosed),
        }
    }
}

/// Consuming half, owned by the coordinator.
///
/// Not `Clone`: a channel has exactly one consumer, so no two consumers can
/// ever dequeue the same sample.
#[derive(Debug)]
pub struct SampleChannel {
    inner: ReceiverInner,
    dropped: u64,
    closed: bool,
}

#[derive(Debug)]
enum ReceiverInner {
    Unbounded(mpsc::UnboundedReceiver<Sample>),
    DropOldest(broadcast::Receiver<Sample>),
}

impl SampleChannel {
    /// Create a channel pair.
    ///
    /// Returns (sender, channel) where the sender goes to the probe and the
    /// channel stays with the coordinator.
    pub fn create(policy: ChannelPolicy) -> (SampleSender, Self) {
        let (sender, receiver) = match policy {
            ChannelPolicy::Unbounded => {
                let (tx, rx) = mpsc::unbounded_channel();
                (SenderInner::Unbounded(tx), ReceiverInner::Unbounded(rx))
            }
            ChannelPolicy::DropOldest { capacity } => {
                let (tx, rx) = broadcast::channel(capacity.max(1));
                (SenderInner::DropOldest(tx), ReceiverInner::DropOldest(rx))
            }
        };

        (
            SampleSender { inner: sender },
            Self {
                inner: receiver,
                dropped: 0,
                closed: false,
            },
        )
    }

    /// Drain every sample available right now, in the order it was pushed.
    ///
    /// Never blocks. Returns an empty Vec when nothing is queued. Takes at
    /// most one sample beyond what was queued on entry, so a producer that
    /// keeps pushing cannot hold the drain open.
    pub fn try_pop_all(&mut self) -> Vec<Sample> {
        let mut drained = Vec::new();
        match &mut self.inner {
            ReceiverInner::Unbounded(rx) => {
                for _ in 0..=rx.len() {
                    match rx.try_recv() {
                        Ok(sample) => drained.push(sample),
                        Err(mpsc::error::TryRecvError::Empty) => break,
                        Err(mpsc::error::TryRecvError::Disconnected) => {
                            self.closed = true;
                            break;
                        }
                    }
                }
            }
            ReceiverInner::DropOldest(rx) => {
                // `len` counts lagged samples too, so the budget covers the skip
                for _ in 0..=rx.len() {
                    match rx.try_recv() {
                        Ok(sample) => drained.push(sample),
                        Err(broadcast::error::TryRecvError::Empty) => break,
                        Err(broadcast::error::TryRecvError::Lagged(skipped)) => {
                            tracing::debug!(skipped, "Sample channel full, dropped oldest samples");
                            self.dropped += skipped;
                        }
                        Err(broadcast::error::TryRecvError::Closed) => {
                            self.closed = true;
                            break;
                        }
                    }
                }
            }
        }
        drained
    }

    /// Advisory emptiness check; may race with the producer.
    pub fn is_empty(&self) -> bool {
        match &self.inner {
            ReceiverInner::Unbounded(rx) => rx.is_empty(),
            ReceiverInner::DropOldest(rx) => rx.is_empty(),
        }
    }

    /// Samples discarded by the drop-oldest policy so far.
    pub fn dropped(&self) -> u64 {
        self.dropped
    }

    /// Whether a drain has observed the producer hanging up.
    pub fn is_closed(&self) -> bool {
        self.closed
    }
}
