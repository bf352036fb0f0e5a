//! Bounded hand-off of decoded samples between the capture and display
//! threads. FIFO order is preserved exactly; the only data loss permitted is
//! the counted best-effort drop on the producer side when the consumer lags.

use crossbeam_channel::{Receiver, Sender, TrySendError};

/// Signals that every sender is gone and the buffer has drained. Cooperative
/// shutdown for the display loop, not an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChannelClosed;

/// Creates a bounded sample channel. Sessions size the capacity to one
/// second of samples at the configured rate.
pub fn channel(capacity: usize) -> (SampleSender, SampleReceiver) {
    let (sender, receiver) = crossbeam_channel::bounded(capacity);
    (SampleSender { inner: sender }, SampleReceiver { inner: receiver })
}

/// Producer half. Cloneable so multiple capture sources could feed one
/// viewer, though sessions wire exactly one.
#[derive(Debug, Clone)]
pub struct SampleSender {
    inner: Sender<i32>,
}

impl SampleSender {
    /// Blocks until space is available. Only appropriate when the producer
    /// is not paced by a real device.
    pub fn send(&self, sample: i32) -> Result<(), ChannelClosed> {
        self.inner.send(sample).map_err(|_| ChannelClosed)
    }

    /// Best-effort send: never blocks the device read loop. Returns
    /// `Ok(false)` when the channel is full and the sample was dropped.
    pub fn offer(&self, sample: i32) -> Result<bool, ChannelClosed> {
        match self.inner.try_send(sample) {
            Ok(()) => Ok(true),
            Err(TrySendError::Full(_)) => Ok(false),
            Err(TrySendError::Disconnected(_)) => Err(ChannelClosed),
        }
    }
}

/// Consumer half.
#[derive(Debug)]
pub struct SampleReceiver {
    inner: Receiver<i32>,
}

impl SampleReceiver {
    /// Blocks until a sample arrives. Samples buffered before the producer
    /// went away remain retrievable; afterwards this returns
    /// [`ChannelClosed`].
    pub fn recv(&self) -> Result<i32, ChannelClosed> {
        self.inner.recv().map_err(|_| ChannelClosed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn preserves_fifo_order() {
        let (sender, receiver) = channel(8);
        for sample in [1, 2, 3] {
            sender.send(sample).unwrap();
        }
        assert_eq!(receiver.recv(), Ok(1));
        assert_eq!(receiver.recv(), Ok(2));
        assert_eq!(receiver.recv(), Ok(3));
    }

    #[test]
    fn offer_drops_when_full() {
        let (sender, receiver) = channel(2);
        assert_eq!(sender.offer(1), Ok(true));
        assert_eq!(sender.offer(2), Ok(true));
        assert_eq!(sender.offer(3), Ok(false));
        // The dropped sample leaves the delivered ones untouched.
        assert_eq!(receiver.recv(), Ok(1));
        assert_eq!(receiver.recv(), Ok(2));
    }

    #[test]
    fn buffered_samples_survive_a_dropped_producer() {
        let (sender, receiver) = channel(4);
        sender.send(7).unwrap();
        sender.send(8).unwrap();
        drop(sender);
        assert_eq!(receiver.recv(), Ok(7));
        assert_eq!(receiver.recv(), Ok(8));
        assert_eq!(receiver.recv(), Err(ChannelClosed));
    }

    #[test]
    fn send_after_receiver_gone_reports_closed() {
        let (sender, receiver) = channel(1);
        drop(receiver);
        assert_eq!(sender.send(1), Err(ChannelClosed));
        assert_eq!(sender.offer(1), Err(ChannelClosed));
    }

    #[test]
    fn order_holds_across_threads() {
        let (sender, receiver) = channel(4);
        let producer = std::thread::spawn(move || {
            for sample in 0..100 {
                sender.send(sample).unwrap();
            }
        });
        for expected in 0..100 {
            assert_eq!(receiver.recv(), Ok(expected));
        }
        producer.join().unwrap();
    }
}
