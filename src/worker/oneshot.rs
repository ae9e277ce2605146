//! One-shot reply channel
//!
//! A single-value rendezvous over `Mutex` + `Condvar`. The sending side is
//! consumed by `send`, so a reply is resolved exactly once; dropping an
//! unused sender closes the channel and wakes the receiver with an error
//! instead of leaving it blocked forever.

use std::sync::{Arc, Condvar, Mutex};

#[derive(Debug)]
enum Slot<T> {
    Empty,
    Value(T),
    Closed,
}

#[derive(Debug)]
struct Shared<T> {
    slot: Mutex<Slot<T>>,
    ready: Condvar,
}

/// Sending half. Consumed by [`send`](Sender::send).
#[derive(Debug)]
pub struct Sender<T> {
    shared: Arc<Shared<T>>,
}

/// Receiving half. Consumed by [`recv`](Receiver::recv).
#[derive(Debug)]
pub struct Receiver<T> {
    shared: Arc<Shared<T>>,
}

/// The reply side went away without sending.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("one-shot channel closed without a value")]
pub struct RecvError;

pub fn channel<T>() -> (Sender<T>, Receiver<T>) {
    let shared = Arc::new(Shared {
        slot: Mutex::new(Slot::Empty),
        ready: Condvar::new(),
    });
    (
        Sender {
            shared: Arc::clone(&shared),
        },
        Receiver { shared },
    )
}

impl<T> Sender<T> {
    /// Deliver the value and wake the receiver. Returns the value back if
    /// the receiver is already gone.
    pub fn send(self, value: T) -> Result<(), T> {
        let mut slot = match self.shared.slot.lock() {
            Ok(slot) => slot,
            Err(poisoned) => poisoned.into_inner(),
        };
        match &*slot {
            Slot::Empty => {
                *slot = Slot::Value(value);
                drop(slot);
                self.shared.ready.notify_one();
                Ok(())
            }
            _ => Err(value),
        }
    }
}

impl<T> Drop for Sender<T> {
    fn drop(&mut self) {
        let mut slot = match self.shared.slot.lock() {
            Ok(slot) => slot,
            Err(poisoned) => poisoned.into_inner(),
        };
        if matches!(*slot, Slot::Empty) {
            *slot = Slot::Closed;
            drop(slot);
            self.shared.ready.notify_one();
        }
    }
}

impl<T> Receiver<T> {
    /// Block until the value arrives or the sender is dropped.
    pub fn recv(self) -> Result<T, RecvError> {
        let mut slot = match self.shared.slot.lock() {
            Ok(slot) => slot,
            Err(poisoned) => poisoned.into_inner(),
        };
        loop {
            match std::mem::replace(&mut *slot, Slot::Empty) {
                Slot::Value(value) => return Ok(value),
                Slot::Closed => return Err(RecvError),
                Slot::Empty => {
                    slot = match self.shared.ready.wait(slot) {
                        Ok(slot) => slot,
                        Err(poisoned) => poisoned.into_inner(),
                    };
                }
            }
        }
    }

    /// Non-blocking probe: the value if it has arrived.
    pub fn try_recv(&self) -> Option<Result<T, RecvError>> {
        let mut slot = match self.shared.slot.lock() {
            Ok(slot) => slot,
            Err(poisoned) => poisoned.into_inner(),
        };
        match std::mem::replace(&mut *slot, Slot::Empty) {
            Slot::Value(value) => Some(Ok(value)),
            Slot::Closed => {
                *slot = Slot::Closed;
                Some(Err(RecvError))
            }
            Slot::Empty => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;
    use std::time::Duration;

    #[test]
    fn value_crosses_threads() {
        let (tx, rx) = channel();
        let handle = thread::spawn(move || {
            thread::sleep(Duration::from_millis(10));
            tx.send(42).unwrap();
        });
        assert_eq!(rx.recv(), Ok(42));
        handle.join().unwrap();
    }

    #[test]
    fn dropping_the_sender_closes_the_channel() {
        let (tx, rx) = channel::<i32>();
        drop(tx);
        assert_eq!(rx.recv(), Err(RecvError));
    }

    #[test]
    fn send_after_receiver_probe_still_delivers() {
        let (tx, rx) = channel();
        assert!(rx.try_recv().is_none());
        tx.send("hi").unwrap();
        assert_eq!(rx.try_recv(), Some(Ok("hi")));
    }
}
