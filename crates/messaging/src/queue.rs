//! Bounded single-producer / single-consumer envelope queue.
//!
//! `MessageQueue<N>` holds up to `N` [`Envelope`]s without heap allocation
//! and is `const`-constructible, so it can live in the shared-memory block.
//! The producer and consumer may run on different cores or in different
//! execution contexts (ISR vs thread).
//!
//! # Ordering
//!
//! Envelopes are consumed in exactly the order they were pushed. The
//! producer writes the slot, then publishes it by storing `head` with
//! `Release`; the consumer loads `head` with `Acquire` before reading the
//! slot, so it never observes a partially written envelope. The consumer
//! frees a slot the same way through `tail`.
//!
//! # Overflow
//!
//! A push into a full queue never waits: the new envelope is dropped and
//! counted. A stalled producer on the signal-processing path costs more
//! than a missed UI update.
//!
//! # Constraints
//!
//! - `N` must be a power of two (checked at compile time).
//! - Only atomic loads and stores are used (no read-modify-write), which the
//!   Cortex-M0 baseband core supports.

use core::cell::UnsafeCell;
use core::sync::atomic::{AtomicBool, AtomicU32, Ordering};

use platform::CoreSignal;

use crate::message::{Envelope, Message};

/// Fixed-capacity SPSC queue of envelopes.
#[repr(C)]
pub struct MessageQueue<const N: usize> {
    /// Next slot to write (written by the producer only).
    head: AtomicU32,
    /// Next slot to read (written by the consumer only).
    tail: AtomicU32,
    /// Envelopes dropped on overflow (written by the producer only).
    dropped: AtomicU32,
    producer_taken: AtomicBool,
    consumer_taken: AtomicBool,
    slots: UnsafeCell<[Envelope; N]>,
}

// SAFETY: slot access is partitioned by the head/tail protocol. A slot is
// written only by the single producer while it is outside [tail, head), and
// read only by the single consumer while it is inside. Producer and consumer
// handles are unique (claimed once each).
unsafe impl<const N: usize> Sync for MessageQueue<N> {}

impl<const N: usize> MessageQueue<N> {
    const CAPACITY_OK: () = assert!(N > 0 && N.is_power_of_two() && N <= (u32::MAX as usize));

    /// Create an empty queue.
    #[allow(clippy::let_unit_value)]
    pub const fn new() -> Self {
        let () = Self::CAPACITY_OK;
        Self {
            head: AtomicU32::new(0),
            tail: AtomicU32::new(0),
            dropped: AtomicU32::new(0),
            producer_taken: AtomicBool::new(false),
            consumer_taken: AtomicBool::new(false),
            slots: UnsafeCell::new([Envelope::EMPTY; N]),
        }
    }

    /// Claim the producer end. Returns `None` if already claimed.
    pub fn producer(&self) -> Option<Producer<'_, N>> {
        claim(&self.producer_taken).then_some(Producer { queue: self })
    }

    /// Claim the consumer end. Returns `None` if already claimed.
    pub fn consumer(&self) -> Option<Consumer<'_, N>> {
        claim(&self.consumer_taken).then_some(Consumer { queue: self })
    }

    /// Maximum number of queued envelopes.
    pub const fn capacity(&self) -> usize {
        N
    }

    /// Number of envelopes currently queued.
    pub fn len(&self) -> usize {
        let head = self.head.load(Ordering::Acquire);
        let tail = self.tail.load(Ordering::Acquire);
        head.wrapping_sub(tail) as usize
    }

    /// `true` when nothing is queued.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Envelopes dropped because the queue was full.
    pub fn dropped(&self) -> u32 {
        self.dropped.load(Ordering::Relaxed)
    }

    #[allow(clippy::cast_possible_truncation)] // N <= u32::MAX checked by CAPACITY_OK
    const fn capacity_u32() -> u32 {
        N as u32
    }

    fn slot(&self, index: u32) -> *mut Envelope {
        // N is a power of two, so masking wraps the free-running index.
        let i = (index as usize) & (N.wrapping_sub(1));
        // SAFETY: i < N, so the offset stays inside the slot array.
        unsafe { self.slots.get().cast::<Envelope>().add(i) }
    }
}

impl<const N: usize> Default for MessageQueue<N> {
    fn default() -> Self {
        Self::new()
    }
}

/// Set `flag` if clear; `true` if this call set it.
///
/// Load and store inside a critical section rather than `swap`, which the
/// M0 lacks. Each end is only ever claimed from its own core.
fn claim(flag: &AtomicBool) -> bool {
    critical_section::with(|_| {
        if flag.load(Ordering::Relaxed) {
            false
        } else {
            flag.store(true, Ordering::Relaxed);
            true
        }
    })
}

/// The write end of a [`MessageQueue`].
pub struct Producer<'q, const N: usize> {
    queue: &'q MessageQueue<N>,
}

impl<const N: usize> Producer<'_, N> {
    /// Enqueue a raw envelope.
    ///
    /// Returns `false` and counts a drop if the queue is full.
    pub fn push(&self, envelope: &Envelope) -> bool {
        let q = self.queue;
        let head = q.head.load(Ordering::Relaxed);
        let tail = q.tail.load(Ordering::Acquire);
        if head.wrapping_sub(tail) >= MessageQueue::<N>::capacity_u32() {
            let dropped = q.dropped.load(Ordering::Relaxed).wrapping_add(1);
            q.dropped.store(dropped, Ordering::Relaxed);
            warn!("message queue full, dropped newest ({} total)", dropped);
            return false;
        }
        // SAFETY: slot `head` is outside [tail, head) so the consumer does
        // not touch it until the Release store below publishes it.
        unsafe { q.slot(head).write(*envelope) };
        q.head.store(head.wrapping_add(1), Ordering::Release);
        true
    }

    /// Encode and enqueue a message. See [`Producer::push`].
    pub fn post(&self, message: &Message) -> bool {
        self.push(&message.to_envelope())
    }

    /// `true` if a push would be dropped right now.
    pub fn is_full(&self) -> bool {
        self.queue.len() >= N
    }
}

/// The read end of a [`MessageQueue`].
pub struct Consumer<'q, const N: usize> {
    queue: &'q MessageQueue<N>,
}

impl<const N: usize> Consumer<'_, N> {
    /// Dequeue the oldest envelope.
    pub fn pop(&self) -> Option<Envelope> {
        let q = self.queue;
        let tail = q.tail.load(Ordering::Relaxed);
        let head = q.head.load(Ordering::Acquire);
        if head == tail {
            return None;
        }
        // SAFETY: slot `tail` is inside [tail, head): fully written and
        // published by the producer's Release store, which the Acquire load
        // of `head` above synchronises with.
        let envelope = unsafe { q.slot(tail).read() };
        q.tail.store(tail.wrapping_add(1), Ordering::Release);
        Some(envelope)
    }

    /// `true` when nothing is queued.
    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    /// Envelopes the producer dropped on overflow.
    pub fn dropped(&self) -> u32 {
        self.queue.dropped()
    }
}

/// A producer paired with the signal that wakes its consumer.
///
/// This is the sending half of the core bridge: after an envelope is
/// published the consumer side is notified (inter-core interrupt or local
/// event flag). Nothing is signalled for a dropped message.
pub struct Outbox<'q, S: CoreSignal, const N: usize> {
    producer: Producer<'q, N>,
    signal: S,
}

impl<'q, S: CoreSignal, const N: usize> Outbox<'q, S, N> {
    /// Pair `producer` with `signal`.
    pub fn new(producer: Producer<'q, N>, signal: S) -> Self {
        Self { producer, signal }
    }

    /// Enqueue `message` and wake the consumer.
    ///
    /// Returns `false` if the message was dropped.
    pub fn send(&self, message: impl Into<Message>) -> bool {
        let sent = self.producer.post(&message.into());
        if sent {
            self.signal.notify();
        }
        sent
    }

    /// Wake the consumer without enqueuing anything.
    pub fn notify(&self) {
        self.signal.notify();
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
mod tests {
    use super::*;
    use crate::message::{FifoSignal, TxProgress};
    use platform::mocks::CountingSignal;

    #[test]
    fn ends_can_only_be_claimed_once() {
        let q: MessageQueue<4> = MessageQueue::new();
        let _p = q.producer().unwrap();
        let _c = q.consumer().unwrap();
        assert!(q.producer().is_none());
        assert!(q.consumer().is_none());
    }

    #[test]
    fn full_queue_drops_newest_and_counts() {
        let q: MessageQueue<2> = MessageQueue::new();
        let p = q.producer().unwrap();
        let c = q.consumer().unwrap();
        for i in 0..4u8 {
            let accepted = p.post(&FifoSignal { signal_type: i }.into());
            assert_eq!(accepted, i < 2);
        }
        assert_eq!(c.dropped(), 2);
        let first = Message::from_envelope(&c.pop().unwrap()).unwrap();
        let second = Message::from_envelope(&c.pop().unwrap()).unwrap();
        assert_eq!(first, FifoSignal { signal_type: 0 }.into());
        assert_eq!(second, FifoSignal { signal_type: 1 }.into());
        assert!(c.pop().is_none());
        // Space again after draining.
        assert!(p.post(&FifoSignal { signal_type: 9 }.into()));
    }

    #[test]
    fn indices_wrap_past_u32_max() {
        let q: MessageQueue<4> = MessageQueue::new();
        q.head.store(u32::MAX - 1, Ordering::Relaxed);
        q.tail.store(u32::MAX - 1, Ordering::Relaxed);
        let p = q.producer().unwrap();
        let c = q.consumer().unwrap();
        for n in 0..4 {
            assert!(p.post(&TxProgress { progress: n, done: false }.into()));
        }
        assert!(p.is_full());
        for n in 0..4 {
            let m = Message::from_envelope(&c.pop().unwrap()).unwrap();
            assert_eq!(m, TxProgress { progress: n, done: false }.into());
        }
        assert!(c.is_empty());
    }

    #[test]
    fn outbox_signals_only_accepted_messages() {
        let q: MessageQueue<1> = MessageQueue::new();
        let signal = CountingSignal::new();
        let outbox = Outbox::new(q.producer().unwrap(), &signal);
        assert!(outbox.send(FifoSignal { signal_type: 1 }));
        assert!(!outbox.send(FifoSignal { signal_type: 2 }));
        assert_eq!(signal.count(), 1);
        assert_eq!(q.dropped(), 1);
    }

    #[test]
    fn producer_and_consumer_on_different_threads_preserve_order() {
        static Q: MessageQueue<8> = MessageQueue::new();
        const COUNT: u32 = 10_000;
        let producer = std::thread::spawn(|| {
            let p = Q.producer().unwrap();
            let mut n = 0;
            while n < COUNT {
                if p.post(&TxProgress { progress: n, done: false }.into()) {
                    n += 1;
                } else {
                    std::thread::yield_now();
                }
            }
        });
        let c = Q.consumer().unwrap();
        let mut expected = 0;
        while expected < COUNT {
            match c.pop() {
                Some(env) => {
                    let m = Message::from_envelope(&env).unwrap();
                    assert_eq!(m, TxProgress { progress: expected, done: false }.into());
                    expected += 1;
                }
                None => std::thread::yield_now(),
            }
        }
        producer.join().unwrap();
    }
}
