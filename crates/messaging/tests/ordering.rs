//! Cross-context ordering through the shared queues and the dispatcher.
#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

use std::cell::RefCell;

use messaging::{
    EventDispatcher, EventFlags, EventMask, FifoSignal, Message, MessageId, MessageRegistry,
    Outbox, SharedMemory, TxProgress,
};
use proptest::prelude::*;

proptest! {
    /// Whatever the producer enqueues, in whatever burst sizes, the
    /// handlers see it in enqueue order.
    #[test]
    fn dispatch_order_matches_enqueue_order(
        values in proptest::collection::vec(any::<u32>(), 0..64),
        burst in 1usize..8,
    ) {
        let seen: RefCell<Vec<u32>> = RefCell::default();
        let on_progress = |m: &Message| {
            if let Message::TxProgress(p) = m {
                seen.borrow_mut().push(p.progress);
            }
        };
        let shared = SharedMemory::new();
        let flags = EventFlags::new();
        let registry: MessageRegistry<'_, Message, 4> = MessageRegistry::new();
        let _reg = registry.register(MessageId::TxProgress, &on_progress);
        let app = shared.application_port().unwrap();
        let baseband = shared.baseband_port().unwrap();
        let outbox = Outbox::new(baseband.to_application, flags.signal(EventMask::APPLICATION));
        let mut dispatcher = EventDispatcher::new(
            &registry, &flags, app.inbox, app.local_inbox, &shared.baseband_panic,
        );

        for chunk in values.chunks(burst) {
            for &progress in chunk {
                let sent = outbox.send(TxProgress { progress, done: false });
                prop_assert!(sent);
            }
            let mask = flags.take();
            dispatcher.dispatch(mask);
        }
        // Drain anything a pass left behind.
        loop {
            let mask = flags.take();
            if mask.is_empty() {
                break;
            }
            dispatcher.dispatch(mask);
        }
        prop_assert_eq!(&*seen.borrow(), &values);
    }
}

#[test]
fn producer_thread_to_consumer_loop_preserves_order() {
    static SHARED: SharedMemory = SharedMemory::new();
    static FLAGS: EventFlags = EventFlags::new();
    const COUNT: u8 = 200;

    let seen: RefCell<Vec<u8>> = RefCell::default();
    let on_fifo = |m: &Message| {
        if let Message::FifoSignal(f) = m {
            seen.borrow_mut().push(f.signal_type);
        }
    };
    let registry: MessageRegistry<'_, Message, 2> = MessageRegistry::new();
    let _reg = registry.register(MessageId::FifoSignal, &on_fifo);
    let app = SHARED.application_port().unwrap();
    let mut dispatcher =
        EventDispatcher::new(&registry, &FLAGS, app.inbox, app.local_inbox, &SHARED.baseband_panic);

    let producer = std::thread::spawn(|| {
        let port = SHARED.baseband_port().unwrap();
        let outbox = Outbox::new(port.to_application, FLAGS.signal(EventMask::APPLICATION));
        for i in 0..COUNT {
            while !outbox.send(FifoSignal { signal_type: i }) {
                std::thread::yield_now();
            }
        }
    });

    while seen.borrow().len() < usize::from(COUNT) {
        let mask = FLAGS.take();
        if mask.is_empty() {
            std::thread::yield_now();
            continue;
        }
        dispatcher.dispatch(mask);
    }
    producer.join().unwrap();
    assert_eq!(*seen.borrow(), (0..COUNT).collect::<Vec<_>>());
}
