//! Message service run by every baseband image.
//!
//! Handles the protocol messages the core itself owns and passes the rest to
//! the image's own handler:
//!
//! - `Shutdown`: acknowledge with `ReadyForSwitch` and stop servicing
//! - `ModuleId { query: true }`: answer with the image signature

use messaging::shared_memory::{APPLICATION_QUEUE_DEPTH, BASEBAND_QUEUE_DEPTH};
use messaging::{Consumer, Message, ModuleId, Outbox, PanicSlot, ReadyForSwitch};
use platform::CoreSignal;

/// Result of one service pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ServiceOutcome {
    /// Queue drained; keep running.
    Running {
        /// Messages handled this pass.
        handled: u32,
    },
    /// `Shutdown` received and acknowledged; the image must stop.
    Stopped,
}

/// Baseband end of the shared queues.
pub struct BasebandService<'a, S: CoreSignal> {
    inbox: Consumer<'a, BASEBAND_QUEUE_DEPTH>,
    outbox: Outbox<'a, S, APPLICATION_QUEUE_DEPTH>,
    panic: &'a PanicSlot,
    signature: [u8; 16],
    stopped: bool,
}

impl<'a, S: CoreSignal> BasebandService<'a, S> {
    /// Service for an image identifying itself with `signature`.
    pub fn new(
        inbox: Consumer<'a, BASEBAND_QUEUE_DEPTH>,
        outbox: Outbox<'a, S, APPLICATION_QUEUE_DEPTH>,
        panic: &'a PanicSlot,
        signature: [u8; 16],
    ) -> Self {
        Self { inbox, outbox, panic, signature, stopped: false }
    }

    /// Send a message to the application core.
    pub fn send(&self, message: impl Into<Message>) -> bool {
        self.outbox.send(message)
    }

    /// Report an unrecoverable fault; the application core halts its loop.
    pub fn fault(&self, message: &str) {
        self.panic.report(message);
        // Wake the application so it notices.
        self.outbox.notify();
    }

    /// Drain the inbox, handling protocol messages and passing others to
    /// `forward`.
    pub fn service(&mut self, mut forward: impl FnMut(&Message)) -> ServiceOutcome {
        if self.stopped {
            return ServiceOutcome::Stopped;
        }
        let mut handled: u32 = 0;
        while let Some(envelope) = self.inbox.pop() {
            handled = handled.wrapping_add(1);
            let Some(message) = Message::from_envelope(&envelope) else {
                continue;
            };
            match message {
                Message::Shutdown(_) => {
                    self.stopped = true;
                    // The application waits for this; retry is its job.
                    if !self.outbox.send(ReadyForSwitch) {
                        self.panic.report("ReadyForSwitch dropped");
                    }
                    return ServiceOutcome::Stopped;
                }
                Message::ModuleId(ModuleId { query: true, .. }) => {
                    self.outbox.send(ModuleId { query: false, signature: self.signature });
                }
                other => forward(&other),
            }
        }
        ServiceOutcome::Running { handled }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
mod tests {
    use super::*;
    use messaging::{FreqChangeCommand, MessageId, SharedMemory};
    use platform::mocks::CountingSignal;

    const SIGNATURE: [u8; 16] = *b"PNFM-test-image!";

    #[test]
    fn answers_module_id_and_forwards_the_rest() {
        let shared = SharedMemory::new();
        let signal = CountingSignal::new();
        let app = shared.application_port().unwrap();
        let bb = shared.baseband_port().unwrap();
        let mut service =
            BasebandService::new(bb.inbox, Outbox::new(bb.to_application, &signal), &shared.baseband_panic, SIGNATURE);

        app.to_baseband.post(&ModuleId { query: true, signature: [0; 16] }.into());
        app.to_baseband.post(&FreqChangeCommand { frequency_hz: 433_920_000 }.into());
        let mut forwarded = Vec::new();
        assert_eq!(service.service(|m| forwarded.push(m.id())), ServiceOutcome::Running { handled: 2 });
        assert_eq!(forwarded, [MessageId::FreqChangeCommand]);

        let reply = Message::from_envelope(&app.inbox.pop().unwrap()).unwrap();
        assert_eq!(reply, Message::ModuleId(ModuleId { query: false, signature: SIGNATURE }));
        assert_eq!(signal.count(), 1);
    }

    #[test]
    fn shutdown_is_acknowledged_and_sticks() {
        let shared = SharedMemory::new();
        let app = shared.application_port().unwrap();
        let bb = shared.baseband_port().unwrap();
        let mut service = BasebandService::new(
            bb.inbox,
            Outbox::new(bb.to_application, CountingSignal::new()),
            &shared.baseband_panic,
            SIGNATURE,
        );

        app.to_baseband.post(&messaging::Shutdown.into());
        app.to_baseband.post(&FreqChangeCommand { frequency_hz: 1 }.into());
        assert_eq!(service.service(|_| panic!("nothing forwarded")), ServiceOutcome::Stopped);
        assert_eq!(service.service(|_| panic!("nothing forwarded")), ServiceOutcome::Stopped);
        let ack = Message::from_envelope(&app.inbox.pop().unwrap()).unwrap();
        assert_eq!(ack.id(), MessageId::ReadyForSwitch);
    }

    #[test]
    fn fault_sets_the_panic_slot() {
        let shared = SharedMemory::new();
        let bb = shared.baseband_port().unwrap();
        let signal = CountingSignal::new();
        let service =
            BasebandService::new(bb.inbox, Outbox::new(bb.to_application, &signal), &shared.baseband_panic, SIGNATURE);
        service.fault("dma underrun");
        assert_eq!(shared.baseband_panic.message().unwrap().as_str(), "dma underrun");
        assert_eq!(signal.count(), 1);
    }
}
