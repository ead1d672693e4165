//! Image switch handshake, application side.
//!
//! Before the baseband core is halted for a new image the running image is
//! asked to stop with [`Shutdown`] and answers with `ReadyForSwitch` once it
//! has released its buffers. The switch itself happens from the event loop
//! after the acknowledgement has been dispatched.
//!
//! ```text
//! request(tag) ── Shutdown ──▶ baseband
//!                              baseband ── ReadyForSwitch ──▶ on_message()
//! take_ready() -> Some(tag) ── BasebandLoader::run_image(tag)
//! ```

use core::cell::Cell;

use loader::{BasebandError, BasebandLoader, LoadOutcome};
use messaging::shared_memory::BASEBAND_QUEUE_DEPTH;
use messaging::{Message, Outbox, Shutdown};
use platform::{BasebandCore, CoreSignal, ImageStore, ImageTag};

/// Tracks one pending image switch.
pub struct ImageSwitch<'q, S: CoreSignal> {
    outbox: Outbox<'q, S, BASEBAND_QUEUE_DEPTH>,
    pending: Cell<Option<ImageTag>>,
    ready: Cell<bool>,
}

impl<'q, S: CoreSignal> ImageSwitch<'q, S> {
    /// Send requests through `outbox` (the application → baseband queue).
    pub fn new(outbox: Outbox<'q, S, BASEBAND_QUEUE_DEPTH>) -> Self {
        Self { outbox, pending: Cell::new(None), ready: Cell::new(false) }
    }

    /// Ask the running image to stop so `tag` can replace it.
    ///
    /// A later request replaces an unacknowledged one. Returns `false` if
    /// the baseband queue was full.
    pub fn request(&self, tag: ImageTag) -> bool {
        if !self.outbox.send(Shutdown) {
            warn!("baseband queue full, switch to {} not requested", tag);
            return false;
        }
        self.pending.set(Some(tag));
        self.ready.set(false);
        true
    }

    /// Registry handler for `ReadyForSwitch`.
    pub fn on_message(&self, message: &Message) {
        if matches!(message, Message::ReadyForSwitch(_)) && self.pending.get().is_some() {
            self.ready.set(true);
        }
    }

    /// The tag to load, once the baseband has acknowledged.
    pub fn take_ready(&self) -> Option<ImageTag> {
        if self.ready.replace(false) {
            self.pending.take()
        } else {
            None
        }
    }

    /// Load the acknowledged image, if the baseband has answered.
    pub fn complete<I: ImageStore, C: BasebandCore>(
        &self,
        baseband: &mut BasebandLoader<I, C>,
    ) -> Option<Result<LoadOutcome, BasebandError<I::Error>>> {
        let tag = self.take_ready()?;
        info!("switching baseband to {}", tag);
        Some(baseband.run_image_forced(tag))
    }

    /// Tag requested but not yet acknowledged.
    pub fn pending(&self) -> Option<ImageTag> {
        self.pending.get()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
mod tests {
    use super::*;
    use messaging::{MessageId, ReadyForSwitch, SharedMemory};
    use platform::mocks::{CountingSignal, MockBasebandCore, MockImageStore};

    #[test]
    fn ack_releases_the_pending_tag_once() {
        let shared = SharedMemory::new();
        let signal = CountingSignal::new();
        let app = shared.application_port().unwrap();
        let bb = shared.baseband_port().unwrap();
        let switch = ImageSwitch::new(Outbox::new(app.to_baseband, &signal));

        assert!(switch.request(ImageTag::AM_AUDIO));
        assert_eq!(signal.count(), 1);
        let sent = Message::from_envelope(&bb.inbox.pop().unwrap()).unwrap();
        assert_eq!(sent.id(), MessageId::Shutdown);

        assert_eq!(switch.take_ready(), None);
        switch.on_message(&ReadyForSwitch.into());
        assert_eq!(switch.take_ready(), Some(ImageTag::AM_AUDIO));
        assert_eq!(switch.take_ready(), None);
    }

    #[test]
    fn complete_loads_only_after_ack() {
        let shared = SharedMemory::new();
        let app = shared.application_port().unwrap();
        let switch = ImageSwitch::new(Outbox::new(app.to_baseband, CountingSignal::new()));
        let mut images = MockImageStore::new();
        images.insert(ImageTag::OOK, &[7; 16]);
        let mut baseband = BasebandLoader::new(images, MockBasebandCore::new(64));

        switch.request(ImageTag::OOK);
        assert!(switch.complete(&mut baseband).is_none());
        assert_eq!(baseband.core().start_count(), 0);

        switch.on_message(&ReadyForSwitch.into());
        assert_eq!(switch.complete(&mut baseband).unwrap().unwrap(), LoadOutcome::Loaded { bytes: 16 });
        assert_eq!(baseband.running(), Some(ImageTag::OOK));
        assert_eq!(switch.pending(), None);
    }

    #[test]
    fn stray_ack_is_ignored() {
        let shared = SharedMemory::new();
        let app = shared.application_port().unwrap();
        let switch = ImageSwitch::new(Outbox::new(app.to_baseband, CountingSignal::new()));
        switch.on_message(&ReadyForSwitch.into());
        assert_eq!(switch.take_ready(), None);
    }
}
