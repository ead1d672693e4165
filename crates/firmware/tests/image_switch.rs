//! Baseband image switch handshake across both queue directions.
//!
//! Run with: cargo test -p firmware --test image_switch
#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic, clippy::indexing_slicing)]

use firmware::{BasebandService, ImageSwitch, ServiceOutcome};
use loader::{BasebandLoader, LoadOutcome};
use messaging::{
    EventDispatcher, EventFlags, EventMask, FreqChangeCommand, Message, MessageId, MessageRegistry,
    ModuleId, Outbox, SharedMemory,
};
use platform::mocks::{MockBasebandCore, MockImageStore};
use platform::ImageTag;

#[test]
fn switch_waits_for_ready_then_loads() {
    let shared = SharedMemory::new();
    let flags = EventFlags::new();
    let app = shared.application_port().unwrap();
    let bb = shared.baseband_port().unwrap();
    let mut service = BasebandService::new(
        bb.inbox,
        Outbox::new(bb.to_application, flags.signal(EventMask::APPLICATION)),
        &shared.baseband_panic,
        *b"PNFM-signature!!",
    );

    let mut images = MockImageStore::new();
    images.insert(ImageTag::WFM_AUDIO, &[3; 128]);
    let mut baseband = BasebandLoader::new(images, MockBasebandCore::new(1024));

    let switch = ImageSwitch::new(Outbox::new(app.to_baseband, platform::mocks::CountingSignal::new()));
    let on_ready = |m: &Message| switch.on_message(m);
    let registry: MessageRegistry<'_, Message, 4> = MessageRegistry::new();
    let _ready = registry.register(MessageId::ReadyForSwitch, &on_ready);
    let mut dispatcher =
        EventDispatcher::new(&registry, &flags, app.inbox, app.local_inbox, &shared.baseband_panic);

    assert!(switch.request(ImageTag::WFM_AUDIO));
    assert!(switch.complete(&mut baseband).is_none());

    // The baseband answers on its next service pass.
    assert_eq!(service.service(|_| {}), ServiceOutcome::Stopped);
    dispatcher.dispatch(flags.take());

    assert_eq!(switch.complete(&mut baseband).unwrap().unwrap(), LoadOutcome::Loaded { bytes: 128 });
    assert_eq!(baseband.running(), Some(ImageTag::WFM_AUDIO));
    assert_eq!(baseband.core().memory()[..128], [3; 128]);
}

#[test]
fn module_id_round_trip() {
    let shared = SharedMemory::new();
    let flags = EventFlags::new();
    let app = shared.application_port().unwrap();
    let bb = shared.baseband_port().unwrap();
    let mut service = BasebandService::new(
        bb.inbox,
        Outbox::new(bb.to_application, flags.signal(EventMask::APPLICATION)),
        &shared.baseband_panic,
        *b"PAMA-signature!!",
    );
    let to_baseband = Outbox::new(app.to_baseband, flags.signal(EventMask::NONE));

    let reply = core::cell::Cell::new(None::<ModuleId>);
    let forwarded = core::cell::Cell::new(0u32);
    let on_id = |m: &Message| {
        if let Message::ModuleId(id) = m {
            reply.set(Some(*id));
        }
    };
    let registry: MessageRegistry<'_, Message, 4> = MessageRegistry::new();
    let _id = registry.register(MessageId::ModuleId, &on_id);
    let mut dispatcher =
        EventDispatcher::new(&registry, &flags, app.inbox, app.local_inbox, &shared.baseband_panic);

    to_baseband.send(ModuleId { query: true, signature: [0; 16] });
    to_baseband.send(FreqChangeCommand { frequency_hz: 145_500_000 });
    let outcome = service.service(|m| {
        assert_eq!(m.id(), MessageId::FreqChangeCommand);
        forwarded.set(forwarded.get().wrapping_add(1));
    });
    assert_eq!(outcome, ServiceOutcome::Running { handled: 2 });
    assert_eq!(forwarded.get(), 1);

    dispatcher.dispatch(flags.take());
    assert_eq!(reply.get(), Some(ModuleId { query: false, signature: *b"PAMA-signature!!" }));
}

#[test]
fn baseband_fault_halts_the_application_loop() {
    let shared = SharedMemory::new();
    let flags = EventFlags::new();
    let app = shared.application_port().unwrap();
    let bb = shared.baseband_port().unwrap();
    let service = BasebandService::new(
        bb.inbox,
        Outbox::new(bb.to_application, flags.signal(EventMask::APPLICATION)),
        &shared.baseband_panic,
        [0; 16],
    );
    let registry: MessageRegistry<'_, Message, 4> = MessageRegistry::new();
    let mut dispatcher =
        EventDispatcher::new(&registry, &flags, app.inbox, app.local_inbox, &shared.baseband_panic);

    service.fault("fifo overrun");
    assert_eq!(dispatcher.dispatch(flags.take()), messaging::DispatchOutcome::Halted);
    assert_eq!(dispatcher.panic_message().unwrap().as_str(), "fifo overrun");
}
