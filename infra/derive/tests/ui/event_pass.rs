use kff_event_bus::{Event, EventType, MarkerType};

trait ModBusEvent {}

#[derive(Debug, Default, Event)]
#[event(cancelable, marker = ModBusEvent)]
struct ChatEvent {
    message: String,
    #[event(canceled)]
    canceled: bool,
}

impl ModBusEvent for ChatEvent {}

#[derive(Debug, Event)]
struct RegistryEvent(#[event(generic)] EventType);

fn main() {
    let mut chat = ChatEvent { message: "hi".to_owned(), canceled: false };
    assert!(chat.is_cancelable());
    chat.set_canceled(true).unwrap();
    assert!(chat.is_canceled());
    assert_eq!(chat.message, "hi");

    let marker = MarkerType::of::<dyn ModBusEvent>().unwrap();
    assert!(ChatEvent::is_marked(&marker));
    assert!(!RegistryEvent::is_marked(&marker));

    let registry = RegistryEvent(EventType::of::<u32>());
    assert_eq!(registry.generic_type(), Some(EventType::of::<u32>()));
}
