use kff_derive::subscriber;
use kff_event_bus::{Event, StaticSubscriber, Subscriber};

#[derive(Debug, Default, Event)]
struct TickEvent;

#[derive(Debug, Default)]
struct Clock;

#[derive(Debug)]
struct Failed;

impl std::fmt::Display for Failed {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("failed")
    }
}

impl std::error::Error for Failed {}

#[subscriber]
impl Clock {
    #[subscribe_event(priority = High)]
    fn on_tick(&self, _event: &mut TickEvent) {}

    #[subscribe_event(priority = Lowest, receive_cancelled)]
    fn on_tick_checked(&self, _event: &mut TickEvent) -> Result<(), Failed> {
        Ok(())
    }

    #[subscribe_event]
    fn on_any_tick(_event: &mut TickEvent) {}
}

// Not `Send`: static handlers never need an instance.
#[derive(Debug)]
struct Sundial(std::rc::Rc<()>);

#[subscriber]
impl Sundial {
    #[subscribe_event(priority = Low)]
    fn on_tick(_event: &mut TickEvent) {}
}

fn main() {
    assert_eq!(<Clock as Subscriber>::handlers().len(), 2);
    assert_eq!(<Clock as StaticSubscriber>::static_handlers().len(), 1);
    assert_eq!(<Sundial as StaticSubscriber>::static_handlers().len(), 1);
    let _ = Sundial(std::rc::Rc::new(()));
}
