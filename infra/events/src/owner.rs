use std::borrow::Cow;
use std::cell::RefCell;
use std::marker::PhantomData;

thread_local! {
    static ACTIVE: RefCell<Vec<Cow<'static, str>>> = const { RefCell::new(Vec::new()) };
}

/// Scope marking which module is currently wiring up its listeners.
///
/// Listeners registered on this thread while the guard is alive record the
/// module name as their owner. Scopes nest; the innermost one wins.
///
/// ```rust
/// use kff_event_bus::ActiveModule;
///
/// let _scope = ActiveModule::enter("examplemod");
/// assert_eq!(ActiveModule::current().as_deref(), Some("examplemod"));
/// ```
#[must_use = "the module is only active while the guard is alive"]
#[derive(Debug)]
pub struct ActiveModule {
    // Guards pop the thread-local stack, so they must stay on this thread.
    _not_send: PhantomData<*const ()>,
}

impl ActiveModule {
    pub fn enter(name: impl Into<Cow<'static, str>>) -> Self {
        ACTIVE.with_borrow_mut(|stack| stack.push(name.into()));
        Self { _not_send: PhantomData }
    }

    /// Name of the innermost active module on this thread.
    #[must_use]
    pub fn current() -> Option<Cow<'static, str>> {
        ACTIVE.with_borrow(|stack| stack.last().cloned())
    }
}

impl Drop for ActiveModule {
    fn drop(&mut self) {
        ACTIVE.with_borrow_mut(|stack| {
            stack.pop();
        });
    }
}
