//! Change notification fan-out.
//!
//! Listeners are called synchronously, in registration order, before the
//! triggering database call returns. Each pass works on a snapshot of the
//! listener list, so a listener may remove itself (or others) from inside a
//! callback without disturbing the pass in progress.

use std::cell::RefCell;
use std::rc::Rc;

use crate::mail::{MsgFlags, MsgHdr};

/// Receives database change events. Every method defaults to a no-op.
pub trait ChangeListener {
    fn on_header_added(&self, _hdr: &MsgHdr) {}

    fn on_header_deleted(&self, _hdr: &MsgHdr) {}

    fn on_header_flags_changed(&self, _hdr: &MsgHdr, _old: MsgFlags, _new: MsgFlags) {}

    fn on_read_status_changed(&self, _hdr: &MsgHdr) {}

    fn on_header_property_changed(&self, _hdr: &MsgHdr, _property: &str) {}

    fn on_summary_changed(&self) {}

    /// The database is closing; drop any handles to it.
    fn on_announcer_going_away(&self) {}
}

/// The listener that caused a change, which is skipped when announcing it.
pub type Instigator<'a> = Option<&'a Rc<dyn ChangeListener>>;

pub(crate) fn same_listener(a: &Rc<dyn ChangeListener>, b: &Rc<dyn ChangeListener>) -> bool {
    // Compare data pointers only; vtable pointers may differ across codegen units
    std::ptr::eq(Rc::as_ptr(a) as *const (), Rc::as_ptr(b) as *const ())
}

/// Shared, ordered list of change listeners.
///
/// Cloning yields another handle to the same list, which listeners can keep
/// to unregister themselves.
#[derive(Clone, Default)]
pub struct Announcer {
    listeners: Rc<RefCell<Vec<Rc<dyn ChangeListener>>>>,
}

impl Announcer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a listener. Adding the same listener twice is a no-op.
    pub fn add(&self, listener: Rc<dyn ChangeListener>) {
        let mut listeners = self.listeners.borrow_mut();
        if !listeners.iter().any(|l| same_listener(l, &listener)) {
            listeners.push(listener);
        }
    }

    /// Unregister a listener; returns false if it wasn't registered.
    pub fn remove(&self, listener: &Rc<dyn ChangeListener>) -> bool {
        let mut listeners = self.listeners.borrow_mut();
        let before = listeners.len();
        listeners.retain(|l| !same_listener(l, listener));
        listeners.len() != before
    }

    pub fn len(&self) -> usize {
        self.listeners.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.listeners.borrow().is_empty()
    }

    pub(crate) fn clear(&self) {
        self.listeners.borrow_mut().clear();
    }

    fn snapshot(&self) -> Vec<Rc<dyn ChangeListener>> {
        self.listeners.borrow().clone()
    }

    fn notify(&self, instigator: Instigator<'_>, f: impl Fn(&dyn ChangeListener)) {
        for listener in self.snapshot() {
            if instigator.is_some_and(|i| same_listener(i, &listener)) {
                continue;
            }
            f(listener.as_ref());
        }
    }

    pub(crate) fn header_added(&self, hdr: &MsgHdr, instigator: Instigator<'_>) {
        self.notify(instigator, |l| l.on_header_added(hdr));
    }

    pub(crate) fn header_deleted(&self, hdr: &MsgHdr, instigator: Instigator<'_>) {
        self.notify(instigator, |l| l.on_header_deleted(hdr));
    }

    pub(crate) fn flags_changed(
        &self,
        hdr: &MsgHdr,
        old: MsgFlags,
        new: MsgFlags,
        instigator: Instigator<'_>,
    ) {
        self.notify(instigator, |l| l.on_header_flags_changed(hdr, old, new));
    }

    pub(crate) fn read_status_changed(&self, hdr: &MsgHdr, instigator: Instigator<'_>) {
        self.notify(instigator, |l| l.on_read_status_changed(hdr));
    }

    pub(crate) fn property_changed(
        &self,
        hdr: &MsgHdr,
        property: &str,
        instigator: Instigator<'_>,
    ) {
        self.notify(instigator, |l| l.on_header_property_changed(hdr, property));
    }

    pub(crate) fn summary_changed(&self) {
        self.notify(None, |l| l.on_summary_changed());
    }

    pub(crate) fn going_away(&self) {
        self.notify(None, |l| l.on_announcer_going_away());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    #[derive(Default)]
    struct Counter {
        summaries: Cell<u32>,
    }

    impl ChangeListener for Counter {
        fn on_summary_changed(&self) {
            self.summaries.set(self.summaries.get() + 1);
        }
    }

    /// Unregisters itself (and optionally another listener) on the first event.
    struct SelfRemover {
        announcer: Announcer,
        me: RefCell<Option<Rc<dyn ChangeListener>>>,
        other: Option<Rc<dyn ChangeListener>>,
        calls: Cell<u32>,
    }

    impl ChangeListener for SelfRemover {
        fn on_summary_changed(&self) {
            self.calls.set(self.calls.get() + 1);
            if let Some(me) = self.me.borrow_mut().take() {
                self.announcer.remove(&me);
            }
            if let Some(other) = &self.other {
                self.announcer.remove(other);
            }
        }
    }

    #[test]
    fn test_add_is_idempotent() {
        let announcer = Announcer::new();
        let listener: Rc<dyn ChangeListener> = Rc::new(Counter::default());
        announcer.add(listener.clone());
        announcer.add(listener.clone());
        assert_eq!(announcer.len(), 1);
        assert!(announcer.remove(&listener));
        assert!(!announcer.remove(&listener));
        assert!(announcer.is_empty());
    }

    #[test]
    fn test_removal_during_pass_keeps_current_pass_intact() {
        let announcer = Announcer::new();
        let later = Rc::new(Counter::default());
        let later_dyn: Rc<dyn ChangeListener> = later.clone();

        let remover = Rc::new(SelfRemover {
            announcer: announcer.clone(),
            me: RefCell::new(None),
            other: Some(later_dyn.clone()),
            calls: Cell::new(0),
        });
        let remover_dyn: Rc<dyn ChangeListener> = remover.clone();
        *remover.me.borrow_mut() = Some(remover_dyn.clone());

        announcer.add(remover_dyn);
        announcer.add(later_dyn);

        announcer.summary_changed();
        assert_eq!(remover.calls.get(), 1);
        // Removed mid-pass, but the snapshot still delivers this event
        assert_eq!(later.summaries.get(), 1);
        assert!(announcer.is_empty());

        announcer.summary_changed();
        assert_eq!(remover.calls.get(), 1);
        assert_eq!(later.summaries.get(), 1);
    }

    #[test]
    fn test_notify_skips_instigator() {
        let announcer = Announcer::new();
        let first = Rc::new(Counter::default());
        let second = Rc::new(Counter::default());
        let first_dyn: Rc<dyn ChangeListener> = first.clone();
        announcer.add(first_dyn.clone());
        announcer.add(second.clone());

        announcer.notify(Some(&first_dyn), |l| l.on_summary_changed());
        assert_eq!(first.summaries.get(), 0);
        assert_eq!(second.summaries.get(), 1);
    }
}
