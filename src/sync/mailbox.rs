//! Bounded, interrupt safe message box drained once per cycle.

use core::cell::RefCell;

use critical_section::Mutex;
use heapless::{Deque, Vec};

/// The mailbox is full; the rejected message is handed back
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MailboxFull<T>(pub T);

/// Fixed capacity FIFO guarded by a critical section
///
/// Producers may post from any context. The consumer takes everything
/// pending at once with [`Mailbox::drain_into`].
pub struct Mailbox<T, const SIZE: usize> {
    inner: Mutex<RefCell<Deque<T, SIZE>>>,
}

impl<T, const SIZE: usize> Mailbox<T, SIZE> {
    pub const fn new() -> Self {
        Self {
            inner: Mutex::new(RefCell::new(Deque::new())),
        }
    }

    pub fn post(&self, message: T) -> Result<(), MailboxFull<T>> {
        critical_section::with(|cs| {
            self.inner
                .borrow(cs)
                .borrow_mut()
                .push_back(message)
                .map_err(MailboxFull)
        })
    }

    /// Move pending messages into `out`, oldest first, until it is full
    pub fn drain_into<const N: usize>(&self, out: &mut Vec<T, N>) {
        critical_section::with(|cs| {
            let mut queue = self.inner.borrow(cs).borrow_mut();
            while !out.is_full() {
                let Some(message) = queue.pop_front() else {
                    break;
                };
                // Cannot fail, `out` has room.
                let _ = out.push(message);
            }
        });
    }

    pub fn len(&self) -> usize {
        critical_section::with(|cs| self.inner.borrow(cs).borrow().len())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drop everything pending
    pub fn clear(&self) {
        critical_section::with(|cs| self.inner.borrow(cs).borrow_mut().clear());
    }
}

impl<T, const SIZE: usize> Default for Mailbox<T, SIZE> {
    fn default() -> Self {
        Self::new()
    }
}
