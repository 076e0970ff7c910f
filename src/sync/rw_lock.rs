//! Async reader/writer lock with writer preference.
//!
//! Readers share the lock: the first reader in takes it, the last one out
//! releases it. A writer excludes everyone. As soon as a writer is waiting, new
//! readers queue behind it, so a steady stream of readers cannot starve it.
//! Waiting writers are admitted in arrival order.
//!
//! `embassy_sync::rwlock::RwLock` gives neither writer preference nor FIFO
//! admission between writers, both of which the config cache relies on.

use core::cell::{RefCell, UnsafeCell};
use core::future::poll_fn;
use core::ops::{Deref, DerefMut};
use core::task::Poll;

use embassy_sync::blocking_mutex::Mutex;
use embassy_sync::blocking_mutex::raw::RawMutex;
use embassy_sync::waitqueue::MultiWakerRegistration;
use heapless::Deque;

const MAX_WAITERS: usize = 8;

struct State {
    readers: usize,
    writer: bool,
    /// Waiting writers, oldest first
    writers: Deque<u32, MAX_WAITERS>,
    next_writer: u32,
    wakers: MultiWakerRegistration<MAX_WAITERS>,
}

pub struct RwLock<M: RawMutex, T> {
    state: Mutex<M, RefCell<State>>,
    value: UnsafeCell<T>,
}

// Access to `value` is serialized by `state`.
unsafe impl<M: RawMutex + Send, T: Send> Send for RwLock<M, T> {}
unsafe impl<M: RawMutex + Sync, T: Send + Sync> Sync for RwLock<M, T> {}

impl<M: RawMutex, T> RwLock<M, T> {
    pub const fn new(value: T) -> Self {
        Self {
            state: Mutex::new(RefCell::new(State {
                readers: 0,
                writer: false,
                writers: Deque::new(),
                next_writer: 0,
                wakers: MultiWakerRegistration::new(),
            })),
            value: UnsafeCell::new(value),
        }
    }

    /// Wait for shared access
    pub async fn read(&self) -> RwLockReadGuard<'_, M, T> {
        poll_fn(|cx| {
            self.state.lock(|state| {
                let mut state = state.borrow_mut();
                if state.writer || !state.writers.is_empty() {
                    state.wakers.register(cx.waker());
                    return Poll::Pending;
                }
                state.readers += 1;
                Poll::Ready(())
            })
        })
        .await;
        RwLockReadGuard { lock: self }
    }

    /// Wait for exclusive access
    pub async fn write(&self) -> RwLockWriteGuard<'_, M, T> {
        let mut ticket = WriterTicket {
            lock: self,
            id: None,
        };
        poll_fn(|cx| {
            self.state.lock(|state| {
                let mut state = state.borrow_mut();
                let id = match ticket.id {
                    Some(id) => id,
                    None => {
                        let id = state.next_writer;
                        if state.writers.push_back(id).is_err() {
                            state.wakers.register(cx.waker());
                            return Poll::Pending;
                        }
                        state.next_writer = id.wrapping_add(1);
                        ticket.id = Some(id);
                        id
                    }
                };
                if state.writer || state.readers > 0 || state.writers.front() != Some(&id) {
                    state.wakers.register(cx.waker());
                    return Poll::Pending;
                }
                state.writers.pop_front();
                ticket.id = None;
                state.writer = true;
                Poll::Ready(())
            })
        })
        .await;
        RwLockWriteGuard { lock: self }
    }

    /// Shared access if no writer holds or waits for the lock
    pub fn try_read(&self) -> Option<RwLockReadGuard<'_, M, T>> {
        self.state.lock(|state| {
            let mut state = state.borrow_mut();
            if state.writer || !state.writers.is_empty() {
                return None;
            }
            state.readers += 1;
            Some(RwLockReadGuard { lock: self })
        })
    }

    /// Exclusive access if the lock is free
    pub fn try_write(&self) -> Option<RwLockWriteGuard<'_, M, T>> {
        self.state.lock(|state| {
            let mut state = state.borrow_mut();
            if state.writer || state.readers > 0 || !state.writers.is_empty() {
                return None;
            }
            state.writer = true;
            Some(RwLockWriteGuard { lock: self })
        })
    }

    /// Number of readers currently holding the lock
    pub fn readers(&self) -> usize {
        self.state.lock(|state| state.borrow().readers)
    }

    pub fn get_mut(&mut self) -> &mut T {
        self.value.get_mut()
    }

    fn release(&self, f: impl FnOnce(&mut State) -> bool) {
        self.state.lock(|state| {
            let mut state = state.borrow_mut();
            if f(&mut *state) {
                state.wakers.wake();
            }
        });
    }
}

/// Leaves the writer queue if the write future is dropped before acquiring.
struct WriterTicket<'a, M: RawMutex, T> {
    lock: &'a RwLock<M, T>,
    id: Option<u32>,
}

impl<M: RawMutex, T> Drop for WriterTicket<'_, M, T> {
    fn drop(&mut self) {
        let Some(id) = self.id else {
            return;
        };
        self.lock.release(|state| {
            for _ in 0..state.writers.len() {
                if let Some(queued) = state.writers.pop_front() {
                    if queued != id {
                        // Cannot fail, one slot was just freed.
                        let _ = state.writers.push_back(queued);
                    }
                }
            }
            true
        });
    }
}

pub struct RwLockReadGuard<'a, M: RawMutex, T> {
    lock: &'a RwLock<M, T>,
}

impl<M: RawMutex, T> Deref for RwLockReadGuard<'_, M, T> {
    type Target = T;

    fn deref(&self) -> &T {
        // Safety: readers only coexist with other readers.
        unsafe { &*self.lock.value.get() }
    }
}

impl<M: RawMutex, T> Drop for RwLockReadGuard<'_, M, T> {
    fn drop(&mut self) {
        self.lock.release(|state| {
            state.readers -= 1;
            state.readers == 0
        });
    }
}

pub struct RwLockWriteGuard<'a, M: RawMutex, T> {
    lock: &'a RwLock<M, T>,
}

impl<M: RawMutex, T> Deref for RwLockWriteGuard<'_, M, T> {
    type Target = T;

    fn deref(&self) -> &T {
        // Safety: the write guard is unique.
        unsafe { &*self.lock.value.get() }
    }
}

impl<M: RawMutex, T> DerefMut for RwLockWriteGuard<'_, M, T> {
    fn deref_mut(&mut self) -> &mut T {
        // Safety: the write guard is unique.
        unsafe { &mut *self.lock.value.get() }
    }
}

impl<M: RawMutex, T> Drop for RwLockWriteGuard<'_, M, T> {
    fn drop(&mut self) {
        self.lock.release(|state| {
            state.writer = false;
            true
        });
    }
}
