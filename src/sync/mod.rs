mod mailbox;
mod rw_lock;

pub use mailbox::{Mailbox, MailboxFull};
pub use rw_lock::{RwLock, RwLockReadGuard, RwLockWriteGuard};
