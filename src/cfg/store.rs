//! Cached parameter store backed by a record log.
//!
//! Reads are served from a RAM cache guarded by a writer-preferring
//! [`RwLock`]; the first read of a parameter pulls it from the log. Writes land
//! in the cache immediately and mark the parameter dirty. The writer task
//! ([`ConfigStore::run_writer`]) waits for dirty marks, lets a burst of writes
//! settle, then notifies subscribers and appends the new records.

use core::cell::RefCell;
use core::convert::Infallible;
use core::sync::atomic::{AtomicU32, Ordering};

use embassy_sync::blocking_mutex::Mutex as BlockingMutex;
use embassy_sync::blocking_mutex::raw::RawMutex;
use embassy_sync::mutex::{Mutex, MutexGuard};
use embassy_sync::signal::Signal;
use embassy_time::{Duration, Timer};
use heapless::Vec;

use super::{ALL_PARAMS, ConfigError, N_PARAMS, Param, ParamId, ParamValue};
use crate::config::{
    MAX_PARAM_LEN, MAX_PARAM_SUBSCRIBERS, PERSIST_COALESCE_DELAY, PERSIST_RETRY_BACKOFF,
};
use crate::storage::{LogError, RecordLog};
use crate::sync::RwLock;

/// Receives the raw payload of a parameter after it changed
///
/// Called from the writer task. Implementations copy what they need and
/// return without blocking.
pub trait ConfigSubscriber: Sync {
    fn on_config_change(&self, id: ParamId, payload: &[u8]);
}

/// Runtime knobs of the store
#[derive(Debug, Clone, Copy)]
pub struct StoreSettings {
    /// Log namespace of the parameter records
    pub file_id: u16,
    /// Time given to a burst of writes before they are persisted
    pub coalesce_delay: Duration,
    /// Wait after compacting a full log before writing again
    pub retry_backoff: Duration,
}

impl StoreSettings {
    pub const DEFAULT: Self = Self {
        file_id: 0x0C0F,
        coalesce_delay: PERSIST_COALESCE_DELAY,
        retry_backoff: PERSIST_RETRY_BACKOFF,
    };
}

impl Default for StoreSettings {
    fn default() -> Self {
        Self::DEFAULT
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Residency {
    /// Log not consulted yet
    Unknown,
    /// Log has no record
    Absent,
    Present,
}

/// RAM shadow of one parameter
#[derive(Debug, Clone, Copy)]
struct CacheEntry {
    residency: Residency,
    length: usize,
    data: [u8; MAX_PARAM_LEN],
}

impl CacheEntry {
    const EMPTY: Self = Self {
        residency: Residency::Unknown,
        length: 0,
        data: [0; MAX_PARAM_LEN],
    };

    const fn allocated_length(&self) -> usize {
        self.data.len()
    }

    fn bytes(&self) -> Option<&[u8]> {
        match self.residency {
            Residency::Present => Some(&self.data[..self.length]),
            Residency::Unknown | Residency::Absent => None,
        }
    }

    fn store(&mut self, payload: &[u8]) {
        self.data[..payload.len()].copy_from_slice(payload);
        self.length = payload.len();
        self.residency = Residency::Present;
    }

    fn copy_to(&self, out: &mut [u8]) -> Result<usize, ConfigError> {
        let bytes = self.bytes().ok_or(ConfigError::NotFound)?;
        let out = out.get_mut(..bytes.len()).ok_or(ConfigError::TooLarge)?;
        out.copy_from_slice(bytes);
        Ok(bytes.len())
    }
}

type SubscriberList<'a> = Vec<&'a dyn ConfigSubscriber, MAX_PARAM_SUBSCRIBERS>;

pub struct ConfigStore<'a, M: RawMutex, L: RecordLog> {
    cache: RwLock<M, [CacheEntry; N_PARAMS]>,
    log: Mutex<M, L>,
    dirty: AtomicU32,
    wake: Signal<M, ()>,
    subscribers: BlockingMutex<M, RefCell<[SubscriberList<'a>; N_PARAMS]>>,
    settings: StoreSettings,
}

impl<'a, M: RawMutex, L: RecordLog> ConfigStore<'a, M, L> {
    pub const fn new(log: L, settings: StoreSettings) -> Self {
        Self {
            cache: RwLock::new([CacheEntry::EMPTY; N_PARAMS]),
            log: Mutex::new(log),
            dirty: AtomicU32::new(0),
            wake: Signal::new(),
            subscribers: BlockingMutex::new(RefCell::new([const { Vec::new() }; N_PARAMS])),
            settings,
        }
    }

    /// Read a typed parameter
    pub async fn get<T: ParamValue>(&self, param: Param<T>) -> Result<T, ConfigError> {
        let mut payload = [0u8; MAX_PARAM_LEN];
        let len = self.get_raw(param.id, &mut payload).await?;
        param.decode(&payload[..len])
    }

    /// Read a typed parameter, storing `default` if it is missing or unreadable
    pub async fn get_or_init<T: ParamValue>(
        &self,
        param: Param<T>,
        default: T,
    ) -> Result<T, ConfigError> {
        match self.get(param).await {
            Err(
                err @ (ConfigError::NotFound
                | ConfigError::VersionMismatch
                | ConfigError::InvalidValue),
            ) => {
                info!("config: {:?} {:?}, storing default", param.id, err);
                self.set(param, &default).await?;
                Ok(default)
            }
            result => result,
        }
    }

    /// Write a typed parameter
    pub async fn set<T: ParamValue>(&self, param: Param<T>, value: &T) -> Result<(), ConfigError> {
        let mut payload = [0u8; MAX_PARAM_LEN];
        let len = param.encode(value, &mut payload)?;
        self.set_raw(param.id, &payload[..len]).await
    }

    /// Copy the raw payload of a parameter into `out`
    pub async fn get_raw(&self, id: ParamId, out: &mut [u8]) -> Result<usize, ConfigError> {
        let index = id.index();
        {
            let cache = self.cache.read().await;
            if cache[index].residency != Residency::Unknown {
                return cache[index].copy_to(out);
            }
        }

        let mut cache = self.cache.write().await;
        let entry = &mut cache[index];
        if entry.residency == Residency::Unknown {
            self.load(id, entry).await?;
        }
        entry.copy_to(out)
    }

    /// Replace the raw payload of a parameter
    ///
    /// The new value is visible to readers when this returns; persistence
    /// happens later on the writer task.
    pub async fn set_raw(&self, id: ParamId, payload: &[u8]) -> Result<(), ConfigError> {
        {
            let mut cache = self.cache.write().await;
            let entry = &mut cache[id.index()];
            if payload.len() > entry.allocated_length() {
                return Err(ConfigError::TooLarge);
            }
            if entry.bytes() == Some(payload) {
                return Ok(());
            }
            entry.store(payload);
        }

        self.dirty.fetch_or(id.mask(), Ordering::AcqRel);
        self.wake.signal(());
        Ok(())
    }

    /// Register for change notifications of `id`
    pub fn subscribe(
        &self,
        id: ParamId,
        subscriber: &'a dyn ConfigSubscriber,
    ) -> Result<(), ConfigError> {
        self.subscribers.lock(|subscribers| {
            subscribers.borrow_mut()[id.index()]
                .push(subscriber)
                .map_err(|_| ConfigError::SubscribersFull)
        })
    }

    /// Drop every stored parameter
    pub async fn erase(&self) -> Result<(), ConfigError> {
        let mut cache = self.cache.write().await;
        let mut log = self.log.lock().await;
        log.erase()?;
        *cache = [CacheEntry::EMPTY; N_PARAMS];
        self.dirty.store(0, Ordering::Release);
        warn!("config: erased");
        Ok(())
    }

    /// Dirty set waiting for the writer
    pub fn pending(&self) -> u32 {
        self.dirty.load(Ordering::Acquire)
    }

    /// Direct access to the record log
    pub async fn log(&self) -> MutexGuard<'_, M, L> {
        self.log.lock().await
    }

    /// Release the record log, dropping unsaved changes
    pub fn into_log(self) -> L {
        self.log.into_inner()
    }

    /// Persist every dirty parameter now
    pub async fn flush(&self) -> Result<(), ConfigError> {
        let mut pending = self.dirty.swap(0, Ordering::AcqRel);
        while pending != 0 {
            let index = pending.trailing_zeros() as usize;
            pending &= pending - 1;
            let id = ALL_PARAMS[index];

            let mut payload = [0u8; MAX_PARAM_LEN];
            let len = {
                let cache = self.cache.read().await;
                match cache[index].copy_to(&mut payload) {
                    Ok(len) => len,
                    Err(_) => continue,
                }
            };

            self.notify(id, &payload[..len]);
            if let Err(err) = self.persist(id, &payload[..len]).await {
                // Keep what was not written for the next pass.
                self.dirty.fetch_or(pending | id.mask(), Ordering::AcqRel);
                return Err(err);
            }
        }
        Ok(())
    }

    /// Writer task body, only returns on a log failure
    pub async fn run_writer(&self) -> Result<Infallible, ConfigError> {
        info!("config: writer started");
        loop {
            self.wake.wait().await;
            Timer::after(self.settings.coalesce_delay).await;
            if let Err(err) = self.flush().await {
                error!("config: writer stopped: {:?}", err);
                return Err(err);
            }
        }
    }

    async fn load(&self, id: ParamId, entry: &mut CacheEntry) -> Result<(), ConfigError> {
        let mut log = self.log.lock().await;
        match log.find(self.settings.file_id, id.as_raw()) {
            Ok(desc) => match log.read(&desc, &mut entry.data) {
                Ok(len) => {
                    entry.length = len;
                    entry.residency = Residency::Present;
                    debug!("config: loaded {:?} ({} bytes)", id, len);
                }
                Err(LogError::TooLarge) => {
                    warn!("config: {:?} record of {} bytes ignored", id, desc.len);
                    entry.residency = Residency::Absent;
                }
                Err(err) => return Err(err.into()),
            },
            Err(LogError::NotFound) => {
                entry.residency = Residency::Absent;
                debug!("config: {:?} not stored", id);
            }
            Err(err) => return Err(err.into()),
        }
        Ok(())
    }

    fn notify(&self, id: ParamId, payload: &[u8]) {
        let subscribers = self
            .subscribers
            .lock(|subscribers| subscribers.borrow()[id.index()].clone());
        for subscriber in &subscribers {
            subscriber.on_config_change(id, payload);
        }
    }

    // Retries until the record fits, compacting the log before each retry.
    async fn persist(&self, id: ParamId, payload: &[u8]) -> Result<(), ConfigError> {
        loop {
            let result = {
                let mut log = self.log.lock().await;
                match log.find(self.settings.file_id, id.as_raw()) {
                    Ok(desc) => log.update(&desc, payload),
                    Err(LogError::NotFound) => log.write(self.settings.file_id, id.as_raw(), payload),
                    Err(err) => Err(err),
                }
            };

            match result {
                Ok(_) => {
                    trace!("config: persisted {:?}", id);
                    return Ok(());
                }
                Err(LogError::NoSpace) => {
                    warn!("config: log full writing {:?}, compacting", id);
                    self.log.lock().await.collect_garbage()?;
                    Timer::after(self.settings.retry_backoff).await;
                }
                Err(err) => return Err(err.into()),
            }
        }
    }
}
