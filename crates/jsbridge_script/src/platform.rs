//! Process-wide engine platform
//!
//! The platform is initialised when the first `Context` comes alive and torn
//! down when the last one goes away. The live count is the whole state
//! machine: `Uninitialized -> Initialized[n] -> Uninitialized`.
//!
//! Contexts hold a `PlatformLease`; dropping the lease is the only way to
//! release the platform, so error paths during context construction release
//! it too.

use once_cell::sync::Lazy;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::SystemTime;

use crate::ENGINE_VERSION;

/// Global lifecycle shared by every context in the process.
static PLATFORM: Lazy<Mutex<Lifecycle>> = Lazy::new(|| Mutex::new(Lifecycle::new()));

/// Sequence behind auto-generated context labels.
static LABEL_SEQUENCE: AtomicU64 = AtomicU64::new(0);

/// Facts recorded when the platform was brought up.
#[derive(Debug, Clone, PartialEq)]
pub struct PlatformInfo {
    pub engine_version: &'static str,
    /// 1 for the first initialisation in this process, 2 for the next, ...
    pub generation: u64,
    pub initialized_at: SystemTime,
}

/// Snapshot of the platform lifecycle.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PlatformStats {
    pub live: usize,
    pub initializations: u64,
    pub teardowns: u64,
    pub info: Option<PlatformInfo>,
}

impl PlatformStats {
    pub fn is_initialized(&self) -> bool {
        self.info.is_some()
    }
}

/// Reference-counted init/teardown bookkeeping.
#[derive(Debug, Default)]
pub(crate) struct Lifecycle {
    live: usize,
    initializations: u64,
    teardowns: u64,
    info: Option<PlatformInfo>,
}

impl Lifecycle {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Register a new live context. Returns `true` when this call initialised
    /// the platform.
    pub(crate) fn acquire(&mut self) -> bool {
        let first = self.live == 0;
        if first {
            self.initializations += 1;
            self.info = Some(PlatformInfo {
                engine_version: ENGINE_VERSION,
                generation: self.initializations,
                initialized_at: SystemTime::now(),
            });
        }
        self.live += 1;
        first
    }

    /// Drop a live context. Returns `true` when this call tore the platform
    /// down.
    pub(crate) fn release(&mut self) -> bool {
        debug_assert!(self.live > 0, "platform released more often than acquired");
        if self.live == 0 {
            return false;
        }
        self.live -= 1;
        if self.live == 0 {
            self.teardowns += 1;
            self.info = None;
            return true;
        }
        false
    }

    pub(crate) fn stats(&self) -> PlatformStats {
        PlatformStats {
            live: self.live,
            initializations: self.initializations,
            teardowns: self.teardowns,
            info: self.info.clone(),
        }
    }
}

fn platform() -> MutexGuard<'static, Lifecycle> {
    // The lifecycle stays consistent across a panicking holder.
    PLATFORM.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Current platform state.
pub fn stats() -> PlatformStats {
    platform().stats()
}

/// Next `program_NNNNN` label.
pub(crate) fn next_label() -> String {
    format!("program_{:05}", LABEL_SEQUENCE.fetch_add(1, Ordering::Relaxed))
}

/// Keeps the platform alive while held.
#[derive(Debug)]
pub struct PlatformLease {
    _private: (),
}

impl PlatformLease {
    pub(crate) fn acquire() -> Self {
        let mut lifecycle = platform();
        if lifecycle.acquire() {
            let generation = lifecycle.initializations;
            tracing::info!(generation, engine = ENGINE_VERSION, "engine platform initialized");
        }
        Self { _private: () }
    }
}

impl Drop for PlatformLease {
    fn drop(&mut self) {
        let mut lifecycle = platform();
        if lifecycle.release() {
            let teardowns = lifecycle.teardowns;
            tracing::info!(teardowns, "engine platform torn down");
        }
    }
}
