//! Bounded pool of reusable browser processes.
//!
//! Browser launches are slow (hundreds of milliseconds), so captures check
//! browsers out of a shared pool instead of launching per call. The pool is
//! generic over a [`PoolFactory`] so the checkout/release/drain machinery is
//! testable without a real browser.
//!
//! Lifecycle: a pool starts `Active`, [`Pool::drain`] moves it through
//! `Draining` to `Drained`, and a later acquire on a `Drained` pool resets it
//! to a fresh `Active` pool. Acquires that were already blocked when a drain
//! began fail with [`PoolError::Draining`].

use std::collections::VecDeque;
use std::sync::{Condvar, Mutex, MutexGuard};

use headless_chrome::{Browser, LaunchOptions};
use log::debug;

use crate::config;

/// Error types for pool operations
#[derive(Debug)]
pub enum PoolError {
    /// The factory failed to produce a usable handle
    Launch(String),

    /// Acquire rejected because the pool was shutting down
    Draining,
}

impl std::fmt::Display for PoolError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PoolError::Launch(msg) => write!(f, "Failed to launch browser: {}", msg),
            PoolError::Draining => write!(f, "Pool is draining"),
        }
    }
}

impl std::error::Error for PoolError {}

/// Produces and disposes of pooled handles
pub trait PoolFactory {
    type Handle;

    /// Create a fresh handle
    fn create(&self) -> Result<Self::Handle, PoolError>;

    /// Dispose of a handle that will not be reused
    fn destroy(&self, handle: Self::Handle);
}

/// Pool construction options
#[derive(Debug, Clone)]
pub struct PoolOptions {
    /// Maximum live handles (checked out + idle)
    pub max: usize,
    /// Keep released handles idle for reuse instead of destroying them
    pub preserve: bool,
}

impl Default for PoolOptions {
    fn default() -> Self {
        let cfg = config::get();
        Self {
            max: cfg.max_browsers,
            preserve: cfg.preserve_browser,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Lifecycle {
    Active,
    Draining,
    Drained,
}

struct PoolState<H> {
    idle: VecDeque<H>,
    /// Handles currently alive, whether idle or checked out
    live: usize,
    lifecycle: Lifecycle,
}

/// Bounded blocking pool, generic over the handle factory
pub struct Pool<F: PoolFactory> {
    factory: F,
    options: PoolOptions,
    state: Mutex<PoolState<F::Handle>>,
    available: Condvar,
}

impl<F: PoolFactory> Pool<F> {
    /// Build a pool. `max` is clamped to at least 1: a zero-capacity pool
    /// could never satisfy an acquire and would park callers forever.
    pub fn new(factory: F, options: PoolOptions) -> Self {
        let options = PoolOptions {
            max: options.max.max(1),
            ..options
        };
        Self {
            factory,
            options,
            state: Mutex::new(PoolState {
                idle: VecDeque::new(),
                live: 0,
                lifecycle: Lifecycle::Active,
            }),
            available: Condvar::new(),
        }
    }

    /// Check a handle out, blocking while the pool is at capacity.
    ///
    /// A `Drained` pool is reset to a fresh `Active` one first, so a pool
    /// remains usable after [`Pool::drain`].
    pub fn acquire(&self) -> Result<Checkout<'_, F>, PoolError> {
        let mut state = self.lock();

        if state.lifecycle == Lifecycle::Drained {
            state.lifecycle = Lifecycle::Active;
        }

        loop {
            match state.lifecycle {
                Lifecycle::Draining => return Err(PoolError::Draining),
                Lifecycle::Drained => {
                    // Drained while we were blocked: treat like a fresh pool
                    state.lifecycle = Lifecycle::Active;
                }
                Lifecycle::Active => {}
            }

            if let Some(handle) = state.idle.pop_front() {
                return Ok(Checkout {
                    pool: self,
                    handle: Some(handle),
                });
            }

            if state.live < self.options.max {
                state.live += 1;
                drop(state);
                debug!("launching pooled browser");
                return match self.factory.create() {
                    Ok(handle) => Ok(Checkout {
                        pool: self,
                        handle: Some(handle),
                    }),
                    Err(e) => {
                        let mut state = self.lock();
                        state.live -= 1;
                        self.available.notify_all();
                        Err(e)
                    }
                };
            }

            state = self
                .available
                .wait(state)
                .unwrap_or_else(|e| e.into_inner());
        }
    }

    /// Destroy all handles and refuse further acquires until the next one.
    ///
    /// Blocks until every checked-out handle has been released.
    pub fn drain(&self) {
        let mut state = self.lock();
        state.lifecycle = Lifecycle::Draining;
        self.available.notify_all();

        loop {
            while let Some(handle) = state.idle.pop_front() {
                state.live -= 1;
                self.factory.destroy(handle);
            }
            if state.live == 0 {
                break;
            }
            state = self
                .available
                .wait(state)
                .unwrap_or_else(|e| e.into_inner());
        }

        state.lifecycle = Lifecycle::Drained;
        debug!("browser pool drained");
    }

    /// Destroy idle handles without changing the lifecycle
    pub fn clear(&self) {
        let mut state = self.lock();
        while let Some(handle) = state.idle.pop_front() {
            state.live -= 1;
            self.factory.destroy(handle);
        }
        self.available.notify_all();
    }

    /// Handles currently alive (idle plus checked out)
    pub fn live(&self) -> usize {
        self.lock().live
    }

    fn lock(&self) -> MutexGuard<'_, PoolState<F::Handle>> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn release(&self, handle: F::Handle) {
        let mut state = self.lock();
        if self.options.preserve && state.lifecycle == Lifecycle::Active {
            state.idle.push_back(handle);
        } else {
            state.live -= 1;
            self.factory.destroy(handle);
        }
        // notify_all: a waiting drain must see this release even when
        // blocked acquirers are also parked on the condvar
        self.available.notify_all();
    }
}

/// RAII checkout; releases the handle back to the pool on drop
pub struct Checkout<'a, F: PoolFactory> {
    pool: &'a Pool<F>,
    handle: Option<F::Handle>,
}

impl<F: PoolFactory> Checkout<'_, F> {
    pub fn handle(&self) -> &F::Handle {
        // Only emptied by Drop
        self.handle.as_ref().unwrap()
    }
}

impl<F: PoolFactory> Drop for Checkout<'_, F> {
    fn drop(&mut self) {
        if let Some(handle) = self.handle.take() {
            self.pool.release(handle);
        }
    }
}

/// Launches headless Chrome processes sized to the capture viewport
pub struct ChromeLauncher {
    headless: bool,
    sandbox: bool,
    window_size: (u32, u32),
}

impl ChromeLauncher {
    pub fn from_config() -> Self {
        let cfg = config::get();
        Self {
            // Preserved browsers stay visible for debugging
            headless: !cfg.preserve_browser,
            // CI containers usually cannot host the Chrome sandbox
            sandbox: !cfg.ci,
            window_size: (config::DEFAULT_WINDOW_WIDTH, config::DEFAULT_WINDOW_HEIGHT),
        }
    }
}

impl PoolFactory for ChromeLauncher {
    type Handle = Browser;

    fn create(&self) -> Result<Browser, PoolError> {
        let options = LaunchOptions {
            headless: self.headless,
            sandbox: self.sandbox,
            window_size: Some(self.window_size),
            ..Default::default()
        };
        Browser::new(options).map_err(|e| PoolError::Launch(e.to_string()))
    }

    fn destroy(&self, handle: Browser) {
        // Dropping the Browser kills the underlying process
        drop(handle);
    }
}

/// Pool of real Chrome processes
pub type BrowserPool = Pool<ChromeLauncher>;

/// Build a Chrome pool from global configuration
pub fn new_pool() -> BrowserPool {
    Pool::new(ChromeLauncher::from_config(), PoolOptions::default())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::thread;
    use std::time::Duration;

    struct Counting {
        created: AtomicUsize,
        destroyed: AtomicUsize,
    }

    impl Counting {
        fn new() -> Self {
            Self {
                created: AtomicUsize::new(0),
                destroyed: AtomicUsize::new(0),
            }
        }
    }

    impl PoolFactory for Counting {
        type Handle = usize;

        fn create(&self) -> Result<usize, PoolError> {
            Ok(self.created.fetch_add(1, Ordering::SeqCst))
        }

        fn destroy(&self, _handle: usize) {
            self.destroyed.fetch_add(1, Ordering::SeqCst);
        }
    }

    fn pool(max: usize, preserve: bool) -> Pool<Counting> {
        Pool::new(Counting::new(), PoolOptions { max, preserve })
    }

    #[test]
    fn test_acquire_creates_up_to_max() {
        let pool = pool(3, false);
        let a = pool.acquire().unwrap();
        let b = pool.acquire().unwrap();
        let c = pool.acquire().unwrap();
        assert_eq!(pool.live(), 3);
        assert_eq!([*a.handle(), *b.handle(), *c.handle()], [0, 1, 2]);
    }

    #[test]
    fn test_zero_max_is_clamped_to_one() {
        // max = 0 must not produce a pool that can never satisfy an acquire
        let pool = pool(0, false);
        let checkout = pool.acquire().unwrap();
        assert_eq!(*checkout.handle(), 0);
        assert_eq!(pool.live(), 1);
    }

    #[test]
    fn test_release_without_preserve_destroys() {
        let pool = pool(2, false);
        {
            let _checkout = pool.acquire().unwrap();
        }
        assert_eq!(pool.live(), 0);
        assert_eq!(pool.factory.destroyed.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_preserve_reuses_idle_handle() {
        let pool = pool(2, true);
        let first = *pool.acquire().unwrap().handle();
        let second = *pool.acquire().unwrap().handle();
        assert_eq!(first, second);
        assert_eq!(pool.factory.created.load(Ordering::SeqCst), 1);
        assert_eq!(pool.factory.destroyed.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_acquire_blocks_at_capacity() {
        let pool = Arc::new(pool(1, false));
        let held = pool.acquire().unwrap();

        let waiter = {
            let pool = Arc::clone(&pool);
            thread::spawn(move || *pool.acquire().unwrap().handle())
        };

        // Give the waiter time to block, then free the slot
        thread::sleep(Duration::from_millis(50));
        drop(held);

        let handle = waiter.join().unwrap();
        assert_eq!(handle, 1);
    }

    #[test]
    fn test_drain_destroys_idle_and_blocks_acquire() {
        let pool = pool(2, true);
        {
            let _a = pool.acquire().unwrap();
        }
        assert_eq!(pool.live(), 1);

        pool.drain();
        assert_eq!(pool.live(), 0);
        assert_eq!(pool.factory.destroyed.load(Ordering::SeqCst), 1);

        // A drained pool accepts new acquires again
        let again = pool.acquire().unwrap();
        assert_eq!(*again.handle(), 1);
    }

    #[test]
    fn test_drain_waits_for_checkouts() {
        let pool = Arc::new(pool(1, true));
        let held = pool.acquire().unwrap();

        let drainer = {
            let pool = Arc::clone(&pool);
            thread::spawn(move || pool.drain())
        };

        thread::sleep(Duration::from_millis(50));
        assert_eq!(pool.live(), 1);
        drop(held);

        drainer.join().unwrap();
        assert_eq!(pool.live(), 0);
    }

    #[test]
    fn test_clear_keeps_pool_active() {
        let pool = pool(2, true);
        {
            let _a = pool.acquire().unwrap();
        }
        pool.clear();
        assert_eq!(pool.live(), 0);
        assert_eq!(pool.factory.destroyed.load(Ordering::SeqCst), 1);

        // Still active: next acquire creates fresh
        let next = pool.acquire().unwrap();
        assert_eq!(*next.handle(), 1);
    }
}
