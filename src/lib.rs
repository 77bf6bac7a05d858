//! Spotcheck - Visual regression testing with headless browser capture.
//!
//! This crate provides:
//! - Hash-gated screenshot baselines tracked per platform
//! - Multi-state capture (default/active/focus/hover) with real input events
//! - Pixel diffing with composite before/after/diff artifacts
//! - A bounded pool of reusable browser processes
//!
//! # Example
//!
//! ```rust,no_run
//! use spotcheck::capture::{CaptureOptions, FileCssBuilder, screenshot};
//! use spotcheck::pool::new_pool;
//!
//! let pool = new_pool();
//! let options = CaptureOptions::default();
//! let outcomes = screenshot(
//!     &pool,
//!     "primary button",
//!     "<button>Click me</button>".into(),
//!     &FileCssBuilder,
//!     &options,
//! )
//! .unwrap();
//! for outcome in outcomes {
//!     println!("{}: changed={} updated={}", outcome.platform, outcome.changed, outcome.updated);
//! }
//! ```

pub mod baseline;
pub mod capture;
pub mod config;
pub mod diff;
pub mod pool;

// Re-export capture entry points and core types
pub use capture::{
    screenshot, screenshot_diff, CaptureError, CaptureOptions, CaptureResult, CssBuilder,
    FileCssBuilder, Platform, PlatformOutcome, RenderHtml, State, StateDiff, Subject,
};

// Re-export baseline storage
pub use baseline::{BaselineStore, ChangeCheck};

// Re-export the diff engine
pub use diff::{visual_diff, DiffError, DiffResult};

// Re-export the browser pool
pub use pool::{new_pool, BrowserPool, Checkout, Pool, PoolError, PoolFactory, PoolOptions};
