//! shellcache - offline app-shell cache for static sites
//!
//! Precaches a site's shell into versioned cache generations and answers
//! requests cache-first or network-first, the way a service worker does,
//! from a local proxy.

pub mod cache;
pub mod cli;
pub mod config;
pub mod error;
pub mod fetch;
pub mod proxy;
pub mod ui;
pub mod worker;

pub use error::{ShellcacheError, ShellcacheResult};
