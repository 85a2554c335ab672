//! Shared infrastructure utilities for pocketctl.
//!
//! - **`atomic_write`**: Crash-safe file persistence (temp + rename)

pub mod atomic_write;

pub use atomic_write::{PersistMode, atomic_write, ensure_private_dir};
