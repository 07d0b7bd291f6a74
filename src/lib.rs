//! # groupwal
//!
//! A write-ahead group-commit log buffer:
//! - Concurrent appends batched into shared fixed-size slots
//! - One Writer call per slot, issued by a self-elected flusher thread
//! - Records spanning slot boundaries split into head / aligned middle / tail
//! - CRC-protected record framing
//! - Bounded-latency partial flush when a group does not fill in time
//!
//! ## Architecture Overview
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │              commit(timestamp, payload, hint)                │
//! │                 (any number of threads)                      │
//! └─────────────────────┬───────────────────────────────────────┘
//!                       │
//! ┌─────────────────────▼───────────────────────────────────────┐
//! │                  Group Committer                             │
//! │     encode ─► reserve [head, head+total) ─► split span       │
//! └──────┬──────────────────────┬────────────────────────┬──────┘
//!        │ head / single        │ aligned middle         │ tail
//!        ▼                      │                        ▼
//!   ┌─────────────────────────┐ │          ┌─────────────────────┐
//!   │   Slot Ring             │ │          │  Slot Ring          │
//!   │ tag ─► fill ─► join     │ │          │ try_tag ─► fill     │
//!   │ (elect flusher)         │ │          │ ... ─► join         │
//!   └───────────┬─────────────┘ │          └──────────┬──────────┘
//!               │               │                    │
//!               ▼               ▼                    ▼
//!        ┌─────────────────────────────────────────────────┐
//!        │                    Writer                        │
//!        │      (sleep / file / block device / memory)      │
//!        └─────────────────────────────────────────────────┘
//! ```
//!
//! ## Example
//!
//! ```
//! use groupwal::writer::MemWriter;
//! use groupwal::{Config, GroupCommitter};
//!
//! let config = Config::builder().slot_capacity(4096).ring_size(4).build();
//! let log = GroupCommitter::new(config, MemWriter::new()).unwrap();
//!
//! // A record exactly one slot long is written as its own group
//! let head = log.commit(1, &[7u8; 4084], 0).unwrap();
//! assert_eq!(head, 0);
//! assert_eq!(log.writer().write_count(), 1);
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod config;

pub mod codec;
pub mod notifier;
pub mod ring;
pub mod writer;
pub mod committer;

// =============================================================================
// Public API Re-exports
// =============================================================================

pub use error::{Result, WalError};
pub use config::{Config, SyncStrategy};
pub use committer::{CommitStatsSnapshot, GroupCommitter};
pub use writer::Writer;

// =============================================================================
// Version Info
// =============================================================================

/// Current version of groupwal
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
