//! # PHALANX
//!
//! Headless host for the lockstep kernel: a small demo ruleset, TOML
//! session files, and a two-peer harness that checks the sync hash after
//! every tick.
//!
//! ```rust,ignore
//! use phalanx::{lockstep, SessionFile};
//!
//! let session = SessionFile::demo()?;
//! let report = lockstep::run(&session)?;
//! assert!(report.desync.is_none());
//! ```

#![deny(missing_docs)]
#![deny(unsafe_code)]
#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![deny(clippy::perf)]

pub mod demo;
pub mod error;
pub mod lockstep;
pub mod session;

pub use error::{HarnessError, HarnessResult};
pub use lockstep::{Desync, Lockstep, Report};
pub use session::{ScriptedOrder, SessionFile, SpawnSpec};
