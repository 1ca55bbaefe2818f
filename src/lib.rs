//! Work allocation and scoring engine.
//!
//! Projects are split into team-level group assignments and member-level
//! assignments over a three-axis scope (division, part, work type). The
//! [`engine::Engine`] drives their lifecycles, scores completed work,
//! pauses and resumes projects and dispatches rework.

pub mod clock;
pub mod completion;
pub mod config;
pub mod engine;
pub mod error;
pub mod hold;
pub mod lifecycle;
pub mod models;
pub mod notify;
pub mod report;
pub mod rework;
pub mod scope;
pub mod scoring;
pub mod store;

pub use engine::Engine;
pub use error::{EngineError, ScopeError, StoreError};
