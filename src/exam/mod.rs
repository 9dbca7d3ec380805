// src/exam/mod.rs

//! Timed test-series attempts: the per-session state machine, the
//! controller that submits and persists it, and result statistics.

pub mod controller;
pub mod marking;
pub mod registry;
pub mod result;
pub mod session;

pub use controller::ExamController;
pub use registry::SessionRegistry;
pub use result::{ResultScorer, ResultStatistics, compute_statistics};
pub use session::{ExamSession, SessionError, SessionSettings};
