//! # ps-optimizer
//!
//! Search-and-scoring core for Paramsweep.
//!
//! Expands a parameter set into constraint-filtered configurations, tracks
//! the resumable search state, and drives the coordinate-wise sweep that
//! locks in one parameter at a time from randomly sampled trials.

mod domain;
mod state;
mod store;
mod sweeper;

pub use domain::{expand, ConstraintMap};
pub use state::{ScoreBook, ScoreEntry, SweepId, SweeperState};
pub use store::{MemoryStateStore, StateStore};
pub use sweeper::{StartMode, Sweeper, SweeperOptions};
