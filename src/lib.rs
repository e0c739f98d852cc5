//! A seeded digital companion: a name becomes a deterministic generative
//! field, and vitals, behavior, emotion, memory and breeding all grow out of
//! it. Time is always supplied by the host; nothing here sleeps or renders.

pub mod behavior;
pub mod config;
pub mod emotion;
pub mod error;
pub mod evolution;
pub mod field;
pub mod genome;
pub mod interaction;
pub mod math;
pub mod memory;
pub mod model;
pub mod sigil;
pub mod sim;
pub mod storage;
pub mod vitals;

pub use error::{CompanionError, Result};
pub use field::Field;
pub use genome::Genome;
pub use model::{CatchupSummary, Companion, CompanionView, Snapshot};
pub use sim::{BreedOutcome, CareAction, ExplorationFinding};
pub use vitals::{Vitals, VitalsDelta};
