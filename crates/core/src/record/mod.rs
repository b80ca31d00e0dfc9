//! Record model: catalog entries and their resolution outcomes.

mod types;

pub use types::{reasons, Record, Resolution, TransitionError};
