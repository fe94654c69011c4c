// Library surface for the CLI and integration tests.
// The core (weight, sampler, content, layout, mastery) performs no I/O.
pub mod app_dirs;
pub mod collaborator;
pub mod config;
pub mod content;
pub mod error;
pub mod layout;
pub mod mastery;
pub mod round;
pub mod sampler;
pub mod storage;
pub mod store;
pub mod weight;

pub use error::{DrillError, Result};
pub use store::{CharacterRecord, CharacterStore};
