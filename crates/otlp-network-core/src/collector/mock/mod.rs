//! In-memory `/proc` fixtures.

mod filesystem;
pub mod scenarios;

pub use filesystem::MockFs;
