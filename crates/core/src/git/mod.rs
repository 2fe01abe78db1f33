//! Git repository access for ShipSync.

pub mod parser;
pub mod repository;

pub use repository::{HistoryReader, HistoryWriter, Repository};
