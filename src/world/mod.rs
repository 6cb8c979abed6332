pub mod grid;
pub mod snapshot;
