//! Harvest Fleet - per-tick decision engine for a harvesting fleet on
//! a toroidal grid

pub mod control;
pub mod core;
pub mod sim;
pub mod world;
