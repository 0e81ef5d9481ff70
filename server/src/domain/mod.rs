//! Domain models

pub mod container;
pub mod state;
pub mod workspace;
