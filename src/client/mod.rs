// File: src/client/mod.rs
//
// Module declaration for the top-level client lifecycle.
//
// Tree Location:
// - src/client/mod.rs (client module entry point)
// - Submodules: lifecycle

pub mod lifecycle;

pub use lifecycle::{ClientStatus, State, StratumClient};
