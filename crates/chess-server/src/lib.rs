//! chess-server
//!
//! Multi-client async TCP server where each connected player plays chess
//! against an external UCI engine process.

pub mod config;
pub mod engine_process;
pub mod registry;
pub mod server;
pub mod types;

// these are internal modules, not re-exported
mod client;
mod game_task;
