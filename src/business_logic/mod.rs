pub mod bar_guard;
pub mod config;
pub mod engine;
pub mod entry_gate;
pub mod exit_engine;
pub mod lifecycle;
pub mod reconcile;
pub mod targets;
pub mod trailing_stop;
