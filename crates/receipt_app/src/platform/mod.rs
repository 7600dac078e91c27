//! Terminal front end: config, logging, the dispatch loop and effect execution.
mod app;
mod commands;
mod config;
mod effects;
mod logging;
mod persistence;
mod ui;

pub use app::run;
