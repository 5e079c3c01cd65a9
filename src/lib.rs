//! Remote control of game processes on this host through chat commands:
//! start, stop, restart and check registered games, and press keys toward a
//! running game.

pub mod args;
pub mod chat;
pub mod config;
pub mod constants;
pub mod core;
pub mod error;
pub mod input;
pub mod logging;
pub mod parsing;
pub mod proc;
pub mod registry;
#[cfg(target_os = "linux")]
pub mod system;
pub mod text;
pub mod util;
