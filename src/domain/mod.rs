//!
//! The command grammar and the projected state it folds into.

pub mod command;
pub mod state;

pub use command::Command;
pub use state::{render, RenderedState, State};
