pub mod analytics;
pub mod catalog;
pub mod cli;
pub mod collector;
pub mod commands;
pub mod error;
pub mod storage;
pub mod tui;

pub use error::{Error, Result};
