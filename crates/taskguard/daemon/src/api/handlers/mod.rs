//! API request handlers

mod health;
mod ws;

pub use health::*;
pub use ws::*;
