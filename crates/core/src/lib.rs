#![forbid(unsafe_code)]

pub mod error;
pub mod leaderboard;
pub mod model;
pub mod personalization;
pub mod quiz;
pub mod reducer;
pub mod time;

pub use error::Error;
pub use time::Clock;
