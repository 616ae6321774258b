pub mod analysis;
pub mod api;
pub mod data;
pub mod error;
pub mod export;
pub mod models;
pub mod pipeline;

pub use error::{Result, ScreenerError};
