#![forbid(unsafe_code)]

pub mod config;
pub mod response;
pub mod router;
pub mod state;
