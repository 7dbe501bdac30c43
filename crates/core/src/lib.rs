#![deny(warnings)]

pub mod analyze;
pub mod config;
pub mod emotion;
pub mod playback;
pub mod report;
pub mod session;
pub mod store;
pub mod upload;
pub mod util;
