//! `walinkd`: process host for the walink session manager.

pub mod cli;
pub mod commands;
pub mod config;
pub mod error;
pub mod http;
pub mod logging;
pub mod output;
pub mod store_http;
