#![allow(clippy::uninlined_format_args)]

pub mod api;
pub mod app;
pub mod client;
pub mod comments;
pub mod config;
pub mod data;
pub mod detail;
pub mod errors;
pub mod flags;
pub mod images;
pub mod logging;
pub mod models;
pub mod notify;
pub mod pagination;
pub mod routes;
pub mod session;
pub mod state;
pub mod storage;
pub mod suggest;
pub mod transport;
pub mod validate;

pub const VERSION: &str = env!("CARGO_PKG_VERSION");

pub use app::run;
