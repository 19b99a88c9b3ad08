//! cfpush-lib: the application deployment pipeline behind `cfpush push`.
//!
//! This crate provides everything between parsed push parameters and a running app:
//! - `bits`: content-addressed diffing, packaging and upload of app source
//! - `routes`: idempotent find-or-create and binding of HTTP/TCP routes
//! - `deploy`: the per-app orchestration of create/update, routes, bits, services and restart
//! - `start`: the staging watcher (background log tailer + package-state polling)
//!   and the startup watcher (instance-state polling)
//! - `api`: the platform facades the pipeline consumes, plus their HTTP implementation

pub mod api;
pub mod bits;
pub mod config;
pub mod consts;
pub mod deploy;
pub mod error;
pub mod platform;
pub mod routes;
pub mod start;
pub mod ui;
pub mod util;

pub use error::PushError;
