#![warn(clippy::all, clippy::pedantic)]
#![allow(
    clippy::missing_errors_doc,
    clippy::missing_panics_doc,
    clippy::module_name_repetitions,
    clippy::must_use_candidate,
    clippy::new_without_default,
    clippy::return_self_not_must_use
)]

pub mod app;
pub mod chat;
pub mod config;
pub mod error;
pub mod gateway;
pub mod history;
pub mod providers;
pub mod retention;
pub mod settings;
pub mod speech;

pub use config::Config;
pub use error::{ParleyError, Result};
