#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::needless_pass_by_value)]
#![allow(clippy::return_self_not_must_use)]

pub mod config;
pub mod engine;
pub mod error;
pub mod headless;
pub mod paths;
pub mod pkg;
pub mod store;
pub mod version;

pub use config::{Config, InstallOptions};
pub use error::Error;
pub use headless::{headless_install, InstallSummary};
pub use store::{LocalStore, StoreController, StoreError};
pub use version::VERSION;
