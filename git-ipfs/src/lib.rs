#![cfg_attr(not(test), warn(clippy::unwrap_used))]

pub mod config;
pub mod locator;
pub mod logger;
pub mod store;
pub mod version;

pub use config::Config;
pub use locator::{RepositoryLocator, Url};
pub use store::{Ipfs, Store};
