pub mod assets;
pub mod cache;
pub mod cancel;
pub mod catalog;
pub mod config;
pub mod domain;
pub mod download;
pub mod error;
pub mod format;
pub mod fs;
pub mod metadata;
pub mod naming;
pub mod output;
pub mod provider;
pub mod resolver;
pub mod store;
pub mod transform;
pub mod transport;
