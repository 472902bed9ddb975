pub mod cache;
pub mod channel;
pub mod config;
pub mod error;
pub mod hash;
pub mod plan;
pub mod tree;
pub mod utils;
