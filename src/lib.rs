pub mod error;
pub mod types;

pub mod config;
pub mod household;
pub mod live;
pub mod query;
pub mod services;
pub mod source;
