#![deny(dead_code)]
#![deny(unused_variables)]
#![deny(unused_imports)]

pub mod chunker;
pub mod clock;
pub mod config;
pub mod data_processor;
pub mod error;
pub mod metadata;
pub mod traits;
pub mod types;

pub use error::{Error, FailureKind, Result, Service};
