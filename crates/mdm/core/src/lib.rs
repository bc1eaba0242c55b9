//! MDM Core Types
//!
//! Documents and configuration consumed by the enrollment endpoints.

mod config;
mod machine_info;

pub use config::*;
pub use machine_info::*;
