//! MDM Crypto Utilities
//!
//! CMS signed-data verification for enrollment and check-in requests, plus certificate helpers.

pub mod algorithm;
mod backend;
mod cert;
mod envelope;
mod error;
mod signature;
mod signer;
mod verify;

pub use algorithm::{DigestAlgorithm, PaddingScheme, SignatureScheme};
pub use backend::*;
pub use cert::*;
pub use envelope::*;
pub use error::*;
pub use signature::*;
pub use signer::*;
pub use verify::*;
