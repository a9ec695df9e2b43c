//! Credential contracts, the refresh-bound request invoker, and a ready-made bearer
//! implementation.

pub mod bearer;
pub mod credentials;
pub mod token;

pub use bearer::*;
pub use credentials::*;
pub use token::{secret::*, *};
