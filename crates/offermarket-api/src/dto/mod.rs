//! Data Transfer Objects
//!
//! Request and response bodies of the REST API. The client crate speaks the
//! same shapes.

pub mod market;
pub mod subscription;

pub use market::*;
pub use subscription::*;
