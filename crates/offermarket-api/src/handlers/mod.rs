//! Request handlers

pub mod health;
pub mod info;
pub mod offer;
pub mod request;
pub mod subscription;
