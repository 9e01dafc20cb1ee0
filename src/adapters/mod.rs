//! Backend-specific translations of the logical variable operations.
//!
//! Each adapter wraps every individual backend call in the crate
//! [`RetryPolicy`](crate::retry::RetryPolicy) and adds operation context to
//! failures. Only transient failures are retried; `AlreadyExists` and
//! `NotFound` are surfaced on first sight so callers can recover from them.

mod parameters;
mod secrets;

pub use parameters::{ParameterAdapter, PutOptions};
pub use secrets::{SecretAdapter, PLACEHOLDER_VALUE};
