//! HTTP route handlers.
//!
//! JSON handlers are annotated with `#[openapi]` so `rocket_okapi` can derive
//! an OpenAPI document automatically. The multipart upload handler is mounted
//! separately.

pub mod employees;
pub mod health;
pub mod params;
pub mod upload;
