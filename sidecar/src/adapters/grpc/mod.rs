//! gRPC Adapter
//!
//! Both ends of the CosiDriver service:
//! - `service`: the built-in mock driver
//! - `client`: the outgoing call wrapper
//! - `interceptor`: logging with secret redaction, shared by both
//! - `layer`: route tagging and forced-stop aborts for every served call

pub mod client;
pub mod interceptor;
pub mod layer;
pub mod service;

pub use client::DriverClient;
pub use interceptor::{CallRoute, Redacted, StripSecrets};
pub use layer::RouteLayer;
pub use service::{MOCK_BUCKET_ID, MockDriver};
