//! Wire types for the `cosi.v1alpha1.CosiDriver` service.
//!
//! Messages are declared by hand with `prost`; the server trait and client
//! stub are generated by `build.rs`.

use std::collections::HashMap;

/// Fully qualified gRPC service name.
pub const SERVICE_NAME: &str = "cosi.v1alpha1.CosiDriver";

/// Route of the `CreateBucket` method, as seen by interceptors and logs.
pub const CREATE_BUCKET: &str = "/cosi.v1alpha1.CosiDriver/CreateBucket";

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct CreateBucketRequest {
    #[prost(string, tag = "1")]
    pub name: String,
    /// Opaque, driver specific parameters.
    #[prost(map = "string, string", tag = "2")]
    pub parameters: HashMap<String, String>,
    /// Credentials needed by the driver. Never logged.
    #[prost(map = "string, string", tag = "3")]
    pub secrets: HashMap<String, String>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct CreateBucketResponse {
    #[prost(message, optional, tag = "1")]
    pub bucket: Option<Bucket>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct Bucket {
    #[prost(string, tag = "1")]
    pub bucket_id: String,
    #[prost(map = "string, string", tag = "2")]
    pub bucket_context: HashMap<String, String>,
}

include!(concat!(env!("OUT_DIR"), "/cosi.v1alpha1.CosiDriver.rs"));

pub use cosi_driver_client::CosiDriverClient;
pub use cosi_driver_server::{CosiDriver, CosiDriverServer};
