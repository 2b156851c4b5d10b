//! Adapters between the CosiDriver wire protocol and the rest of the sidecar.

pub mod grpc;
