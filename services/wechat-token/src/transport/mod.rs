//! Transport adapters: application HTTP and gRPC, plus the debug listener.

pub mod debug;
pub mod grpc;
pub mod http;
