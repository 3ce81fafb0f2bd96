//! WeChat Token Service - resilient access-token front-end.
//!
//! This crate exposes one operation, `GetToken`, over HTTP and gRPC at the
//! same time. Every call runs through the same endpoint pipeline
//! (instrumentation, tracing, circuit breaking) and all listeners are
//! supervised as a single run group together with a signal watcher.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod app;
pub mod config;
pub mod context;
pub mod endpoint;
pub mod error;
pub mod group;
pub mod middleware;
pub mod observability;

/// Protobuf messages and gRPC stubs for `pb.WechatToken`.
#[allow(missing_docs, clippy::all, clippy::pedantic, clippy::nursery)]
pub mod pb {
    tonic::include_proto!("pb");
}
pub mod provider;
pub mod service;
pub mod shutdown;
pub mod transport;

pub use app::{Application, Listeners};
pub use config::Config;
pub use context::{RequestContext, TraceContext};
pub use endpoint::{Endpoints, GetTokenRequest, GetTokenResponse};
pub use error::{ErrorCode, TokenServiceError};
pub use group::{Group, GroupError};
pub use provider::{ProviderError, TokenProvider};
pub use service::TokenService;
pub use shutdown::{Signal, SignalWatcher};
pub use transport::grpc::GrpcClient;
