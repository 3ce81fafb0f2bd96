//! Application assembly.
//!
//! Builds the metrics registry, the core service and the server pipeline,
//! binds the three listeners and registers everything as one run group.

use std::io;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use prometheus::Registry;
use rust_common::{CircuitBreaker, CircuitState};
use thiserror::Error;
use tokio::net::TcpListener;
use tokio_stream::wrappers::TcpListenerStream;
use tokio_util::sync::CancellationToken;
use tonic::transport::Server;
use tracing::{error, info};

use crate::config::Config;
use crate::endpoint::Endpoints;
use crate::group::{Group, GroupError};
use crate::middleware::{GET_TOKEN, server_endpoint};
use crate::observability::Metrics;
use crate::provider::TokenProvider;
use crate::service;
use crate::shutdown::SignalWatcher;
use crate::transport::{self, grpc::GrpcServer};

/// A listener could not be bound.
#[derive(Debug, Error)]
#[error("{transport} listen on {addr}: {source}")]
pub struct BindError {
    /// Listener that failed
    pub transport: &'static str,
    /// Requested address
    pub addr: String,
    /// Underlying socket error
    #[source]
    pub source: io::Error,
}

/// Local addresses of the bound listeners.
#[derive(Debug, Clone, Copy)]
pub struct ListenAddrs {
    /// Debug/metrics listener
    pub debug: SocketAddr,
    /// Application HTTP listener
    pub http: SocketAddr,
    /// Application gRPC listener
    pub grpc: SocketAddr,
}

/// The three bound listeners.
pub struct Listeners {
    debug: TcpListener,
    http: TcpListener,
    grpc: TcpListener,
}

impl Listeners {
    /// Binds all three listeners, stopping at the first failure.
    ///
    /// # Errors
    ///
    /// Returns the first [`BindError`].
    pub async fn bind(debug: &str, http: &str, grpc: &str) -> Result<Self, BindError> {
        Ok(Self {
            debug: bind("debug/HTTP", debug).await?,
            http: bind("HTTP", http).await?,
            grpc: bind("gRPC", grpc).await?,
        })
    }

    /// Binds the addresses from `config`.
    ///
    /// # Errors
    ///
    /// Returns the first [`BindError`].
    pub async fn from_config(config: &Config) -> Result<Self, BindError> {
        Self::bind(&config.debug_addr, &config.http_addr, &config.grpc_addr).await
    }

    /// Addresses the listeners are bound to.
    ///
    /// # Errors
    ///
    /// Fails when a socket address cannot be read back.
    pub fn local_addrs(&self) -> io::Result<ListenAddrs> {
        Ok(ListenAddrs {
            debug: self.debug.local_addr()?,
            http: self.http.local_addr()?,
            grpc: self.grpc.local_addr()?,
        })
    }
}

async fn bind(transport: &'static str, addr: &str) -> Result<TcpListener, BindError> {
    match TcpListener::bind(addr).await {
        Ok(listener) => {
            info!(transport, addr, "Listening");
            Ok(listener)
        }
        Err(source) => {
            error!(transport, during = "Listen", err = %source, "Bind failed");
            Err(BindError {
                transport,
                addr: addr.to_string(),
                source,
            })
        }
    }
}

/// Wired service ready to be served.
pub struct Application {
    endpoints: Endpoints,
    registry: Registry,
    request_timeout: Duration,
}

impl Application {
    /// Builds metrics, service and pipeline over `provider`.
    ///
    /// # Errors
    ///
    /// Fails when the metrics cannot be registered.
    pub fn new(config: &Config, provider: Arc<dyn TokenProvider>) -> Result<Self, prometheus::Error> {
        let registry = Registry::new();
        let metrics = Metrics::new(&registry)?;

        let service = service::new(provider, metrics.invoke_count.clone());
        let breaker = Arc::new(CircuitBreaker::new(GET_TOKEN, config.circuit_breaker_config()));
        metrics
            .circuit_breaker_state
            .with_label_values(&[GET_TOKEN])
            .set(CircuitState::Closed.as_gauge());

        let endpoints = Endpoints::new(server_endpoint(
            service,
            &metrics,
            breaker,
            config.tracing_enabled,
        ));

        Ok(Self {
            endpoints,
            registry,
            request_timeout: config.request_timeout(),
        })
    }

    /// The server pipeline.
    #[must_use]
    pub const fn endpoints(&self) -> &Endpoints {
        &self.endpoints
    }

    /// Registry exposed on the debug listener.
    #[must_use]
    pub const fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Registers the debug, HTTP and gRPC listeners plus `watcher` as one
    /// run group. Each listener stops serving when interrupted.
    #[must_use]
    pub fn into_group(self, listeners: Listeners, watcher: SignalWatcher) -> Group {
        let Self {
            endpoints,
            registry,
            request_timeout,
        } = self;
        let Listeners { debug, http, grpc } = listeners;
        let mut group = Group::new();

        let stop = CancellationToken::new();
        let interrupt = stop.clone();
        let router = transport::debug::router(registry);
        group.add(
            "debug",
            async move {
                axum::serve(debug, router)
                    .with_graceful_shutdown(stop.cancelled_owned())
                    .await
                    .map_err(|e| GroupError::actor("debug", e))
            },
            move |_| interrupt.cancel(),
        );

        let stop = CancellationToken::new();
        let interrupt = stop.clone();
        let router = transport::http::router(endpoints.clone(), request_timeout);
        group.add(
            "http",
            async move {
                axum::serve(http, router)
                    .with_graceful_shutdown(stop.cancelled_owned())
                    .await
                    .map_err(|e| GroupError::actor("http", e))
            },
            move |_| interrupt.cancel(),
        );

        let stop = CancellationToken::new();
        let interrupt = stop.clone();
        let server = GrpcServer::new(endpoints, request_timeout).into_service();
        group.add(
            "grpc",
            async move {
                Server::builder()
                    .add_service(server)
                    .serve_with_incoming_shutdown(
                        TcpListenerStream::new(grpc),
                        stop.cancelled_owned(),
                    )
                    .await
                    .map_err(|e| GroupError::actor("grpc", e))
            },
            move |_| interrupt.cancel(),
        );

        let interrupt = watcher.interrupter();
        group.add("signal", watcher.run(), move |_| interrupt.cancel());

        group
    }
}
