//! Unit tests for the WeChat token service.

mod group;
mod http;
mod pipeline;
mod service;
