//! docbrew - a namespaced JSON document store
//!
//! Documents are JSON values addressed by `(namespace, key)` and kept in a
//! pluggable [`storage`] backend. Namespaces may carry a JSON Schema
//! ([`schema`]), can be searched with a jq-style [`query`] filter, and every
//! mutation is fanned out to [`realtime`] subscribers. [`service`] ties these
//! together and [`http_server`] exposes them over HTTP.

pub mod cli;
pub mod http_server;
pub mod query;
pub mod realtime;
pub mod schema;
pub mod service;
pub mod storage;
