//! karte-client - HTTP transport for the karte FHIR endpoints.
//!
//! A thin read-only client: each call is one GET against the endpoint, a
//! transport/error-payload check, and a hand-off of the raw body to the
//! parser in `karte-core`. No retries, no caching.

pub mod client;
pub mod config;
pub mod error;

pub use client::FhirClient;
pub use config::ClientConfig;
pub use error::{ClientError, Result};
