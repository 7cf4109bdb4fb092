//! Unit Tests Module
//!
//! Component tests against mock upstreams and scripted fakes.
//!
//! Structure:
//! - fixtures: Shared records, clocks and scripted fakes
//! - credential_provider: UAA grants, caching and single-flight
//! - certificate_fetcher: Ops Manager responses and error mapping
//! - scheduler: Refresh cycles, loop timing and shutdown
//! - server: Metrics endpoint over a real socket


pub mod certificate_fetcher;
pub mod credential_provider;
pub mod server;
