//! Integration test entry point for the Graph gateway
//!
//! Tests run against a wiremock-based Graph API mock server; no network
//! access and no real credential involved.

mod common;
mod test_delta;
mod test_identity;
mod test_subscriptions;
