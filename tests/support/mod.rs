//! Shared helpers for integration tests.

#![allow(dead_code)]

#[path = "../../src/test_support/socket_guard.rs"]
pub mod socket_guard;
#[path = "../../src/test_support/zip_fixture.rs"]
pub mod zip_fixture;
