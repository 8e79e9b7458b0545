//! stream integration tests.

mod support;
mod basic;
mod bridge;
