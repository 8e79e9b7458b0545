//! transport integration tests.

mod support;
mod channel;
