//! Test doubles for the session ports
//!
//! Compiled for unit tests and behind the `testing` feature so integration
//! tests and downstream crates can drive a [`SessionManager`] without a
//! server.
//!
//! [`SessionManager`]: crate::SessionManager

pub mod stubs;

/// Route `log` output through the test harness.
pub fn init_test_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}
