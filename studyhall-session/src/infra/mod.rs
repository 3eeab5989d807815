pub mod adapters;
pub mod api_client;
pub mod config;
pub mod services;

// Testing module is available when compiling tests or with the testing feature
#[cfg(any(test, feature = "testing"))]
pub mod testing;
