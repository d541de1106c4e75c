pub mod auth;
pub mod backoff;
pub mod bus;
pub mod diff;
pub mod fetch;
pub mod manager;
#[cfg(any(test, feature = "test-support"))]
pub mod testing;
pub mod traits;
pub mod worker;
pub mod youtube;
