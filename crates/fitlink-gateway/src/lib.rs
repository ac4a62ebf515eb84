pub mod auth;
pub mod connection;
pub mod dispatcher;
pub mod error;
pub mod notifier;
pub mod presence;
pub mod relay;
pub mod signal;
pub mod store;

#[cfg(test)]
pub(crate) mod testing;
