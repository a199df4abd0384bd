pub mod cli;
pub mod collector;
pub mod config;
pub mod engine;
pub mod error;
pub mod network;
pub mod registry;
pub mod sources;
pub mod store;
pub mod uptime;

#[cfg(test)]
pub mod test_support;
