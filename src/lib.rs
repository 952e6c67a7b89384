pub mod common;
pub mod configs;
pub mod feeder;
pub mod library;
pub mod orchestrator;
pub mod server;
pub mod session;
pub mod tools;
pub mod transport;
pub mod voice;

#[cfg(test)]
mod testing;
