pub mod base;
pub mod feeder;
pub mod library;
pub mod logging;
pub mod server;
pub mod tools;

pub use base::*;
pub use feeder::*;
pub use library::*;
pub use logging::*;
pub use server::*;
pub use tools::*;
