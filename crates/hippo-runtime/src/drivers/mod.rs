//! Concrete inference drivers.

pub mod command;
pub mod server;

pub use command::CommandDriver;
pub use server::ServerDriver;
