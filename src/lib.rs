pub mod client;
pub mod directory;
pub mod message;
pub mod presence;
pub mod registry;
pub mod server;
pub mod session;
