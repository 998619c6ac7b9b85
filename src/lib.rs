pub mod app_state;
pub mod client;
pub mod engine;
pub mod error;
pub mod events;
pub mod model;
pub mod server;
pub mod session;
pub mod upstream;
