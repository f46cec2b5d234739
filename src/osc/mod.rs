pub mod client;
pub mod relay;

pub use client::OscClient;
pub use relay::OscRelay;
