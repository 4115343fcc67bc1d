pub mod bootstrap;
pub mod bridge;
pub mod capabilities;
pub mod config;
pub mod device_server;
pub mod error;
pub mod lease_guard;
pub mod media;
pub mod ports;
pub mod routes;
pub mod session;
pub mod settings;
pub mod transport;
pub mod web_driver;

#[cfg(test)]
mod tests;

pub const DEVICE_SERVER_HOSTNAME: &str = "127.0.0.1";
pub const DEVICE_SERVER_BASE_URL: &str =
    const_format::concatcp!("http://", DEVICE_SERVER_HOSTNAME);
pub const DEVICE_SERVER_PATH: &str = "/wd/hub";
