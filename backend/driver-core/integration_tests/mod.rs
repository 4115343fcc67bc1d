mod capabilities;
mod config;
mod device_server;
mod error;
mod helpers;
mod lease_guard;
mod ports;
mod routes;
mod session;
mod settings;
mod web_driver;
