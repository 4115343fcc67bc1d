pub mod bridge;
pub mod capabilities;
pub mod command;
pub mod config;
pub mod device_server;
pub mod lease_guard;
pub mod port;
pub mod provisioning;
pub mod session;
pub mod settings;
pub mod web_driver;

pub use bridge::BridgeError;
pub use capabilities::CapabilityError;
pub use command::CommandError;
pub use config::ConfigError;
pub use device_server::DeviceServerError;
pub use lease_guard::LeaseGuardError;
pub use port::PortError;
pub use provisioning::ProvisioningError;
pub use session::{SessionError, TeardownWarning};
pub use settings::SettingsError;
pub use web_driver::WebDriverError;
