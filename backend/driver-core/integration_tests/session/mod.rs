mod dispatch;
mod provisioning;
mod teardown;
