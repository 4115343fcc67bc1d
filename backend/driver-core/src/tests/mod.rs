mod adb;
mod lease_guard;
mod media;
mod probe;
mod routes;
mod session;
