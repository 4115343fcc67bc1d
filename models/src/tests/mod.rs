mod device_metadata;
mod lifecycle;
mod protocol;
