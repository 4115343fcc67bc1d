//! Live device metadata merged into a session's capabilities once the
//! on-device server is running.

pub mod builder;

use serde::Serialize;
use serde_json::{Map, Value, json};

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ViewportRect {
    pub left: u32,
    pub top: u32,
    pub width: u32,
    pub height: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DeviceMetadata {
    pub api_level: u32,
    pub platform_version: String,
    pub manufacturer: String,
    pub model: String,
    pub screen_size: String,
    pub screen_density: u32,
    pub pixel_ratio: f64,
    pub stat_bar_height: u32,
    pub viewport_rect: ViewportRect,
}

impl DeviceMetadata {
    /// Capability entries this metadata contributes to the enriched bundle.
    pub fn to_capabilities(&self) -> Map<String, Value> {
        let mut caps = Map::new();
        caps.insert("deviceApiLevel".into(), json!(self.api_level));
        caps.insert("platformVersion".into(), json!(self.platform_version));
        caps.insert("deviceManufacturer".into(), json!(self.manufacturer));
        caps.insert("deviceModel".into(), json!(self.model));
        caps.insert("deviceScreenSize".into(), json!(self.screen_size));
        caps.insert("deviceScreenDensity".into(), json!(self.screen_density));
        caps.insert("pixelRatio".into(), json!(self.pixel_ratio));
        caps.insert("statBarHeight".into(), json!(self.stat_bar_height));
        caps.insert("viewportRect".into(), json!(self.viewport_rect));
        caps
    }
}
