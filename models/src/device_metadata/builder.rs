use crate::device_metadata::{DeviceMetadata, ViewportRect};
use crate::error::model_error::ModelError;
use crate::ErrorLocation;

use std::panic::Location;

/// Builder for validated [`DeviceMetadata`].
///
/// The individual values come from several independent device-server queries,
/// so they are collected here and checked together.
#[derive(Debug, Default)]
pub struct DeviceMetadataBuilder {
    api_level: Option<u32>,
    platform_version: Option<String>,
    manufacturer: Option<String>,
    model: Option<String>,
    screen_size: Option<String>,
    screen_density: Option<u32>,
    pixel_ratio: Option<f64>,
    stat_bar_height: Option<u32>,
}

impl DeviceMetadataBuilder {
    pub fn with_api_level(mut self, api_level: u32) -> Self {
        self.api_level = Some(api_level);
        self
    }

    pub fn with_platform_version(mut self, version: impl Into<String>) -> Self {
        self.platform_version = Some(version.into());
        self
    }

    pub fn with_manufacturer(mut self, manufacturer: impl Into<String>) -> Self {
        self.manufacturer = Some(manufacturer.into());
        self
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    pub fn with_screen_size(mut self, size: impl Into<String>) -> Self {
        self.screen_size = Some(size.into());
        self
    }

    pub fn with_screen_density(mut self, density: u32) -> Self {
        self.screen_density = Some(density);
        self
    }

    pub fn with_pixel_ratio(mut self, ratio: f64) -> Self {
        self.pixel_ratio = Some(ratio);
        self
    }

    pub fn with_stat_bar_height(mut self, height: u32) -> Self {
        self.stat_bar_height = Some(height);
        self
    }

    /// Build with validation. The viewport is derived from the screen size
    /// minus the status bar.
    #[track_caller]
    pub fn build(self) -> Result<DeviceMetadata, ModelError> {
        let api_level = self.api_level.ok_or_else(|| ModelError::Validation {
            message: String::from("API level is required"),
            location: ErrorLocation::from(Location::caller()),
        })?;

        let platform_version = required_text(self.platform_version, "Platform version")?;
        let manufacturer = required_text(self.manufacturer, "Manufacturer")?;
        let model = required_text(self.model, "Model")?;
        let screen_size = required_text(self.screen_size, "Screen size")?;

        let (width, height) = parse_screen_size(&screen_size)?;

        let screen_density = self.screen_density.unwrap_or_default();

        let pixel_ratio = self.pixel_ratio.ok_or_else(|| ModelError::Validation {
            message: String::from("Pixel ratio is required"),
            location: ErrorLocation::from(Location::caller()),
        })?;

        if !pixel_ratio.is_finite() || pixel_ratio <= 0.0 {
            return Err(ModelError::Validation {
                message: format!("Pixel ratio must be positive, got {pixel_ratio}"),
                location: ErrorLocation::from(Location::caller()),
            });
        }

        let stat_bar_height = self.stat_bar_height.unwrap_or_default();

        if stat_bar_height >= height {
            return Err(ModelError::Validation {
                message: format!(
                    "Status bar height {stat_bar_height} exceeds screen height {height}"
                ),
                location: ErrorLocation::from(Location::caller()),
            });
        }

        Ok(DeviceMetadata {
            api_level,
            platform_version,
            manufacturer,
            model,
            screen_size,
            screen_density,
            pixel_ratio,
            stat_bar_height,
            viewport_rect: ViewportRect {
                left: 0,
                top: stat_bar_height,
                width,
                height: height - stat_bar_height,
            },
        })
    }
}

#[track_caller]
fn required_text(value: Option<String>, field: &str) -> Result<String, ModelError> {
    let value = value.ok_or_else(|| ModelError::Validation {
        message: format!("{field} is required"),
        location: ErrorLocation::from(Location::caller()),
    })?;

    if value.trim().is_empty() {
        return Err(ModelError::Validation {
            message: format!("{field} cannot be empty"),
            location: ErrorLocation::from(Location::caller()),
        });
    }

    Ok(value)
}

/// Parses `"<width>x<height>"` as reported by the device.
#[track_caller]
pub(crate) fn parse_screen_size(size: &str) -> Result<(u32, u32), ModelError> {
    let parse_error = || ModelError::Validation {
        message: format!("Invalid screen size format: {size}"),
        location: ErrorLocation::from(Location::caller()),
    };

    let (width, height) = size.split_once('x').ok_or_else(parse_error)?;
    let width: u32 = width.trim().parse().map_err(|_| parse_error())?;
    let height: u32 = height.trim().parse().map_err(|_| parse_error())?;

    if width == 0 || height == 0 {
        return Err(parse_error());
    }

    Ok((width, height))
}
