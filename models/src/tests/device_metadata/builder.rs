use crate::device_metadata::builder::parse_screen_size;
use crate::{DeviceMetadataBuilder, ModelError};

fn complete_builder() -> DeviceMetadataBuilder {
    DeviceMetadataBuilder::default()
        .with_api_level(30)
        .with_platform_version("11")
        .with_manufacturer("Google")
        .with_model("Pixel 4")
        .with_screen_size("1080x2280")
        .with_screen_density(440)
        .with_pixel_ratio(2.75)
        .with_stat_bar_height(66)
}

/// **VALUE**: Verifies that a complete builder produces metadata with a derived viewport.
///
/// **WHY THIS MATTERS**: The viewport rectangle is reported to clients for coordinate
/// math; it must exclude the status bar.
///
/// **BUG THIS CATCHES**: Would catch if the viewport stops subtracting the status bar.
#[test]
fn given_complete_builder_when_built_then_viewport_excludes_status_bar() {
    // GIVEN: All values present
    let builder = complete_builder();

    // WHEN: Building
    let metadata = builder.build().expect("complete metadata should build");

    // THEN: Viewport starts below the status bar
    assert_eq!(metadata.viewport_rect.top, 66);
    assert_eq!(metadata.viewport_rect.width, 1080);
    assert_eq!(metadata.viewport_rect.height, 2280 - 66);

    let caps = metadata.to_capabilities();
    assert_eq!(caps["deviceModel"], "Pixel 4");
    assert_eq!(caps["statBarHeight"], 66);
}

/// **VALUE**: Verifies that a missing platform version is rejected.
///
/// **WHY THIS MATTERS**: Clients branch on platformVersion; an empty value would
/// silently break them.
///
/// **BUG THIS CATCHES**: Would catch if required-field validation is dropped.
#[test]
fn given_empty_platform_version_when_built_then_returns_validation_error() {
    // GIVEN: Empty platform version
    let builder = complete_builder().with_platform_version("  ");

    // WHEN: Building
    let result = builder.build();

    // THEN: Validation error naming the field
    match result {
        Err(ModelError::Validation { message, .. }) => {
            assert_eq!(message, "Platform version cannot be empty");
        }
        other => panic!("Expected validation error, got {other:?}"),
    }
}

/// **VALUE**: Verifies that a non-positive pixel ratio is rejected.
///
/// **WHY THIS MATTERS**: Pixel ratio is a divisor in client-side coordinate scaling.
///
/// **BUG THIS CATCHES**: Would catch if zero or NaN ratios slip through.
#[test]
fn given_zero_pixel_ratio_when_built_then_returns_validation_error() {
    // GIVEN: Zero pixel ratio
    let builder = complete_builder().with_pixel_ratio(0.0);

    // WHEN/THEN: Build fails
    assert!(builder.build().is_err());
}

/// **VALUE**: Verifies screen-size parsing of well-formed and malformed values.
///
/// **WHY THIS MATTERS**: Devices report `WxH`; garbage must not produce a zero viewport.
///
/// **BUG THIS CATCHES**: Would catch a parser that accepts `0x0` or missing separators.
#[test]
fn given_screen_size_strings_when_parsed_then_only_valid_dimensions_accepted() {
    // GIVEN/WHEN/THEN
    assert_eq!(parse_screen_size("720x1280").unwrap(), (720, 1280));
    assert!(parse_screen_size("720*1280").is_err());
    assert!(parse_screen_size("0x1280").is_err());
    assert!(parse_screen_size("axb").is_err());
}
