use crate::ErrorLocation;
use std::panic::Location;

/// **VALUE**: Verifies that `ErrorLocation::from()` records the test file and a real position.
///
/// **WHY THIS MATTERS**: Every provisioning and teardown error carries an ErrorLocation.
/// If capture breaks, a failed session start no longer says where it failed.
///
/// **BUG THIS CATCHES**: Would catch if file, line or column extraction stops working.
#[test]
#[track_caller]
fn given_caller_location_when_error_location_created_then_records_file_and_position() {
    // GIVEN/WHEN: Capturing the current caller location
    let location = ErrorLocation::from(Location::caller());

    // THEN: File is this module, line and column are populated
    assert!(
        location.file.contains("error_location.rs"),
        "Should capture file path, got {}",
        location.file
    );
    assert!(location.line > 0, "Should capture a line number");
    assert!(location.column > 0, "Should capture a column number");
}

/// **VALUE**: Verifies the bracketed `[file:line:column]` display format.
///
/// **WHY THIS MATTERS**: All error Display strings end with the location; log readers
/// and tests rely on the exact shape.
///
/// **BUG THIS CATCHES**: Would catch a changed Display implementation.
#[test]
fn given_error_location_when_displayed_then_uses_bracketed_format() {
    // GIVEN: A hand-built location
    let location = ErrorLocation {
        file: "src/ports/mod.rs",
        line: 42,
        column: 7,
    };

    // WHEN: Formatting
    let formatted = location.to_string();

    // THEN: Exact bracketed form
    assert_eq!(formatted, "[src/ports/mod.rs:42:7]");
}

/// **VALUE**: Verifies that `#[track_caller]` propagates through helper functions.
///
/// **WHY THIS MATTERS**: Error constructors such as `PortError::busy()` are helpers; the
/// location must point at the code that called them.
///
/// **BUG THIS CATCHES**: Would catch if propagation through helpers stops working.
#[test]
fn given_track_caller_helper_when_called_twice_then_lines_differ() {
    // GIVEN: A helper that captures its caller
    #[track_caller]
    fn capture() -> ErrorLocation {
        ErrorLocation::from(Location::caller())
    }

    // WHEN: Calling from two consecutive lines
    let first = capture();
    let second = capture();

    // THEN: Same file, consecutive lines
    assert_eq!(first.file, second.file);
    assert_eq!(first.line + 1, second.line);
}
