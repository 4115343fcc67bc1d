// Unit tests for the adb output parsers
// Bridge behaviour against fakes is covered in integration_tests/

use crate::bridge::adb::{
    BADGING_ACTIVITY_REGEX, BADGING_PACKAGE_REGEX, WEBVIEW_SOCKET_REGEX, parse_badging,
    parse_devices, parse_resolved_activity, parse_webview_contexts,
};

use std::thread;

/// **VALUE**: Verifies only online devices are reported by `adb devices`.
///
/// **WHY THIS MATTERS**: Attaching to an `offline` or `unauthorized` serial makes every
/// later bridge call fail with confusing errors.
///
/// **BUG THIS CATCHES**: Would catch if the state column were ignored or if the header line
/// were parsed as a device.
#[test]
fn given_mixed_device_states_when_parse_devices_then_returns_online_serials_only() {
    // GIVEN: adb output with a daemon banner, online, offline and unauthorized devices
    let output = "* daemon started successfully\n\
                  List of devices attached\n\
                  emulator-5554\tdevice\n\
                  0123456789ABCDEF\toffline\n\
                  R58M123\tunauthorized\n\
                  R58M456\tdevice\n\n";

    // WHEN: Parsing the device list
    let devices = parse_devices(output);

    // THEN: Only the two online serials remain, in order
    assert_eq!(devices, vec!["emulator-5554", "R58M456"]);
}

/// **VALUE**: Verifies an empty device list parses to nothing.
///
/// **WHY THIS MATTERS**: The connector turns an empty list into `DeviceNotFound`.
///
/// **BUG THIS CATCHES**: Would catch the header being treated as a serial.
#[test]
fn given_no_devices_when_parse_devices_then_returns_empty() {
    // GIVEN: adb output with only the header
    let output = "List of devices attached\n\n";

    // WHEN: Parsing
    let devices = parse_devices(output);

    // THEN: Nothing is reported
    assert!(devices.is_empty());
}

/// **VALUE**: Verifies devtools sockets map to context names.
///
/// **WHY THIS MATTERS**: Auto-webview polling and context switching both depend on these names.
///
/// **BUG THIS CATCHES**: Would catch duplicate sockets producing duplicate contexts, or the
/// Chrome socket being reported under a WEBVIEW name.
#[test]
fn given_proc_net_unix_when_parse_webview_contexts_then_returns_sorted_unique_names() {
    // GIVEN: /proc/net/unix lines with two webview sockets (one repeated) and Chrome
    let output = "00000000: 00000002 00000000 00010000 0001 01 123 @webview_devtools_remote_4321\n\
                  00000000: 00000002 00000000 00010000 0001 01 124 @chrome_devtools_remote\n\
                  00000000: 00000002 00000000 00010000 0001 01 125 @webview_devtools_remote_1234\n\
                  00000000: 00000002 00000000 00010000 0001 01 126 @webview_devtools_remote_4321\n\
                  00000000: 00000002 00000000 00010000 0001 01 127 @jdwp-control\n";

    // WHEN: Parsing webview contexts
    let contexts = parse_webview_contexts(output);

    // THEN: Sorted, deduplicated names with the Chrome socket as CHROMIUM
    assert_eq!(contexts, vec!["CHROMIUM", "WEBVIEW_1234", "WEBVIEW_4321"]);
}

/// **VALUE**: Verifies package and launchable activity come out of `aapt dump badging`.
///
/// **WHY THIS MATTERS**: Provisioning step 4 resolves the target identity from the artifact.
///
/// **BUG THIS CATCHES**: Would catch the regex grabbing `versionName` or `label` instead.
#[test]
fn given_badging_output_when_parse_badging_then_returns_identity() {
    // GIVEN: Typical badging output
    let output = "package: name='com.example.app' versionCode='42' versionName='1.2.3'\n\
                  sdkVersion:'21'\n\
                  application-label:'Example'\n\
                  launchable-activity: name='com.example.app.MainActivity'  label='Example' icon=''\n";

    // WHEN: Parsing
    let identity = parse_badging(output).expect("Should parse badging");

    // THEN: Both parts are resolved
    assert_eq!(identity.package, "com.example.app");
    assert_eq!(identity.activity.as_deref(), Some("com.example.app.MainActivity"));
}

/// **VALUE**: Verifies a package without a launcher entry still resolves.
///
/// **WHY THIS MATTERS**: Library-style artifacts have no launchable activity; the session
/// must still be able to install them.
///
/// **BUG THIS CATCHES**: Would catch a missing activity failing the whole parse.
#[test]
fn given_badging_without_activity_when_parse_badging_then_activity_is_none() {
    // GIVEN: Badging output with no launchable-activity line
    let output = "package: name='com.example.service' versionCode='1'\n";

    // WHEN: Parsing
    let identity = parse_badging(output).expect("Should parse badging");

    // THEN: Package is set, activity is absent
    assert_eq!(identity.package, "com.example.service");
    assert!(identity.activity.is_none());
}

/// **VALUE**: Verifies relative activity names are expanded against the package.
///
/// **WHY THIS MATTERS**: `am start -n` needs the fully qualified component; `cmd package
/// resolve-activity` often reports `.MainActivity`.
///
/// **BUG THIS CATCHES**: Would catch a launch with `pkg/.MainActivity` stored as the activity,
/// which breaks activity waiting later.
#[test]
fn given_relative_component_when_parse_resolved_activity_then_expands_package() {
    // GIVEN: resolve-activity output with a relative component
    let output = "priority=0 preferredOrder=0 match=0x108000\n\
                  com.example.app/.MainActivity\n";

    // WHEN: Parsing for the same package
    let activity = parse_resolved_activity(output, "com.example.app");

    // THEN: The activity is fully qualified
    assert_eq!(activity.as_deref(), Some("com.example.app.MainActivity"));
}

/// **VALUE**: Verifies a component from another package is rejected.
///
/// **WHY THIS MATTERS**: When a package has no launcher the resolver may answer with the
/// chooser activity of the system.
///
/// **BUG THIS CATCHES**: Would catch launching `android/com.android.internal.app.ResolverActivity`.
#[test]
fn given_foreign_component_when_parse_resolved_activity_then_returns_none() {
    // GIVEN: Output naming a different package
    let output = "android/com.android.internal.app.ResolverActivity\n";

    // WHEN: Parsing for the target package
    let activity = parse_resolved_activity(output, "com.example.app");

    // THEN: Nothing is resolved
    assert!(activity.is_none());
}

/// **VALUE**: Verifies the shared parser patterns compile and match from several threads.
///
/// **WHY THIS MATTERS**: The patterns are statics initialised on first use by whichever
/// session thread gets there first.
///
/// **BUG THIS CATCHES**: Would catch an invalid pattern literal, which would otherwise only
/// surface as a panic the first time a device reported sockets or badging.
#[test]
fn given_parser_patterns_when_used_from_several_threads_then_all_match() {
    // GIVEN: Threads that race to first use of every pattern
    let workers: Vec<_> = (0..4)
        .map(|_| {
            thread::spawn(|| {
                (
                    WEBVIEW_SOCKET_REGEX.is_match("@webview_devtools_remote_77"),
                    BADGING_PACKAGE_REGEX.is_match("package: name='com.example'"),
                    BADGING_ACTIVITY_REGEX.is_match("launchable-activity: name='com.example.Main'"),
                )
            })
        })
        .collect();

    // WHEN: Collecting their results
    let results: Vec<_> = workers
        .into_iter()
        .map(|worker| worker.join().expect("worker thread"))
        .collect();

    // THEN: Every thread saw every pattern match
    assert!(results.iter().all(|matched| *matched == (true, true, true)));
}
