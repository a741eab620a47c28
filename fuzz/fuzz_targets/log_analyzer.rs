#![no_main]

use libfuzzer_sys::fuzz_target;
use tilt_orchestrator_core::analyze;
use tilt_orchestrator_core::types::Lifecycle;

fuzz_target!(|data: &[u8]| {
    let text = String::from_utf8_lossy(data);
    let lines: Vec<&str> = text.lines().collect();

    let running = analyze(&lines, Lifecycle::Running);
    if let Some(url) = running.url() {
        assert!(url.starts_with("http://") || url.starts_with("https://"));
        assert!(!url.bytes().any(|b| b.is_ascii_whitespace()));
        assert!(!url.ends_with(['.', ',', ';', ':']));
        let host = url.split_once("://").map_or("", |(_, rest)| rest);
        assert!(host.starts_with(|c: char| c.is_ascii_alphanumeric()));
        // only the first line is ever scanned
        assert!(lines.first().is_some_and(|first| first.contains(url)));
    }
    assert_eq!(running.url().is_some(), running.retain(None).is_some());

    for lifecycle in [Lifecycle::Stopped, Lifecycle::Starting, Lifecycle::Stopping] {
        let other = analyze(&lines, lifecycle);
        assert!(other.url().is_none());
        assert!(other.retain(Some("http://previous")).is_none());
    }
});
