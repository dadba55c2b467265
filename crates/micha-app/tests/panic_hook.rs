//! The panic hook is process-wide, so it is exercised in its own test binary
//! where no other test can panic while it is installed.

use std::sync::Arc;

use micha_app::{CapturingSink, CrashMode, install_panic_hook};

fn explode() {
    panic!("physics exploded");
}

#[test]
fn test_panic_hook_routes_to_sink() {
    let sink = Arc::new(CapturingSink::new());
    install_panic_hook(sink.clone());

    let result = std::thread::Builder::new()
        .name("sim".to_string())
        .spawn(explode)
        .unwrap()
        .join();
    let _ = std::panic::take_hook();

    assert!(result.is_err());
    let reports = sink.reports();
    assert_eq!(reports.len(), 1);
    let (report, mode) = &reports[0];
    assert_eq!(report.summary, "physics exploded");
    assert_eq!(report.context, "sim");
    assert_eq!(*mode, CrashMode::Kill);
    assert!(report.trace.contains("panicked at"));
}
