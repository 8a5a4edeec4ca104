//! Integration Test: Headless Core Purity
//!
//! **Policy**: `manual-conductor` production code does all I/O through tokio
//! and reqwest's async client, knows nothing about the terminal, and returns
//! errors instead of panicking. The TUI may block only before its runtime
//! loop (config loading), never by sleeping a thread.

use architectural_enforcement::{
    assert_clean, rust_files, scan_dir, workspace_path, Rule, BLOCKING_IO, PANICKING,
    UI_FRAMEWORKS,
};

#[test]
fn test_core_sources_are_found() {
    let files = rust_files(&workspace_path("conductor/core/src"));
    assert!(
        files.iter().any(|p| p.ends_with("conductor.rs")),
        "scanner did not find the core sources: {files:?}"
    );
}

#[test]
fn test_no_blocking_io_in_core() {
    let violations = scan_dir(&workspace_path("conductor/core/src"), BLOCKING_IO);
    assert_clean("Blocking I/O in conductor/core (use tokio::fs, tokio::net)", &violations);
}

#[test]
fn test_no_ui_dependencies_in_core() {
    let violations = scan_dir(&workspace_path("conductor/core/src"), UI_FRAMEWORKS);
    assert_clean("UI framework referenced from conductor/core", &violations);
}

#[test]
fn test_no_panicking_shortcuts_in_core() {
    let violations = scan_dir(&workspace_path("conductor/core/src"), PANICKING);
    assert_clean("unwrap()/expect() in conductor/core production code", &violations);
}

#[test]
fn test_no_thread_sleep_in_tui() {
    const SLEEP: &[Rule] = &[Rule {
        pattern: "thread::sleep",
        reason: "Blocking sleep in the event loop",
    }];
    let violations = scan_dir(&workspace_path("tui/src"), SLEEP);
    assert_clean("thread::sleep in tui (use tokio::time::sleep)", &violations);
}
