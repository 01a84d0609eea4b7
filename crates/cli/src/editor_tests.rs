// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

#![allow(clippy::unwrap_used)]

use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use fmtd_core::MemoryBuffer;
use fmtd_ipc::{Method, Response};
use tempfile::TempDir;
use yare::parameterized;

use super::*;
use crate::config::{DaemonConfig, StatusLevel, Timeouts};
use crate::daemon::test_daemon::{prettier_reply, unused_port, FakeDaemon};

#[derive(Clone, Default)]
struct Recorder {
    messages: Arc<Mutex<Vec<(bool, String)>>>,
}

impl Recorder {
    fn errors(&self) -> Vec<String> {
        self.messages
            .lock()
            .unwrap()
            .iter()
            .filter(|(error, _)| *error)
            .map(|(_, m)| m.clone())
            .collect()
    }

    fn infos(&self) -> Vec<String> {
        self.messages
            .lock()
            .unwrap()
            .iter()
            .filter(|(error, _)| !*error)
            .map(|(_, m)| m.clone())
            .collect()
    }
}

impl Notifier for Recorder {
    fn info(&self, message: &str) {
        self.messages
            .lock()
            .unwrap()
            .push((false, message.to_string()));
    }

    fn error(&self, message: &str) {
        self.messages
            .lock()
            .unwrap()
            .push((true, message.to_string()));
    }
}

fn settings(port: u16) -> Settings {
    Settings {
        port,
        timeouts: Timeouts {
            control_ms: Some(1_000),
            file_info_ms: Some(2_000),
            format_ms: Some(2_000),
        },
        daemon: DaemonConfig {
            program: "/nonexistent/fmtd-daemon".to_string(),
            max_spawn_attempts: 1,
            respawn_delay_ms: 10,
            ..DaemonConfig::default()
        },
        status_level: StatusLevel::Verbose,
        ..Settings::default()
    }
}

fn editor(settings: Settings) -> (Editor, Recorder) {
    let recorder = Recorder::default();
    let client = DaemonClient::new(settings).unwrap();
    let editor = Editor::new(client, Box::new(recorder.clone()));
    (editor, recorder)
}

fn started(settings: Settings) -> (Editor, Recorder) {
    let (editor, recorder) = editor(settings);
    assert!(editor.start());
    (editor, recorder)
}

fn file_buffer(dir: &TempDir, name: &str, text: &str) -> MemoryBuffer {
    let path = dir.path().join(name);
    std::fs::write(&path, text).unwrap();
    MemoryBuffer::open(path).unwrap()
}

#[test]
fn test_start_reports_adoption() {
    let daemon = FakeDaemon::prettier();
    let (_editor, recorder) = started(settings(daemon.port()));
    assert!(recorder.infos().iter().any(|m| m.contains("ready")));
}

#[test]
fn test_start_failure_is_reported() {
    let (editor, recorder) = editor(settings(unused_port()));
    assert!(!editor.start());
    assert_eq!(recorder.errors().len(), 1);
    assert!(recorder.errors()[0].contains("unavailable"));

    let mut buffer = MemoryBuffer::with_path("/src/a.rb", "a=1");
    let report = editor.format_buffer(&mut buffer, false, false).unwrap();
    assert_eq!(report, FormatReport::Skipped(SkipReason::NotReady));
    assert_eq!(buffer.as_str(), "a=1");
}

#[test]
fn test_format_buffer_patches_and_saves() {
    let daemon = FakeDaemon::prettier();
    let temp = TempDir::new().unwrap();
    let (editor, recorder) = started(settings(daemon.port()));
    let mut buffer = file_buffer(&temp, "a.rb", "a=1");

    let report = editor.format_buffer(&mut buffer, true, false).unwrap();
    assert!(matches!(report, FormatReport::Formatted(s) if s.inserted == 3));
    assert_eq!(buffer.as_str(), "a = 1\n");
    assert_eq!(
        std::fs::read_to_string(temp.path().join("a.rb")).unwrap(),
        "a = 1\n"
    );
    assert!(recorder.infos().iter().any(|m| m == "formatted (ruby)"));
}

#[test]
fn test_unchanged_buffer_is_not_saved() {
    let daemon = FakeDaemon::prettier();
    let temp = TempDir::new().unwrap();
    let (editor, recorder) = started(settings(daemon.port()));
    let mut buffer = file_buffer(&temp, "a.rb", "puts 1\n");
    std::fs::write(temp.path().join("a.rb"), "on disk").unwrap();

    let report = editor.format_buffer(&mut buffer, true, false).unwrap();
    assert_eq!(report, FormatReport::Unchanged);
    assert_eq!(
        std::fs::read_to_string(temp.path().join("a.rb")).unwrap(),
        "on disk"
    );
    assert!(recorder.infos().iter().any(|m| m == "unchanged"));
}

#[test]
fn test_quiet_level_hides_progress() {
    let daemon = FakeDaemon::prettier();
    let mut config = settings(daemon.port());
    config.status_level = StatusLevel::Quiet;
    let (editor, recorder) = started(config);
    let mut buffer = MemoryBuffer::with_path("/src/a.rb", "a=1");
    editor.format_buffer(&mut buffer, false, false).unwrap();
    assert!(recorder.infos().is_empty());
}

#[test]
fn test_daemon_error_is_notified() {
    let daemon = FakeDaemon::start(|req| match req.method {
        Method::Format => Some(Response::err(req.id, "SyntaxError: Unexpected token").to_value()),
        _ => prettier_reply(req),
    });
    let (editor, recorder) = started(settings(daemon.port()));
    let mut buffer = MemoryBuffer::with_path("/src/a.rb", "a=(");

    let report = editor.format_buffer(&mut buffer, false, false).unwrap();
    assert_eq!(
        report,
        FormatReport::Failed("SyntaxError: Unexpected token".to_string())
    );
    assert_eq!(
        recorder.errors(),
        vec!["format failed, open log to see error message".to_string()]
    );
    assert_eq!(buffer.as_str(), "a=(");
}

#[parameterized(
    off = { "false", false },
    on = { "true", true },
)]
fn test_pre_save_follows_format_on_save(value: &str, formats: bool) {
    let daemon = FakeDaemon::prettier();
    let mut config = settings(daemon.port());
    config.format_on_save = Settings::parse(&format!("format_on_save = {}", value))
        .unwrap()
        .format_on_save;
    let (editor, _) = started(config);
    let mut buffer = MemoryBuffer::with_path("/src/a.rb", "a=1");

    let report = editor.on_pre_save(&mut buffer).unwrap();
    assert_eq!(report.is_some(), formats);
    assert_eq!(buffer.as_str() == "a = 1\n", formats);
}

#[test]
fn test_explicit_mode_needs_prettierrc() {
    let daemon = FakeDaemon::prettier();
    let mut config = settings(daemon.port());
    config.format_on_save = FormatOnSave::Explicit;
    let (editor, _) = started(config);

    let temp = TempDir::new().unwrap();
    std::fs::write(temp.path().join("package.json"), "{}").unwrap();
    let mut buffer = file_buffer(&temp, "a.rb", "a=1");
    assert_eq!(editor.on_pre_save(&mut buffer).unwrap(), None);

    std::fs::write(temp.path().join(".prettierrc"), "{}").unwrap();
    assert!(editor.on_pre_save(&mut buffer).unwrap().is_some());
    assert_eq!(buffer.as_str(), "a = 1\n");
}

#[test]
fn test_pre_save_skips_large_buffers() {
    let daemon = FakeDaemon::prettier();
    let mut config = settings(daemon.port());
    config.format_on_save = FormatOnSave::On;
    config.max_size = 2;
    let (editor, _) = started(config);
    let mut buffer = MemoryBuffer::with_path("/src/a.rb", "a=1");
    assert_eq!(editor.on_pre_save(&mut buffer).unwrap(), None);
    assert_eq!(daemon.count(Method::Format), 0);
}

#[test]
fn test_save_formats_then_writes() {
    let daemon = FakeDaemon::prettier();
    let mut config = settings(daemon.port());
    config.format_on_save = FormatOnSave::On;
    let (editor, _) = started(config);
    let temp = TempDir::new().unwrap();
    let mut buffer = file_buffer(&temp, "a.rb", "a=1");

    let report = editor.save(&mut buffer).unwrap();
    assert!(matches!(report, Some(FormatReport::Formatted(_))));
    assert_eq!(
        std::fs::read_to_string(temp.path().join("a.rb")).unwrap(),
        "a = 1\n"
    );
}

#[test]
fn test_save_without_formatting_skips_one_save() {
    let daemon = FakeDaemon::prettier();
    let mut config = settings(daemon.port());
    config.format_on_save = FormatOnSave::On;
    let (editor, _) = started(config);
    let temp = TempDir::new().unwrap();
    let mut buffer = file_buffer(&temp, "a.rb", "a=1");

    editor.save_without_formatting(&mut buffer).unwrap();
    assert_eq!(
        std::fs::read_to_string(temp.path().join("a.rb")).unwrap(),
        "a=1"
    );
    assert_eq!(daemon.count(Method::Format), 0);

    // the next save formats again
    editor.save(&mut buffer).unwrap();
    assert_eq!(buffer.as_str(), "a = 1\n");
}

#[test]
fn test_saving_config_file_clears_caches() {
    let daemon = FakeDaemon::prettier();
    let (editor, _) = started(settings(daemon.port()));
    let temp = TempDir::new().unwrap();

    let source = file_buffer(&temp, "a.rb", "a=1");
    editor.on_activated(&source).join().unwrap();
    assert!(editor.client().status(source.id()).is_formattable());

    let mut plain = file_buffer(&temp, "b.rb", "b=1");
    editor.save(&mut plain).unwrap();
    assert_eq!(daemon.count(Method::ClearConfigCache), 0);

    let mut rc = file_buffer(&temp, ".prettierrc", "{}");
    editor.save(&mut rc).unwrap();
    assert_eq!(daemon.count(Method::ClearConfigCache), 1);
    assert_eq!(editor.client().status(source.id()), BufferStatus::Unknown);
}

#[test]
fn test_refresh_classifies_every_buffer() {
    let daemon = FakeDaemon::prettier();
    let (editor, _) = started(settings(daemon.port()));
    let a = MemoryBuffer::with_path("/src/a.rb", "");
    let b = MemoryBuffer::with_path("/src/b.js", "");
    let c = MemoryBuffer::with_path("/src/ignored/c.js", "");
    let buffers: Vec<&dyn TextBuffer> = vec![&a, &b, &c];

    let statuses: Vec<BufferStatus> = editor
        .refresh(buffers)
        .into_iter()
        .map(|p| p.join().unwrap())
        .collect();
    assert_eq!(
        statuses,
        vec![
            BufferStatus::Formattable("ruby".to_string()),
            BufferStatus::Formattable("babel".to_string()),
            BufferStatus::Ignored,
        ]
    );
}

#[test]
fn test_close_forgets_buffer() {
    let daemon = FakeDaemon::prettier();
    let (editor, _) = started(settings(daemon.port()));
    let buffer = MemoryBuffer::with_path("/src/a.rb", "");
    editor.on_activated(&buffer).join().unwrap();
    assert_eq!(editor.status_text(&buffer), "ready [ruby]");

    editor.on_close(&buffer);
    assert_eq!(editor.status_text(&buffer), "ready [unknown]");
}

#[test]
fn test_commands_are_noops_when_not_ready() {
    let daemon = FakeDaemon::prettier();
    let (editor, recorder) = editor(settings(daemon.port()));
    editor.clear_cache().unwrap();
    editor.restart_daemon().unwrap();
    assert!(daemon.calls().is_empty());
    assert!(recorder.errors().is_empty());
}

#[test]
fn test_has_prettier_config_stops_at_project_root() {
    let temp = TempDir::new().unwrap();
    let root = temp.path();
    let project = root.join("project");
    let src = project.join("src");
    std::fs::create_dir_all(&src).unwrap();
    std::fs::write(root.join(".prettierrc"), "{}").unwrap();
    std::fs::write(project.join("package.json"), "{}").unwrap();

    // the rc above the package.json does not count
    assert!(!has_prettier_config(&src.join("a.js")));

    std::fs::write(project.join("prettierrc.config.js"), "").unwrap();
    assert!(has_prettier_config(&src.join("a.js")));
}

#[test]
fn test_has_prettier_config_in_parent() {
    let temp = TempDir::new().unwrap();
    let nested = temp.path().join("a").join("b");
    std::fs::create_dir_all(&nested).unwrap();
    std::fs::write(temp.path().join(".prettierrc.json"), "{}").unwrap();
    assert!(has_prettier_config(&nested.join("x.css")));
}

#[test]
fn test_daemon_crash_is_reported_on_next_format() {
    let dir = TempDir::new().unwrap();
    let marker = dir.path().join("crashed");
    // Ping goes unanswered so the client spawns instead of adopting.
    let daemon = FakeDaemon::start(|req| match req.method {
        Method::Ping => None,
        _ => prettier_reply(req),
    });
    let mut config = settings(daemon.port());
    config.daemon.program = "sh".to_string();
    config.daemon.args = vec![
        "-c".to_string(),
        format!(
            r#"printf '{{"ok":%s}}\n' "$0"
if [ -e '{marker}' ]; then exec sleep 30; fi
touch '{marker}'
sleep 0.2
echo boom
exit 1"#,
            marker = marker.display()
        ),
    ];
    let (editor, recorder) = started(config);
    let first = editor.client().daemon_pid().unwrap();

    let deadline = Instant::now() + Duration::from_secs(10);
    while editor.client().daemon_pid().map_or(true, |pid| pid == first) || !editor.client().is_ready() {
        assert!(Instant::now() < deadline, "daemon was not regenerated");
        std::thread::sleep(Duration::from_millis(20));
    }

    let mut buffer = MemoryBuffer::with_path("/src/a.rb", "a=1");
    let report = editor.format_buffer(&mut buffer, false, false).unwrap();
    assert!(matches!(report, FormatReport::Formatted(_)));
    assert_eq!(
        recorder.errors(),
        vec![format!("daemon exited unexpectedly: pid {}, last output: boom", first)]
    );

    editor.format_buffer(&mut buffer, false, false).unwrap();
    assert_eq!(recorder.errors().len(), 1);
    editor.shutdown();
}
