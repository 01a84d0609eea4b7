// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

#![allow(clippy::unwrap_used)]

use super::*;
use yare::parameterized;

#[test]
fn test_timeout_display() {
    let err = Error::Timeout {
        method: Method::Format,
        after: Duration::from_millis(1500),
    };
    let msg = err.to_string();
    assert!(msg.contains("'format'"));
    assert!(msg.contains("1500ms"));
}

#[test]
fn test_collision_display_has_hint() {
    let msg = Error::Collision(9870).to_string();
    assert!(msg.contains("9870"));
    assert!(msg.contains("hint:"));
}

#[test]
fn test_stale_display() {
    let msg = Error::Stale { id: 3, latest: 5 }.to_string();
    assert!(msg.contains("request 3"));
    assert!(msg.contains("superseded by 5"));
}

#[test]
fn test_spawn_keeps_source() {
    use std::error::Error as _;

    let err = Error::Spawn {
        program: "node".to_string(),
        source: std::io::Error::new(std::io::ErrorKind::NotFound, "no such file"),
    };
    assert!(err.to_string().contains("node"));
    assert!(err.source().is_some());
}

#[test]
fn test_protocol_error_is_transport() {
    let err: Error = ProtocolError::Empty.into();
    assert!(matches!(err, Error::Transport(_)));
    assert!(err.to_string().contains("empty response"));
}

#[test]
fn test_core_error_converts() {
    let err: Error = fmtd_core::Error::NoFilePath.into();
    assert!(matches!(err, Error::Buffer(_)));
}

#[parameterized(
    transport = { Error::Transport("refused".to_string()), true, true },
    timeout = { Error::Timeout { method: Method::Ping, after: Duration::from_secs(1) }, true, false },
    application = { Error::Application("SyntaxError".to_string()), true, false },
    not_ready = { Error::NotReady, false, false },
    stale = { Error::Stale { id: 1, latest: 2 }, false, false },
    crash = { Error::Crash("exit 1".to_string()), false, false },
    collision = { Error::Collision(1), false, false },
)]
fn test_error_classes(err: Error, transient: bool, transport: bool) {
    assert_eq!(err.is_transient(), transient);
    assert_eq!(err.is_transport(), transport);
}
