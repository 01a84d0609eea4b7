// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

// Allow unused items: test helpers are shared across multiple test binaries,
// and not every test file uses every helper.
#![allow(dead_code)]
#![allow(unused_imports)]

use std::io::Write;
use std::net::{Shutdown, TcpListener, TcpStream};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;

use assert_cmd::cargo::cargo_bin_cmd;
use assert_cmd::Command;
use fmtd_ipc::{framing, Method, Request, Response};
use serde_json::json;

pub use predicates::prelude::*;
pub use tempfile::TempDir;

/// A scratch directory with a settings file pointing at `port`.
pub struct Fixture {
    pub temp: TempDir,
    pub port: u16,
}

impl Fixture {
    pub fn new(port: u16) -> Self {
        let temp = TempDir::new().unwrap();
        let config = format!(
            "port = {}\n\
             \n\
             [timeouts]\n\
             control_ms = 1000\n\
             file_info_ms = 2000\n\
             format_ms = 2000\n\
             \n\
             [daemon]\n\
             program = \"/nonexistent/fmtd-daemon\"\n\
             max_spawn_attempts = 1\n\
             respawn_delay_ms = 10\n",
            port
        );
        std::fs::write(temp.path().join("config.toml"), config).unwrap();
        Fixture { temp, port }
    }

    pub fn path(&self, name: &str) -> PathBuf {
        self.temp.path().join(name)
    }

    pub fn write(&self, name: &str, text: &str) -> PathBuf {
        let path = self.path(name);
        std::fs::write(&path, text).unwrap();
        path
    }

    /// `fmtd` isolated from the user's config and environment.
    pub fn fmtd(&self) -> Command {
        let mut cmd = cargo_bin_cmd!("fmtd");
        cmd.env("FMTD_CONFIG", self.path("config.toml"))
            .env_remove("FMTD_PORT")
            .env_remove("FMTD_DAEMON_SCRIPT")
            .env_remove("RUST_LOG")
            .current_dir(self.temp.path());
        cmd
    }
}

/// A free localhost port with nothing listening on it.
pub fn unused_port() -> u16 {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    listener.local_addr().unwrap().port()
}

/// Minimal formatter daemon on an ephemeral port: `.rb` files use `ruby`,
/// and formatting spaces out `=` and ensures a trailing newline.
pub struct FakeDaemon {
    pub port: u16,
    methods: Arc<Mutex<Vec<Method>>>,
    stop: Arc<AtomicBool>,
    thread: Option<JoinHandle<()>>,
}

impl FakeDaemon {
    pub fn start() -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();
        let methods = Arc::new(Mutex::new(Vec::new()));
        let stop = Arc::new(AtomicBool::new(false));

        let thread = {
            let methods = Arc::clone(&methods);
            let stop = Arc::clone(&stop);
            std::thread::spawn(move || {
                for stream in listener.incoming() {
                    if stop.load(Ordering::SeqCst) {
                        break;
                    }
                    if let Ok(stream) = stream {
                        serve(stream, &methods);
                    }
                }
            })
        };

        FakeDaemon {
            port,
            methods,
            stop,
            thread: Some(thread),
        }
    }

    pub fn count(&self, method: Method) -> usize {
        self.methods
            .lock()
            .unwrap()
            .iter()
            .filter(|m| **m == method)
            .count()
    }
}

impl Drop for FakeDaemon {
    fn drop(&mut self) {
        self.stop.store(true, Ordering::SeqCst);
        let _ = TcpStream::connect(("127.0.0.1", self.port));
        if let Some(thread) = self.thread.take() {
            let _ = thread.join();
        }
    }
}

fn serve(mut stream: TcpStream, methods: &Mutex<Vec<Method>>) {
    let Ok(bytes) = framing::read_message(&mut stream) else {
        return;
    };
    let Ok(request) = serde_json::from_slice::<Request>(&bytes) else {
        return;
    };
    methods.lock().unwrap().push(request.method);

    let payload = match request.method {
        Method::GetFileInfo => {
            let path = request.params["path"].as_str().unwrap_or_default();
            let parser = path.ends_with(".rb").then_some("ruby");
            json!({"ignored": false, "inferredParser": parser})
        }
        Method::Format => {
            let contents = request.params["contents"].as_str().unwrap_or_default();
            let mut formatted = contents.replace('=', " = ");
            if !formatted.ends_with('\n') {
                formatted.push('\n');
            }
            json!({"formatted": formatted, "cursorOffset": -1})
        }
        Method::ClearConfigCache => json!(null),
        Method::Ping | Method::Quit => json!({}),
    };
    let reply = Response::ok(request.id, payload).to_value();
    let _ = stream.write_all(reply.to_string().as_bytes());
    let _ = stream.shutdown(Shutdown::Both);
}
