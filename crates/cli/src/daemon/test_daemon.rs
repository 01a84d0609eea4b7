// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! In-process stand-in for the formatter daemon, speaking the real socket
//! protocol on an ephemeral localhost port.

#![allow(clippy::unwrap_used)]

use std::io::Write;
use std::net::{Shutdown, TcpListener, TcpStream};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;

use fmtd_ipc::{framing, Method, Request, Response};
use serde_json::{json, Value};

/// What the fake daemon sends back for one request. `None` closes the
/// connection without a reply.
pub type Handler = dyn Fn(&Request) -> Option<Value> + Send + Sync;

pub struct FakeDaemon {
    port: u16,
    calls: Arc<Mutex<Vec<Request>>>,
    stop: Arc<AtomicBool>,
    thread: Option<JoinHandle<()>>,
}

impl FakeDaemon {
    pub fn start(handler: impl Fn(&Request) -> Option<Value> + Send + Sync + 'static) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();
        let calls = Arc::new(Mutex::new(Vec::new()));
        let stop = Arc::new(AtomicBool::new(false));
        let handler: Arc<Handler> = Arc::new(handler);

        let thread = {
            let calls = Arc::clone(&calls);
            let stop = Arc::clone(&stop);
            std::thread::spawn(move || {
                for stream in listener.incoming() {
                    if stop.load(Ordering::SeqCst) {
                        break;
                    }
                    let Ok(stream) = stream else { continue };
                    serve(stream, &calls, handler.as_ref());
                }
            })
        };

        FakeDaemon {
            port,
            calls,
            stop,
            thread: Some(thread),
        }
    }

    /// A daemon answering like a stock formatter install:
    ///
    /// - `getFileInfo`: `.rb` is `ruby`, `.js` is `babel`, paths containing
    ///   `ignored` are ignored, anything else has no parser.
    /// - `format`: spaces out `=` and ensures a trailing newline.
    pub fn prettier() -> Self {
        Self::start(prettier_reply)
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    pub fn calls(&self) -> Vec<Request> {
        self.calls.lock().unwrap().clone()
    }

    pub fn count(&self, method: Method) -> usize {
        self.calls().iter().filter(|r| r.method == method).count()
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

fn serve(mut stream: TcpStream, calls: &Mutex<Vec<Request>>, handler: &Handler) {
    let Ok(bytes) = framing::read_message(&mut stream) else {
        return;
    };
    let Ok(request) = serde_json::from_slice::<Request>(&bytes) else {
        return;
    };
    calls.lock().unwrap().push(request.clone());
    if let Some(reply) = handler(&request) {
        let _ = stream.write_all(reply.to_string().as_bytes());
    }
    let _ = stream.shutdown(Shutdown::Both);
}

/// Reply used by [`FakeDaemon::prettier`].
pub fn prettier_reply(request: &Request) -> Option<Value> {
    let payload = match request.method {
        Method::Ping => json!({}),
        Method::GetFileInfo => {
            let path = request.params["path"].as_str().unwrap_or_default();
            if path.contains("ignored") {
                json!({"ignored": true, "inferredParser": "babel"})
            } else if path.ends_with(".rb") {
                json!({"ignored": false, "inferredParser": "ruby"})
            } else if path.ends_with(".js") {
                json!({"ignored": false, "inferredParser": "babel"})
            } else {
                json!({"ignored": false, "inferredParser": null})
            }
        }
        Method::Format => {
            let contents = request.params["contents"].as_str().unwrap_or_default();
            let mut formatted = contents.replace('=', " = ");
            if !formatted.ends_with('\n') {
                formatted.push('\n');
            }
            let cursor = request.params["cursor"].as_i64().unwrap_or(-1);
            json!({"formatted": formatted, "cursorOffset": cursor})
        }
        Method::ClearConfigCache => Value::Null,
        Method::Quit => json!({}),
    };
    Some(Response::ok(request.id, payload).to_value())
}

/// A free localhost port with nothing listening on it.
pub fn unused_port() -> u16 {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    listener.local_addr().unwrap().port()
}
