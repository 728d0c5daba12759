//! Fake supervisord serving XML-RPC over a Unix socket

#![allow(dead_code)]

use std::collections::HashMap;
use std::io::{Read, Write};
use std::os::unix::net::{UnixListener, UnixStream};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::thread;

/// How the fake answers
#[derive(Debug, Clone)]
pub struct Behaviour {
    pub supervisor: String,
    pub processes: HashMap<String, String>,
    pub chunked: bool,
    pub http_status: Option<(u16, &'static str)>,
}

impl Behaviour {
    pub fn new(supervisor: &str) -> Self {
        Self {
            supervisor: supervisor.to_string(),
            processes: HashMap::new(),
            chunked: false,
            http_status: None,
        }
    }

    /// Add a process in the `epidose` group
    pub fn process(mut self, name: &str, state: &str) -> Self {
        self.processes.insert(format!("epidose:{}", name), state.to_string());
        self
    }

    pub fn chunked(mut self) -> Self {
        self.chunked = true;
        self
    }

    pub fn http_error(mut self, status: u16, reason: &'static str) -> Self {
        self.http_status = Some((status, reason));
        self
    }
}

/// Handle to a running fake; the accept thread lives until the test exits
pub struct FakeSupervisor {
    pub socket_path: PathBuf,
    calls: Arc<Mutex<Vec<String>>>,
}

impl FakeSupervisor {
    pub fn spawn(dir: &Path, behaviour: Behaviour) -> Self {
        let socket_path = dir.join("supervisor.sock");
        let listener = UnixListener::bind(&socket_path).expect("bind fake supervisor socket");
        let calls = Arc::new(Mutex::new(Vec::new()));

        let thread_calls = Arc::clone(&calls);
        thread::spawn(move || {
            for stream in listener.incoming() {
                let Ok(stream) = stream else { break };
                serve(stream, &behaviour, &thread_calls);
            }
        });

        Self { socket_path, calls }
    }

    /// Every call received so far, as `method` or `method(arg)`
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }
}

fn serve(mut stream: UnixStream, behaviour: &Behaviour, calls: &Mutex<Vec<String>>) {
    let request = read_request(&mut stream);
    let method = between(&request, "<methodName>", "</methodName>").unwrap_or_default();
    let arg = between(&request, "<string>", "</string>");

    calls.lock().unwrap().push(match &arg {
        Some(arg) => format!("{}({})", method, arg),
        None => method.clone(),
    });

    let body = match method.as_str() {
        "supervisor.getState" => state_response(&behaviour.supervisor),
        "supervisor.getProcessInfo" => {
            let name = arg.unwrap_or_default();
            match behaviour.processes.get(&name) {
                Some(state) => process_response(&name, state),
                None => fault_response(10, &format!("BAD_NAME: {}", name)),
            }
        }
        other => fault_response(1, &format!("UNKNOWN_METHOD: {}", other)),
    };

    let (status, reason) = behaviour.http_status.unwrap_or((200, "OK"));
    let response = if behaviour.chunked {
        let mut out = format!(
            "HTTP/1.1 {} {}\r\nContent-Type: text/xml\r\nTransfer-Encoding: chunked\r\n\r\n",
            status, reason
        );
        for chunk in body.as_bytes().chunks(16) {
            out.push_str(&format!("{:x}\r\n{}\r\n", chunk.len(), String::from_utf8_lossy(chunk)));
        }
        out.push_str("0\r\n\r\n");
        out
    } else {
        format!(
            "HTTP/1.0 {} {}\r\nContent-Type: text/xml\r\nContent-Length: {}\r\n\r\n{}",
            status,
            reason,
            body.len(),
            body
        )
    };
    let _ = stream.write_all(response.as_bytes());
}

fn read_request(stream: &mut UnixStream) -> String {
    let mut raw = Vec::new();
    let mut buf = [0u8; 1024];
    loop {
        let n = stream.read(&mut buf).unwrap_or(0);
        if n == 0 {
            break;
        }
        raw.extend_from_slice(&buf[..n]);

        let text = String::from_utf8_lossy(&raw);
        if let Some(split) = text.find("\r\n\r\n") {
            let length = text[..split]
                .lines()
                .find_map(|l| l.strip_prefix("Content-Length: "))
                .and_then(|v| v.trim().parse::<usize>().ok())
                .unwrap_or(0);
            if raw.len() >= split + 4 + length {
                break;
            }
        }
    }
    String::from_utf8_lossy(&raw).into_owned()
}

fn between(text: &str, start: &str, end: &str) -> Option<String> {
    let from = text.find(start)? + start.len();
    let to = text[from..].find(end)? + from;
    Some(text[from..to].to_string())
}

fn wrap(members: &str) -> String {
    format!(
        "<?xml version='1.0'?>\n<methodResponse>\n<params>\n<param>\n<value><struct>\n{}</struct></value>\n</param>\n</params>\n</methodResponse>\n",
        members
    )
}

fn member(name: &str, value: &str) -> String {
    format!("<member>\n<name>{}</name>\n<value>{}</value>\n</member>\n", name, value)
}

fn state_response(state: &str) -> String {
    let code = if state == "RUNNING" { 1 } else { 0 };
    wrap(&format!(
        "{}{}",
        member("statecode", &format!("<int>{}</int>", code)),
        member("statename", &format!("<string>{}</string>", state))
    ))
}

fn process_response(qualified: &str, state: &str) -> String {
    let (group, name) = qualified.split_once(':').unwrap_or(("", qualified));
    let pid = if state == "RUNNING" { 4242 } else { 0 };
    wrap(&format!(
        "{}{}{}{}{}{}",
        member("name", &format!("<string>{}</string>", name)),
        member("group", &format!("<string>{}</string>", group)),
        member("statename", &format!("<string>{}</string>", state)),
        member("pid", &format!("<int>{}</int>", pid)),
        member("description", "<string></string>"),
        member("spawnerr", "")
    ))
}

fn fault_response(code: i64, message: &str) -> String {
    format!(
        "<?xml version='1.0'?>\n<methodResponse>\n<fault>\n<value><struct>\n{}{}</struct></value>\n</fault>\n</methodResponse>\n",
        member("faultCode", &format!("<int>{}</int>", code)),
        member("faultString", &format!("<string>{}</string>", message))
    )
}
