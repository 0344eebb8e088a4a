// CyberRange: Deploying and operating GNS3 lab topologies
// Copyright (C) 2026 The CyberRange Authors
//
// This program is free software; you can redistribute it and/or modify
// it under the terms of the GNU General Public License as published by
// the Free Software Foundation; either version 2 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
// GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License along
// with this program; if not, write to the Free Software Foundation, Inc.,
// 51 Franklin Street, Fifth Floor, Boston, MA 02110-1301 USA.

//! In-process fakes of a GNS3 server and of the shell behind a telnet console.
//!
//! [`FakeGns3`] is a stateful REST server (built on `wiremock`) that keeps projects, templates,
//! nodes and links in memory. [`FakeConsole`] listens on a local TCP port and behaves like a
//! minimal POSIX shell: it understands the commands issued by [`crate::script::ScriptPusher`],
//! stores uploaded files, and answers other commands with canned responses.

use std::{
    collections::{HashMap, HashSet},
    sync::{Arc, Mutex, MutexGuard},
    time::Duration,
};

use serde_json::{json, Value};
use tokio::{
    io::{AsyncReadExt, AsyncWriteExt},
    net::{TcpListener, TcpStream},
    task::JoinHandle,
};
use wiremock::{matchers::any, Mock, MockServer, Request, Respond, ResponseTemplate};

use crate::{
    console::EXIT_SENTINEL,
    rest::Gns3Client,
    rest_types::{ConsoleTarget, Link, LinkEndpoint, Node, NodeStatus, Port, Project, Template},
};

/// Prompt printed by the fake shell after each command.
pub const FAKE_PROMPT: &str = "/ # ";

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(|e| e.into_inner())
}

/// Fake telnet console with a minimal shell behind it.
#[derive(Debug)]
pub struct FakeConsole {
    port: u16,
    state: Arc<Mutex<ShellState>>,
    task: JoinHandle<()>,
}

#[derive(Debug, Default)]
struct ShellState {
    files: HashMap<String, Vec<u8>>,
    responses: Vec<(String, String)>,
    exit_codes: Vec<(String, i32)>,
    commands: Vec<String>,
    delay: Duration,
    echo: bool,
    pause_after: Option<(String, Duration)>,
    busy: usize,
    max_busy: usize,
    sessions: usize,
}

impl FakeConsole {
    /// Start listening on a random local port.
    pub async fn start() -> std::io::Result<Self> {
        let listener = TcpListener::bind("127.0.0.1:0").await?;
        let port = listener.local_addr()?.port();
        let state: Arc<Mutex<ShellState>> = Default::default();
        let task_state = state.clone();
        let task = tokio::spawn(async move {
            while let Ok((stream, _)) = listener.accept().await {
                tokio::spawn(serve_shell(stream, task_state.clone()));
            }
        });
        Ok(Self { port, state, task })
    }

    /// The port on which the console listens.
    pub fn port(&self) -> u16 {
        self.port
    }

    /// The console target to connect to.
    pub fn target(&self) -> ConsoleTarget {
        ConsoleTarget::new("127.0.0.1", self.port)
    }

    /// Answer every command starting with `prefix` with `output`.
    pub fn respond(&self, prefix: impl Into<String>, output: impl Into<String>) {
        lock(&self.state)
            .responses
            .insert(0, (prefix.into(), output.into()));
    }

    /// Let every command starting with `prefix` exit with `code`.
    pub fn exit_code(&self, prefix: impl Into<String>, code: i32) {
        lock(&self.state).exit_codes.insert(0, (prefix.into(), code));
    }

    /// Wait `delay` before answering a command whose exit code is requested.
    pub fn set_delay(&self, delay: Duration) {
        lock(&self.state).delay = delay;
    }

    /// Echo every received line back, as a terminal with echo enabled does.
    pub fn set_echo(&self, echo: bool) {
        lock(&self.state).echo = echo;
    }

    /// Deliver replies that contain `marker` in two parts: everything up to and including the
    /// marker, and the rest after `pause`.
    pub fn pause_after(&self, marker: impl Into<String>, pause: Duration) {
        lock(&self.state).pause_after = Some((marker.into(), pause));
    }

    /// Create a file in the fake file system.
    pub fn put_file(&self, path: impl Into<String>, content: impl Into<Vec<u8>>) {
        lock(&self.state).files.insert(path.into(), content.into());
    }

    /// Content of a file in the fake file system.
    pub fn file(&self, path: &str) -> Option<String> {
        lock(&self.state)
            .files
            .get(path)
            .map(|c| String::from_utf8_lossy(c).into_owned())
    }

    /// All commands received so far (lines of here-documents excluded).
    pub fn commands(&self) -> Vec<String> {
        lock(&self.state).commands.clone()
    }

    /// Maximum number of sessions that were executing a command (whose exit code was requested)
    /// at the same time.
    pub fn max_concurrent_sessions(&self) -> usize {
        lock(&self.state).max_busy
    }

    /// Number of sessions opened so far.
    pub fn sessions(&self) -> usize {
        lock(&self.state).sessions
    }
}

impl Drop for FakeConsole {
    fn drop(&mut self) {
        self.task.abort();
    }
}

async fn serve_shell(stream: TcpStream, state: Arc<Mutex<ShellState>>) {
    lock(&state).sessions += 1;
    let _ = run_shell(stream, &state).await;
}

async fn run_shell(mut stream: TcpStream, state: &Mutex<ShellState>) -> std::io::Result<()> {
    let status_suffix = format!("; printf '{EXIT_SENTINEL}%s\\n' $?");
    let mut heredoc: Option<(String, Vec<String>)> = None;
    let mut pending = Vec::new();
    let mut buf = [0u8; 1024];
    stream.write_all(FAKE_PROMPT.as_bytes()).await?;
    loop {
        let n = stream.read(&mut buf).await?;
        if n == 0 {
            return Ok(());
        }
        for &b in &buf[..n] {
            if b != b'\r' && b != b'\n' {
                pending.push(b);
                continue;
            }
            if pending.is_empty() {
                continue;
            }
            let line = String::from_utf8_lossy(&pending).into_owned();
            pending.clear();
            if lock(state).echo {
                stream.write_all(format!("{line}\r\n").as_bytes()).await?;
            }

            if let Some((path, lines)) = heredoc.as_mut() {
                if line == "EOF" {
                    let content = lines.join("\n") + "\n";
                    lock(state).files.insert(path.clone(), content.into_bytes());
                    heredoc = None;
                    stream.write_all(FAKE_PROMPT.as_bytes()).await?;
                } else {
                    lines.push(line);
                }
                continue;
            }

            lock(state).commands.push(line.clone());
            if line == "exit" {
                return Ok(());
            } else if let Some(path) = line.strip_prefix("cat <<'EOF' > ") {
                heredoc = Some((unquote(path), Vec::new()));
            } else if let Some(cmd) = line.strip_suffix(&status_suffix) {
                let delay = {
                    let mut s = lock(state);
                    s.busy += 1;
                    s.max_busy = s.max_busy.max(s.busy);
                    s.delay
                };
                tokio::time::sleep(delay).await;
                let (output, code) = execute(state, cmd);
                let mut reply = output;
                if !reply.is_empty() && !reply.ends_with('\n') {
                    reply.push_str("\r\n");
                }
                reply.push_str(&format!("{EXIT_SENTINEL}{code}\r\n{FAKE_PROMPT}"));
                let written = write_reply(&mut stream, state, &reply).await;
                lock(state).busy -= 1;
                written?;
            } else {
                let (output, _) = execute(state, &line);
                write_reply(&mut stream, state, &format!("{output}\r\n{FAKE_PROMPT}")).await?;
            }
        }
    }
}

/// Write a reply, split at the configured pause marker.
async fn write_reply(
    stream: &mut TcpStream,
    state: &Mutex<ShellState>,
    reply: &str,
) -> std::io::Result<()> {
    let pause = lock(state).pause_after.clone();
    let split = pause.and_then(|(marker, pause)| {
        reply
            .find(marker.as_str())
            .map(|pos| (pos + marker.len(), pause))
    });
    match split {
        Some((at, pause)) => {
            stream.write_all(reply[..at].as_bytes()).await?;
            stream.flush().await?;
            tokio::time::sleep(pause).await;
            stream.write_all(reply[at..].as_bytes()).await
        }
        None => stream.write_all(reply.as_bytes()).await,
    }
}

/// Execute a command in the fake shell, returning its output and exit code.
fn execute(state: &Mutex<ShellState>, cmd: &str) -> (String, i32) {
    let mut s = lock(state);
    let response = s
        .responses
        .iter()
        .find(|(prefix, _)| cmd.starts_with(prefix.as_str()))
        .map(|(_, out)| out.clone());
    if let Some((_, code)) = s.exit_codes.iter().find(|(p, _)| cmd.starts_with(p.as_str())) {
        return (response.unwrap_or_default(), *code);
    }
    let words: Vec<String> = cmd.split_whitespace().map(unquote).collect();
    let words: Vec<&str> = words.iter().map(String::as_str).collect();
    match words.as_slice() {
        ["[", "-e", path, "]"] => (String::new(), if s.files.contains_key(*path) { 0 } else { 1 }),
        ["mkdir", ..] => (String::new(), 0),
        ["cat", path] if s.files.contains_key(*path) => {
            (String::from_utf8_lossy(&s.files[*path]).into_owned(), 0)
        }
        ["rm", "-f", path] => {
            s.files.remove(*path);
            (String::new(), 0)
        }
        ["chmod", "+x", path] => (String::new(), if s.files.contains_key(*path) { 0 } else { 1 }),
        ["base64", "-d", src, ">", dst] => {
            let decoded = s
                .files
                .get(*src)
                .map(|c| c.iter().copied().filter(|b| !b.is_ascii_whitespace()).collect::<Vec<u8>>())
                .and_then(|c| base64::decode(c).ok());
            match decoded {
                Some(content) => {
                    s.files.insert(dst.to_string(), content);
                    (String::new(), 0)
                }
                None => (format!("base64: {src}: No such file or directory"), 1),
            }
        }
        _ => (response.unwrap_or_default(), 0),
    }
}

fn unquote(s: &str) -> String {
    s.trim().trim_matches('\'').to_string()
}

/// Fake GNS3 server.
pub struct FakeGns3 {
    server: MockServer,
    state: Arc<Mutex<Gns3State>>,
}

#[derive(Debug, Default)]
struct Gns3State {
    projects: Vec<Project>,
    templates: Vec<(Template, Option<u16>)>,
    nodes: Vec<(String, Node)>,
    links: Vec<(String, Link)>,
    requests: Vec<String>,
    failing: HashSet<String>,
    next_id: u64,
}

impl Gns3State {
    fn new_id(&mut self, kind: u32) -> String {
        self.next_id += 1;
        format!("{kind:08x}-0000-4000-8000-{:012x}", self.next_id)
    }

    fn node_mut(&mut self, project: &str, node: &str) -> Option<&mut Node> {
        self.nodes
            .iter_mut()
            .find(|(p, n)| p == project && n.node_id == node)
            .map(|(_, n)| n)
    }

    fn create_node(&mut self, project: &str, name: &str, console: Option<u16>, x: i64, y: i64) -> Node {
        let node = Node {
            node_id: self.new_id(1),
            name: name.to_string(),
            template_id: None,
            node_type: Some(String::from("qemu")),
            compute_id: String::from("local"),
            console,
            console_host: Some(String::from("0.0.0.0")),
            console_type: Some(String::from(if console.is_some() { "telnet" } else { "none" })),
            ports: (0..16)
                .map(|adapter_number| Port {
                    adapter_number,
                    port_number: 0,
                    name: Some(format!("eth{adapter_number}")),
                })
                .collect(),
            properties: json!({ "adapters": 16 }),
            status: NodeStatus::Stopped,
            x,
            y,
        };
        self.nodes.push((project.to_string(), node.clone()));
        node
    }
}

impl FakeGns3 {
    /// Start the fake server.
    pub async fn start() -> Self {
        let server = MockServer::start().await;
        let state: Arc<Mutex<Gns3State>> = Default::default();
        Mock::given(any())
            .respond_with(Gns3Responder(state.clone()))
            .mount(&server)
            .await;
        Self { server, state }
    }

    /// Base URL of the fake server.
    pub fn uri(&self) -> String {
        self.server.uri()
    }

    /// A client talking to the fake server.
    pub fn client(&self) -> Gns3Client {
        // building a client without TLS configuration cannot fail
        Gns3Client::new(self.uri(), None, Duration::from_secs(10))
            .unwrap_or_else(|e| panic!("cannot build the client: {e}"))
    }

    /// Create a project and return its id.
    pub fn add_project(&self, name: &str) -> String {
        let mut s = lock(&self.state);
        let project_id = s.new_id(0);
        s.projects.push(Project {
            project_id: project_id.clone(),
            name: name.to_string(),
            status: Some(String::from("opened")),
        });
        project_id
    }

    /// Create a template and return its id. Nodes created from it get a telnet console on
    /// `console` (if given).
    pub fn add_template(&self, name: &str, console: Option<u16>) -> String {
        let mut s = lock(&self.state);
        let template_id = s.new_id(2);
        s.templates.push((
            Template {
                template_id: template_id.clone(),
                name: name.to_string(),
                template_type: Some(String::from("qemu")),
            },
            console,
        ));
        template_id
    }

    /// Create a node directly (as if it was created by hand in the GUI).
    pub fn add_node(&self, project: &str, name: &str, console: Option<u16>, x: i64, y: i64) -> Node {
        lock(&self.state).create_node(project, name, console, x, y)
    }

    /// Change the console of an existing node.
    pub fn set_console(&self, project: &str, node: &str, console_type: &str, host: &str) {
        if let Some(n) = lock(&self.state).node_mut(project, node) {
            n.console_type = Some(console_type.to_string());
            n.console_host = Some(host.to_string());
        }
    }

    /// All nodes of a project.
    pub fn nodes(&self, project: &str) -> Vec<Node> {
        lock(&self.state)
            .nodes
            .iter()
            .filter(|(p, _)| p == project)
            .map(|(_, n)| n.clone())
            .collect()
    }

    /// All links of a project.
    pub fn links(&self, project: &str) -> Vec<Link> {
        lock(&self.state)
            .links
            .iter()
            .filter(|(p, _)| p == project)
            .map(|(_, l)| l.clone())
            .collect()
    }

    /// All requests received so far, formatted as `METHOD /path`.
    pub fn requests(&self) -> Vec<String> {
        lock(&self.state).requests.clone()
    }

    /// Answer the request `METHOD /path` with a 500 error from now on.
    pub fn fail(&self, method: &str, path: &str) {
        lock(&self.state).failing.insert(format!("{method} {path}"));
    }
}

struct Gns3Responder(Arc<Mutex<Gns3State>>);

fn not_found(what: &str) -> ResponseTemplate {
    ResponseTemplate::new(404).set_body_json(json!({ "message": format!("{what} not found") }))
}

impl Respond for Gns3Responder {
    fn respond(&self, request: &Request) -> ResponseTemplate {
        let method = request.method.to_string();
        let path = request.url.path().to_string();
        let body: Value = serde_json::from_slice(&request.body).unwrap_or(Value::Null);
        let mut s = lock(&self.0);
        let key = format!("{method} {path}");
        s.requests.push(key.clone());
        if s.failing.contains(&key) {
            return ResponseTemplate::new(500).set_body_json(json!({ "message": "injected failure" }));
        }

        let segments: Vec<&str> = path.trim_matches('/').split('/').collect();
        match (method.as_str(), segments.as_slice()) {
            ("GET", ["v2", "projects"]) => ResponseTemplate::new(200).set_body_json(&s.projects),
            ("GET", ["v2", "templates"]) => {
                let templates: Vec<&Template> = s.templates.iter().map(|(t, _)| t).collect();
                ResponseTemplate::new(200).set_body_json(templates)
            }
            ("POST", ["v2", "projects", project, "templates", template]) => {
                let Some(console) = s
                    .templates
                    .iter()
                    .find(|(t, _)| t.template_id == *template)
                    .map(|(_, c)| *c)
                else {
                    return not_found("Template");
                };
                let name = body["name"].as_str().unwrap_or("node").to_string();
                let x = body["x"].as_i64().unwrap_or_default();
                let y = body["y"].as_i64().unwrap_or_default();
                let mut node = s.create_node(project, &name, console, x, y);
                node.template_id = Some(template.to_string());
                if let Some(n) = s.node_mut(project, &node.node_id) {
                    n.template_id = node.template_id.clone();
                }
                ResponseTemplate::new(201).set_body_json(node)
            }
            ("GET", ["v2", "projects", project, "nodes"]) => {
                let nodes: Vec<&Node> = s
                    .nodes
                    .iter()
                    .filter(|(p, _)| p == project)
                    .map(|(_, n)| n)
                    .collect();
                ResponseTemplate::new(200).set_body_json(nodes)
            }
            ("POST", ["v2", "projects", project, "nodes", "stop"]) => {
                s.nodes
                    .iter_mut()
                    .filter(|(p, _)| p == project)
                    .for_each(|(_, n)| n.status = NodeStatus::Stopped);
                ResponseTemplate::new(204)
            }
            ("GET", ["v2", "projects", project, "nodes", node]) => match s.node_mut(project, node) {
                Some(n) => ResponseTemplate::new(200).set_body_json(&*n),
                None => not_found("Node"),
            },
            ("POST", ["v2", "projects", project, "nodes", node, "start"]) => {
                match s.node_mut(project, node) {
                    Some(n) => {
                        n.status = NodeStatus::Started;
                        ResponseTemplate::new(200).set_body_json(&*n)
                    }
                    None => not_found("Node"),
                }
            }
            ("DELETE", ["v2", "projects", project, "nodes", node]) => {
                let before = s.nodes.len();
                s.nodes.retain(|(p, n)| !(p == project && n.node_id == *node));
                if s.nodes.len() == before {
                    return not_found("Node");
                }
                s.links.retain(|(p, l)| !(p == project && l.touches(node)));
                ResponseTemplate::new(204)
            }
            ("GET", ["v2", "projects", project, "links"]) => {
                let links: Vec<&Link> = s
                    .links
                    .iter()
                    .filter(|(p, _)| p == project)
                    .map(|(_, l)| l)
                    .collect();
                ResponseTemplate::new(200).set_body_json(links)
            }
            ("POST", ["v2", "projects", project, "links"]) => {
                let endpoints: Vec<LinkEndpoint> =
                    match serde_json::from_value(body["nodes"].clone()) {
                        Ok(e) => e,
                        Err(e) => {
                            return ResponseTemplate::new(400)
                                .set_body_json(json!({ "message": e.to_string() }))
                        }
                    };
                if endpoints.len() != 2 {
                    return ResponseTemplate::new(400)
                        .set_body_json(json!({ "message": "A link needs two nodes" }));
                }
                for e in &endpoints {
                    if s.node_mut(project, &e.node_id).is_none() {
                        return not_found("Node");
                    }
                    let used = s.links.iter().any(|(p, l)| p == project && l.nodes.contains(e));
                    if used {
                        return ResponseTemplate::new(409).set_body_json(json!({
                            "message": format!("Port {}/{} is not free", e.adapter_number, e.port_number)
                        }));
                    }
                }
                let link = Link {
                    link_id: s.new_id(3),
                    link_type: Some(String::from("ethernet")),
                    nodes: endpoints,
                };
                s.links.push((project.to_string(), link.clone()));
                ResponseTemplate::new(201).set_body_json(link)
            }
            ("DELETE", ["v2", "projects", project, "links", link]) => {
                let before = s.links.len();
                s.links.retain(|(p, l)| !(p == project && l.link_id == *link));
                if s.links.len() == before {
                    return not_found("Link");
                }
                ResponseTemplate::new(204)
            }
            _ => not_found("Endpoint"),
        }
    }
}
