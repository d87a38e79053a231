//! Minimal MCP provider over stdio.
//!
//! Exposes `greet` (no arguments, fixed welcome text) and `echo` (returns its
//! `text` argument). Used as a demo provider and by the integration tests.
//!
//! Flags:
//! - `--delay-ms <N>`: sleep before answering each `tools/call`
//! - `--page-size <N>`: split `tools/list` into pages of N tools
//! - `--chatty`: before every response, print a log line, a bare JSON value,
//!   a notification, a `ping` and an unsupported request; the extra `replies`
//!   tool reports how the client answered them
//! - `--flood`: answer `tools/list` with 2 MiB of unterminated output
//! - `--deaf`: stop reading stdin once the handshake is done

use std::io::{self, BufRead, Write};
use std::thread;
use std::time::Duration;

use mcp::protocol::{JsonRpcResponse, METHOD_NOT_FOUND, PROTOCOL_VERSION, RequestId};
use serde_json::{Value, json};

const GREETING: &str = "Welcome to the world of MCP!";

const FLOOD_BYTES: usize = 2 * 1024 * 1024;

#[derive(Default)]
struct Options {
    delay: Duration,
    page_size: usize,
    chatty: bool,
    flood: bool,
    deaf: bool,
}

fn parse_options() -> Result<Options, String> {
    let mut options = Options {
        page_size: usize::MAX,
        ..Options::default()
    };

    let mut args = std::env::args().skip(1);
    while let Some(flag) = args.next() {
        match flag.as_str() {
            "--chatty" => options.chatty = true,
            "--flood" => options.flood = true,
            "--deaf" => options.deaf = true,
            "--delay-ms" | "--page-size" => {
                let value = args
                    .next()
                    .ok_or_else(|| format!("missing value for {flag}"))?;
                let number: u64 = value
                    .parse()
                    .map_err(|_| format!("invalid number for {flag}: {value}"))?;
                if flag == "--delay-ms" {
                    options.delay = Duration::from_millis(number);
                } else {
                    options.page_size = number.max(1) as usize;
                }
            }
            other => return Err(format!("unknown flag: {other}")),
        }
    }
    Ok(options)
}

/// How the client answered the requests sent in chatty mode.
#[derive(Default)]
struct Replies {
    pings: u64,
    rejected: u64,
    unexpected: u64,
}

impl Replies {
    fn record(&mut self, message: &Value) {
        let id = message.get("id").and_then(Value::as_str).unwrap_or("");
        let code = message.pointer("/error/code").and_then(Value::as_i64);

        if id.starts_with("ping-") && message.get("result") == Some(&json!({})) {
            self.pings += 1;
        } else if id.starts_with("sample-") && code == Some(i64::from(METHOD_NOT_FOUND)) {
            self.rejected += 1;
        } else {
            self.unexpected += 1;
        }
    }

    fn summary(&self) -> String {
        format!(
            "pings={} rejected={} unexpected={}",
            self.pings, self.rejected, self.unexpected
        )
    }
}

fn chatter(out: &mut impl Write, seq: u64) -> io::Result<()> {
    writeln!(out, "greeter: handling request {seq}")?;
    writeln!(out, "42")?;
    let messages = [
        json!({
            "jsonrpc": "2.0",
            "method": "notifications/message",
            "params": {"level": "info", "data": "working"}
        }),
        json!({"jsonrpc": "2.0", "id": format!("ping-{seq}"), "method": "ping"}),
        json!({
            "jsonrpc": "2.0",
            "id": format!("sample-{seq}"),
            "method": "sampling/createMessage",
            "params": {}
        }),
    ];
    for message in messages {
        writeln!(out, "{message}")?;
    }
    Ok(())
}

fn tools(options: &Options) -> Vec<Value> {
    let mut tools = vec![
        json!({
            "name": "greet",
            "description": "Return a welcome message when greeted with \"Hi\", \"Hey\" or \"Hello\".",
            "inputSchema": {"type": "object", "properties": {}}
        }),
        json!({
            "name": "echo",
            "description": "Repeat the given text back.",
            "inputSchema": {
                "type": "object",
                "properties": {"text": {"type": "string"}},
                "required": ["text"]
            }
        }),
    ];
    if options.chatty {
        tools.push(json!({
            "name": "replies",
            "description": "Report how the client answered provider requests.",
            "inputSchema": {"type": "object", "properties": {}}
        }));
    }
    tools
}

fn list_page(params: &Value, options: &Options) -> Value {
    let all = tools(options);
    let page_size = options.page_size;
    let start = params
        .get("cursor")
        .and_then(Value::as_str)
        .and_then(|cursor| cursor.parse::<usize>().ok())
        .unwrap_or(0);
    let end = start.saturating_add(page_size).min(all.len());

    let slice = all[start.min(end)..end].to_vec();
    let mut page = json!({ "tools": slice });
    if end < all.len() {
        page["nextCursor"] = Value::String(end.to_string());
    }
    page
}

fn call(params: &Value, replies: &Replies) -> Value {
    let text_result = |text: &str, is_error: bool| {
        json!({ "content": [{"type": "text", "text": text}], "isError": is_error })
    };

    match params.get("name").and_then(Value::as_str) {
        Some("greet") => text_result(GREETING, false),
        Some("echo") => match params.pointer("/arguments/text").and_then(Value::as_str) {
            Some(text) => text_result(text, false),
            None => text_result("missing required argument: text", true),
        },
        Some("replies") => text_result(&replies.summary(), false),
        Some(other) => text_result(&format!("unknown tool: {other}"), true),
        None => text_result("missing tool name", true),
    }
}

fn respond(
    id: RequestId,
    method: &str,
    params: &Value,
    options: &Options,
    replies: &Replies,
) -> JsonRpcResponse {
    match method {
        "initialize" => JsonRpcResponse::success(
            id,
            json!({
                "protocolVersion": PROTOCOL_VERSION,
                "capabilities": {"tools": {"listChanged": false}},
                "serverInfo": {"name": "greeter", "version": env!("CARGO_PKG_VERSION")}
            }),
        ),
        "ping" => JsonRpcResponse::success(id, json!({})),
        "tools/list" => JsonRpcResponse::success(id, list_page(params, options)),
        "tools/call" => {
            thread::sleep(options.delay);
            JsonRpcResponse::success(id, call(params, replies))
        }
        other => JsonRpcResponse::failure(id, METHOD_NOT_FOUND, format!("unknown method: {other}")),
    }
}

fn main() -> io::Result<()> {
    let options = parse_options().map_err(io::Error::other)?;
    let stdin = io::stdin();
    let mut stdout = io::stdout();
    let mut replies = Replies::default();
    let mut seq = 0;

    for line in stdin.lock().lines() {
        let line = line?;
        let Ok(message) = serde_json::from_str::<Value>(&line) else {
            eprintln!("greeter: ignoring malformed line");
            continue;
        };

        let Some(method) = message.get("method").and_then(Value::as_str) else {
            // A reply to one of our own requests.
            replies.record(&message);
            continue;
        };

        // Notifications carry no id and get no answer.
        let Some(id) = message
            .get("id")
            .and_then(|id| serde_json::from_value::<RequestId>(id.clone()).ok())
        else {
            if options.deaf && method == "notifications/initialized" {
                loop {
                    thread::park();
                }
            }
            continue;
        };

        if options.chatty {
            seq += 1;
            chatter(&mut stdout, seq)?;
        }

        if options.flood && method == "tools/list" {
            stdout.write_all(&vec![b'x'; FLOOD_BYTES])?;
            stdout.flush()?;
            continue;
        }

        let params = message.get("params").cloned().unwrap_or(Value::Null);
        let response = respond(id, method, &params, &options, &replies);

        let frame = serde_json::to_string(&response).map_err(io::Error::other)?;
        writeln!(stdout, "{frame}")?;
        stdout.flush()?;
    }

    Ok(())
}
