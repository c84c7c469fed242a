//! Event and summary formatting for the console.
//!
//! Text mode prints one human-readable line per event; JSON mode prints
//! one object per line so the output can be piped into other tools.
//! When several servers are watched, every line names its server.

use std::time::Instant;

use appwatch_core::{AppMirror, ChangeEvent};
use serde_json::{Value, json};

/// How events are printed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    Text,
    Json,
}

impl OutputFormat {
    pub fn from_json_flag(json: bool) -> Self {
        if json { Self::Json } else { Self::Text }
    }
}

/// Render one event as it arrived. Names of removed apps are looked up
/// by the caller before the event reaches the mirror.
pub fn render_event(
    event: &ChangeEvent,
    removed_name: Option<&str>,
    server: Option<&str>,
    format: OutputFormat,
) -> String {
    match format {
        OutputFormat::Text => match server {
            Some(server) => format!("{server}  {}", event_text(event, removed_name)),
            None => event_text(event, removed_name),
        },
        OutputFormat::Json => {
            let mut value = event_json(event, removed_name);
            if let Some(server) = server {
                value["server"] = json!(server);
            }
            value.to_string()
        }
    }
}

fn event_text(event: &ChangeEvent, removed_name: Option<&str>) -> String {
    match event {
        ChangeEvent::Add { pid, record, icon } => {
            let icon = icon.as_ref().map_or(0, Vec::len);
            format!("+ {:>6}  {}  (icon {icon} bytes)", pid, record.name)
        }
        ChangeEvent::Remove { pid } => {
            format!("- {:>6}  {}", pid, removed_name.unwrap_or("?"))
        }
        ChangeEvent::FocusChanged { pid: 0 } => "* focus   none".to_string(),
        ChangeEvent::FocusChanged { pid } => format!("* {pid:>6}  focused"),
        ChangeEvent::Heartbeat => ". heartbeat".to_string(),
    }
}

fn event_json(event: &ChangeEvent, removed_name: Option<&str>) -> Value {
    match event {
        ChangeEvent::Add { pid, record, icon } => json!({
            "type": "add",
            "pid": pid,
            "name": record.name,
            "icon_bytes": icon.as_ref().map_or(0, Vec::len),
        }),
        ChangeEvent::Remove { pid } => json!({
            "type": "remove",
            "pid": pid,
            "name": removed_name,
        }),
        ChangeEvent::FocusChanged { pid } => json!({ "type": "focus", "pid": pid }),
        ChangeEvent::Heartbeat => json!({ "type": "heartbeat" }),
    }
}

/// Focus-share table of everything the mirror holds.
pub fn render_summary(
    mirror: &AppMirror,
    server: Option<&str>,
    now: Instant,
    format: OutputFormat,
) -> String {
    let rows = mirror.summary(now);
    match format {
        OutputFormat::Json => {
            let mut value = json!({ "type": "summary", "apps": rows });
            if let Some(server) = server {
                value["server"] = json!(server);
            }
            value.to_string()
        }
        OutputFormat::Text => {
            let mut out = server.map(|s| format!("== {s}\n")).unwrap_or_default();
            out.push_str(&format!("{:>6}  {:>4}  {:>10}  name\n", "pid", "%", "focused"));
            for row in rows {
                let marker = if row.has_focus { '*' } else { ' ' };
                out.push_str(&format!(
                    "{:>6}  {:>3}%  {:>9.1}s {marker}{}\n",
                    row.pid,
                    row.percentage,
                    row.focused_ms as f64 / 1000.0,
                    row.name
                ));
            }
            out
        }
    }
}
