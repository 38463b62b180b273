//! Output formatting utilities
//!
//! Provides table and JSON output formatting for CLI commands.

use crate::cli::args::OutputFormat;
use serde::Serialize;
use std::io::{self, Write};

/// Format and print output based on the selected format
pub fn print_output<T: Serialize + TableDisplay>(data: &T, format: OutputFormat) -> io::Result<()> {
    let stdout = io::stdout();
    let mut handle = stdout.lock();

    match format {
        OutputFormat::Table => {
            writeln!(handle, "{}", data.to_table())?;
        }
        OutputFormat::Json => {
            let json = serde_json::to_string_pretty(data).unwrap_or_else(|_| "{}".to_string());
            writeln!(handle, "{}", json)?;
        }
        OutputFormat::Compact => {
            writeln!(handle, "{}", data.to_compact())?;
        }
    }

    Ok(())
}

/// Trait for types that can be displayed as a table
pub trait TableDisplay {
    /// Format as a table string
    fn to_table(&self) -> String;

    /// Format as a compact single line
    fn to_compact(&self) -> String {
        self.to_table().replace('\n', " | ")
    }
}

/// Validated configuration overview
#[derive(Debug, Clone, Serialize)]
pub struct ConfigSummary {
    pub source: Option<String>,
    pub queue: String,
    pub queue_name: String,
    pub store: String,
    pub dispatch: String,
    pub initial_delay_secs: u64,
    pub repeat_delay_secs: u64,
    pub contacts: usize,
    pub channels: usize,
    pub channel_types: Vec<String>,
    pub unhandled_types: Vec<String>,
    pub tags: usize,
    pub rules: usize,
    pub checks: usize,
}

impl TableDisplay for ConfigSummary {
    fn to_table(&self) -> String {
        let mut output = format!(
            "Configuration: {}\n",
            self.source.as_deref().unwrap_or("(defaults)")
        );
        output.push_str(&format!("  Queue:       {} ({})\n", self.queue, self.queue_name));
        output.push_str(&format!("  Store:       {}\n", self.store));
        output.push_str(&format!("  Dispatch:    {}\n", self.dispatch));
        output.push_str(&format!(
            "  Escalation:  {}s initial, {}s repeat\n",
            self.initial_delay_secs, self.repeat_delay_secs
        ));
        output.push_str(&format!(
            "  Recipients:  {} contacts, {} channels\n",
            self.contacts, self.channels
        ));
        output.push_str(&format!(
            "  Routing:     {} tags, {} rules, {} checks\n",
            self.tags, self.rules, self.checks
        ));

        if !self.channel_types.is_empty() {
            output.push_str(&format!("  Channel types: {}\n", self.channel_types.join(", ")));
        }

        if !self.unhandled_types.is_empty() {
            output.push_str("\n  Warnings:\n");
            for kind in &self.unhandled_types {
                output.push_str(&format!("    • no delivery handler for '{}'\n", kind));
            }
        }

        output
    }

    fn to_compact(&self) -> String {
        format!(
            "queue={} store={} contacts={} channels={} tags={} rules={} checks={}",
            self.queue, self.store, self.contacts, self.channels, self.tags, self.rules, self.checks
        )
    }
}

/// One check-to-channel route
#[derive(Debug, Clone, Serialize)]
pub struct RouteEntry {
    pub check: String,
    pub rule: String,
    pub channel: String,
    pub contact: String,
    pub kind: String,
    pub address: String,
}

/// Routes of one check
#[derive(Debug, Clone, Serialize)]
pub struct CheckRoutes {
    pub check: String,
    pub tags: Vec<String>,
    pub routes: Vec<RouteEntry>,
}

/// Route listing for display
#[derive(Debug, Clone, Serialize)]
pub struct RouteList {
    pub checks: Vec<CheckRoutes>,
}

impl TableDisplay for RouteList {
    fn to_table(&self) -> String {
        if self.checks.is_empty() {
            return "No checks configured".to_string();
        }

        let mut output = String::new();
        for check in &self.checks {
            output.push_str(&format!("{} [{}]\n", check.check, check.tags.join(", ")));

            if check.routes.is_empty() {
                output.push_str("  (no routes)\n");
            }
            for route in &check.routes {
                output.push_str(&format!(
                    "  {} -> {} ({} {} for {})\n",
                    route.rule, route.channel, route.kind, route.address, route.contact
                ));
            }
        }

        output
    }

    fn to_compact(&self) -> String {
        self.checks
            .iter()
            .map(|c| {
                let channels: Vec<&str> = c.routes.iter().map(|r| r.channel.as_str()).collect();
                format!("{}:{}", c.check, channels.join("+"))
            })
            .collect::<Vec<_>>()
            .join(", ")
    }
}

/// Simple message output
#[derive(Debug, Clone, Serialize)]
pub struct Message {
    pub message: String,
    pub success: bool,
}

impl TableDisplay for Message {
    fn to_table(&self) -> String {
        if self.success {
            format!("✓ {}", self.message)
        } else {
            format!("✗ {}", self.message)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn route(check: &str, channel: &str) -> RouteEntry {
        RouteEntry {
            check: check.to_string(),
            rule: "disk".to_string(),
            channel: channel.to_string(),
            contact: "ops".to_string(),
            kind: "email".to_string(),
            address: "ops@example.com".to_string(),
        }
    }

    #[test]
    fn test_route_list_table() {
        let list = RouteList {
            checks: vec![
                CheckRoutes {
                    check: "db01:disk".to_string(),
                    tags: vec!["disk".to_string()],
                    routes: vec![route("db01:disk", "ops-email")],
                },
                CheckRoutes {
                    check: "web01:http".to_string(),
                    tags: Vec::new(),
                    routes: Vec::new(),
                },
            ],
        };

        let output = list.to_table();
        assert!(output.contains("db01:disk [disk]"));
        assert!(output.contains("disk -> ops-email"));
        assert!(output.contains("(no routes)"));
        assert_eq!(list.to_compact(), "db01:disk:ops-email, web01:http:");
    }

    #[test]
    fn test_empty_route_list() {
        let list = RouteList { checks: Vec::new() };
        assert_eq!(list.to_table(), "No checks configured");
    }

    #[test]
    fn test_config_summary_warnings() {
        let summary = ConfigSummary {
            source: None,
            queue: "directory".to_string(),
            queue_name: "results".to_string(),
            store: "memory".to_string(),
            dispatch: "background".to_string(),
            initial_delay_secs: 30,
            repeat_delay_secs: 60,
            contacts: 1,
            channels: 2,
            channel_types: vec!["log".to_string(), "sms".to_string()],
            unhandled_types: vec!["sms".to_string()],
            tags: 0,
            rules: 0,
            checks: 0,
        };

        let output = summary.to_table();
        assert!(output.contains("(defaults)"));
        assert!(output.contains("30s initial, 60s repeat"));
        assert!(output.contains("no delivery handler for 'sms'"));
    }

    #[test]
    fn test_message_display() {
        let msg = Message {
            message: "Result queued".to_string(),
            success: true,
        };

        assert!(msg.to_table().starts_with('✓'));
    }
}
