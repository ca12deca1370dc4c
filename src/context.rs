//! Capabilities the host environment injects into the module: operator
//! logging, credential persistence, and discovered-user notification.
//!
//! The module only ever talks to the trait objects bundled in [`Context`],
//! so tests substitute recording doubles and the CLI picks between the
//! in-memory and CSV-backed stores.
use std::fs::File;
use std::io::Write;
use std::path::Path;

use anyhow::{Context as _, Result};
use colored::Colorize;

/// Leveled operator-facing output.
pub trait Logger {
    fn info(&mut self, msg: &str);
    fn error(&mut self, msg: &str);
    fn success(&mut self, msg: &str);
    fn highlight(&mut self, msg: &str);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CredentialKind {
    Hash,
}

/// A harvested credential, tagged with the computer it was pillaged from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CredentialRecord {
    pub kind: CredentialKind,
    pub domain: String,
    pub username: String,
    pub secret: String,
    pub pillaged_from: Option<i64>,
}

pub trait CredentialStore {
    /// Identifier of a known computer by host address, if the store tracks
    /// one. Stores may intern previously unseen hosts.
    fn computer_id(&mut self, host: &str) -> Option<i64>;
    fn add_credential(&mut self, record: &CredentialRecord) -> Result<()>;
}

/// Receives newly discovered user identities for downstream enrichment.
pub trait DiscoveryNotifier {
    fn user_found(&mut self, username: &str, domain: &str);
}

/// Bundle of injected capabilities handed to the module per invocation.
pub struct Context<'a> {
    pub log: &'a mut dyn Logger,
    pub store: &'a mut dyn CredentialStore,
    pub notifier: &'a mut dyn DiscoveryNotifier,
}

/// Console logger with the usual operator prefixes.
#[derive(Debug, Default)]
pub struct ConsoleLogger;

impl Logger for ConsoleLogger {
    fn info(&mut self, msg: &str) {
        println!("{} {}", "[*]".blue().bold(), msg);
    }

    fn error(&mut self, msg: &str) {
        println!("{} {}", "[-]".red().bold(), msg.red());
    }

    fn success(&mut self, msg: &str) {
        println!("{} {}", "[+]".green().bold(), msg.green());
    }

    fn highlight(&mut self, msg: &str) {
        println!("{}", msg.yellow().bold());
    }
}

/// In-memory store; interns hosts in insertion order.
#[derive(Debug, Default)]
pub struct MemoryCredentialStore {
    pub computers: Vec<String>,
    pub records: Vec<CredentialRecord>,
}

impl MemoryCredentialStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl CredentialStore for MemoryCredentialStore {
    fn computer_id(&mut self, host: &str) -> Option<i64> {
        Some(intern(&mut self.computers, host))
    }

    fn add_credential(&mut self, record: &CredentialRecord) -> Result<()> {
        self.records.push(record.clone());
        Ok(())
    }
}

fn intern(computers: &mut Vec<String>, host: &str) -> i64 {
    if let Some(idx) = computers.iter().position(|h| h == host) {
        return idx as i64;
    }
    computers.push(host.to_string());
    (computers.len() - 1) as i64
}

/// Store that appends credential rows to a CSV file.
pub struct CsvCredentialStore {
    writer: csv::Writer<File>,
    computers: Vec<String>,
}

impl CsvCredentialStore {
    pub fn create<P: AsRef<Path>>(path: P) -> Result<Self> {
        let mut writer = csv::Writer::from_path(&path)
            .with_context(|| format!("create {}", path.as_ref().display()))?;
        writer.write_record(["Type", "Domain", "Username", "Secret", "PillagedFrom"])?;
        Ok(Self {
            writer,
            computers: Vec::new(),
        })
    }

    pub fn flush(&mut self) -> Result<()> {
        self.writer.flush()?;
        Ok(())
    }
}

impl CredentialStore for CsvCredentialStore {
    fn computer_id(&mut self, host: &str) -> Option<i64> {
        Some(intern(&mut self.computers, host))
    }

    fn add_credential(&mut self, record: &CredentialRecord) -> Result<()> {
        let kind = match record.kind {
            CredentialKind::Hash => "hash",
        };
        let pillaged = record
            .pillaged_from
            .and_then(|id| self.computers.get(id as usize))
            .map(String::as_str)
            .unwrap_or("");
        self.writer.write_record([
            kind,
            record.domain.as_str(),
            record.username.as_str(),
            record.secret.as_str(),
            pillaged,
        ])?;
        Ok(())
    }
}

/// Collects discovered users; exportable as `user@domain` lines.
#[derive(Debug, Default)]
pub struct DiscoveredUsers {
    pub users: Vec<(String, String)>,
}

impl DiscoveredUsers {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn save_txt<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let mut f = File::create(&path)
            .with_context(|| format!("create {}", path.as_ref().display()))?;
        for (username, domain) in &self.users {
            writeln!(f, "{username}@{domain}")?;
        }
        Ok(())
    }
}

impl DiscoveryNotifier for DiscoveredUsers {
    fn user_found(&mut self, username: &str, domain: &str) {
        self.users.push((username.to_string(), domain.to_string()));
    }
}
