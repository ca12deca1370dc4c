//! Data contracts for the attack-runner boundary.
//!
//! The runner performs the actual remote work (agent drop, session hijack,
//! PKINIT exchange, cleanup) and is deliberately opaque to this crate:
//! callers see a [`DumpRequest`] going in and a [`DumpResults`] plus a
//! [`Tracker`] coming back. Everything derives `serde` so a run can be
//! captured and replayed across a process boundary.
use anyhow::Result;
use serde::{Deserialize, Serialize};

/// Parameters for one single-host dump attempt, assembled by the module
/// from its options and the current connection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DumpRequest {
    pub ca: String,
    pub template: String,
    pub user: String,
    pub dc_ip: Option<String>,
    pub domain: String,
    pub password: String,
    /// Always `"<lmhash>:<nthash>"`, empty components included.
    pub hashes: String,
    pub kerberos: bool,
}

/// One account whose session was hijacked on the target.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DumpedUser {
    pub domain: String,
    pub name: String,
    /// NT hash recovered via PKINIT, when the exchange succeeded.
    #[serde(default)]
    pub nt_hash: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DumpResults {
    pub users: Vec<DumpedUser>,
}

/// Diagnostic record of a run's side effects on the target. Cleanup flags
/// default to true so a tracker only reports what actually went wrong.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Tracker {
    pub nb_hijacked_users: u32,
    pub last_error_msg: Option<String>,
    pub files_cleaning_success: bool,
    pub svc_cleaning_success: bool,
    pub agent_filename: String,
    pub error_filename: String,
    pub output_filename: String,
    pub svc_name: String,
}

impl Default for Tracker {
    fn default() -> Self {
        Self {
            nb_hijacked_users: 0,
            last_error_msg: None,
            files_cleaning_success: true,
            svc_cleaning_success: true,
            agent_filename: String::new(),
            error_filename: String::new(),
            output_filename: String::new(),
            svc_name: String::new(),
        }
    }
}

/// Boundary to the external dump implementation. `run` blocks for the
/// duration of the remote operation; `None` means the attempt produced no
/// result set at all (distinct from an empty one). The tracker is valid
/// after `run` returns, whatever the outcome.
pub trait AttackRunner {
    fn run(&mut self, request: &DumpRequest, host: &str) -> Result<Option<DumpResults>>;
    fn last_tracker(&self) -> Tracker;
}
