//! Credential-dump module: glue between the host framework's privileged
//! login event and the external attack runner.
//!
//! On a privileged login the module assembles a [`DumpRequest`] from its
//! options and the connection, hands it to the runner, then translates the
//! result set and cleanup tracker into operator log lines, persisted
//! credentials, and discovered-user notifications. All failure modes are
//! communicated through the returned boolean and log severity; nothing in
//! the observable contract raises.
use crate::connection::Connection;
use crate::context::{Context, CredentialKind, CredentialRecord};
use crate::options::ModuleOptions;
use crate::runner::{AttackRunner, DumpRequest, DumpResults, DumpedUser, Tracker};

/// Remote directory the runner drops its working files into.
const REMOTE_DROP_DIR: &str = "\\Windows\\Temp\\";

#[derive(Debug, Clone, Default)]
pub struct CredentialDumpModule {
    options: ModuleOptions,
}

impl CredentialDumpModule {
    pub fn new(options: ModuleOptions) -> Self {
        Self { options }
    }

    pub fn options(&self) -> &ModuleOptions {
        &self.options
    }

    /// Handle a privileged login on one target. Runs the dump, reports on
    /// the outcome, and returns the overall result for this invocation.
    /// Holds no state across targets beyond the read-only options.
    pub fn on_admin_login(
        &self,
        ctx: &mut Context<'_>,
        conn: &Connection,
        runner: &mut dyn AttackRunner,
    ) -> bool {
        let Some(ca) = self.options.ca.as_deref() else {
            ctx.log
                .error("Please provide a valid CA server and CA name (CA_SERVER\\CA_NAME)");
            return false;
        };

        let request = DumpRequest {
            ca: ca.to_string(),
            template: self.options.template.clone(),
            user: conn.username.clone(),
            dc_ip: self.options.dc_ip.clone(),
            domain: conn.domain.clone(),
            password: conn.password.clone(),
            hashes: conn.hashes(),
            kerberos: conn.kerberos,
        };

        ctx.log.info("Running the credential dump on the targeted host");
        let results = match runner.run(&request, &conn.host) {
            Ok(results) => results,
            Err(e) => {
                ctx.log.error(&format!("Credential dump failed to start: {e:#}"));
                return false;
            }
        };
        let tracker = runner.last_tracker();

        self.process_results(ctx, conn, results.as_ref(), &tracker);
        self.process_errors(ctx, &tracker)
    }

    /// Report on hijacked sessions and harvest every recovered NT hash.
    /// Returns true whenever a non-empty result set was processed, even if
    /// no hash was recoverable; the overall outcome is gated separately by
    /// [`process_errors`](Self::process_errors).
    pub fn process_results(
        &self,
        ctx: &mut Context<'_>,
        conn: &Connection,
        results: Option<&DumpResults>,
        tracker: &Tracker,
    ) -> bool {
        if tracker.nb_hijacked_users == 0 {
            ctx.log.info("No users' sessions were hijacked");
        } else {
            ctx.log.info(&format!(
                "{} session(s) successfully hijacked",
                tracker.nb_hijacked_users
            ));
            ctx.log.info("Attempting to retrieve NT hash(es) via PKINIT");
        }

        let Some(results) = results.filter(|r| !r.users.is_empty()) else {
            return false;
        };

        let mut pwned_users = 0;
        for user in &results.users {
            let Some(nt_hash) = user.nt_hash.as_deref().filter(|h| !h.is_empty()) else {
                continue;
            };
            ctx.log
                .highlight(&format!("{}\\{} {}", user.domain, user.name, nt_hash));
            self.process_credentials(ctx, conn, user, nt_hash);
            pwned_users += 1;
        }

        if pwned_users > 0 {
            ctx.log
                .success(&format!("{pwned_users} NT hash(es) successfully collected"));
        } else {
            ctx.log
                .error("Unable to collect NT hash(es) from the hijacked session(s)");
        }
        true
    }

    /// Persist one recovered hash and notify the discovery feed. A store
    /// failure is logged and never aborts the remaining users.
    fn process_credentials(
        &self,
        ctx: &mut Context<'_>,
        conn: &Connection,
        user: &DumpedUser,
        nt_hash: &str,
    ) {
        let pillaged_from = ctx.store.computer_id(&conn.host);
        let record = CredentialRecord {
            kind: CredentialKind::Hash,
            domain: user.domain.clone(),
            username: user.name.clone(),
            secret: nt_hash.to_string(),
            pillaged_from,
        };
        if let Err(e) = ctx.store.add_credential(&record) {
            ctx.log.error(&format!(
                "Failed to record credential for {}\\{}: {e:#}",
                user.domain, user.name
            ));
        }
        ctx.notifier.user_found(&user.name, &user.domain);
    }

    /// Check the tracker's three failure conditions independently; each one
    /// logs its own message and flips the outcome, none short-circuits.
    pub fn process_errors(&self, ctx: &mut Context<'_>, tracker: &Tracker) -> bool {
        let mut ret = true;

        if let Some(msg) = tracker.last_error_msg.as_deref() {
            ctx.log.error(msg);
            ret = false;
        }

        if !tracker.files_cleaning_success {
            ctx.log.error(&format!(
                "Failed to clean the dropped files, please remove '{}', '{}' & '{}' \
                 within the '{}' folder",
                tracker.agent_filename,
                tracker.error_filename,
                tracker.output_filename,
                REMOTE_DROP_DIR
            ));
            ret = false;
        }

        if !tracker.svc_cleaning_success {
            ctx.log.error(&format!(
                "Failed to remove the service named '{}', please remove it manually",
                tracker.svc_name
            ));
            ret = false;
        }

        ret
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::{CredentialStore, DiscoveryNotifier, Logger, MemoryCredentialStore};
    use anyhow::anyhow;

    #[derive(Default)]
    struct RecordingLogger {
        infos: Vec<String>,
        errors: Vec<String>,
        successes: Vec<String>,
        highlights: Vec<String>,
    }

    impl Logger for RecordingLogger {
        fn info(&mut self, msg: &str) {
            self.infos.push(msg.to_string());
        }
        fn error(&mut self, msg: &str) {
            self.errors.push(msg.to_string());
        }
        fn success(&mut self, msg: &str) {
            self.successes.push(msg.to_string());
        }
        fn highlight(&mut self, msg: &str) {
            self.highlights.push(msg.to_string());
        }
    }

    #[derive(Default)]
    struct RecordingNotifier {
        found: Vec<(String, String)>,
    }

    impl DiscoveryNotifier for RecordingNotifier {
        fn user_found(&mut self, username: &str, domain: &str) {
            self.found.push((username.to_string(), domain.to_string()));
        }
    }

    #[derive(Default)]
    struct StubRunner {
        results: Option<DumpResults>,
        tracker: Tracker,
        fail: bool,
        requests: Vec<(DumpRequest, String)>,
    }

    impl AttackRunner for StubRunner {
        fn run(&mut self, request: &DumpRequest, host: &str) -> anyhow::Result<Option<DumpResults>> {
            self.requests.push((request.clone(), host.to_string()));
            if self.fail {
                return Err(anyhow!("agent upload refused"));
            }
            Ok(self.results.clone())
        }

        fn last_tracker(&self) -> Tracker {
            self.tracker.clone()
        }
    }

    fn configured_module() -> CredentialDumpModule {
        CredentialDumpModule::new(
            ModuleOptions::from_pairs([("CA", "SRV01\\CORP-CA")]).unwrap(),
        )
    }

    fn connection() -> Connection {
        Connection {
            host: "10.0.0.5".to_string(),
            domain: "CORP".to_string(),
            username: "admin".to_string(),
            password: "S3cret!".to_string(),
            ..Default::default()
        }
    }

    struct Harness {
        log: RecordingLogger,
        store: MemoryCredentialStore,
        notifier: RecordingNotifier,
    }

    impl Harness {
        fn new() -> Self {
            Self {
                log: RecordingLogger::default(),
                store: MemoryCredentialStore::new(),
                notifier: RecordingNotifier::default(),
            }
        }

        fn ctx(&mut self) -> Context<'_> {
            Context {
                log: &mut self.log,
                store: &mut self.store,
                notifier: &mut self.notifier,
            }
        }
    }

    fn dumped(domain: &str, name: &str, nt_hash: Option<&str>) -> DumpedUser {
        DumpedUser {
            domain: domain.to_string(),
            name: name.to_string(),
            nt_hash: nt_hash.map(str::to_string),
        }
    }

    #[test]
    fn missing_ca_aborts_before_any_run() {
        let module = CredentialDumpModule::new(ModuleOptions::default());
        let mut runner = StubRunner::default();
        let mut h = Harness::new();
        let ok = module.on_admin_login(&mut h.ctx(), &connection(), &mut runner);
        assert!(!ok);
        assert_eq!(h.log.errors.len(), 1);
        assert!(h.log.errors[0].contains("CA_SERVER\\CA_NAME"));
        assert!(runner.requests.is_empty());
    }

    #[test]
    fn request_carries_options_and_auth_material() {
        let module = CredentialDumpModule::new(
            ModuleOptions::from_pairs([
                ("CA", "SRV01\\CORP-CA"),
                ("TEMPLATE", "Machine"),
                ("DC_IP", "10.0.0.1"),
            ])
            .unwrap(),
        );
        let mut conn = connection();
        conn.kerberos = true;
        let mut runner = StubRunner {
            results: Some(DumpResults::default()),
            ..Default::default()
        };
        let mut h = Harness::new();
        module.on_admin_login(&mut h.ctx(), &conn, &mut runner);
        let (request, host) = &runner.requests[0];
        assert_eq!(host, "10.0.0.5");
        assert_eq!(request.ca, "SRV01\\CORP-CA");
        assert_eq!(request.template, "Machine");
        assert_eq!(request.dc_ip.as_deref(), Some("10.0.0.1"));
        assert_eq!(request.user, "admin");
        assert_eq!(request.domain, "CORP");
        assert_eq!(request.password, "S3cret!");
        assert!(request.kerberos);
    }

    #[test]
    fn empty_lm_component_is_preserved_in_hashes() {
        let module = configured_module();
        let mut conn = connection();
        conn.password = String::new();
        conn.nthash = "ABCD".to_string();
        let mut runner = StubRunner::default();
        let mut h = Harness::new();
        module.on_admin_login(&mut h.ctx(), &conn, &mut runner);
        assert_eq!(runner.requests[0].0.hashes, ":ABCD");
    }

    #[test]
    fn runner_failure_is_logged_and_fails_the_invocation() {
        let module = configured_module();
        let mut runner = StubRunner {
            fail: true,
            ..Default::default()
        };
        let mut h = Harness::new();
        let ok = module.on_admin_login(&mut h.ctx(), &connection(), &mut runner);
        assert!(!ok);
        assert!(h.log.errors[0].contains("agent upload refused"));
    }

    #[test]
    fn zero_hijacked_sessions_skips_pkinit_message() {
        let module = configured_module();
        let mut h = Harness::new();
        let ret = module.process_results(&mut h.ctx(), &connection(), None, &Tracker::default());
        assert!(!ret);
        assert_eq!(h.log.infos, vec!["No users' sessions were hijacked"]);
    }

    #[test]
    fn hijacked_sessions_announce_pkinit_attempt() {
        let module = configured_module();
        let tracker = Tracker {
            nb_hijacked_users: 3,
            ..Default::default()
        };
        let results = DumpResults {
            users: vec![dumped("CORP", "alice", Some("aa".repeat(16).as_str()))],
        };
        let mut h = Harness::new();
        module.process_results(&mut h.ctx(), &connection(), Some(&results), &tracker);
        assert!(h.log.infos.contains(&"3 session(s) successfully hijacked".to_string()));
        assert!(h
            .log
            .infos
            .contains(&"Attempting to retrieve NT hash(es) via PKINIT".to_string()));
    }

    #[test]
    fn empty_result_set_returns_false_without_harvesting() {
        let module = configured_module();
        let tracker = Tracker {
            nb_hijacked_users: 1,
            ..Default::default()
        };
        let results = DumpResults::default();
        let mut h = Harness::new();
        let ret = module.process_results(&mut h.ctx(), &connection(), Some(&results), &tracker);
        assert!(!ret);
        assert!(h.store.records.is_empty());
        assert!(h.log.successes.is_empty());
    }

    #[test]
    fn harvests_only_users_with_recovered_hashes() {
        let module = configured_module();
        let tracker = Tracker {
            nb_hijacked_users: 3,
            ..Default::default()
        };
        let results = DumpResults {
            users: vec![
                dumped("CORP", "alice", Some("8846f7eaee8fb117ad06bdd830b7586c")),
                dumped("CORP", "bob", None),
                dumped("CORP", "carol", Some("31d6cfe0d16ae931b73c59d7e0c089c0")),
            ],
        };
        let mut h = Harness::new();
        let ret = module.process_results(&mut h.ctx(), &connection(), Some(&results), &tracker);
        assert!(ret);
        assert_eq!(h.store.records.len(), 2);
        assert_eq!(
            h.notifier.found,
            vec![
                ("alice".to_string(), "CORP".to_string()),
                ("carol".to_string(), "CORP".to_string()),
            ]
        );
        assert_eq!(h.log.highlights.len(), 2);
        assert!(h.log.highlights[0].starts_with("CORP\\alice "));
        assert_eq!(h.log.successes, vec!["2 NT hash(es) successfully collected"]);
        let record = &h.store.records[0];
        assert_eq!(record.kind, CredentialKind::Hash);
        assert_eq!(record.pillaged_from, Some(0));
    }

    #[test]
    fn zero_recovered_hashes_still_counts_as_processed() {
        let module = configured_module();
        let tracker = Tracker {
            nb_hijacked_users: 2,
            ..Default::default()
        };
        let results = DumpResults {
            users: vec![dumped("CORP", "bob", None), dumped("CORP", "eve", Some(""))],
        };
        let mut h = Harness::new();
        let ret = module.process_results(&mut h.ctx(), &connection(), Some(&results), &tracker);
        assert!(ret);
        assert!(h.store.records.is_empty());
        assert!(h
            .log
            .errors
            .contains(&"Unable to collect NT hash(es) from the hijacked session(s)".to_string()));
    }

    #[test]
    fn store_failure_does_not_abort_remaining_users() {
        struct FailingStore;
        impl CredentialStore for FailingStore {
            fn computer_id(&mut self, _host: &str) -> Option<i64> {
                None
            }
            fn add_credential(&mut self, _record: &CredentialRecord) -> anyhow::Result<()> {
                Err(anyhow!("database locked"))
            }
        }
        let module = configured_module();
        let tracker = Tracker {
            nb_hijacked_users: 2,
            ..Default::default()
        };
        let results = DumpResults {
            users: vec![
                dumped("CORP", "alice", Some("aaaa")),
                dumped("CORP", "bob", Some("bbbb")),
            ],
        };
        let mut log = RecordingLogger::default();
        let mut store = FailingStore;
        let mut notifier = RecordingNotifier::default();
        let mut ctx = Context {
            log: &mut log,
            store: &mut store,
            notifier: &mut notifier,
        };
        let ret = module.process_results(&mut ctx, &connection(), Some(&results), &tracker);
        assert!(ret);
        assert_eq!(notifier.found.len(), 2);
        assert_eq!(log.successes, vec!["2 NT hash(es) successfully collected"]);
        assert_eq!(log.errors.len(), 2);
    }

    #[test]
    fn error_checks_fire_independently() {
        let module = configured_module();
        let tracker = Tracker {
            last_error_msg: Some("RPC pipe closed unexpectedly".to_string()),
            files_cleaning_success: false,
            svc_cleaning_success: true,
            agent_filename: "agent.exe".to_string(),
            error_filename: "err.log".to_string(),
            output_filename: "out.log".to_string(),
            ..Default::default()
        };
        let mut h = Harness::new();
        let ret = module.process_errors(&mut h.ctx(), &tracker);
        assert!(!ret);
        assert_eq!(h.log.errors.len(), 2);
        assert_eq!(h.log.errors[0], "RPC pipe closed unexpectedly");
        assert!(h.log.errors[1].contains("'agent.exe'"));
        assert!(h.log.errors[1].contains("'err.log'"));
        assert!(h.log.errors[1].contains("'out.log'"));
        assert!(h.log.errors[1].contains("\\Windows\\Temp\\"));
    }

    #[test]
    fn service_cleanup_failure_names_the_service() {
        let module = configured_module();
        let tracker = Tracker {
            svc_cleaning_success: false,
            svc_name: "CertSvcHelper".to_string(),
            ..Default::default()
        };
        let mut h = Harness::new();
        let ret = module.process_errors(&mut h.ctx(), &tracker);
        assert!(!ret);
        assert_eq!(h.log.errors.len(), 1);
        assert!(h.log.errors[0].contains("'CertSvcHelper'"));
    }

    #[test]
    fn clean_tracker_reports_success() {
        let module = configured_module();
        let mut h = Harness::new();
        assert!(module.process_errors(&mut h.ctx(), &Tracker::default()));
        assert!(h.log.errors.is_empty());
    }
}
