//! CLI entrypoint for `certloot`.
//!
//! Replays a captured dump report against one target: parses module options
//! and connection material from the command line, drives the credential-dump
//! module with a console logger, and optionally writes the harvested
//! credentials (CSV) and discovered users (TXT) into an output directory.
use std::fs;
use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, ValueEnum};
use colored::Colorize;
use log::{LevelFilter, error};

use certloot::connection::Connection;
use certloot::context::{
    ConsoleLogger, Context, CsvCredentialStore, DiscoveredUsers, MemoryCredentialStore,
};
use certloot::module::CredentialDumpModule;
use certloot::options::ModuleOptions;
use certloot::replay::ReplayRunner;

#[derive(Parser, Debug)]
#[command(
    name = "certloot",
    version,
    about = "ADCS/PKINIT credential dump reporter"
)]
struct Args {
    /// Target host the dump report was captured from
    host: String,

    /// Path to the JSON run report to replay
    #[arg(short = 'r', long = "report")]
    report: PathBuf,

    /// Certificate Authority name (CA_SERVER\CA_NAME)
    #[arg(long = "ca")]
    ca: Option<String>,

    /// Certificate template allowing users to authenticate
    #[arg(long = "template")]
    template: Option<String>,

    /// IP address of the domain controller
    #[arg(long = "dc-ip")]
    dc_ip: Option<String>,

    /// Authentication domain
    #[arg(short = 'd', long = "domain", default_value = "")]
    domain: String,

    /// Username the session authenticated as
    #[arg(short = 'u', long = "user", default_value = "")]
    username: String,

    /// Password of the authenticated session
    #[arg(short = 'p', long = "password", default_value = "")]
    password: String,

    /// LM and NT hashes as LMHASH:NTHASH (either side may be empty)
    #[arg(short = 'H', long = "hashes")]
    hashes: Option<String>,

    /// Session is Kerberos-authenticated
    #[arg(short = 'k', long = "kerberos")]
    kerberos: bool,

    /// Directory for credential CSV and discovered-user TXT exports
    #[arg(short = 'o', long = "output")]
    output: Option<PathBuf>,

    /// Increase verbosity (-v, -vv)
    #[arg(short = 'v', action = clap::ArgAction::Count)]
    verbose: u8,

    /// Control color output (auto, always, never)
    #[arg(long = "color", value_enum, default_value_t = ColorChoice::Auto)]
    color: ColorChoice,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum ColorChoice {
    Auto,
    Always,
    Never,
}

const ASCII_TITLE: &str = r#"
                    _   _             _
   ___ ___ _ __ ___| |_| | ___   ___ | |_
  / __/ _ \ '__/ __| __| |/ _ \ / _ \| __|
 | (_|  __/ |  | (_| |_| | (_) | (_) | |_
  \___\___|_|   \___|\__|_|\___/ \___/ \__|
"#;

fn init_logger(verbosity: u8) {
    let level = match verbosity {
        0 => LevelFilter::Warn,
        1 => LevelFilter::Info,
        _ => LevelFilter::Debug,
    };
    let _ = env_logger::Builder::from_default_env()
        .filter_level(level)
        .try_init();
}

fn module_options(args: &Args) -> Result<ModuleOptions, certloot::options::OptionsError> {
    let mut pairs: Vec<(&str, String)> = Vec::new();
    if let Some(ca) = &args.ca {
        pairs.push(("CA", ca.clone()));
    }
    if let Some(template) = &args.template {
        pairs.push(("TEMPLATE", template.clone()));
    }
    if let Some(dc_ip) = &args.dc_ip {
        pairs.push(("DC_IP", dc_ip.clone()));
    }
    ModuleOptions::from_pairs(pairs)
}

fn connection(args: &Args) -> Connection {
    // LMHASH:NTHASH; a bare value without ':' is treated as the NT hash
    let (lmhash, nthash) = match args.hashes.as_deref().and_then(|h| h.split_once(':')) {
        Some((lm, nt)) => (lm.to_string(), nt.to_string()),
        None => (String::new(), args.hashes.clone().unwrap_or_default()),
    };
    Connection {
        host: args.host.clone(),
        domain: args.domain.clone(),
        username: args.username.clone(),
        kerberos: args.kerberos,
        password: args.password.clone(),
        lmhash,
        nthash,
    }
}

fn main() -> ExitCode {
    let args = Args::parse();
    init_logger(args.verbose);
    match args.color {
        ColorChoice::Always => colored::control::set_override(true),
        ColorChoice::Never => colored::control::set_override(false),
        ColorChoice::Auto => {}
    }

    let options = match module_options(&args) {
        Ok(options) => options,
        Err(e) => {
            error!("{e}");
            return ExitCode::from(2);
        }
    };

    let mut runner = match ReplayRunner::from_path(&args.report) {
        Ok(runner) => runner,
        Err(e) => {
            error!("failed to load run report: {e:#}");
            return ExitCode::from(3);
        }
    };

    println!("{}", ASCII_TITLE.bold().green());

    let module = CredentialDumpModule::new(options);
    let conn = connection(&args);
    let mut log = ConsoleLogger;
    let mut found = DiscoveredUsers::new();

    let ok = match &args.output {
        Some(outdir) => {
            if let Err(e) = fs::create_dir_all(outdir) {
                error!("failed to create output directory {}: {e}", outdir.display());
                return ExitCode::from(4);
            }
            let ts = chrono::Local::now().format("%Y.%m.%d_%H.%M.%S");
            let csv_path = outdir.join(format!("certloot_credentials_{ts}.csv"));
            let mut store = match CsvCredentialStore::create(&csv_path) {
                Ok(store) => store,
                Err(e) => {
                    error!("failed to create credential export: {e:#}");
                    return ExitCode::from(5);
                }
            };
            let ok = {
                let mut ctx = Context {
                    log: &mut log,
                    store: &mut store,
                    notifier: &mut found,
                };
                module.on_admin_login(&mut ctx, &conn, &mut runner)
            };
            if let Err(e) = store.flush() {
                error!("failed to write {}: {e:#}", csv_path.display());
                return ExitCode::from(5);
            }
            let users_path = outdir.join(format!("certloot_discovered_users_{ts}.txt"));
            if let Err(e) = found.save_txt(&users_path) {
                error!("failed to write {}: {e:#}", users_path.display());
                return ExitCode::from(6);
            }
            ok
        }
        None => {
            let mut store = MemoryCredentialStore::new();
            let mut ctx = Context {
                log: &mut log,
                store: &mut store,
                notifier: &mut found,
            };
            module.on_admin_login(&mut ctx, &conn, &mut runner)
        }
    };

    if ok { ExitCode::SUCCESS } else { ExitCode::FAILURE }
}
