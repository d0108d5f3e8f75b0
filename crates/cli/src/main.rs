mod config;
mod error;

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use clap::{Parser, Subcommand};
use interfaces::security::apparmor::AppArmor;
use interfaces::security::seccomp::Seccomp;
use interfaces::{
    ConnectMode, ConnectionDecisionEngine, Decision, Registry, Repository, SecurityBackend,
    Specification,
};
use policy::Verdict;
use serde::Serialize;
use snap::{Info, PlugRef, SlotRef};
use tracing::{debug, info, warn};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

use config::{Backend, Config};
use error::{Error, Result};

const CONFIG_FILE: &str = "snapsec.toml";

#[derive(Parser)]
#[command(name = "snapsec")]
#[command(about = "Validate snap interfaces, decide connections and compile security snippets", long_about = None)]
#[command(version)]
struct Cli {
    /// Path to the configuration file
    #[arg(long, global = true, default_value = CONFIG_FILE)]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List the known interfaces
    Interfaces {
        /// Print JSON instead of text
        #[arg(long)]
        json: bool,
    },
    /// Validate snap metadata files
    Validate {
        /// snap.yaml files to validate
        #[arg(required = true)]
        snaps: Vec<PathBuf>,
    },
    /// Decide whether a plug may be connected to a slot
    Decide {
        /// snap.yaml files to load
        #[arg(long = "snap", required = true)]
        snaps: Vec<PathBuf>,
        /// Plug as <snap>:<plug>
        plug: PlugRef,
        /// Slot as <snap>:<slot>
        slot: SlotRef,
        /// Decide as an auto-connection instead of a manual one
        #[arg(long)]
        auto: bool,
        /// Print JSON instead of text
        #[arg(long)]
        json: bool,
    },
    /// Compile security snippets for the loaded snaps
    Compile {
        /// snap.yaml files to load
        #[arg(long = "snap", required = true)]
        snaps: Vec<PathBuf>,
        /// Manual connection as <snap>:<plug>=<snap>:<slot>
        #[arg(long = "connect")]
        connections: Vec<String>,
        /// Backend to compile for (default: from config)
        #[arg(long, value_enum)]
        backend: Vec<Backend>,
        /// Print JSON instead of text
        #[arg(long)]
        json: bool,
    },
}

fn main() {
    if let Err(e) = run() {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}

fn run() -> Result<()> {
    let cli = Cli::parse();
    let config = Config::load_or_default(&cli.config)?;
    init_logging(&config.log.level);

    let registry = Arc::new(Registry::builtin()?);
    debug!(interfaces = registry.len(), "registry built");

    match cli.command {
        Commands::Interfaces { json } => cmd_interfaces(&registry, json),
        Commands::Validate { snaps } => cmd_validate(registry, &snaps),
        Commands::Decide {
            snaps,
            plug,
            slot,
            auto,
            json,
        } => cmd_decide(registry, &snaps, &plug, &slot, auto, json),
        Commands::Compile {
            snaps,
            connections,
            backend,
            json,
        } => {
            let backends = if backend.is_empty() {
                config.compile.backends.clone()
            } else {
                backend
            };
            cmd_compile(
                registry,
                &snaps,
                &connections,
                &backends,
                config.compile.auto_connect,
                json,
            )
        }
    }
}

/// Log to stderr so command output on stdout stays machine-readable.
fn init_logging(level: &str) {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(level))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

#[derive(Serialize)]
struct InterfaceEntry<'a> {
    name: &'a str,
    summary: &'a str,
}

fn cmd_interfaces(registry: &Registry, json: bool) -> Result<()> {
    let entries: Vec<InterfaceEntry<'_>> = registry
        .interfaces()
        .map(|iface| InterfaceEntry {
            name: iface.name(),
            summary: iface.static_info().summary,
        })
        .collect();

    if json {
        println!("{}", serde_json::to_string_pretty(&entries)?);
        return Ok(());
    }

    println!("{:<20}  SUMMARY", "NAME");
    for entry in entries {
        println!("{:<20}  {}", entry.name, entry.summary);
    }
    Ok(())
}

fn cmd_validate(registry: Arc<Registry>, paths: &[PathBuf]) -> Result<()> {
    let mut failed = 0;
    for path in paths {
        let mut repo = Repository::new(Arc::clone(&registry));
        match Info::load(path)
            .map_err(Error::from)
            .and_then(|info| Ok(repo.add_snap(info)?))
        {
            Ok(()) => {
                for info in repo.snaps() {
                    println!(
                        "ok      {} ({} plugs, {} slots)",
                        info.name(),
                        info.plugs().len(),
                        info.slots().len()
                    );
                }
            }
            Err(e) => {
                failed += 1;
                println!("failed  {}: {e}", path.display());
            }
        }
    }

    if failed > 0 {
        return Err(Error::ValidationFailed {
            failed,
            total: paths.len(),
        });
    }
    Ok(())
}

#[derive(Serialize)]
struct DecisionOutput<'a> {
    plug: String,
    slot: String,
    mode: String,
    approved: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    reason: Option<&'a str>,
    /// The base declaration's verdict before any interface veto.
    base_declaration: Verdict,
}

fn cmd_decide(
    registry: Arc<Registry>,
    paths: &[PathBuf],
    plug: &PlugRef,
    slot: &SlotRef,
    auto: bool,
    json: bool,
) -> Result<()> {
    let repo = load_snaps(registry, paths)?;
    let plug_info = repo.plug(plug)?;
    let slot_info = repo.slot(slot)?;
    let mode = if auto {
        ConnectMode::Auto
    } else {
        ConnectMode::Manual
    };

    let engine = ConnectionDecisionEngine::new(repo.registry());
    let decision = engine.decide(plug_info, slot_info, mode);
    let reason = match &decision {
        Decision::Approved => None,
        Decision::Denied { reason } => Some(reason.as_str()),
    };

    if json {
        let base = repo.registry().base_declaration();
        let base_declaration = match mode {
            ConnectMode::Auto => base.check_auto_connection(plug_info, slot_info),
            ConnectMode::Manual => base.check_connection(plug_info, slot_info),
        };
        let output = DecisionOutput {
            plug: plug.to_string(),
            slot: slot.to_string(),
            mode: mode.to_string(),
            approved: decision.is_approved(),
            reason,
            base_declaration,
        };
        println!("{}", serde_json::to_string_pretty(&output)?);
    } else {
        match reason {
            None => println!("approved: {plug} {slot} ({mode})"),
            Some(reason) => println!("denied: {plug} {slot} ({mode}): {reason}"),
        }
    }
    Ok(())
}

#[derive(Serialize)]
struct ConnectionEntry {
    plug: String,
    slot: String,
    interface: String,
    mode: String,
}

#[derive(Serialize)]
struct CompileOutput {
    connections: Vec<ConnectionEntry>,
    snippets: BTreeMap<&'static str, BTreeMap<String, Vec<String>>>,
}

fn cmd_compile(
    registry: Arc<Registry>,
    paths: &[PathBuf],
    connections: &[String],
    backends: &[Backend],
    auto_connect: bool,
    json: bool,
) -> Result<()> {
    let mut repo = load_snaps(registry, paths)?;

    if auto_connect {
        let names: Vec<String> = repo.snaps().map(|info| info.name().to_string()).collect();
        for name in names {
            for conn in repo.auto_connect(&name)? {
                info!(%conn, "auto-connected");
            }
        }
    }
    for arg in connections {
        let (plug, slot) = parse_connection(arg)?;
        repo.connect(&plug, &slot, ConnectMode::Manual)?;
    }

    let connections: Vec<ConnectionEntry> = repo
        .connections()
        .map(|(conn, connection)| ConnectionEntry {
            plug: conn.plug.to_string(),
            slot: conn.slot.to_string(),
            interface: connection.interface().to_string(),
            mode: connection.mode.to_string(),
        })
        .collect();

    // backend -> tag -> snippets
    let mut snippets: BTreeMap<&'static str, BTreeMap<String, Vec<String>>> = BTreeMap::new();
    for backend in backends {
        let tags = match backend {
            Backend::Apparmor => collect(&repo.specification::<AppArmor>()?),
            Backend::Seccomp => collect(&repo.specification::<Seccomp>()?),
        };
        snippets.insert(backend.as_str(), tags);
    }

    if json {
        let output = CompileOutput {
            connections,
            snippets,
        };
        println!("{}", serde_json::to_string_pretty(&output)?);
        return Ok(());
    }

    println!("== connections ==");
    if connections.is_empty() {
        println!("(none)");
    }
    for conn in &connections {
        println!("{} {} ({}, {})", conn.plug, conn.slot, conn.interface, conn.mode);
    }
    println!();

    for (backend, tags) in &snippets {
        println!("== {backend} ==");
        if tags.is_empty() {
            println!("(no snippets)");
        }
        for (tag, snippets) in tags {
            println!("[{tag}]");
            for snippet in snippets {
                print!("{snippet}");
            }
        }
        println!();
    }
    Ok(())
}

fn collect<B: SecurityBackend>(spec: &Specification<B>) -> BTreeMap<String, Vec<String>> {
    spec.security_tags()
        .into_iter()
        .map(|tag| {
            let snippets = spec.snippets_for_tag(&tag).to_vec();
            (tag, snippets)
        })
        .collect()
}

fn load_snaps(registry: Arc<Registry>, paths: &[PathBuf]) -> Result<Repository> {
    let mut repo = Repository::new(registry);
    for path in paths {
        repo.add_snap(load_info(path)?)?;
    }
    Ok(repo)
}

fn load_info(path: &Path) -> Result<Info> {
    let info = Info::load(path)?;
    if info.apps().is_empty() && info.hooks().is_empty() {
        warn!(snap = %info.name(), "snap has no apps or hooks, nothing will be confined");
    }
    Ok(info)
}

fn parse_connection(arg: &str) -> Result<(PlugRef, SlotRef)> {
    let invalid = || Error::InvalidConnection(arg.to_string());
    let (plug, slot) = arg.split_once('=').ok_or_else(invalid)?;
    let plug = plug.parse().map_err(|_| invalid())?;
    let slot = slot.parse().map_err(|_| invalid())?;
    Ok((plug, slot))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_connection() {
        let (plug, slot) = parse_connection("client:queue=server:queue").unwrap();
        assert_eq!(plug, PlugRef::new("client", "queue"));
        assert_eq!(slot, SlotRef::new("server", "queue"));
    }

    #[test]
    fn test_parse_connection_rejects_malformed() {
        for bad in ["client:queue", "client=server:queue", "a:b=c"] {
            assert!(matches!(
                parse_connection(bad),
                Err(Error::InvalidConnection(_))
            ));
        }
    }

    #[test]
    fn test_decision_output_includes_base_verdict() {
        let output = DecisionOutput {
            plug: "client:queue".into(),
            slot: "server:queue".into(),
            mode: ConnectMode::Manual.to_string(),
            approved: false,
            reason: Some("denied"),
            base_declaration: Verdict::Deny {
                reason: "denied".into(),
            },
        };
        let json: serde_json::Value = serde_json::to_value(&output).unwrap();
        assert_eq!(json["mode"], "manual");
        assert_eq!(json["base_declaration"]["verdict"], "deny");
        assert_eq!(json["base_declaration"]["reason"], "denied");
    }

    #[test]
    fn test_compile_output_reports_connection_mode() {
        let output = CompileOutput {
            connections: vec![ConnectionEntry {
                plug: "client:queue".into(),
                slot: "server:queue".into(),
                interface: "msg-queue".into(),
                mode: ConnectMode::Auto.to_string(),
            }],
            snippets: BTreeMap::from([(
                "apparmor",
                BTreeMap::from([(
                    "snap.client.app".to_string(),
                    vec!["/q rw,\n".to_string()],
                )]),
            )]),
        };
        let json: serde_json::Value = serde_json::to_value(&output).unwrap();
        assert_eq!(json["connections"][0]["mode"], "auto");
        assert_eq!(json["snippets"]["apparmor"]["snap.client.app"][0], "/q rw,\n");
    }

    #[test]
    fn test_cli_parses_compile() {
        let cli = Cli::try_parse_from([
            "snapsec",
            "compile",
            "--snap",
            "a.yaml",
            "--snap",
            "b.yaml",
            "--backend",
            "seccomp",
            "--json",
        ]).unwrap();
        match cli.command {
            Commands::Compile {
                snaps,
                backend,
                json,
                ..
            } => {
                assert_eq!(snaps.len(), 2);
                assert_eq!(backend, vec![Backend::Seccomp]);
                assert!(json);
            }
            _ => panic!("expected compile"),
        }
    }

    #[test]
    fn test_cli_parses_decide_refs() {
        let cli = Cli::try_parse_from([
            "snapsec",
            "decide",
            "--snap",
            "a.yaml",
            "client:queue",
            "server:queue",
            "--auto",
        ]).unwrap();
        match cli.command {
            Commands::Decide { plug, slot, auto, .. } => {
                assert_eq!(plug.to_string(), "client:queue");
                assert_eq!(slot.to_string(), "server:queue");
                assert!(auto);
            }
            _ => panic!("expected decide"),
        }
    }
}
