//! kubemaster CLI: the entry point the lifecycle runtime invokes.
//!
//! # Usage
//!
//! ```text
//! kubemaster hook config-changed --relations /run/kubemaster/relations.json
//! kubemaster upgrade
//! kubemaster flags kube-apiserver
//! kubemaster gates
//! kubemaster status
//! ```

use std::path::{Path, PathBuf};
use std::process;

use clap::{Parser, Subcommand};
use tracing::error;
use tracing_subscriber::EnvFilter;

use kubemaster_core::infrastructure::{ProcessRunner, TeraRenderer};
use kubemaster_core::state::ClusterState;
use kubemaster_core::types::RelationSnapshot;
use kubemaster_core::{settings, Sys};

const DEFAULT_STATE_DIR: &str = "/var/lib/kubemaster";
const DEFAULT_CONFIG: &str = "/etc/kubemaster/settings.yaml";
const DEFAULT_TEMPLATES: &str = "/usr/share/kubemaster/templates";

#[derive(Debug, Parser)]
#[command(name = "kubemaster", about = "Kubernetes master convergence engine")]
struct Cli {
    /// Directory holding state.json and the pass lock.
    #[arg(long, global = true)]
    state_dir: Option<PathBuf>,

    /// Settings file (YAML). Missing file means defaults.
    #[arg(long, global = true, default_value = DEFAULT_CONFIG)]
    config: PathBuf,

    /// Template directory for unit files and addon manifests.
    #[arg(long, global = true, default_value = DEFAULT_TEMPLATES)]
    templates: PathBuf,

    #[command(subcommand)]
    command: Cmd,
}

#[derive(Debug, Subcommand)]
enum Cmd {
    /// Run one convergence pass for a runtime hook.
    Hook {
        name: String,
        /// Relation snapshot (JSON). Omitted means no relations.
        #[arg(long)]
        relations: Option<PathBuf>,
    },
    /// Stop the control plane and clear deployment gates.
    Upgrade,
    /// Print the serialized flags for a service.
    Flags { service: String },
    /// List set gates.
    Gates,
    /// Print the last recorded status.
    Status,
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_env("KUBEMASTER_LOG").unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let state_dir = resolve_state_dir(cli.state_dir.as_deref());
    if let Err(message) = run(&cli, &state_dir) {
        error!("{}", message);
        eprintln!("kubemaster: {}", message);
        process::exit(1);
    }
}

fn resolve_state_dir(flag: Option<&Path>) -> PathBuf {
    if let Some(dir) = flag {
        return dir.to_path_buf();
    }
    if let Ok(dir) = std::env::var("KUBEMASTER_STATE_DIR") {
        return PathBuf::from(dir);
    }
    PathBuf::from(DEFAULT_STATE_DIR)
}

fn run(cli: &Cli, state_dir: &Path) -> Result<(), String> {
    match &cli.command {
        Cmd::Hook { name, relations } => {
            let snapshot = match relations {
                Some(path) => settings::load_relations(path).map_err(|e| e.to_string())?,
                None => RelationSnapshot::default(),
            };
            let settings = settings::load(&cli.config).map_err(|e| e.to_string())?;
            let renderer = TeraRenderer::new(&cli.templates).map_err(|e| e.to_string())?;
            let mut sys = Sys::new(state_dir, settings, ProcessRunner, renderer)
                .map_err(|e| e.to_string())?;
            let report = sys.dispatch(name, &snapshot).map_err(|e| e.to_string())?;
            let json = serde_json::to_string_pretty(&report).map_err(|e| e.to_string())?;
            println!("{}", json);
        }
        Cmd::Upgrade => {
            let settings = settings::load(&cli.config).map_err(|e| e.to_string())?;
            let renderer = TeraRenderer::from_raw(&[]).map_err(|e| e.to_string())?;
            let mut sys = Sys::new(state_dir, settings, ProcessRunner, renderer)
                .map_err(|e| e.to_string())?;
            sys.upgrade().map_err(|e| e.to_string())?;
        }
        Cmd::Flags { service } => {
            let state = ClusterState::open(state_dir).map_err(|e| e.to_string())?;
            let flags = state.flag_set(service).map_err(|e| e.to_string())?;
            println!("{}", flags.serialize());
        }
        Cmd::Gates => {
            let state = ClusterState::open(state_dir).map_err(|e| e.to_string())?;
            let gates = state.gates().map_err(|e| e.to_string())?;
            for gate in gates.iter() {
                println!("{}", gate);
            }
        }
        Cmd::Status => {
            let state = ClusterState::open(state_dir).map_err(|e| e.to_string())?;
            match state.status() {
                Some(status) => println!("{}", status),
                None => println!("unknown"),
            }
        }
    }
    Ok(())
}
