//! hbase-probe: drive the Java bridge from a terminal.
//!
//! Uses the same `Bridge` the desktop shell loads, so a working probe means
//! the JVM, the bundled archive and the cluster are all reachable.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use hbase_bridge::{
    Bridge, BridgeConfig, CommandOutcome, CommandRequest, JvmLauncher, ScanRequest,
};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "hbase-probe", about = "Exercise the HBase GUI Java bridge")]
struct Cli {
    /// Bridge config file (TOML). Defaults to the per-user config.
    #[arg(long, env = "HBASE_BRIDGE_CONFIG")]
    config: Option<PathBuf>,

    /// ZooKeeper quorum, e.g. `zk1:2181,zk2:2181`.
    #[arg(long, env = "HBASE_ZOOKEEPER_QUORUM")]
    quorum: Option<String>,

    /// Parent znode of the cluster.
    #[arg(long, default_value = "/hbase")]
    znode: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Start the JVM and check the bridge class loads.
    Init,
    /// List table names.
    Tables,
    /// Scan rows of a table.
    Scan {
        table: String,
        #[arg(long)]
        start: Option<String>,
        #[arg(long)]
        end: Option<String>,
        #[arg(long, default_value_t = 10)]
        limit: i32,
        #[arg(long)]
        prefix: Option<String>,
    },
    /// Run get, put or delete against one row.
    Exec {
        table: String,
        command: String,
        #[arg(long)]
        row: Option<String>,
        #[arg(long)]
        family: Option<String>,
        #[arg(long)]
        qualifier: Option<String>,
        #[arg(long)]
        value: Option<String>,
    },
}

fn load_config(path: Option<&PathBuf>) -> BridgeConfig {
    let Some(path) = path else {
        return BridgeConfig::load();
    };
    let mut config = BridgeConfig::from_file(path).unwrap_or_else(|| {
        tracing::warn!("using defaults, {} not loaded", path.display());
        BridgeConfig::default()
    });
    config.apply_env(|key| std::env::var(key).ok());
    config
}

/// The Java side sometimes reports an error without a message.
fn failure_message(outcome: &CommandOutcome) -> &str {
    outcome.message.as_deref().unwrap_or("error")
}

fn connect(bridge: &Bridge<JvmLauncher>, cli: &Cli) -> Result<()> {
    let quorum = cli
        .quorum
        .as_deref()
        .context("--quorum (or HBASE_ZOOKEEPER_QUORUM) is required")?;
    bridge
        .connect(quorum, &cli.znode)
        .with_context(|| format!("connecting to {quorum} ({})", cli.znode))
}

fn run(cli: &Cli) -> Result<()> {
    let bridge = Bridge::new(JvmLauncher, load_config(cli.config.as_ref()));

    let output = match &cli.command {
        Command::Init => {
            bridge.initialize().context("initializing the JVM")?;
            serde_json::json!({ "initialized": true })
        }
        Command::Tables => {
            connect(&bridge, cli)?;
            serde_json::to_value(bridge.table_names()?)?
        }
        Command::Scan {
            table,
            start,
            end,
            limit,
            prefix,
        } => {
            connect(&bridge, cli)?;
            let mut request = ScanRequest::new(table, *limit);
            request.start_row = start.clone();
            request.end_row = end.clone();
            request.prefix = prefix.clone();
            let rows = bridge
                .scan_rows(&request)
                .with_context(|| format!("scanning {table}"))?;
            serde_json::to_value(rows)?
        }
        Command::Exec {
            table,
            command,
            row,
            family,
            qualifier,
            value,
        } => {
            connect(&bridge, cli)?;
            let mut request = CommandRequest::new(table, command);
            request.row_key = row.clone();
            request.family = family.clone();
            request.qualifier = qualifier.clone();
            request.value = value.clone();
            let outcome = bridge
                .run_command(&request)
                .with_context(|| format!("running {command} on {table}"))?;
            if outcome.is_error() {
                tracing::warn!("{command} on {table}: {}", failure_message(&outcome));
            }
            serde_json::to_value(outcome)?
        }
    };

    if !matches!(cli.command, Command::Init) {
        bridge.disconnect();
    }
    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}

fn main() -> Result<()> {
    let json_logs = std::env::var("HBASE_BRIDGE_LOG_JSON").unwrap_or_default() == "1";
    let filter = EnvFilter::try_from_env("HBASE_BRIDGE_LOG")
        .unwrap_or_else(|_| EnvFilter::new("hbase_bridge=info,hbase_probe=info"));
    if json_logs {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .json()
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .init();
    }

    let cli = Cli::parse();
    run(&cli)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_shape() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }

    #[test]
    fn test_scan_defaults() {
        let cli = Cli::parse_from(["hbase-probe", "--quorum", "zk1:2181", "scan", "users"]);
        assert_eq!(cli.znode, "/hbase");
        match cli.command {
            Command::Scan { table, limit, start, .. } => {
                assert_eq!(table, "users");
                assert_eq!(limit, 10);
                assert!(start.is_none());
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_exec_flags() {
        let cli = Cli::parse_from([
            "hbase-probe", "exec", "users", "put", "--row", "r1", "--family", "cf",
            "--qualifier", "name", "--value", "ada",
        ]);
        let Command::Exec { command, row, value, .. } = cli.command else {
            panic!("expected exec");
        };
        assert_eq!(command, "put");
        assert_eq!(row.as_deref(), Some("r1"));
        assert_eq!(value.as_deref(), Some("ada"));
    }

    #[test]
    fn test_failure_message() {
        let outcome = CommandOutcome {
            status: Some("error".into()),
            message: Some("Unsupported command: scan".into()),
            data: None,
        };
        assert_eq!(failure_message(&outcome), "Unsupported command: scan");

        let bare = CommandOutcome {
            status: Some("error".into()),
            ..CommandOutcome::default()
        };
        assert_eq!(failure_message(&bare), "error");
    }

    #[test]
    fn test_missing_config_file_falls_back() {
        let path = PathBuf::from("/nonexistent/hbase-bridge.toml");
        let config = load_config(Some(&path));
        assert_eq!(config.max_heap, BridgeConfig::default().max_heap);
    }
}
