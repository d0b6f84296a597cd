use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

#[derive(ValueEnum, Clone, Copy, Debug, Default, PartialEq)]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
}

#[derive(Parser)]
#[command(
    name = "leasekeep",
    version,
    about = "Time-boxed exclusive leases on shared credentialed accounts"
)]
pub struct Cli {
    #[command(flatten)]
    pub global: GlobalArgs,

    #[command(subcommand)]
    pub cmd: Command,
}

#[derive(clap::Args, Clone, Debug)]
pub struct GlobalArgs {
    /// Configuration file (YAML). Defaults apply when the file is absent.
    #[arg(
        long,
        global = true,
        env = "LEASEKEEP_CONFIG",
        default_value = "leasekeep.yaml"
    )]
    pub config: PathBuf,

    /// SQLite database path; overrides `database_path` from the config
    #[arg(long, global = true, env = "LEASEKEEP_DB")]
    pub db: Option<PathBuf>,

    #[arg(long, global = true, value_enum, default_value_t = OutputFormat::Text)]
    pub format: OutputFormat,

    /// Emit logs as JSON lines on stderr
    #[arg(long, global = true)]
    pub log_json: bool,
}

#[derive(Subcommand)]
pub enum Command {
    /// Create the database schema and optionally a sample config
    Init(InitArgs),
    /// Register and browse leasable resources
    Resource(ResourceArgs),
    /// Allocate, inspect and release leases
    Lease(LeaseArgs),
    /// Grant and inspect bonus minutes
    Credit(CreditArgs),
    /// Requester notifications and the rotation feed
    Notify(NotifyArgs),
    /// Query the audit log
    Audit(AuditArgs),
    /// Reclaim lapsed leases once or as a daemon
    Sweep(SweepArgs),
    /// System or per-requester statistics
    Stats(StatsArgs),
}

#[derive(clap::Args, Clone, Debug)]
pub struct InitArgs {
    /// Also write a sample config to --config
    #[arg(long)]
    pub write_config: bool,

    /// Overwrite an existing config file
    #[arg(long, requires = "write_config")]
    pub force: bool,
}

#[derive(clap::Args, Clone, Debug)]
pub struct ResourceArgs {
    #[command(subcommand)]
    pub cmd: ResourceSub,
}

#[derive(Subcommand, Clone, Debug)]
pub enum ResourceSub {
    Add {
        category: String,
        name: String,
    },
    /// Available resources
    List {
        #[arg(long)]
        category: Option<String>,
    },
    Get {
        id: i64,
    },
    /// Count available resources (or every resource with --all)
    Count {
        #[arg(long, conflicts_with = "all")]
        category: Option<String>,
        #[arg(long)]
        all: bool,
    },
    Categories,
    /// Available resources whose category contains QUERY
    Search {
        query: String,
    },
}

#[derive(clap::Args, Clone, Debug)]
pub struct LeaseArgs {
    #[command(subcommand)]
    pub cmd: LeaseSub,
}

#[derive(Subcommand, Clone, Debug)]
pub enum LeaseSub {
    Allocate {
        resource_id: i64,
        requester: String,
        /// Defaults to lease.default_duration_hours
        #[arg(long)]
        hours: Option<u32>,
        /// Extra minutes added to the window
        #[arg(long, default_value_t = 0)]
        bonus_minutes: u32,
        /// Draw --bonus-minutes from the requester's credits
        #[arg(long)]
        use_credit: bool,
    },
    /// The requester's active lease
    Active {
        requester: String,
    },
    Remaining {
        requester: String,
    },
    /// End a lease early. Credentials are not queued for rotation
    Release {
        lease_id: i64,
    },
    History {
        requester: String,
        #[arg(long, default_value_t = 10)]
        limit: u32,
    },
}

#[derive(clap::Args, Clone, Debug)]
pub struct CreditArgs {
    #[command(subcommand)]
    pub cmd: CreditSub,
}

#[derive(Subcommand, Clone, Debug)]
pub enum CreditSub {
    Grant {
        requester: String,
        minutes: u32,
        #[arg(long, default_value = "manual grant")]
        reason: String,
    },
    Balance {
        requester: String,
    },
    Consume {
        requester: String,
        minutes: u32,
    },
    List {
        requester: String,
    },
}

#[derive(clap::Args, Clone, Debug)]
pub struct NotifyArgs {
    #[command(subcommand)]
    pub cmd: NotifySub,
}

#[derive(Subcommand, Clone, Debug)]
pub enum NotifySub {
    List {
        requester: String,
        /// Only unread notifications
        #[arg(long)]
        unread: bool,
        #[arg(long, default_value_t = 50)]
        limit: u32,
    },
    /// Mark a notification as read
    Read {
        id: i64,
    },
    /// Lapse notifications after a cursor, oldest first
    Lapsed {
        #[arg(long, default_value_t = 0)]
        after: i64,
        #[arg(long, default_value_t = 50)]
        limit: u32,
    },
}

#[derive(clap::Args, Clone, Debug)]
pub struct AuditArgs {
    #[command(subcommand)]
    pub cmd: AuditSub,
}

#[derive(Subcommand, Clone, Debug)]
pub enum AuditSub {
    Requester {
        requester: String,
        #[arg(long, default_value_t = 20)]
        limit: u32,
    },
    Recent {
        #[arg(long, default_value_t = 20)]
        limit: u32,
    },
    Lease {
        lease_id: i64,
    },
}

#[derive(clap::Args, Clone, Debug)]
pub struct SweepArgs {
    #[command(subcommand)]
    pub cmd: SweepSub,
}

#[derive(Subcommand, Clone, Debug)]
pub enum SweepSub {
    /// One reclamation pass
    Once,
    /// Sweep on the configured interval until Ctrl-C
    Run,
}

#[derive(clap::Args, Clone, Debug)]
pub struct StatsArgs {
    #[arg(long, conflicts_with = "requesters")]
    pub requester: Option<String>,
    /// List every requester with lease count and last lease start
    #[arg(long)]
    pub requesters: bool,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_global_flags_after_subcommand() {
        let cli = Cli::try_parse_from([
            "leasekeep",
            "resource",
            "list",
            "--format",
            "json",
            "--db",
            "x.db",
        ])
        .unwrap();
        assert_eq!(cli.global.format, OutputFormat::Json);
        assert_eq!(cli.global.db, Some(PathBuf::from("x.db")));
    }

    #[test]
    fn test_force_requires_write_config() {
        assert!(Cli::try_parse_from(["leasekeep", "init", "--force"]).is_err());
    }
}
