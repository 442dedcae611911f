//! CLI argument definitions using clap.

use clap::{Args, Parser, Subcommand, ValueEnum};

use contracts::RelayTuning;

/// Relay - replicate datagram / framed stream traffic to many destinations
#[derive(Parser, Debug)]
#[command(
    name = "relay",
    author,
    version,
    about = "Fan-out traffic replication relay",
    long_about = "Accepts datagrams, or length-prefixed frames over TCP, on one local endpoint \n\
                  and replicates every unit unmodified to any number of datagram or stream \n\
                  destinations. A slow or unreachable destination never stalls ingestion.\n\n\
                  Specs: host:port | udp@host:port | tcp@host:port. The first spec is the \n\
                  local endpoint, the rest are destinations. A single argument names a \n\
                  config file with one spec per line.\n\n\
                  SIGHUP reloads the destination set, SIGTERM / SIGINT shut down."
)]
pub struct Cli {
    /// Increase logging verbosity (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true, env = "RELAY_VERBOSE")]
    pub verbose: u8,

    /// Suppress all output except warnings and errors
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Log output format
    #[arg(
        long,
        value_enum,
        default_value = "pretty",
        global = true,
        env = "RELAY_LOG_FORMAT"
    )]
    pub log_format: LogFormat,

    #[command(subcommand)]
    pub command: Commands,
}

/// Available CLI commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run the relay until SIGTERM / SIGINT
    Run(RunArgs),

    /// Parse and resolve the configuration without running
    Validate(ValidateArgs),
}

/// Arguments for the `run` command
#[derive(Parser, Debug, Clone)]
pub struct RunArgs {
    /// Config file, or `local-host:local-port [proto@]dest-host:dest-port ...`
    #[arg(required = true, value_name = "CONFIG | SPEC", num_args = 1..)]
    pub specs: Vec<String>,

    #[command(flatten)]
    pub tuning: TuningArgs,

    /// Metrics server port (0 = disabled)
    #[arg(long, default_value = "0", env = "RELAY_METRICS_PORT")]
    pub metrics_port: u16,

    /// Validate configuration and exit without running the relay
    #[arg(long)]
    pub dry_run: bool,
}

/// Arguments for the `validate` command
#[derive(Parser, Debug)]
pub struct ValidateArgs {
    /// Config file, or `local-host:local-port [proto@]dest-host:dest-port ...`
    #[arg(required = true, value_name = "CONFIG | SPEC", num_args = 1..)]
    pub specs: Vec<String>,

    /// Output validation result as JSON
    #[arg(long)]
    pub json: bool,

    /// Also print the resolved configuration as a TOML document
    #[arg(long)]
    pub toml: bool,
}

/// Overrides for `[tuning]` values from the config file
#[derive(Args, Debug, Clone, Default)]
pub struct TuningArgs {
    /// Per-destination queue capacity (units)
    #[arg(long, env = "RELAY_QUEUE_CAPACITY")]
    pub queue_capacity: Option<usize>,

    /// Largest accepted stream frame payload (bytes)
    #[arg(long, env = "RELAY_MAX_FRAME_SIZE")]
    pub max_frame_size: Option<u32>,

    /// Governance loop tick (milliseconds)
    #[arg(long, env = "RELAY_POLL_INTERVAL_MS")]
    pub poll_interval_ms: Option<u64>,

    /// Stream destination connect timeout (milliseconds)
    #[arg(long, env = "RELAY_CONNECT_TIMEOUT_MS")]
    pub connect_timeout_ms: Option<u64>,

    /// Stream destination per-frame send timeout (milliseconds)
    #[arg(long, env = "RELAY_SEND_TIMEOUT_MS")]
    pub send_timeout_ms: Option<u64>,

    /// First stream reconnect delay (milliseconds)
    #[arg(long, env = "RELAY_RECONNECT_INITIAL_MS")]
    pub reconnect_initial_ms: Option<u64>,

    /// Upper bound of the stream reconnect delay (milliseconds)
    #[arg(long, env = "RELAY_RECONNECT_MAX_MS")]
    pub reconnect_max_ms: Option<u64>,

    /// Log destination statistics every N ticks (0 = never)
    #[arg(long, env = "RELAY_STATS_INTERVAL_TICKS")]
    pub stats_interval_ticks: Option<u32>,
}

impl TuningArgs {
    /// Apply every given override, returning the names of changed fields
    pub fn apply(&self, tuning: &mut RelayTuning) -> Vec<&'static str> {
        let mut changed = Vec::new();
        if let Some(v) = self.queue_capacity {
            tuning.queue_capacity = v;
            changed.push("queue_capacity");
        }
        if let Some(v) = self.max_frame_size {
            tuning.max_frame_size = v;
            changed.push("max_frame_size");
        }
        if let Some(v) = self.poll_interval_ms {
            tuning.poll_interval_ms = v;
            changed.push("poll_interval_ms");
        }
        if let Some(v) = self.connect_timeout_ms {
            tuning.connect_timeout_ms = v;
            changed.push("connect_timeout_ms");
        }
        if let Some(v) = self.send_timeout_ms {
            tuning.send_timeout_ms = v;
            changed.push("send_timeout_ms");
        }
        if let Some(v) = self.reconnect_initial_ms {
            tuning.reconnect_initial_ms = v;
            changed.push("reconnect_initial_ms");
        }
        if let Some(v) = self.reconnect_max_ms {
            tuning.reconnect_max_ms = v;
            changed.push("reconnect_max_ms");
        }
        if let Some(v) = self.stats_interval_ticks {
            tuning.stats_interval_ticks = v;
            changed.push("stats_interval_ticks");
        }
        changed
    }
}

/// Log output format
#[derive(ValueEnum, Clone, Copy, Debug, Default)]
pub enum LogFormat {
    /// JSON structured logging
    Json,
    /// Human-readable pretty format
    #[default]
    Pretty,
    /// Compact single-line format
    Compact,
}

impl From<LogFormat> for observability::LogFormat {
    fn from(format: LogFormat) -> Self {
        match format {
            LogFormat::Json => Self::Json,
            LogFormat::Pretty => Self::Pretty,
            LogFormat::Compact => Self::Compact,
        }
    }
}
