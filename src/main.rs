mod app;

use clap::{Parser, Subcommand};
use color_eyre::Result;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::EnvFilter;

use app::{App, Task};
use ventdash::{Config, DashboardClient};

#[derive(Parser, Debug)]
#[command(name = "ventdash")]
#[command(about = "Cached client for the ventilation monitoring dashboard")]
#[command(version)]
struct Args {
  /// Path to config file (default: $XDG_CONFIG_HOME/ventdash/config.yaml)
  #[arg(short, long)]
  config: Option<PathBuf>,

  /// Override the API base URL
  #[arg(long)]
  base_url: Option<String>,

  /// Write logs to a daily rolling file in this directory instead of stderr
  #[arg(long)]
  log_dir: Option<PathBuf>,

  #[command(subcommand)]
  command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
  /// Current ventilation status
  Status {
    /// Ignore cached data
    #[arg(short, long)]
    force: bool,
  },
  /// Ventilation history for a time window
  History {
    /// Window size in hours (default from config, normally 24)
    #[arg(long)]
    hours: Option<u32>,
    #[arg(short, long)]
    force: bool,
  },
  /// Enhanced dashboard metrics
  Enhanced {
    #[arg(short, long)]
    force: bool,
  },
  /// Poll all endpoints and print every fresh update
  Watch {
    /// Seconds between polls
    #[arg(short, long, default_value_t = 10)]
    interval: u64,
    #[arg(long)]
    hours: Option<u32>,
  },
}

fn init_tracing(log_dir: Option<&Path>) -> Option<WorkerGuard> {
  let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("ventdash=info"));

  match log_dir {
    Some(dir) => {
      let appender = tracing_appender::rolling::daily(dir, "ventdash.log");
      let (writer, guard) = tracing_appender::non_blocking(appender);
      tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(writer)
        .with_ansi(false)
        .init();
      Some(guard)
    }
    None => {
      tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
      None
    }
  }
}

#[tokio::main]
async fn main() -> Result<()> {
  color_eyre::install()?;

  let args = Args::parse();
  let _guard = init_tracing(args.log_dir.as_deref());

  // Load configuration
  let config = Config::load(args.config.as_deref())?;

  // Override base url if specified on command line
  let config = if let Some(base_url) = args.base_url {
    Config {
      api: ventdash::config::ApiConfig { base_url },
      ..config
    }
  } else {
    config
  };

  let default_hours = config.cache.default_history_hours;
  let task = match args.command {
    Command::Status { force } => Task::Status { force },
    Command::History { hours, force } => Task::History {
      hours: hours.unwrap_or(default_hours),
      force,
    },
    Command::Enhanced { force } => Task::Enhanced { force },
    Command::Watch { interval, hours } => Task::Watch {
      interval: Duration::from_secs(interval.max(1)),
      hours: hours.unwrap_or(default_hours),
    },
  };

  let client = DashboardClient::from_config(&config)?;
  App::new(client).run(task).await?;

  Ok(())
}
