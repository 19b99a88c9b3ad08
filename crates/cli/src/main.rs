mod cmd;
mod output;

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use cfpush_lib::deploy::PushFlags;

use crate::output::print_error;

/// cfpush - push applications to a Cloud Foundry style platform
#[derive(Parser)]
#[command(name = "cfpush")]
#[command(author, version, about, long_about = None)]
struct Cli {
  /// Enable verbose diagnostics on stderr
  #[arg(short, long, global = true)]
  verbose: bool,

  #[command(subcommand)]
  command: Commands,
}

#[derive(Subcommand)]
enum Commands {
  /// Create or update an app, upload its bits, and start it
  Push(PushArgs),

  /// Start an app
  Start {
    /// Name of the app
    name: String,
  },

  /// Stop an app
  Stop {
    /// Name of the app
    name: String,
  },
}

#[derive(Args)]
struct PushArgs {
  /// Name of the app
  name: Option<String>,

  /// Path to the app directory or zip archive (default: current directory)
  #[arg(short = 'p', long)]
  path: Option<PathBuf>,

  /// Custom buildpack by name or URL ("default" or "null" to reset)
  #[arg(short = 'b', long)]
  buildpack: Option<String>,

  /// Startup command ("default" or "null" to reset)
  #[arg(short = 'c', long)]
  command: Option<String>,

  /// Domain to route the app on
  #[arg(short = 'd', long)]
  domain: Option<String>,

  /// Hostname for the route
  #[arg(short = 'n', long)]
  hostname: Option<String>,

  /// Number of instances
  #[arg(short = 'i', long, allow_negative_numbers = true)]
  instances: Option<i64>,

  /// Disk limit (e.g. 256M, 1024M, 1G)
  #[arg(short = 'k', long)]
  disk: Option<String>,

  /// Memory limit (e.g. 256M, 1024M, 1G)
  #[arg(short = 'm', long)]
  memory: Option<String>,

  /// Stack to use
  #[arg(short = 's', long)]
  stack: Option<String>,

  /// Docker image to deploy instead of local bits
  #[arg(short = 'o', long)]
  docker_image: Option<String>,

  /// Max wait time for app instance startup, in seconds
  #[arg(short = 't', long)]
  timeout: Option<String>,

  /// Application health check type ("port" or "none")
  #[arg(short = 'u', long)]
  health_check_type: Option<String>,

  /// Path for the route
  #[arg(long)]
  route_path: Option<String>,

  /// Do not map a route to this app and remove routes from previous pushes
  #[arg(long)]
  no_route: bool,

  /// Map the root domain to this app
  #[arg(long)]
  no_hostname: bool,

  /// Create a random route for this app
  #[arg(long)]
  random_route: bool,

  /// Do not start the app after pushing
  #[arg(long)]
  no_start: bool,
}

impl From<PushArgs> for PushFlags {
  fn from(args: PushArgs) -> Self {
    PushFlags {
      name: args.name,
      path: args.path,
      buildpack: args.buildpack,
      command: args.command,
      domain: args.domain,
      hostname: args.hostname,
      instances: args.instances,
      disk_quota: args.disk,
      memory: args.memory,
      stack: args.stack,
      docker_image: args.docker_image,
      timeout: args.timeout,
      health_check_type: args.health_check_type,
      route_path: args.route_path,
      no_route: args.no_route,
      no_hostname: args.no_hostname,
      random_route: args.random_route,
      no_start: args.no_start,
    }
  }
}

fn main() {
  let cli = Cli::parse();

  let filter = EnvFilter::try_from_default_env()
    .unwrap_or_else(|_| EnvFilter::new(if cli.verbose { "debug" } else { "warn" }));
  tracing_subscriber::fmt()
    .with_env_filter(filter)
    .with_writer(std::io::stderr)
    .without_time()
    .init();

  let result = match cli.command {
    Commands::Push(args) => cmd::cmd_push(args.into()),
    Commands::Start { name } => cmd::cmd_start(&name),
    Commands::Stop { name } => cmd::cmd_stop(&name),
  };

  if let Err(e) = result {
    print_error(&e.to_string());
    std::process::exit(1);
  }
}
