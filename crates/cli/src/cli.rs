use std::net::SocketAddr;
use std::path::PathBuf;

use clap::{Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(name = "walinkd")]
#[command(about = "Per-tenant messaging session daemon")]
#[command(version)]
pub struct Cli {
	/// Increase verbosity (-v info, -vv debug, -vvv trace)
	#[arg(short, long, global = true, action = clap::ArgAction::Count)]
	pub verbose: u8,

	/// Config file (defaults to <config dir>/walink/config.json when present)
	#[arg(long, global = true, value_name = "FILE")]
	pub config: Option<PathBuf>,

	/// Directory holding the session snapshot and credentials
	#[arg(long, global = true, value_name = "DIR")]
	pub state_dir: Option<PathBuf>,

	#[command(subcommand)]
	pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
	/// Serve the HTTP API and restore previously paired sessions
	Serve {
		/// Address to listen on
		#[arg(long, value_name = "ADDR")]
		listen: Option<SocketAddr>,

		/// Skip reconnecting stored sessions on startup
		#[arg(long)]
		no_restore: bool,
	},

	/// Print stored session state without connecting
	Status {
		/// Only show this tenant
		tenant: Option<String>,
	},

	/// Remove a tenant's stored state and credentials
	Forget { tenant: String },
}
