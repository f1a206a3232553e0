mod forget;
mod serve;
mod status;

use crate::cli::{Cli, Commands};
use crate::config::AppConfig;
use crate::error::Result;
use crate::output::{ApiResult, print_result};

pub async fn dispatch(cli: Cli) -> Result<()> {
	let result = run(cli).await;
	if let Err(err) = &result {
		print_result(&ApiResult::<()>::failure(err.code(), err.to_string()));
	}
	result
}

async fn run(cli: Cli) -> Result<()> {
	let config = AppConfig::load(cli.config.as_deref())?.with_state_dir(cli.state_dir);

	match cli.command {
		Commands::Serve { listen, no_restore } => serve::execute(config.with_listen(listen), !no_restore).await,
		Commands::Status { tenant } => status::execute(&config, tenant.as_deref()),
		Commands::Forget { tenant } => forget::execute(config, &tenant).await,
	}
}
