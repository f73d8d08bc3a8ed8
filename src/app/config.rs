use std::io::{self, IsTerminal, Write};

use log::error;
use tokio::runtime::Builder;

use super::args::Args;
use crate::config::Config;

/// Parses the config file on a throwaway single-threaded runtime, before
/// the real runtime and logger are up, so a parse error can be reported in
/// whatever form (terminal or log line) is available at that point.
pub fn init_config(args: &Args) -> Result<Config, Box<dyn std::error::Error>> {
    let runtime = Builder::new_multi_thread().worker_threads(1).build()?;
    let config = runtime.block_on(async { Config::load(&args.config_file).await });

    match config {
        Ok(config) => Ok(config),
        Err(err) => {
            if io::stdin().is_terminal() {
                eprintln!("config parse error: {err}");
                io::stdout().flush().ok();
            } else {
                error!("config parse error: {err}");
            }
            std::process::exit(exitcode::CONFIG);
        }
    }
}
