use clap::Parser;

use max_pain::{logging, pipeline};

mod cli;

fn main() -> anyhow::Result<()> {
    let cli = cli::Cli::parse();
    let level = cli.log_level.clone();

    match cli.command {
        cli::Command::Run(args) => {
            let opts = args.into_options()?;
            logging::init(level.as_deref().unwrap_or(&opts.config.log_level), cli.log_json);
            let batch = pipeline::run(opts)?;
            if batch.summary.succeeded == 0 && batch.summary.requested > 0 {
                anyhow::bail!("no ticker succeeded");
            }
            Ok(())
        }
        cli::Command::Expiration { spec, today } => {
            logging::init(level.as_deref().unwrap_or("warn"), cli.log_json);
            pipeline::expiration(&spec, today.unwrap_or_else(cli::today))
        }
        cli::Command::Curve {
            file,
            ticker,
            expiration,
            today,
        } => {
            logging::init(level.as_deref().unwrap_or("warn"), cli.log_json);
            pipeline::curve(&file, &ticker, &expiration, today.unwrap_or_else(cli::today))
        }
    }
}
