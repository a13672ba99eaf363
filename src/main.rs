use anyhow::Result;
use clap::Parser;
use elmore::{CLIArguments, delay_main, evaluate_main};

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

    let args = CLIArguments::parse();

    match args {
        CLIArguments::Delay(args) => delay_main(args),
        CLIArguments::Evaluate(args) => evaluate_main(args),
    }
}
