use anyhow::Context;
use argh::FromArgs;
use fdsh::Interpreter;
use fdsh::external;
use tracing_subscriber::EnvFilter;

/// Environment variable holding the log filter, e.g. `FDSH_LOG=debug`.
const LOG_ENV: &str = "FDSH_LOG";

#[derive(FromArgs)]
/// A small Unix shell with stream redirection.
struct Args {
    #[argh(option, short = 'c')]
    /// run a single command line and exit with its status
    command: Option<String>,

    #[argh(switch)]
    /// do not print a prompt before reading each line
    no_prompt: bool,
}

fn main() -> anyhow::Result<()> {
    let filter = EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(true)
        .init();

    let args: Args = argh::from_env();
    let mut shell = Interpreter::default();

    let status = match args.command {
        Some(line) => shell.eval(&line, 0),
        None => {
            external::ignore_interrupts().context("cannot ignore SIGINT")?;
            shell.repl(!args.no_prompt)?
        }
    };
    std::process::exit(status)
}
