//! eventsh CLI
//!
//! Run a script, or command strings with `-R`, against an event document.

use anyhow::{bail, Context, Result};
use clap::Parser;
use simplelog::{ColorChoice, ConfigBuilder, LevelFilter, TermLogger, TerminalMode};
use std::process::ExitCode;
use std::time::Duration;
use eventsh::{Config, Event, Script, Session, State};

#[derive(Parser, Debug)]
#[command(name = "eventsh")]
#[command(version)]
#[command(about = "Run shell scripts that query an event document with jq")]
struct Cli {
    /// The event file to expose to the script (- for stdin)
    #[arg(short = 'E', long = "event", value_name = "FILE", default_value = "-")]
    event: String,

    /// Treat the arguments as command strings instead of a script file
    #[arg(short = 'R', long)]
    raw: bool,

    /// Stop at the first failing command
    #[arg(short = 'e', long)]
    errexit: bool,

    /// Seconds an external command may run before it is killed
    #[arg(long, value_name = "SECS")]
    timeout: Option<f64>,

    /// Print the execution log and debug messages
    #[arg(short, long)]
    verbose: bool,

    /// Script file (- for stdin) followed by its parameters, or command strings with -R
    #[arg(required = true, value_name = "SCRIPT|COMMANDS")]
    args: Vec<String>,

    /// Positional parameters for the script
    #[arg(last = true, value_name = "PARAMS")]
    params: Vec<String>,
}

impl Cli {
    fn config(&self) -> Result<Config> {
        let mut config = Config::from_env()?;
        if self.errexit {
            config = config.errexit(true);
        }
        if self.verbose {
            config = config.verbose(true);
        }
        if let Some(secs) = self.timeout {
            if !secs.is_finite() || secs <= 0.0 {
                bail!("--timeout must be a positive number of seconds");
            }
            config = config.exec_timeout(Duration::from_secs_f64(secs));
        }
        Ok(config)
    }
}

fn init_logging(verbose: bool) {
    let level = if verbose { LevelFilter::Debug } else { LevelFilter::Warn };
    let config = ConfigBuilder::new().set_time_level(LevelFilter::Off).build();
    if TermLogger::init(level, config, TerminalMode::Stderr, ColorChoice::Auto).is_err() {
        eprintln!("eventsh: logger already initialised");
    }
}

fn run(cli: &Cli, config: &Config) -> Result<i32> {
    let (script_source, params): (Option<&str>, Vec<String>) = if cli.raw {
        (None, cli.params.clone())
    } else {
        let path = cli.args[0].as_str();
        if path == "-" && cli.event == "-" {
            bail!("both --event and program and stdin: only one can be read from standard input");
        }
        let params = cli.args[1..].iter().chain(&cli.params).cloned().collect();
        (Some(path), params)
    };

    let event = Event::load(&cli.event)?;
    let script = match script_source {
        Some(path) => Script::load(path)?,
        None => Script::inline(&cli.args).context("error parsing commands")?,
    };

    let pwd = std::env::current_dir().context("cannot determine working directory")?;
    let mut state = State::new(pwd);
    state.set_params(&script.name, &params);

    let session = Session::new(event, config);
    let result = session.run(&mut state, &script);

    if config.verbose && !state.log.is_empty() {
        eprint!("{}", state.log);
    }

    match result {
        Ok(status) => Ok(status),
        Err(e) => {
            log::error!("script error: {}", e);
            Ok(e.exit_status())
        }
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let config = match cli.config() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("eventsh: {:#}", e);
            return ExitCode::FAILURE;
        }
    };
    init_logging(config.verbose);

    match run(&cli, &config) {
        Ok(status) => ExitCode::from((status & 0xff) as u8),
        Err(e) => {
            log::error!("{:#}", e);
            ExitCode::FAILURE
        }
    }
}
