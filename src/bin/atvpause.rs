use atvpause::app;
use atvpause::atv::AtvTransport;
use atvpause::config::{EnvFile, ENV_FILE_NAME};
use atvpause::error::Failure;
use atvpause::identity::Identity;
use atvpause::orchestrator::Settings;
use atvpause::pairing::DEFAULT_MAX_PIN_ATTEMPTS;
use atvpause::prompt::Terminal;
use atvpause::tv::noop::LogOnlyTransport;
use clap::Parser;
use log::debug;
use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Device IPv4 address. Overrides the saved one for this run.
    #[arg(long)]
    host: Option<String>,

    /// Pair again even if a credential is saved.
    #[arg(long)]
    repair: bool,

    /// Where the settings file and client certificate live.
    #[arg(long, env = "ATVPAUSE_CONFIG_DIR")]
    config_dir: Option<PathBuf>,

    /// Name shown on the device when pairing.
    #[arg(long, default_value = "atvpause")]
    client_name: String,

    /// Wrong PINs allowed before pairing gives up.
    #[arg(long, default_value_t = DEFAULT_MAX_PIN_ATTEMPTS, value_parser = clap::value_parser!(u32).range(1..))]
    max_pin_attempts: u32,

    /// Network timeout in seconds.
    #[arg(long, default_value_t = 10, value_parser = clap::value_parser!(u64).range(1..))]
    timeout: u64,

    /// If true, log what would be sent instead of talking to a device.
    #[arg(long)]
    use_fake_tv: bool,
}

fn config_dir(args: &Args) -> PathBuf {
    args.config_dir.clone().unwrap_or_else(|| {
        dirs::config_dir()
            .map(|dir| dir.join("atvpause"))
            .unwrap_or_else(|| PathBuf::from("."))
    })
}

fn run(args: &Args) -> Result<(), Failure> {
    let dir = config_dir(args);
    debug!("Using config dir {:?}", dir);
    let mut store = EnvFile::open(dir.join(ENV_FILE_NAME))?;
    let options = app::Options {
        host: args.host.clone(),
        settings: Settings {
            force_repair: args.repair,
            max_pin_attempts: args.max_pin_attempts,
        },
    };
    if args.use_fake_tv {
        app::run(&options, &mut store, LogOnlyTransport::default(), &mut Terminal)
    } else {
        let transport = AtvTransport::new(
            Identity::in_dir(&dir, &args.client_name),
            &args.client_name,
            Duration::from_secs(args.timeout),
        );
        app::run(&options, &mut store, transport, &mut Terminal)
    }
}

fn main() -> ExitCode {
    let args = Args::parse();

    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("WARN"))
        .format_timestamp(Some(env_logger::fmt::TimestampPrecision::Millis))
        .init();

    let result = run(&args);
    if let Err(failure) = &result {
        eprintln!("Error: {failure}");
        eprintln!("{}", failure.hint());
    }
    ExitCode::from(app::exit_code(&result))
}

#[cfg(test)]
mod tests {
    use crate::*;

    #[test]
    fn test_defaults() {
        let args = Args::try_parse_from(["atvpause"]).unwrap();
        assert_eq!(args.timeout, 10);
        assert_eq!(args.max_pin_attempts, DEFAULT_MAX_PIN_ATTEMPTS);
        assert!(!args.repair);
    }

    #[test]
    fn test_zero_limits_are_rejected() {
        assert!(Args::try_parse_from(["atvpause", "--timeout", "0"]).is_err());
        assert!(Args::try_parse_from(["atvpause", "--max-pin-attempts", "0"]).is_err());
        let args = Args::try_parse_from(["atvpause", "--timeout", "1"]).unwrap();
        assert_eq!(args.timeout, 1);
    }
}
