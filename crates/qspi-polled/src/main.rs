//! CLI entry point running the polled flash sequence on a simulated device.

use std::env;
use std::ffi::OsString;
use std::fs;
use std::path::{Path, PathBuf};

use isf_flash::{
    ConnectionMode, FlashSequencer, FlashTestConfig, ReadCommand, SimConfigTable, SimFlash,
    SimQspi,
};
#[cfg(test)]
use tempfile as _;

const USAGE_TEXT: &str = "\
Usage: qspi-polled [options]

Options:
  -c, --config <file>    JSON run configuration (defaults apply to missing fields)
  -a, --address <hex>    Test region start address
  -p, --pages <n>        Number of pages to write
  -r, --read <command>   read | fast_read | dual_op_fast_read | quad_op_fast_read
      --stacked          Use two stacked devices behind one controller
      --corrupt <offset> Invert one byte of every read-back at <offset>
  -v, --verbose          Log every flash command
  -h, --help             Show this help message

Examples:
  qspi-polled
  qspi-polled --address 0x20000 --pages 4 --read fast_read
  qspi-polled --config run.json --stacked
";

const BANNER: &str = "QSPIPSU FLASH Polling Example Test";

#[derive(Debug, Default, PartialEq, Eq)]
struct RunArgs {
    config: Option<PathBuf>,
    address: Option<u32>,
    pages: Option<u32>,
    read: Option<ReadCommand>,
    stacked: bool,
    corrupt: Option<usize>,
    verbose: bool,
}

#[derive(Debug)]
enum ParseResult {
    Run(RunArgs),
    Help,
}

#[allow(clippy::while_let_on_iterator)]
fn parse_args(mut args: impl Iterator<Item = OsString>) -> Result<ParseResult, String> {
    let mut run = RunArgs::default();

    while let Some(arg) = args.next() {
        let flag = arg.to_string_lossy().to_string();
        match flag.as_str() {
            "-h" | "--help" => return Ok(ParseResult::Help),
            "-v" | "--verbose" => run.verbose = true,
            "--stacked" => run.stacked = true,
            "-c" | "--config" => {
                run.config = Some(PathBuf::from(next_value(&mut args, &flag)?));
            }
            "-a" | "--address" => {
                run.address = Some(parse_hex(&next_value(&mut args, &flag)?)?);
            }
            "-p" | "--pages" => {
                let value = next_value(&mut args, &flag)?;
                let pages = value
                    .parse::<u32>()
                    .map_err(|_| format!("invalid page count: {value}"))?;
                run.pages = Some(pages);
            }
            "-r" | "--read" => {
                let value = next_value(&mut args, &flag)?;
                let command = ReadCommand::from_name(&value)
                    .ok_or_else(|| format!("unknown read command: {value}"))?;
                run.read = Some(command);
            }
            "--corrupt" => {
                let value = next_value(&mut args, &flag)?;
                let offset = value
                    .parse::<usize>()
                    .map_err(|_| format!("invalid corrupt offset: {value}"))?;
                run.corrupt = Some(offset);
            }
            other => return Err(format!("unknown option: {other}")),
        }
    }

    Ok(ParseResult::Run(run))
}

fn next_value(args: &mut impl Iterator<Item = OsString>, flag: &str) -> Result<String, String> {
    args.next()
        .map(|value| value.to_string_lossy().to_string())
        .ok_or_else(|| format!("missing value for {flag}"))
}

fn parse_hex(text: &str) -> Result<u32, String> {
    let digits = text
        .strip_prefix("0x")
        .or_else(|| text.strip_prefix("0X"))
        .unwrap_or(text);
    u32::from_str_radix(&digits.replace('_', ""), 16)
        .map_err(|_| format!("invalid hex address: {text}"))
}

fn load_config(path: &Path) -> Result<FlashTestConfig, String> {
    let text = fs::read_to_string(path)
        .map_err(|e| format!("failed to read {}: {e}", path.display()))?;
    serde_json::from_str(&text).map_err(|e| format!("invalid config {}: {e}", path.display()))
}

fn resolve_config(args: &RunArgs) -> Result<FlashTestConfig, String> {
    let mut config = match &args.config {
        Some(path) => load_config(path)?,
        None => FlashTestConfig::default(),
    };
    if let Some(address) = args.address {
        config.test_address = address;
    }
    if let Some(pages) = args.pages {
        config.page_count = pages;
    }
    if let Some(command) = args.read {
        config.read_command = command;
    }
    config.validate().map_err(|e| e.to_string())?;
    Ok(config)
}

fn init_logging(verbose: bool) {
    let level = if verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level)).init();
}

fn run_sequence(args: &RunArgs, config: FlashTestConfig) -> Result<(), i32> {
    let (mode, mut flash) = if args.stacked {
        (ConnectionMode::Stacked, SimFlash::n25q256_stacked())
    } else {
        (ConnectionMode::Single, SimFlash::n25q256())
    };
    if let Some(offset) = args.corrupt {
        flash.corrupt_reads_at(offset);
    }

    log::info!(
        "{} pages of {} bytes at {:#010x}, {} readback",
        config.page_count,
        config.page_size,
        config.test_address,
        config.read_command.name()
    );

    let mut sequencer = FlashSequencer::new(config, SimQspi::new(), flash).map_err(|e| {
        eprintln!("error: {e}");
        1
    })?;

    match sequencer.run(&SimConfigTable::single(mode)) {
        Ok(()) => {
            println!("Successfully ran {BANNER}");
            Ok(())
        }
        Err(e) => {
            eprintln!("error: {e} (status {})", e.status());
            println!("{BANNER} Failed");
            Err(1)
        }
    }
}

fn main() {
    let exit_code = match parse_args(env::args_os().skip(1)) {
        Ok(ParseResult::Help) => {
            println!("{USAGE_TEXT}");
            0
        }
        Ok(ParseResult::Run(args)) => {
            init_logging(args.verbose);
            println!("{BANNER}");
            match resolve_config(&args).map_err(|error| {
                eprintln!("error: {error}");
                println!("{BANNER} Failed");
                1
            }) {
                Ok(config) => match run_sequence(&args, config) {
                    Ok(()) => 0,
                    Err(code) => code,
                },
                Err(code) => code,
            }
        }
        Err(error) => {
            eprintln!("error: {error}");
            eprintln!("{USAGE_TEXT}");
            1
        }
    };

    std::process::exit(exit_code);
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::ffi::OsString;

    fn args(list: &[&str]) -> impl Iterator<Item = OsString> {
        list.iter()
            .map(OsString::from)
            .collect::<Vec<_>>()
            .into_iter()
    }

    #[test]
    fn no_arguments_run_the_defaults() {
        let result = parse_args(std::iter::empty()).expect("empty args parse");
        assert!(matches!(result, ParseResult::Run(run) if run == RunArgs::default()));
    }

    #[test]
    fn parses_every_option() {
        let result = parse_args(args(&[
            "--config",
            "run.json",
            "-a",
            "0x20000",
            "--pages",
            "4",
            "-r",
            "fast_read",
            "--stacked",
            "--corrupt",
            "12",
            "-v",
        ]))
        .expect("valid args parse");

        let ParseResult::Run(run) = result else {
            panic!("expected run arguments");
        };
        assert_eq!(
            run,
            RunArgs {
                config: Some(PathBuf::from("run.json")),
                address: Some(0x2_0000),
                pages: Some(4),
                read: Some(ReadCommand::FastRead),
                stacked: true,
                corrupt: Some(12),
                verbose: true,
            }
        );
    }

    #[test]
    fn parses_help_flag() {
        let result = parse_args(args(&["-h"])).expect("help parses");
        assert!(matches!(result, ParseResult::Help));
    }

    #[test]
    fn rejects_unknown_option() {
        let error = parse_args(args(&["--erase-all"])).expect_err("unknown option");
        assert!(error.contains("unknown option"));
    }

    #[test]
    fn rejects_missing_option_value() {
        let error = parse_args(args(&["--pages"])).expect_err("missing value");
        assert_eq!(error, "missing value for --pages");
    }

    #[test]
    fn rejects_unknown_read_command() {
        let error = parse_args(args(&["--read", "octal"])).expect_err("bad command");
        assert!(error.contains("unknown read command"));
    }

    #[test]
    fn hex_addresses_accept_optional_prefix_and_separators() {
        assert_eq!(parse_hex("0x100_0000"), Ok(0x100_0000));
        assert_eq!(parse_hex("1000"), Ok(0x1000));
        assert_eq!(parse_hex("0XfF"), Ok(0xFF));
        assert!(parse_hex("0xZZ").is_err());
        assert!(parse_hex("0x1_0000_0000").is_err());
    }

    #[test]
    fn overrides_apply_on_top_of_defaults() {
        let run = RunArgs {
            address: Some(0x4_0000),
            pages: Some(3),
            read: Some(ReadCommand::Read),
            ..RunArgs::default()
        };
        let config = resolve_config(&run).expect("valid overrides");
        assert_eq!(config.test_address, 0x4_0000);
        assert_eq!(config.page_count, 3);
        assert_eq!(config.read_command, ReadCommand::Read);
        assert_eq!(config.page_size, 256);
    }

    #[test]
    fn zero_pages_are_rejected() {
        let run = RunArgs {
            pages: Some(0),
            ..RunArgs::default()
        };
        let error = resolve_config(&run).expect_err("zero pages");
        assert_eq!(error, "page count must be non-zero");
    }

    #[test]
    fn default_run_succeeds_and_corruption_fails() {
        let config = FlashTestConfig::default();
        assert_eq!(run_sequence(&RunArgs::default(), config), Ok(()));

        let corrupt = RunArgs {
            corrupt: Some(5),
            ..RunArgs::default()
        };
        assert_eq!(run_sequence(&corrupt, config), Err(1));
    }

    #[test]
    fn stacked_run_succeeds() {
        let stacked = RunArgs {
            stacked: true,
            ..RunArgs::default()
        };
        assert_eq!(run_sequence(&stacked, FlashTestConfig::default()), Ok(()));
    }
}
