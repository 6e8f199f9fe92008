use anyhow::Result;
use clap::{Parser, Subcommand};
use std::fs;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use classforge::library::ClassReader;
use classforge::{CompilationContext, Config, Error};

#[derive(Parser)]
#[command(name = "classforge")]
#[command(about = "Inspect library and emitted JVM class files")]
#[command(version)]
struct Cli {
    /// Verbose output (repeat for more)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Load a class through the library loader and list its symbol
    Inspect {
        /// Binary (java/lang/String) or dotted (java.lang.String) class name
        #[arg(value_name = "CLASS")]
        name: String,

        /// Runtime image, a directory or an archive
        #[arg(long, value_name = "PATH")]
        runtime: Option<PathBuf>,

        /// Standard-library archive
        #[arg(long, value_name = "PATH")]
        stdlib: Option<PathBuf>,

        /// Directory of third-party archives
        #[arg(long, value_name = "DIR")]
        libs: Option<PathBuf>,
    },

    /// Decode one class file and list it
    Dump {
        #[arg(value_name = "FILE")]
        input: PathBuf,
    },
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match run(&cli.command) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("error: {:#}", err);
            let code = err.downcast_ref::<Error>().map(Error::exit_code).unwrap_or(1);
            ExitCode::from(u8::try_from(code).unwrap_or(1))
        }
    }
}

/// `RUST_LOG` applies unless `-v` is given, which overrides it
fn init_logging(verbose: u8) {
    let mut builder = env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn"));
    if let Some(level) = verbosity_level(verbose) {
        builder.filter_level(level);
    }
    builder.format_timestamp(None).init();
}

fn verbosity_level(verbose: u8) -> Option<log::LevelFilter> {
    match verbose {
        0 => None,
        1 => Some(log::LevelFilter::Info),
        2 => Some(log::LevelFilter::Debug),
        _ => Some(log::LevelFilter::Trace),
    }
}

fn run(command: &Commands) -> Result<()> {
    match command {
        Commands::Inspect { name, runtime, stdlib, libs } => {
            inspect(name, runtime.clone(), stdlib.clone(), libs.clone())
        }
        Commands::Dump { input } => dump(input),
    }
}

fn inspect(name: &str, runtime: Option<PathBuf>, stdlib: Option<PathBuf>, libs: Option<PathBuf>) -> Result<()> {
    let config = Config::default().with_library_paths(runtime, stdlib, libs);
    let mut ctx = CompilationContext::new(config)?;
    let binary_name = if name.contains('/') { name.to_string() } else { name.replace('.', "/") };

    let class = ctx
        .find_class(&binary_name)?
        .ok_or_else(|| anyhow::anyhow!("class {} not found in any library", binary_name))?;
    print!("{}", ctx.tree.describe_class(class));
    Ok(())
}

fn dump(input: &Path) -> Result<()> {
    let bytes = fs::read(input).map_err(|e| Error::io(input, e))?;
    let origin = input.display().to_string();
    let class = ClassReader::decode(&origin, &bytes)?;
    print!("{}", class.describe());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn no_flag_leaves_the_environment_filter_alone() {
        assert_eq!(verbosity_level(0), None);
        assert_eq!(verbosity_level(1), Some(log::LevelFilter::Info));
        assert_eq!(verbosity_level(2), Some(log::LevelFilter::Debug));
        assert_eq!(verbosity_level(9), Some(log::LevelFilter::Trace));
    }
}
