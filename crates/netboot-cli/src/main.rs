//! buildnetboot - UEFI payload with iPXE network boot
//!
//! ## Commands
//!
//! - `build`: check out EDK II, apply the NetBoot patch, verify the host
//!   toolchain and build `UefiPayloadPkg` for X64
//!
//! Exit codes: 0 on success, -1 when toolchain verification fails, 1 for
//! every other failure.

use anyhow::{Context, Result};
use clap::{CommandFactory, Parser, Subcommand};
use netboot_core::{
    init_tracing, BuildDriver, BuildEnv, BuildOptions, HttpFetcher, NetbootConfig, NetbootError,
    Platform, SystemRunner,
};
use tracing::{error, Level};

#[derive(Parser, Debug)]
#[command(name = "buildnetboot")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Build the EDK II UEFI payload with iPXE network boot", long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Emit JSON-formatted log lines
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand, Debug, PartialEq, Eq)]
enum Commands {
    /// Build the UEFI NetBoot payload
    Build {
        /// Build RELEASE instead of DEBUG
        #[arg(short, long)]
        release: bool,

        /// Preferred toolchain (e.g. clang, vs2019); detected when empty
        #[arg(short, long, default_value = "")]
        toolchain: String,
    },
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let level = if cli.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };
    init_tracing(cli.json, level);

    let Some(command) = cli.command else {
        Cli::command().print_help().context("Failed to print help")?;
        println!();
        return Ok(());
    };

    match command {
        Commands::Build { release, toolchain } => {
            let options = BuildOptions { release, toolchain };
            if let Err(err) = cmd_build(&options).await {
                error!("{}", err);
                std::process::exit(err.exit_code());
            }
        }
    }

    Ok(())
}

async fn cmd_build(options: &BuildOptions) -> Result<(), NetbootError> {
    let root = std::env::current_dir()?;
    let mut env = BuildEnv::from_process();
    let config = NetbootConfig::from_env(root, &env);
    let fetcher = HttpFetcher::new()?;

    BuildDriver::new(&SystemRunner, &fetcher, Platform::host())
        .build(&config, options, &mut env)
        .await?;
    Ok(())
}
