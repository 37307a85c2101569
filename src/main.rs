// Copyright 2025 dentsusoken
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

use clap::{Parser, Subcommand};
use provision::commands::detect::DetectCommand;
use provision::commands::install::{InstallArgs, InstallCommand};
use provision::commands::status::StatusCommand;
use provision::config::new_provision_config;
use provision::error::{
    EXIT_NOT_RUNNING, EXIT_SUCCESS, Result, format_error_chain, get_exit_code,
};
use provision::locking::global_token;
use provision::logging;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "provision")]
#[command(author, version, about = "Cross-platform application installer", long_about = None)]
struct Cli {
    /// Increase verbosity (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Install the configured application
    #[command(visible_alias = "i")]
    Install {
        /// Install into this directory instead of the platform default
        #[arg(long, value_name = "DIR")]
        dest: Option<PathBuf>,

        /// Install even if the application is running
        #[arg(short, long)]
        force: bool,

        /// Do not ask for confirmation
        #[arg(short, long)]
        yes: bool,

        /// Show what would be installed without actually installing
        #[arg(long)]
        dry_run: bool,

        /// Disable progress indicators
        #[arg(long)]
        no_progress: bool,

        /// Give up after this many seconds
        #[arg(long, value_name = "SECONDS")]
        timeout: Option<u64>,

        /// Print the outcome as JSON
        #[arg(long)]
        json: bool,
    },

    /// Show the detected platform and install channel
    Detect {
        /// Output in JSON format
        #[arg(long)]
        json: bool,
    },

    /// Check whether the application is running
    Status {
        /// Output in JSON format
        #[arg(long)]
        json: bool,
    },
}

fn main() {
    let cli = Cli::parse();

    logging::setup_logger(cli.verbose);

    // Load configuration once at startup
    let config = match new_provision_config() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("{}", format_error_chain(&e));
            std::process::exit(get_exit_code(&e));
        }
    };

    let result: Result<i32> = (|| match cli.command {
        Commands::Install {
            dest,
            force,
            yes,
            dry_run,
            no_progress,
            timeout,
            json,
        } => {
            let args = InstallArgs {
                dest,
                force,
                yes,
                dry_run,
                no_progress,
                timeout_secs: timeout,
                json,
            };
            let command = InstallCommand::new(&config)?;
            let outcome = command.execute(&args, global_token())?;
            Ok(outcome.exit_code())
        }
        Commands::Detect { json } => {
            let command = DetectCommand::new(&config)?;
            command.execute(json)?;
            Ok(EXIT_SUCCESS)
        }
        Commands::Status { json } => {
            let command = StatusCommand::new(&config)?;
            let running = command.execute(json)?;
            Ok(if running { EXIT_SUCCESS } else { EXIT_NOT_RUNNING })
        }
    })();

    match result {
        Ok(code) => std::process::exit(code),
        Err(e) => {
            eprintln!("{}", format_error_chain(&e));
            std::process::exit(get_exit_code(&e));
        }
    }
}
