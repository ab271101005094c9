//! Main CLI application structure

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Result;
use clap::{Parser, Subcommand};

use super::output::{Output, OutputFormat};
use super::{console, render, tui, viewers_cmd};
use crate::storage::{Config, DevLog};

#[derive(Parser)]
#[command(name = "eview")]
#[command(
    author,
    version,
    about = "Edit scripts for generating graphics and see the results in real-time."
)]
#[command(args_conflicts_with_subcommands = true)]
pub struct Cli {
    /// Script to open; its extension picks the viewer tab
    pub filename: Option<PathBuf>,

    /// Output format
    #[arg(long, short = 'f', global = true, default_value = "text")]
    pub format: OutputFormat,

    /// Enable verbose output for debugging
    #[arg(long, short = 'v', global = true)]
    pub verbose: bool,

    /// Use this config file instead of the project's .eview.toml
    #[arg(long, global = true, env = "EVIEW_CONFIG")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// List available viewers
    Viewers,

    /// Run a viewer once on a script and report the result
    Render {
        /// Script to render
        file: PathBuf,

        /// Viewer key (defaults to the one matching the file extension)
        #[arg(long)]
        viewer: Option<String>,

        /// Command file to use (created from the viewer if missing)
        #[arg(long)]
        cmd_file: Option<PathBuf>,

        /// Graphic to write (defaults to the script path with .png)
        #[arg(long, short)]
        output: Option<PathBuf>,
    },

    /// Re-render a script every time it changes on disk
    Watch {
        /// Script to watch
        file: PathBuf,

        /// Viewer key (defaults to the one matching the file extension)
        #[arg(long)]
        viewer: Option<String>,

        /// Graphic to write (defaults to the script path with .png)
        #[arg(long, short)]
        output: Option<PathBuf>,
    },

    /// Show the devtools log written by a running app
    Console {
        /// Number of lines to show
        #[arg(short = 'n', long, default_value = "50")]
        lines: usize,

        /// Keep printing new lines as they arrive
        #[arg(short = 'F', long)]
        follow: bool,
    },

    /// Print the effective configuration
    Config {
        /// Only print which files were read
        #[arg(long)]
        path: bool,
    },
}

/// Main entry point for the CLI
pub fn run() -> Result<ExitCode> {
    let cli = Cli::parse();
    let output = Output::new(cli.format, cli.verbose);

    output.verbose("eview starting");

    let config = Config::load(cli.config.as_deref())?;
    output.verbose_ctx(
        "config",
        &format!("Loaded {} config file(s)", config.sources.len()),
    );

    let devlog = DevLog::new(
        DevLog::resolve_path(config.devtools_log.as_deref()),
        DevLog::env_enabled() || cli.verbose,
    );

    let code = match cli.command {
        None => {
            tui::run(&output, &config, &devlog, cli.filename.as_deref())?;
            ExitCode::SUCCESS
        }

        Some(Commands::Viewers) => {
            viewers_cmd::list(&output, &config);
            ExitCode::SUCCESS
        }

        Some(Commands::Render {
            file,
            viewer,
            cmd_file,
            output: graphic,
        }) => {
            output.verbose_ctx("render", &format!("Rendering {}", file.display()));
            let options = render::RenderOptions {
                file,
                viewer,
                cmd_file,
                output: graphic,
            };
            if render::render(&output, &config, &devlog, &options)? {
                ExitCode::SUCCESS
            } else {
                ExitCode::FAILURE
            }
        }

        Some(Commands::Watch {
            file,
            viewer,
            output: graphic,
        }) => {
            output.verbose_ctx("watch", &format!("Watching {}", file.display()));
            let options = render::RenderOptions {
                file,
                viewer,
                cmd_file: None,
                output: graphic,
            };
            render::watch(&output, &config, &devlog, &options)?;
            ExitCode::SUCCESS
        }

        Some(Commands::Console { lines, follow }) => {
            console::show(&output, devlog.path(), lines, follow)?;
            ExitCode::SUCCESS
        }

        Some(Commands::Config { path }) => {
            show_config(&output, &config, &devlog, path)?;
            ExitCode::SUCCESS
        }
    };

    output.verbose("Command completed");
    Ok(code)
}

/// Prints the effective configuration or the files it came from
fn show_config(output: &Output, config: &Config, devlog: &DevLog, paths_only: bool) -> Result<()> {
    let sources: Vec<String> = config
        .sources
        .iter()
        .map(|p| p.display().to_string())
        .collect();

    if output.is_json() {
        if paths_only {
            output.data(&serde_json::json!({
                "sources": sources,
                "global": Config::global_config_path().map(|p| p.display().to_string()),
                "devtools_log": devlog.path().display().to_string(),
            }));
        } else {
            output.data(config);
        }
        return Ok(());
    }

    if paths_only {
        if sources.is_empty() {
            println!("No config files found (using defaults)");
        } else {
            for source in &sources {
                println!("{}", source);
            }
        }
        if let Some(global) = Config::global_config_path() {
            println!("Global config: {}", global.display());
        }
        println!("Devtools log: {}", devlog.path().display());
    } else {
        print!("{}", toml::to_string_pretty(config)?);
    }

    Ok(())
}
