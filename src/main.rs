use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::Context;
use clap::Parser;

use gitian_build::cli::Cli;
use gitian_build::config::loader::{locate_project_config, resolve_project_config};
use gitian_build::config::validator::validate_options;
use gitian_build::{AppError, LogCollector, NativeGit, Orchestrator, RunOutcome, SystemRunner};

fn script_name() -> String {
    std::env::args()
        .next()
        .and_then(|arg0| {
            Path::new(&arg0)
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
        })
        .unwrap_or_else(|| "gitian-build".to_string())
}

fn resolve_workdir(cli: &Cli) -> anyhow::Result<PathBuf> {
    let cwd = std::env::current_dir().context("Failed to determine current directory")?;
    Ok(match &cli.workdir {
        Some(dir) if dir.is_absolute() => dir.clone(),
        Some(dir) => cwd.join(dir),
        None => cwd,
    })
}

fn run(cli: Cli) -> anyhow::Result<ExitCode> {
    let workdir = resolve_workdir(&cli)?;

    // Everything up to validation is side-effect free.
    let config_source = locate_project_config(cli.config.as_deref(), &workdir);
    let project = resolve_project_config(config_source.as_deref()).map_err(AppError::from)?;
    let config = validate_options(&cli.to_options(), project, &workdir).map_err(AppError::from)?;

    match LogCollector::new(&config.workspace.logs_dir(), cli.log_level) {
        Ok(collector) => {
            let session = collector.session_log_path().to_path_buf();
            if collector.install().is_ok() {
                log::info!("[Main] Session log: {}", session.display());
            }
        }
        Err(e) => eprintln!("[Main] WARNING: session log unavailable: {}", e),
    }
    match &config_source {
        Some(path) => log::info!("[Config] Project config: {}", path.display()),
        None => log::info!("[Config] Project config: built-in defaults"),
    }

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("Failed to start async runtime")?;

    let summary = config
        .workspace
        .logs_dir()
        .join(format!("gitian-build-{}.json", chrono::Local::now().format("%Y%m%d_%H%M%S")));

    let mut orchestrator = Orchestrator::new(config, SystemRunner::new(), NativeGit);
    let result = runtime.block_on(orchestrator.run());

    if let Err(e) = orchestrator.write_summary(&summary) {
        log::warn!("[Main] Could not write run summary: {}", e);
    }
    log::logger().flush();

    match result? {
        RunOutcome::RebootRequired => println!("Reboot is required"),
        RunOutcome::Completed => {}
    }
    Ok(ExitCode::SUCCESS)
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    let script = script_name();

    match run(cli) {
        Ok(code) => code,
        Err(err) => {
            let Some(app) = err.downcast_ref::<AppError>() else {
                eprintln!("{}: {:#}", script, err);
                return ExitCode::from(1);
            };
            match app {
                AppError::Usage(usage) if usage.is_missing_argument() => {
                    println!("{}: {}", script, usage);
                    println!("Try {} --help for more information", script);
                }
                _ => eprintln!("{}: {}", script, app.user_message()),
            }
            ExitCode::from(u8::try_from(app.exit_code()).unwrap_or(1))
        }
    }
}
