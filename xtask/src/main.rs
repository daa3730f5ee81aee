use anyhow::Result;
use clap::{Parser, Subcommand, ValueEnum};
use colored::*;
use std::path::Path;
use std::process::{Command, Stdio};
use std::time::Instant;

#[derive(Parser)]
#[command(name = "x")]
#[command(about = "Development automation for nes-runner")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run all CI checks (fmt, clippy, build, test)
    Ci {
        #[arg(long)]
        verbose: bool,
    },
    /// Quick checks before commit (fmt, clippy)
    Check {
        #[arg(long)]
        verbose: bool,
    },
    /// Format code
    Fmt {
        #[arg(long)]
        check: bool,
    },
    /// Run clippy
    Clippy {
        #[arg(long)]
        fix: bool,
    },
    /// Build the project
    Build {
        #[arg(long)]
        release: bool,
    },
    /// Run tests
    Test {
        #[arg(long)]
        doc: bool,
        #[arg(long)]
        ignored: bool,
        /// Restrict to some modules (repeatable)
        #[arg(long, value_enum)]
        only: Vec<Module>,
    },
    /// Run benchmarks
    Bench,
    /// Run a ROM headless for a number of frames
    Smoke {
        /// Path to ROM file
        rom_path: String,
        /// Number of frames to run
        #[arg(short = 'n', long, default_value = "600")]
        frames: u64,
        /// Build in release mode
        #[arg(long)]
        release: bool,
    },
    /// Pre-commit hook (fmt, clippy, test)
    PreCommit,
}

/// Modules with their own test suites
#[derive(Clone, Copy, ValueEnum)]
enum Module {
    Scheduler,
    Display,
    Netplay,
    Emulator,
}

impl Module {
    /// Unit test filter and the integration test file, if any
    fn targets(self) -> (&'static str, Option<&'static str>) {
        match self {
            Module::Scheduler => ("scheduler", Some("scheduler_test")),
            Module::Display => ("display", Some("display_test")),
            Module::Netplay => ("netplay", Some("netplay_test")),
            Module::Emulator => ("emulator", None),
        }
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Ci { verbose } => run_ci(verbose),
        Commands::Check { verbose } => run_check(verbose),
        Commands::Fmt { check } => run_fmt(check),
        Commands::Clippy { fix } => run_clippy(fix),
        Commands::Build { release } => run_build(release),
        Commands::Test { doc, ignored, only } => run_test(doc, ignored, &only),
        Commands::Bench => execute_command(&mut cargo("bench")),
        Commands::Smoke {
            rom_path,
            frames,
            release,
        } => run_smoke(&rom_path, frames, release),
        Commands::PreCommit => run_pre_commit(),
    }
}

/// `cargo <subcommand>` with the feature set for this environment
///
/// CI machines have no sound server, so the cpal backend is left out there.
fn cargo(subcommand: &str) -> Command {
    let mut cmd = Command::new("cargo");
    cmd.arg(subcommand);
    if subcommand != "fmt" {
        if std::env::var("CI").is_ok() {
            cmd.arg("--no-default-features");
        } else {
            cmd.arg("--all-features");
        }
    }
    cmd
}

fn run_ci(verbose: bool) -> Result<()> {
    println!("{}", "=== Running CI Pipeline ===".bold().blue());
    let start = Instant::now();

    run_task("Format Check", || run_fmt(true), verbose)?;
    run_task("Clippy", || run_clippy(false), verbose)?;
    run_task("Build", || run_build(false), verbose)?;
    run_task("Test", || run_test(false, false, &[]), verbose)?;

    report_done("CI passed in", start);
    Ok(())
}

fn run_check(verbose: bool) -> Result<()> {
    println!("{}", "=== Running Quick Checks ===".bold().blue());
    let start = Instant::now();

    run_task("Format Check", || run_fmt(true), verbose)?;
    run_task("Clippy", || run_clippy(false), verbose)?;

    report_done("Checks passed in", start);
    Ok(())
}

fn run_pre_commit() -> Result<()> {
    println!("{}", "=== Pre-commit Checks ===".bold().blue());
    let start = Instant::now();

    run_task("Format Check", || run_fmt(true), false)?;
    run_task("Clippy", || run_clippy(false), false)?;
    run_task("Test", || run_test(false, false, &[]), false)?;

    report_done("Pre-commit checks passed in", start);
    Ok(())
}

fn run_fmt(check: bool) -> Result<()> {
    let mut cmd = cargo("fmt");
    cmd.arg("--all");
    if check {
        cmd.arg("--").arg("--check");
    }
    execute_command(&mut cmd)
}

fn run_clippy(fix: bool) -> Result<()> {
    let mut cmd = cargo("clippy");
    cmd.arg("--all-targets");
    if fix {
        cmd.arg("--fix");
    } else {
        cmd.arg("--").arg("-D").arg("warnings");
    }
    execute_command(&mut cmd)
}

fn run_build(release: bool) -> Result<()> {
    let mut cmd = cargo("build");
    if release {
        cmd.arg("--release");
    }
    execute_command(&mut cmd)
}

fn run_test(doc: bool, ignored: bool, only: &[Module]) -> Result<()> {
    let with_ignored = |cmd: &mut Command| {
        if ignored {
            cmd.arg("--").arg("--ignored");
        }
    };

    if doc {
        let mut cmd = cargo("test");
        cmd.arg("--doc");
        with_ignored(&mut cmd);
        return execute_command(&mut cmd);
    }

    if only.is_empty() {
        let mut cmd = cargo("test");
        with_ignored(&mut cmd);
        return execute_command(&mut cmd);
    }

    let mut failed = Vec::new();
    for &module in only {
        let (filter, integration) = module.targets();
        println!("{} Running {} tests...", "→".blue(), filter.bold());

        let mut unit = cargo("test");
        unit.arg("--lib").arg(filter);
        with_ignored(&mut unit);
        let mut result = execute_command(&mut unit);

        if let (Ok(()), Some(file)) = (&result, integration) {
            let mut cmd = cargo("test");
            cmd.arg("--test").arg(file);
            with_ignored(&mut cmd);
            result = execute_command(&mut cmd);
        }

        match result {
            Ok(()) => println!("{} {} tests passed\n", "✓".green(), filter),
            Err(e) => {
                println!("{} {} tests failed\n", "✗".red(), filter);
                if only.len() == 1 {
                    return Err(e);
                }
                failed.push(filter);
            }
        }
    }

    if failed.is_empty() {
        Ok(())
    } else {
        anyhow::bail!("Tests failed in: {}", failed.join(", "))
    }
}

fn run_smoke(rom_path: &str, frames: u64, release: bool) -> Result<()> {
    println!("{}", "=== Headless Smoke Run ===".bold().blue());

    if !Path::new(rom_path).exists() {
        println!(
            "{} ROM file not found: {}",
            "✗".red().bold(),
            rom_path.yellow()
        );
        anyhow::bail!("ROM file not found");
    }

    let lower = rom_path.to_lowercase();
    if !lower.ends_with(".nes") && !lower.ends_with(".fds") {
        println!(
            "{} File does not have a .nes or .fds extension",
            "⚠".yellow().bold()
        );
    }

    println!("{} ROM file: {}", "✓".green(), rom_path.cyan());
    println!("{} Frames: {}", "→".blue(), frames.to_string().bold());
    println!();

    let start = Instant::now();
    let mut cmd = cargo("run");
    if release {
        cmd.arg("--release");
    }
    cmd.arg("--")
        .arg(rom_path)
        .arg("--headless")
        .arg("--frames")
        .arg(frames.to_string());

    if let Err(e) = execute_command(&mut cmd) {
        println!("\n{} Smoke run failed", "✗".red().bold());
        return Err(e);
    }

    let elapsed = start.elapsed().as_secs_f64();
    println!(
        "\n{} {} frames in {} ({:.1} fps)",
        "✓".green().bold(),
        frames,
        format!("{:.2}s", elapsed).bold(),
        frames as f64 / elapsed.max(f64::EPSILON)
    );
    Ok(())
}

fn run_task<F>(name: &str, task: F, verbose: bool) -> Result<()>
where
    F: FnOnce() -> Result<()>,
{
    print!("{} {} ... ", "→".blue(), name);

    let start = Instant::now();
    match task() {
        Ok(_) => {
            let timing = if verbose {
                format!("({:.2}s)", start.elapsed().as_secs_f64())
            } else {
                String::new()
            };
            println!("{} {}", "✓".green().bold(), timing);
            Ok(())
        }
        Err(e) => {
            println!("{}", "✗".red().bold());
            Err(e)
        }
    }
}

fn report_done(message: &str, start: Instant) {
    println!(
        "\n{} {}",
        format!("✓ {}", message).green().bold(),
        format!("{:.2}s", start.elapsed().as_secs_f64()).bold()
    );
}

fn execute_command(cmd: &mut Command) -> Result<()> {
    let status = cmd
        .stdout(Stdio::inherit())
        .stderr(Stdio::inherit())
        .status()?;

    if !status.success() {
        anyhow::bail!("Command failed with exit code: {}", status);
    }

    Ok(())
}
