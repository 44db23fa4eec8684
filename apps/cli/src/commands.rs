//! CLI command definitions, routing, and tracing setup.

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use color_eyre::eyre::{Result, eyre};
use indicatif::{ProgressBar, ProgressStyle};
use serde_json::json;
use tracing::info;

use nbmend_core::{
    CoverageReporter, DocumentValidator, ProgressReporter, RepairOptions, RepairPlan,
    repair_file, scan_directory, validate_all,
};
use nbmend_shared::{AppConfig, init_config, load_config, load_config_from, load_profile};

// ---------------------------------------------------------------------------
// CLI structure
// ---------------------------------------------------------------------------

/// nbmend: put scrambled notebooks back in order.
#[derive(Parser)]
#[command(
    name = "nbmend",
    version,
    about = "Repair, validate and survey Jupyter notebooks.",
    long_about = None,
)]
pub(crate) struct Cli {
    /// Log format: text (default) or json.
    #[arg(long, default_value = "text", global = true)]
    pub log_format: LogFormat,

    /// Verbosity level (-v, -vv, -vvv).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Config file to use instead of ~/.nbmend/nbmend.toml.
    #[arg(long, env = "NBMEND_CONFIG", global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

/// Log output format.
#[derive(Clone, Debug, clap::ValueEnum)]
pub(crate) enum LogFormat {
    Text,
    Json,
}

/// Top-level CLI subcommands.
#[derive(Subcommand)]
pub(crate) enum Command {
    /// Restore a notebook's canonical section order.
    Repair {
        /// Notebook to repair.
        notebook: PathBuf,

        /// Repair profile: a TOML file or a built-in name
        /// (deep-dive-analysis, deep-dive-structure). Defaults to deep-dive-analysis.
        #[arg(short, long)]
        profile: Option<PathBuf>,

        /// Write the result here instead of overwriting the input.
        #[arg(short, long)]
        out: Option<PathBuf>,

        /// Report what would change without writing.
        #[arg(long)]
        dry_run: bool,

        /// Do not create missing section headers.
        #[arg(long)]
        no_synthesis: bool,
    },

    /// Check notebooks for structural defects.
    Validate {
        /// Notebooks to check.
        paths: Vec<PathBuf>,

        /// Check every notebook under the current directory.
        #[arg(long)]
        all: bool,

        /// Emit results as JSON.
        #[arg(long)]
        json: bool,
    },

    /// Report keyword coverage of the files under one or more roots.
    Coverage {
        /// Directories to scan.
        #[arg(required = true)]
        roots: Vec<PathBuf>,

        /// Override the configured coverage threshold (percent).
        #[arg(long)]
        threshold: Option<f64>,

        /// Emit the report as JSON.
        #[arg(long)]
        json: bool,
    },

    /// Print the role each block of a notebook is classified as.
    Classify {
        /// Notebook to inspect.
        notebook: PathBuf,

        /// Repair profile: a TOML file or a built-in name
        /// (deep-dive-analysis, deep-dive-structure). Defaults to deep-dive-analysis.
        #[arg(short, long)]
        profile: Option<PathBuf>,
    },

    /// Configuration management.
    Config {
        /// Config subcommand.
        #[command(subcommand)]
        action: ConfigAction,
    },
}

/// Config subcommands.
#[derive(Subcommand)]
pub(crate) enum ConfigAction {
    /// Initialize config file with defaults.
    Init,
    /// Show resolved configuration.
    Show,
}

// ---------------------------------------------------------------------------
// Tracing setup
// ---------------------------------------------------------------------------

/// Initialize tracing based on CLI flags.
pub(crate) fn init_tracing(cli: &Cli) {
    use tracing_subscriber::{EnvFilter, fmt};

    let filter = match cli.verbose {
        0 => "nbmend=info",
        1 => "nbmend=debug",
        _ => "nbmend=trace",
    };

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter));

    match cli.log_format {
        LogFormat::Text => {
            fmt()
                .with_env_filter(env_filter)
                .with_target(false)
                .with_writer(std::io::stderr)
                .init();
        }
        LogFormat::Json => {
            fmt()
                .json()
                .with_env_filter(env_filter)
                .with_writer(std::io::stderr)
                .init();
        }
    }
}

// ---------------------------------------------------------------------------
// Command dispatch
// ---------------------------------------------------------------------------

/// Run the CLI command.
pub(crate) fn run(cli: Cli) -> Result<ExitCode> {
    let config_path = cli.config;
    match cli.command {
        Command::Repair {
            notebook,
            profile,
            out,
            dry_run,
            no_synthesis,
        } => {
            let config = resolve_config(config_path.as_deref())?;
            let options = RepairOptions {
                input: notebook,
                output: out,
                dry_run,
            };
            cmd_repair(&config, &options, profile.as_deref(), no_synthesis)
        }
        Command::Validate { paths, all, json } => {
            let config = resolve_config(config_path.as_deref())?;
            cmd_validate(&config, paths, all, json)
        }
        Command::Coverage {
            roots,
            threshold,
            json,
        } => {
            let config = resolve_config(config_path.as_deref())?;
            cmd_coverage(&config, &roots, threshold, json)
        }
        Command::Classify { notebook, profile } => cmd_classify(&notebook, profile.as_deref()),
        Command::Config { action } => match action {
            ConfigAction::Init => cmd_config_init(),
            ConfigAction::Show => cmd_config_show(config_path.as_deref()),
        },
    }
}

fn resolve_config(path: Option<&Path>) -> Result<AppConfig> {
    Ok(match path {
        Some(path) => load_config_from(path)?,
        None => load_config()?,
    })
}

/// A profile argument is a file path, or a built-in name when it has no
/// extension and no such file exists.
fn resolve_plan(profile: Option<&Path>) -> Result<RepairPlan> {
    let plan = match profile {
        None => RepairPlan::builtin()?,
        Some(path) if path.is_file() || path.extension().is_some() => {
            RepairPlan::compile(&load_profile(path)?)?
        }
        Some(name) => RepairPlan::builtin_named(&name.to_string_lossy())?,
    };
    Ok(plan)
}

// ---------------------------------------------------------------------------
// Command handlers
// ---------------------------------------------------------------------------

fn cmd_repair(
    config: &AppConfig,
    options: &RepairOptions,
    profile: Option<&Path>,
    no_synthesis: bool,
) -> Result<ExitCode> {
    let mut plan = resolve_plan(profile)?;
    if no_synthesis {
        plan.options.synthesize_missing_headers = false;
    }
    let validator = DocumentValidator::new(config.validation.clone());

    info!(notebook = %options.input.display(), profile = %plan.name, "repairing notebook");

    let reporter = CliProgress::spinner();
    let outcome =
        reporter.finish_after(|progress| repair_file(options, &plan, &validator, progress))?;

    println!();
    println!("  Notebook:     {}", options.input.display());
    println!("  Blocks:       {}", outcome.document.len());
    println!("  Synthesized:  {}", outcome.synthesized_count);
    println!("  Dropped:      {}", outcome.dropped.len());
    for dropped in &outcome.dropped {
        println!("    - cell {} ({})", dropped.original_index, dropped.role);
    }
    if !outcome.advisories.is_empty() {
        println!("  Advisories:   {}", outcome.advisories.len());
        for advisory in &outcome.advisories {
            println!("    - {advisory}");
        }
    }
    if outcome.validation.is_valid() {
        println!("  Validation:   ok");
    } else {
        println!("  Validation:   {} issue(s)", outcome.validation.len());
        for issue in &outcome.validation.issues {
            println!("    - {issue}");
        }
    }

    let status = match (outcome.written, outcome.changed, options.dry_run) {
        (true, _, _) => format!("written to {}", outcome.output.display()),
        (false, true, true) => "changes not written (dry run)".to_string(),
        _ => "already in canonical order".to_string(),
    };
    println!("  Result:       {status}");
    println!("  Time:         {:.2}s", outcome.elapsed.as_secs_f64());
    println!();

    Ok(ExitCode::SUCCESS)
}

fn cmd_validate(config: &AppConfig, paths: Vec<PathBuf>, all: bool, json: bool) -> Result<ExitCode> {
    let mut paths = paths;
    if all {
        let cwd = std::env::current_dir()
            .map_err(|e| eyre!("cannot determine working directory: {e}"))?;
        paths.extend(nbmend_notebook::find_notebooks(&cwd)?);
    }
    if paths.is_empty() {
        return Err(eyre!("no notebooks given (pass paths or --all)"));
    }

    let validator = DocumentValidator::new(config.validation.clone());
    let reporter = if json {
        CliProgress::hidden()
    } else {
        CliProgress::bar(paths.len())
    };
    let results = validate_all(&paths, &validator, &reporter);

    if json {
        let entries: Vec<serde_json::Value> = results
            .iter()
            .map(|r| match &r.result {
                Ok(report) => json!({
                    "path": r.path.display().to_string(),
                    "valid": report.is_valid(),
                    "issues": report.issues,
                }),
                Err(e) => json!({
                    "path": r.path.display().to_string(),
                    "valid": false,
                    "error": e.to_string(),
                }),
            })
            .collect();
        println!("{}", serde_json::to_string_pretty(&entries)?);
    } else {
        for result in &results {
            match &result.result {
                Ok(report) if report.is_valid() => {
                    println!("ok    {}", result.path.display());
                }
                Ok(report) => {
                    println!("FAIL  {}", result.path.display());
                    for issue in &report.issues {
                        println!("        {issue}");
                    }
                }
                Err(e) => {
                    println!("ERROR {}", result.path.display());
                    println!("        {e}");
                }
            }
        }
        let failing = results.iter().filter(|r| !r.is_valid()).count();
        println!();
        println!("  {} checked, {failing} with issues", results.len());
    }

    Ok(if results.iter().all(|r| r.is_valid()) {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}

fn cmd_coverage(
    config: &AppConfig,
    roots: &[PathBuf],
    threshold: Option<f64>,
    json: bool,
) -> Result<ExitCode> {
    let mut coverage = config.coverage.clone();
    if let Some(threshold) = threshold {
        if !(0.0..=100.0).contains(&threshold) {
            return Err(eyre!("threshold {threshold} must be between 0 and 100"));
        }
        coverage.threshold = threshold;
    }

    let groups = roots
        .iter()
        .map(|root| scan_directory(root, &coverage.extensions))
        .collect::<nbmend_shared::Result<Vec<_>>>()?;

    let report = CoverageReporter::from_config(&coverage).report(&groups);

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        println!();
        for (category, count) in &report.by_category {
            println!("  {category:<28} {count:>6}");
        }
        println!();
        println!("  Total files:    {}", report.total);
        println!("  Categorized:    {}", report.categorized);
        println!("  Coverage:       {:.1}%", report.coverage_percent);
        println!(
            "  Threshold:      {:.1}% ({})",
            report.threshold,
            if report.meets_threshold { "met" } else { "not met" }
        );
        println!();
    }

    Ok(if report.meets_threshold {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}

fn cmd_classify(notebook: &Path, profile: Option<&Path>) -> Result<ExitCode> {
    let plan = resolve_plan(profile)?;
    let loaded = nbmend_notebook::load(notebook)?;

    for block in loaded.document.blocks() {
        let role = plan.classifier.classify(block);
        let first_line = block.content().lines().next().unwrap_or_default();
        let preview: String = first_line.chars().take(60).collect();
        println!(
            "{:>4}  {:<10}  {:<24}  {preview}",
            block.original_index(),
            block.kind().label(),
            role.as_str()
        );
    }

    Ok(ExitCode::SUCCESS)
}

fn cmd_config_init() -> Result<ExitCode> {
    let path = init_config()?;
    println!("Config initialized at: {}", path.display());
    Ok(ExitCode::SUCCESS)
}

fn cmd_config_show(path: Option<&Path>) -> Result<ExitCode> {
    let config = resolve_config(path)?;
    let toml_str = toml::to_string_pretty(&config)?;
    println!("{toml_str}");
    Ok(ExitCode::SUCCESS)
}

// ---------------------------------------------------------------------------
// CLI progress reporter
// ---------------------------------------------------------------------------

/// CLI progress reporter using indicatif spinners/bars.
struct CliProgress {
    bar: ProgressBar,
}

impl CliProgress {
    fn spinner() -> Self {
        let bar = ProgressBar::new_spinner();
        if let Ok(style) = ProgressStyle::with_template("{spinner:.cyan} {msg}") {
            bar.set_style(style.tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"]));
        }
        bar.enable_steady_tick(std::time::Duration::from_millis(80));
        Self { bar }
    }

    fn bar(total: usize) -> Self {
        if total < 2 {
            return Self::hidden();
        }
        let bar = ProgressBar::new(total as u64);
        if let Ok(style) = ProgressStyle::with_template("{bar:30.cyan/blue} {pos}/{len} {msg}") {
            bar.set_style(style);
        }
        Self { bar }
    }

    fn hidden() -> Self {
        Self {
            bar: ProgressBar::hidden(),
        }
    }

    fn finish(&self) {
        self.bar.finish_and_clear();
    }

    /// Run `work`, clearing the bar whether or not it succeeds.
    fn finish_after<T, E>(
        &self,
        work: impl FnOnce(&Self) -> std::result::Result<T, E>,
    ) -> std::result::Result<T, E> {
        let result = work(self);
        self.finish();
        result
    }
}

impl ProgressReporter for CliProgress {
    fn phase(&self, name: &str) {
        self.bar.set_message(name.to_string());
    }

    fn file_checked(&self, path: &Path, current: usize, _total: usize) {
        self.bar.set_position(current as u64);
        if let Some(name) = path.file_name() {
            self.bar.set_message(name.to_string_lossy().to_string());
        }
    }

    fn done(&self, _processed: usize, _failing: usize) {
        self.finish();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nbmend_shared::ValidationConfig;

    #[test]
    fn profile_argument_accepts_builtin_names() {
        assert_eq!(resolve_plan(None).expect("default").name, "deep-dive-analysis");

        let plan = resolve_plan(Some(Path::new("deep-dive-structure"))).expect("named");
        assert_eq!(plan.name, "deep-dive-structure");

        let err = resolve_plan(Some(Path::new("no-such-profile"))).unwrap_err();
        assert!(err.to_string().contains("unknown built-in profile"));
    }

    #[test]
    fn missing_profile_file_is_an_error() {
        let path = std::env::temp_dir().join("nbmend-cli-no-such-dir").join("profile.toml");
        assert!(resolve_plan(Some(&path)).is_err());
    }

    #[test]
    fn spinner_is_cleared_when_repair_fails() {
        let plan = RepairPlan::builtin().expect("plan");
        let validator = DocumentValidator::new(ValidationConfig::default());
        let options = RepairOptions::in_place(
            std::env::temp_dir().join("nbmend-cli-no-such-dir").join("missing.ipynb"),
        );

        let reporter = CliProgress::hidden();
        let result =
            reporter.finish_after(|progress| repair_file(&options, &plan, &validator, progress));

        assert!(result.is_err());
        assert!(reporter.bar.is_finished());
    }
}
