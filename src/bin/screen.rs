//! Screen CLI - operator tool for the screening flow
//!
//! Commands:
//! - start: Create a screening from a questionnaire form
//! - record: Record an activity result by hand
//! - summary: Show the pass/fail summary
//! - export: Print the cleaned record
//! - clear: Delete the stored screening
//! - run: Drive a full flow from scripted stage inputs
//! - doctor: Diagnose configuration and storage
//! - config: Print the effective configuration

use clap::{Parser, Subcommand, ValueEnum};
use std::fs;
use std::io::{self, BufRead, BufReader, Read, Write};
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use screening_flow::detection::{SensorKind, VirtualSensorHub};
use screening_flow::store::FileStore;
use screening_flow::{
    ActivityResult, CleanExport, FlowConfig, FlowError, FlowStatus, QuestionnaireForm,
    RecordOutcome, ScreeningFlow, SessionStore, StageHost, StageInput, StageView, Summary,
    Verdict, VERSION,
};

/// Screen - stage sequencing and results ledger for a child development screening
#[derive(Parser)]
#[command(name = "screen")]
#[command(version = VERSION)]
#[command(about = "Run and inspect child development screenings", long_about = None)]
struct Cli {
    /// Configuration file (JSON)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Directory holding the stored screening
    #[arg(long, global = true)]
    store_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create a screening from a questionnaire form
    Start {
        /// Form file path, camelCase JSON (use - for stdin)
        #[arg(short, long)]
        form: PathBuf,
    },

    /// Record an activity result by hand
    Record {
        /// Activity key (responseToName, waveGame, blowOutCandles, overstim, pointing)
        key: String,

        #[arg(value_enum)]
        outcome: Outcome,
    },

    /// Show the pass/fail summary
    Summary {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Print the cleaned record (child info, answers, scores)
    Export,

    /// Delete the stored screening
    Clear,

    /// Drive a full flow from scripted stage inputs
    Run {
        /// Script of stage inputs, one JSON object per line (use - for stdin)
        #[arg(short, long)]
        script: PathBuf,

        /// Refuse a sensor, as if permission was denied
        #[arg(long, value_parser = parse_sensor)]
        deny: Vec<SensorKind>,

        /// Print each flow status as JSON
        #[arg(long)]
        json: bool,
    },

    /// Diagnose configuration and storage
    Doctor {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Print the effective configuration
    Config,
}

#[derive(Clone, Copy, ValueEnum)]
enum Outcome {
    Pass,
    Fail,
}

fn parse_sensor(s: &str) -> Result<SensorKind, String> {
    SensorKind::parse(s).ok_or_else(|| {
        let known: Vec<&str> = SensorKind::ALL.iter().map(|k| k.as_str()).collect();
        format!("unknown sensor '{}' (expected one of: {})", s, known.join(", "))
    })
}

fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

    let cli = Cli::parse();

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!(
                "{}",
                serde_json::to_string(&CliError::from(e)).unwrap_or_else(|_| "Unknown error".to_string())
            );
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<(), ScreenCliError> {
    let store_dir = cli.store_dir.unwrap_or_else(default_store_dir);

    // Doctor reports a broken config instead of failing on it
    if let Commands::Doctor { json } = cli.command {
        return cmd_doctor(cli.config.as_deref(), &store_dir, json);
    }
    let config = load_config(cli.config.as_deref())?;

    match cli.command {
        Commands::Start { form } => cmd_start(config, &store_dir, &form),
        Commands::Record { key, outcome } => cmd_record(config, &store_dir, &key, outcome),
        Commands::Summary { json } => cmd_summary(config, &store_dir, json),
        Commands::Export => cmd_export(config, &store_dir),
        Commands::Clear => cmd_clear(config, &store_dir),
        Commands::Run { script, deny, json } => cmd_run(config, &store_dir, &script, deny, json),
        Commands::Doctor { .. } | Commands::Config => {
            println!("{}", config.to_json()?);
            Ok(())
        }
    }
}

fn load_config(path: Option<&Path>) -> Result<FlowConfig, ScreenCliError> {
    match path {
        Some(path) => Ok(FlowConfig::load(path)?),
        None => Ok(FlowConfig::default()),
    }
}

fn default_store_dir() -> PathBuf {
    dirs::data_dir()
        .map(|dir| dir.join("screening-flow"))
        .unwrap_or_else(|| PathBuf::from(".screening-flow"))
}

fn open_flow(config: FlowConfig, store_dir: &Path) -> Result<ScreeningFlow, ScreenCliError> {
    let store = FileStore::new(store_dir, config.storage_key.clone());
    Ok(ScreeningFlow::new(config, Box::new(store))?)
}

fn read_input(path: &Path) -> Result<String, ScreenCliError> {
    if path.to_string_lossy() == "-" {
        let mut buffer = String::new();
        io::stdin().read_to_string(&mut buffer)?;
        Ok(buffer)
    } else {
        Ok(fs::read_to_string(path)?)
    }
}

fn cmd_start(config: FlowConfig, store_dir: &Path, form: &Path) -> Result<(), ScreenCliError> {
    let form = QuestionnaireForm::from_json(&read_input(form)?)?;
    let mut flow = open_flow(config, store_dir)?;

    if let Some(previous) = flow.resume() {
        log::warn!(
            "Replacing saved screening {} for {}",
            previous.submission_id,
            previous.child_info.name
        );
    }

    let record = flow.submit_questionnaire(form)?;
    println!("{}", serde_json::to_string_pretty(&record)?);
    Ok(())
}

fn cmd_record(
    config: FlowConfig,
    store_dir: &Path,
    key: &str,
    outcome: Outcome,
) -> Result<(), ScreenCliError> {
    let mut flow = open_flow(config, store_dir)?;
    let verdict = Verdict::from_detected(matches!(outcome, Outcome::Pass));

    match flow.record(key, ActivityResult::from_verdict(verdict))? {
        RecordOutcome::Written => {
            println!("{} = {}", key, verdict.label());
            Ok(())
        }
        RecordOutcome::Dropped { reason } => Err(ScreenCliError::NotWritten(reason)),
        RecordOutcome::Duplicate => Err(ScreenCliError::NotWritten("duplicate completion".to_string())),
    }
}

fn cmd_summary(config: FlowConfig, store_dir: &Path, json: bool) -> Result<(), ScreenCliError> {
    let flow = open_flow(config, store_dir)?;
    let summary = flow.summary();

    if json {
        println!("{}", serde_json::to_string_pretty(&summary)?);
    } else {
        print!("{}", summary.render_text());
    }
    Ok(())
}

fn cmd_export(config: FlowConfig, store_dir: &Path) -> Result<(), ScreenCliError> {
    let flow = open_flow(config, store_dir)?;
    let record = flow.session().load().ok_or(ScreenCliError::NoData)?;
    println!(
        "{}",
        serde_json::to_string_pretty(&CleanExport::from_record(&record))?
    );
    Ok(())
}

fn cmd_clear(config: FlowConfig, store_dir: &Path) -> Result<(), ScreenCliError> {
    let mut flow = open_flow(config, store_dir)?;
    flow.reset()?;
    println!("Screening data cleared");
    Ok(())
}

/// Prints stage screens and the summary to stdout
struct ConsoleHost {
    quiet: bool,
}

impl StageHost for ConsoleHost {
    fn render(&mut self, view: &StageView) {
        if self.quiet {
            return;
        }
        println!(
            "== Stage {}/{}: {} ==",
            view.position + 1,
            view.total,
            view.title
        );
        println!("{}", view.prompt);
    }

    fn show_summary(&mut self, summary: &Summary) {
        if self.quiet {
            return;
        }
        println!();
        print!("{}", summary.render_text());
    }
}

fn cmd_run(
    config: FlowConfig,
    store_dir: &Path,
    script: &Path,
    deny: Vec<SensorKind>,
    json: bool,
) -> Result<(), ScreenCliError> {
    let mut flow = open_flow(config, store_dir)?
        .with_sensors(VirtualSensorHub::denying(deny))
        .with_host(ConsoleHost { quiet: json });

    let reader: Box<dyn BufRead> = if script.to_string_lossy() == "-" {
        Box::new(BufReader::new(io::stdin()))
    } else {
        Box::new(BufReader::new(fs::File::open(script)?))
    };

    let mut stdout = io::stdout();
    flow.start();

    for (index, line) in reader.lines().enumerate() {
        let line = line?;
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') {
            continue;
        }

        let input: StageInput = serde_json::from_str(trimmed).map_err(|e| {
            ScreenCliError::Script {
                line: index + 1,
                message: e.to_string(),
            }
        })?;

        let status = match flow.handle(input) {
            Ok(status) => status,
            Err(e @ FlowError::UnexpectedInput { .. }) | Err(e @ FlowError::InvalidForm(_)) => {
                log::warn!("Line {}: {}", index + 1, e);
                continue;
            }
            Err(e) => return Err(e.into()),
        };

        if json {
            writeln!(stdout, "{}", serde_json::to_string(&status)?)?;
        } else if let FlowStatus::Advanced {
            recorded: Some(outcome),
            ..
        }
        | FlowStatus::Finished {
            recorded: Some(outcome),
        } = &status
        {
            writeln!(stdout, "-- recorded: {:?}", outcome)?;
        }
        stdout.flush()?;

        if matches!(status, FlowStatus::Finished { .. } | FlowStatus::Exited) {
            break;
        }
    }

    Ok(())
}

fn cmd_doctor(config_path: Option<&Path>, store_dir: &Path, json: bool) -> Result<(), ScreenCliError> {
    let mut checks: Vec<DoctorCheck> = Vec::new();

    checks.push(DoctorCheck {
        name: "version".to_string(),
        status: CheckStatus::Ok,
        message: format!("screening-flow {}", VERSION),
    });

    // Configuration
    let config = match config_path {
        Some(path) => match FlowConfig::load(path) {
            Ok(config) => {
                checks.push(DoctorCheck {
                    name: "config".to_string(),
                    status: CheckStatus::Ok,
                    message: format!(
                        "{} valid ({} stages)",
                        path.display(),
                        config.stages.len()
                    ),
                });
                config
            }
            Err(e) => {
                checks.push(DoctorCheck {
                    name: "config".to_string(),
                    status: CheckStatus::Error,
                    message: e.to_string(),
                });
                FlowConfig::default()
            }
        },
        None => {
            checks.push(DoctorCheck {
                name: "config".to_string(),
                status: CheckStatus::Ok,
                message: "Using built-in defaults".to_string(),
            });
            FlowConfig::default()
        }
    };

    if config.stages.is_empty() {
        checks.push(DoctorCheck {
            name: "stages".to_string(),
            status: CheckStatus::Warning,
            message: "No stages configured; every run goes straight to the summary".to_string(),
        });
    }

    // Store directory
    let store_check = match fs::create_dir_all(store_dir) {
        Ok(()) => {
            let probe = store_dir.join(".doctor-probe");
            match fs::write(&probe, b"ok").and_then(|_| fs::remove_file(&probe)) {
                Ok(()) => DoctorCheck {
                    name: "store_dir".to_string(),
                    status: CheckStatus::Ok,
                    message: format!("{} is writable", store_dir.display()),
                },
                Err(e) => DoctorCheck {
                    name: "store_dir".to_string(),
                    status: CheckStatus::Error,
                    message: format!("{} is not writable: {}", store_dir.display(), e),
                },
            }
        }
        Err(e) => DoctorCheck {
            name: "store_dir".to_string(),
            status: CheckStatus::Error,
            message: format!("Cannot create {}: {}", store_dir.display(), e),
        },
    };
    checks.push(store_check);

    // Saved screening
    let store = FileStore::new(store_dir, config.storage_key.clone());
    let record_check = match store.load() {
        Ok(Some(record)) => DoctorCheck {
            name: "saved_screening".to_string(),
            status: CheckStatus::Ok,
            message: format!(
                "{} with {} activity results",
                record.submission_id,
                record.activity_results.len()
            ),
        },
        Ok(None) => DoctorCheck {
            name: "saved_screening".to_string(),
            status: CheckStatus::Ok,
            message: "No saved screening".to_string(),
        },
        Err(e) => DoctorCheck {
            name: "saved_screening".to_string(),
            status: CheckStatus::Warning,
            message: format!("{} (treated as no data; run 'screen clear')", e),
        },
    };
    checks.push(record_check);

    // Check stdin is available (for scripted runs)
    let stdin_check = if atty::is(atty::Stream::Stdin) {
        DoctorCheck {
            name: "stdin".to_string(),
            status: CheckStatus::Ok,
            message: "stdin is a TTY (interactive mode)".to_string(),
        }
    } else {
        DoctorCheck {
            name: "stdin".to_string(),
            status: CheckStatus::Ok,
            message: "stdin is a pipe (ready for 'screen run --script -')".to_string(),
        }
    };
    checks.push(stdin_check);

    let report = DoctorReport {
        version: VERSION.to_string(),
        store: store.describe(),
        checks,
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        println!("Screen Doctor Report");
        println!("====================");
        println!("Version: {}", report.version);
        println!("Store:   {}", report.store);
        println!("\nChecks:");

        for check in &report.checks {
            let status_icon = match check.status {
                CheckStatus::Ok => "[OK]",
                CheckStatus::Warning => "[WARN]",
                CheckStatus::Error => "[ERR]",
            };
            println!("  {} {}: {}", status_icon, check.name, check.message);
        }
    }

    let has_errors = report.checks.iter().any(|c| matches!(c.status, CheckStatus::Error));
    if has_errors {
        Err(ScreenCliError::DoctorFailed)
    } else {
        Ok(())
    }
}

// Error types

#[derive(Debug)]
enum ScreenCliError {
    Io(io::Error),
    Flow(FlowError),
    Json(serde_json::Error),
    Script { line: usize, message: String },
    NotWritten(String),
    NoData,
    DoctorFailed,
}

impl From<io::Error> for ScreenCliError {
    fn from(e: io::Error) -> Self {
        ScreenCliError::Io(e)
    }
}

impl From<FlowError> for ScreenCliError {
    fn from(e: FlowError) -> Self {
        ScreenCliError::Flow(e)
    }
}

impl From<serde_json::Error> for ScreenCliError {
    fn from(e: serde_json::Error) -> Self {
        ScreenCliError::Json(e)
    }
}

#[derive(serde::Serialize)]
struct CliError {
    code: String,
    message: String,
    hint: Option<String>,
}

impl From<ScreenCliError> for CliError {
    fn from(e: ScreenCliError) -> Self {
        match e {
            ScreenCliError::Io(e) => CliError {
                code: "IO_ERROR".to_string(),
                message: e.to_string(),
                hint: Some("Check file paths and permissions".to_string()),
            },
            ScreenCliError::Flow(e) => {
                let hint = match &e {
                    FlowError::InvalidForm(_) => "Form needs childName, parentName and answers A1..A6",
                    FlowError::InvalidConfig(_) => "Run 'screen config' to see a valid configuration",
                    FlowError::NoSession => "Run 'screen start --form <file>' first",
                    FlowError::UnknownActivity(_) => {
                        "Known keys: responseToName, waveGame, blowOutCandles, overstim, pointing"
                    }
                    FlowError::CorruptRecord(_) => "Run 'screen clear' to start over",
                    FlowError::RecordClosed(_) => "Run 'screen start --form <file>' to begin a new screening",
                    _ => "Run 'screen doctor' for details",
                };
                CliError {
                    code: "FLOW_ERROR".to_string(),
                    message: e.to_string(),
                    hint: Some(hint.to_string()),
                }
            }
            ScreenCliError::Json(e) => CliError {
                code: "JSON_ERROR".to_string(),
                message: e.to_string(),
                hint: Some("Check JSON syntax".to_string()),
            },
            ScreenCliError::Script { line, message } => CliError {
                code: "SCRIPT_ERROR".to_string(),
                message: format!("Line {}: {}", line, message),
                hint: Some("Each line must be a stage input such as {\"type\": \"start\"}".to_string()),
            },
            ScreenCliError::NotWritten(reason) => CliError {
                code: "NOT_WRITTEN".to_string(),
                message: format!("Result was not stored: {}", reason),
                hint: Some("Run 'screen doctor' to check the store directory".to_string()),
            },
            ScreenCliError::NoData => CliError {
                code: "NO_DATA".to_string(),
                message: "No screening data found".to_string(),
                hint: Some("Run 'screen start --form <file>' first".to_string()),
            },
            ScreenCliError::DoctorFailed => CliError {
                code: "DOCTOR_FAILED".to_string(),
                message: "One or more health checks failed".to_string(),
                hint: Some("Review the doctor report for details".to_string()),
            },
        }
    }
}

// Report types

#[derive(serde::Serialize)]
struct DoctorReport {
    version: String,
    store: String,
    checks: Vec<DoctorCheck>,
}

#[derive(serde::Serialize)]
struct DoctorCheck {
    name: String,
    status: CheckStatus,
    message: String,
}

#[derive(serde::Serialize)]
enum CheckStatus {
    Ok,
    Warning,
    Error,
}
