// SPDX-License-Identifier: MIT OR Apache-2.0
//! `telop` command line tool.
//!
//! Validates projects, scrubs template phases, runs playout against recorded
//! data and replays editor command scripts. Frames go to stdout as JSON, logs
//! go to stderr.

use clap::{Parser, Subcommand, ValueEnum};
use std::io::Write as _;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use telop_editor::{CommandError, EditorCommand, EditorSettings, EditorState, SettingsError};
use telop_model::{Phase, Project, ProjectLoadError, Template};
use telop_timeline::{evaluate_phase, ActivationTarget, ContentOverlay, Playout, RecordSet};
use thiserror::Error;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "telop", version, about = "Broadcast graphics scene and timeline engine")]
struct Cli {
    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Validate a project and every animation's keyframes.
    Check(CheckArgs),
    /// Print one phase of a template at a local time as JSON.
    Preview(PreviewArgs),
    /// Run a template through its phases and print one JSON tick per frame.
    Playout(PlayoutArgs),
    /// Replay an editor command script and write the project.
    Edit(EditArgs),
}

#[derive(Parser, Debug)]
struct CheckArgs {
    /// Project RON file.
    project: PathBuf,
}

#[derive(Parser, Debug)]
struct PreviewArgs {
    /// Project RON file.
    project: PathBuf,

    /// Template name.
    #[arg(long)]
    template: String,

    /// Phase to scrub.
    #[arg(long, value_enum, default_value_t = PhaseArg::In)]
    phase: PhaseArg,

    /// Local phase time (ms).
    #[arg(long, default_value_t = 0.0)]
    at: f64,
}

#[derive(Parser, Debug)]
struct PlayoutArgs {
    /// Project RON file.
    project: PathBuf,

    /// Template name.
    #[arg(long)]
    template: String,

    /// Records for a data source, as `source=file.json`. Repeatable.
    #[arg(long = "data", value_parser = parse_data_arg)]
    data: Vec<(String, PathBuf)>,

    /// Take the template off air at this time (ms).
    #[arg(long)]
    out_at: Option<f64>,

    /// Stop after this time (ms).
    #[arg(long, default_value_t = 5_000.0)]
    until: f64,
}

#[derive(Parser, Debug)]
struct EditArgs {
    /// Project RON file.
    project: PathBuf,

    /// Template name.
    #[arg(long)]
    template: String,

    /// RON list of editor commands.
    #[arg(long)]
    script: PathBuf,

    /// Output project path.
    #[arg(long)]
    out: PathBuf,

    /// Editor settings RON file.
    #[arg(long)]
    settings: Option<PathBuf>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
enum PhaseArg {
    In,
    Loop,
    Out,
}

impl From<PhaseArg> for Phase {
    fn from(phase: PhaseArg) -> Self {
        match phase {
            PhaseArg::In => Phase::In,
            PhaseArg::Loop => Phase::Loop,
            PhaseArg::Out => Phase::Out,
        }
    }
}

#[derive(Debug, Error)]
enum CliError {
    #[error("Cannot read {path:?}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Cannot write {path:?}: {source}")]
    Write {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Output error: {0}")]
    Output(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Project load failed: {0}")]
    Load(#[from] ProjectLoadError),

    #[error("Script parse error: {0}")]
    Script(#[from] ron::error::SpannedError),

    #[error("Serialization error: {0}")]
    Serialization(#[from] ron::Error),

    #[error("Settings error: {0}")]
    Settings(#[from] SettingsError),

    #[error("Command failed: {0}")]
    Command(#[from] CommandError),

    #[error("No template named {0:?}")]
    TemplateNotFound(String),

    #[error("{0} problem(s) found")]
    Check(usize),
}

fn parse_data_arg(value: &str) -> Result<(String, PathBuf), String> {
    match value.split_once('=') {
        Some((source, path)) if !source.is_empty() && !path.is_empty() => {
            Ok((source.to_string(), PathBuf::from(path)))
        }
        _ => Err(format!("expected source=file.json, got {value:?}")),
    }
}

fn read(path: &Path) -> Result<String, CliError> {
    std::fs::read_to_string(path).map_err(|source| CliError::Read {
        path: path.to_path_buf(),
        source,
    })
}

fn load_project(path: &Path) -> Result<Project, CliError> {
    Ok(Project::from_ron(&read(path)?)?)
}

fn find_template<'a>(project: &'a Project, name: &str) -> Result<&'a Template, CliError> {
    project
        .find_template_named(name)
        .ok_or_else(|| CliError::TemplateNotFound(name.to_string()))
}

fn init_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("telop=info"));
    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging();

    let result = match cli.cmd {
        Command::Check(args) => cmd_check(args),
        Command::Preview(args) => cmd_preview(args),
        Command::Playout(args) => cmd_playout(args),
        Command::Edit(args) => cmd_edit(args),
    };
    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!("{e}");
            ExitCode::FAILURE
        }
    }
}

fn cmd_check(args: CheckArgs) -> Result<(), CliError> {
    let project = load_project(&args.project)?;
    let mut templates = 0;
    let mut problems = 0;
    for layer in &project.layers {
        for template in &layer.templates {
            templates += 1;
            for (index, animation) in template.animations().iter().enumerate() {
                if let Err(e) = animation.check() {
                    problems += 1;
                    tracing::error!(
                        "{}/{}: {}",
                        layer.name,
                        template.name(),
                        e.within(format!("animations[{index}]"))
                    );
                }
            }
        }
    }
    if problems > 0 {
        return Err(CliError::Check(problems));
    }
    println!(
        "{}: ok ({} layers, {} templates)",
        project.name,
        project.layers.len(),
        templates
    );
    Ok(())
}

fn cmd_preview(args: PreviewArgs) -> Result<(), CliError> {
    let project = load_project(&args.project)?;
    let template = find_template(&project, &args.template)?;
    let frame = evaluate_phase(template, args.phase.into(), args.at, &ContentOverlay::new());
    println!("{}", serde_json::to_string_pretty(&frame)?);
    Ok(())
}

fn cmd_playout(args: PlayoutArgs) -> Result<(), CliError> {
    let project = load_project(&args.project)?;
    let playout = Playout::new(find_template(&project, &args.template)?);

    for (source, path) in &args.data {
        let document = serde_json::from_str(&read(path)?)?;
        let misses = playout.push_records(source, RecordSet::from_json(0.0, document));
        tracing::info!("Loaded {:?} from {:?} ({} misses)", source, path, misses.len());
    }

    playout.activate(&ActivationTarget::Template, 0.0);
    let mut out_sent = false;
    let mut stdout = std::io::stdout().lock();
    for frame in 0_u64.. {
        let now = project.frame_to_time(frame);
        if now > args.until {
            break;
        }
        if let Some(out_at) = args.out_at {
            if !out_sent && now >= out_at {
                playout.deactivate(&ActivationTarget::Template, out_at);
                out_sent = true;
            }
        }
        let tick = playout.tick(now);
        serde_json::to_writer(&mut stdout, &tick)?;
        writeln!(stdout)?;
        if out_sent && playout.is_idle() {
            break;
        }
    }
    Ok(())
}

fn cmd_edit(args: EditArgs) -> Result<(), CliError> {
    let project = load_project(&args.project)?;
    let template = find_template(&project, &args.template)?.id();
    let settings = match &args.settings {
        Some(path) => EditorSettings::load(path)?,
        None => EditorSettings::default(),
    };
    let commands: Vec<EditorCommand> = ron::from_str(&read(&args.script)?)?;

    let mut state = EditorState::new(project, template, settings)?;
    let changed = state.apply_all(&commands)?;
    tracing::info!(
        "Applied {} commands ({} edits, {} undo steps)",
        commands.len(),
        changed,
        state.history.undo_depth()
    );

    let content = state.project.to_ron()?;
    std::fs::write(&args.out, content).map_err(|source| CliError::Write {
        path: args.out.clone(),
        source,
    })?;
    tracing::info!("Saved project to {:?}", args.out);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_data_arg() {
        assert_eq!(
            parse_data_arg("scores=data/scores.json").unwrap(),
            ("scores".to_string(), PathBuf::from("data/scores.json"))
        );
        assert!(parse_data_arg("scores").is_err());
        assert!(parse_data_arg("=file.json").is_err());
    }

    #[test]
    fn test_cli_parses_subcommands() {
        let cli = Cli::try_parse_from([
            "telop", "playout", "show.ron", "--template", "Ticker", "--data", "news=news.json",
            "--out-at", "3000",
        ])
        .unwrap();
        let Command::Playout(args) = cli.cmd else {
            panic!("expected playout");
        };
        assert_eq!(args.data.len(), 1);
        assert_eq!(args.out_at, Some(3000.0));
        assert_eq!(args.until, 5000.0);

        let cli = Cli::try_parse_from([
            "telop", "preview", "show.ron", "--template", "Ticker", "--phase", "loop", "--at", "250",
        ])
        .unwrap();
        let Command::Preview(args) = cli.cmd else {
            panic!("expected preview");
        };
        assert_eq!(Phase::from(args.phase), Phase::Loop);
        assert_eq!(args.at, 250.0);
    }
}
