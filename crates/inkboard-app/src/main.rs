//! Command-line entry point.

use clap::Parser;
use inkboard_app::replay::{Replay, parse_script};
use inkboard_app::AppError;
use inkboard_core::{EditorConfig, FileStore, MemoryStore, ProjectContent, ProjectStore};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;

/// Replay a scripted editing session and print the resulting project.
#[derive(Debug, Parser)]
#[command(name = "inkboard", version, about)]
struct Cli {
    /// JSON array of actions to replay.
    script: PathBuf,

    /// Editor config (JSON). Defaults are used for missing fields.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Project id the session runs against.
    #[arg(long, default_value = "default")]
    project: String,

    /// Persist snapshots to this directory instead of memory.
    #[arg(long)]
    store: Option<PathBuf>,
}

fn read(path: &Path) -> Result<String, AppError> {
    std::fs::read_to_string(path).map_err(|source| AppError::Io {
        path: path.display().to_string(),
        source,
    })
}

async fn replay<S: ProjectStore>(
    store: S,
    config: EditorConfig,
    cli: &Cli,
    script: &str,
) -> Result<ProjectContent, AppError> {
    let actions = parse_script(script)?;
    log::info!("Replaying {} actions on project {}", actions.len(), cli.project);
    let mut replay = Replay::new(Arc::new(store), config, cli.project.clone());
    replay.run(&actions).await
}

fn run(cli: &Cli) -> Result<String, AppError> {
    let config = match &cli.config {
        Some(path) => EditorConfig::load(path)?,
        None => EditorConfig::default(),
    };
    let script = read(&cli.script)?;
    let content = match &cli.store {
        Some(dir) => pollster::block_on(replay(FileStore::new(dir)?, config, cli, &script))?,
        None => pollster::block_on(replay(MemoryStore::new(), config, cli, &script))?,
    };
    Ok(content.to_json()?)
}

fn main() -> ExitCode {
    env_logger::init();
    log::info!("Starting Inkboard replay");

    let cli = Cli::parse();
    match run(&cli) {
        Ok(json) => {
            println!("{json}");
            ExitCode::SUCCESS
        }
        Err(e) => {
            log::error!("{e}");
            eprintln!("inkboard: {e}");
            ExitCode::FAILURE
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn cli(script: PathBuf) -> Cli {
        Cli {
            script,
            config: None,
            project: "default".into(),
            store: None,
        }
    }

    #[test]
    fn test_cli_parses_flags() {
        let cli = Cli::try_parse_from([
            "inkboard",
            "--config",
            "cfg.json",
            "--store",
            "projects",
            "script.json",
        ])
        .unwrap();
        assert_eq!(cli.script, PathBuf::from("script.json"));
        assert_eq!(cli.config, Some(PathBuf::from("cfg.json")));
        assert_eq!(cli.project, "default");
        assert_eq!(cli.store, Some(PathBuf::from("projects")));
    }

    #[test]
    fn test_run_prints_project_content() {
        let mut script = tempfile::NamedTempFile::new().unwrap();
        write!(
            script,
            r#"[
                {{"action": "mode", "mode": "rect"}},
                {{"action": "down", "position": {{"x": 0, "y": 0}}}},
                {{"action": "move", "position": {{"x": 50, "y": 30}}}},
                {{"action": "up", "position": {{"x": 50, "y": 30}}}}
            ]"#
        )
        .unwrap();
        let json = run(&cli(script.path().to_path_buf())).unwrap();
        let content = ProjectContent::from_json(&json).unwrap();
        assert!(content.scene_json.is_some());
    }

    #[test]
    fn test_file_store_persists_commits() {
        let dir = tempfile::tempdir().unwrap();
        let mut script = tempfile::NamedTempFile::new().unwrap();
        write!(
            script,
            r#"[
                {{"action": "mode", "mode": "line"}},
                {{"action": "down", "position": {{"x": 0, "y": 0}}}},
                {{"action": "move", "position": {{"x": 80, "y": 0}}}},
                {{"action": "up", "position": {{"x": 80, "y": 0}}}}
            ]"#
        )
        .unwrap();
        let mut cli = cli(script.path().to_path_buf());
        cli.store = Some(dir.path().to_path_buf());
        run(&cli).unwrap();
        assert!(dir.path().join("default.json").exists());
    }

    #[test]
    fn test_bad_config_and_missing_script() {
        let mut config = tempfile::NamedTempFile::new().unwrap();
        write!(config, "{{\"drag_threshold\": \"far\"}}").unwrap();
        let mut bad = cli(PathBuf::from("/nonexistent/script.json"));
        assert!(matches!(run(&bad), Err(AppError::Io { .. })));

        bad.config = Some(config.path().to_path_buf());
        assert!(matches!(run(&bad), Err(AppError::Config(_))));
    }
}
