use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use log::info;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use pipedash::auth::{CredentialStore, Credentials, Token};
use pipedash::config::{Config, OutputFormat};
use pipedash::dashboard::{
    can_retry, Coordinator, DragGesture, PinStore, RefreshOutcome, RefreshSettings,
};
use pipedash::error::PipedashError;
use pipedash::output::{self, LoadProgress};
use pipedash::providers::gitlab::GitLabClient;
use pipedash::providers::{self, ForgeApi};
use pipedash::session;
use pipedash::storage;

#[derive(Parser)]
#[command(name = "pipedash")]
#[command(author, version, about = "CI/CD Pipeline Dashboard", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Configuration file (defaults to ./pipedash.{toml,json,yaml,yml})
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// GitLab instance URL, overrides the config file
    #[arg(short, long, global = true)]
    url: Option<String>,

    /// GitLab API token, overrides stored credentials
    #[arg(short, long, global = true, env = "GITLAB_TOKEN", hide_env_values = true)]
    token: Option<String>,

    /// Output format for `status`
    #[arg(short, long, global = true, value_enum)]
    format: Option<OutputFormat>,

    /// Pretty print JSON output
    #[arg(short, long, global = true, default_value_t = false)]
    pretty: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Store GitLab credentials
    Login {
        #[arg(short = 'n', long)]
        username: String,

        /// Personal access token with `api` scope
        #[arg(short = 'k', long = "access-token")]
        access_token: String,
    },

    /// Remove stored credentials
    Logout,

    /// Fetch pipeline status once and print it
    Status,

    /// Keep the dashboard open and refresh it periodically
    Watch {
        /// Seconds between refreshes, overrides the config file
        #[arg(short, long)]
        interval: Option<u64>,
    },

    /// Pin or unpin a project
    Pin { project_id: u64 },

    /// List pinned projects in display order
    Pins,

    /// Move a pinned project from one position to another
    Reorder { from: usize, to: usize },

    /// Retry the latest pipeline of a project
    Retry { project_id: u64 },

    /// List the jobs of a project's latest pipeline
    Jobs { project_id: u64 },

    /// Export credentials and pins as JSON
    Export {
        /// Output file path (defaults to stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Import credentials and pins from an exported JSON file
    Import { file: PathBuf },
}

impl Cli {
    pub async fn execute(&self) -> Result<()> {
        let config = Config::load(self.config.as_deref())?;
        let data_dir = storage::data_dir(config.storage.data_dir.as_deref())?;

        match &self.command {
            Commands::Login {
                username,
                access_token,
            } => Self::login(&data_dir, username, access_token),
            Commands::Logout => {
                let mut store = CredentialStore::open(&data_dir)?;
                if !store.is_present() {
                    eprintln!("{}", output::dim("Not logged in"));
                    return Ok(());
                }
                store.clear()?;
                eprintln!("{}", output::bright_green("Logged out ✓"));
                Ok(())
            }
            Commands::Status => self.status(&config, &data_dir).await,
            Commands::Watch { interval } => self.watch(&config, &data_dir, *interval).await,
            Commands::Pin { project_id } => {
                let pinned = PinStore::open(&data_dir)?.toggle(*project_id)?;
                let action = if pinned { "Pinned" } else { "Unpinned" };
                eprintln!("{}", output::bright_green(format!("{action} project {project_id} ✓")));
                Ok(())
            }
            Commands::Pins => {
                let pins = PinStore::open(&data_dir)?;
                if pins.is_empty() {
                    eprintln!("{}", output::dim("No pinned projects"));
                }
                info!("{} pinned projects", pins.len());
                for (index, id) in pins.get_all().into_iter().enumerate() {
                    println!("{index}\t{id}");
                }
                Ok(())
            }
            Commands::Reorder { from, to } => {
                let mut pins = PinStore::open(&data_dir)?;
                let mut gesture = DragGesture::begin(*from);
                gesture.hover(*to);
                match gesture.release() {
                    Some((from, to)) => {
                        pins.reorder(from, to)?;
                        info!("Pins reordered: {:?}", pins.get_all());
                    }
                    None => eprintln!("{}", output::dim("Nothing to move")),
                }
                Ok(())
            }
            Commands::Retry { project_id } => self.retry(&config, &data_dir, *project_id).await,
            Commands::Jobs { project_id } => self.jobs(&config, &data_dir, *project_id).await,
            Commands::Export { output } => self.export(&data_dir, output.as_deref()),
            Commands::Import { file } => Self::import(&data_dir, file),
        }
    }

    fn login(data_dir: &Path, username: &str, access_token: &str) -> Result<()> {
        let token = Token::from(access_token);
        if username.trim().is_empty() || token.is_empty() {
            bail!("Username and token must not be empty");
        }

        CredentialStore::open(data_dir)?.save(Credentials {
            username: username.to_owned(),
            token,
        })?;
        eprintln!("{}", output::bright_green(format!("Logged in as {username} ✓")));
        Ok(())
    }

    /// Token precedence: command line / environment, config file, stored credentials.
    fn resolve_token(&self, config: &Config, data_dir: &Path) -> Result<Token> {
        if let Some(token) = self.token.as_deref().or(config.gitlab.token.as_deref()) {
            return Ok(Token::from(token));
        }

        let store = CredentialStore::open(data_dir)?;
        match store.current() {
            Some(credentials) => Ok(credentials.token.clone()),
            None => Err(PipedashError::NotAuthenticated.into()),
        }
    }

    fn client(&self, config: &Config, data_dir: &Path) -> Result<Arc<GitLabClient>> {
        let token = self.resolve_token(config, data_dir)?;
        let base_url = self.url.as_deref().unwrap_or(&config.gitlab.base_url);

        Ok(Arc::new(GitLabClient::new(
            base_url,
            Some(token),
            Duration::from_secs(config.gitlab.timeout_secs),
        )?))
    }

    fn coordinator(
        &self,
        config: &Config,
        data_dir: &Path,
        interval: Option<u64>,
    ) -> Result<Coordinator<GitLabClient>> {
        let client = self.client(config, data_dir)?;
        let settings = RefreshSettings {
            interval: Duration::from_secs(interval.unwrap_or(config.refresh.interval_secs).max(1)),
            batch_size: config.refresh.batch_size,
        };

        Ok(Coordinator::new(client, PinStore::open(data_dir)?, settings))
    }

    /// Runs a single refresh behind a spinner.
    async fn load<A: ForgeApi>(coordinator: &Coordinator<A>) -> Result<()> {
        let progress = LoadProgress::start();
        match coordinator.refresh().await {
            RefreshOutcome::Published { projects } => {
                progress.finish(projects);
                Ok(())
            }
            RefreshOutcome::Failed { message } => {
                progress.fail(&message);
                bail!("Failed to load dashboard: {message}")
            }
            RefreshOutcome::Discarded => {
                progress.fail("refresh cancelled");
                bail!("Refresh was cancelled")
            }
        }
    }

    async fn status(&self, config: &Config, data_dir: &Path) -> Result<()> {
        let coordinator = self.coordinator(config, data_dir, None)?;
        Self::load(&coordinator).await?;

        let view = coordinator.view();
        match self.format.unwrap_or(config.output.format) {
            OutputFormat::Table => output::print_dashboard(&coordinator.state(), &view),
            OutputFormat::Json => {
                let json = if self.pretty || config.output.pretty {
                    serde_json::to_string_pretty(&view)?
                } else {
                    serde_json::to_string(&view)?
                };
                println!("{json}");
            }
        }

        Ok(())
    }

    async fn watch(&self, config: &Config, data_dir: &Path, interval: Option<u64>) -> Result<()> {
        let coordinator = self.coordinator(config, data_dir, interval)?;
        let mut updates = coordinator.subscribe();
        let term = console::Term::stdout();

        coordinator.start();
        info!("Watching pipelines, press Ctrl-C to exit");

        loop {
            tokio::select! {
                changed = updates.changed() => {
                    if changed.is_err() {
                        break;
                    }
                    let state = updates.borrow_and_update().clone();
                    let view = coordinator.view();
                    term.clear_screen()?;
                    output::print_dashboard(&state, &view);
                }
                _ = tokio::signal::ctrl_c() => break,
            }
        }

        coordinator.stop();
        Ok(())
    }

    async fn retry(&self, config: &Config, data_dir: &Path, project_id: u64) -> Result<()> {
        let coordinator = self.coordinator(config, data_dir, None)?;
        Self::load(&coordinator).await?;

        let view = coordinator
            .state()
            .find(project_id)
            .cloned()
            .ok_or(PipedashError::ProjectNotFound(project_id))?;

        let status = view.pipeline.as_ref().map(|p| p.status);
        if status.is_some() && !can_retry(status) {
            bail!(
                "Pipeline of {} is {}, only failed, canceled or skipped pipelines can be retried",
                view.project.path_with_namespace,
                status.map_or("unknown", |s| s.as_str())
            );
        }

        match coordinator.retry(&view).await? {
            Some(pipeline) => eprintln!(
                "{} pipeline #{} is {}\n  {}",
                output::bright_green(format!("Retried {} ✓", view.project.path_with_namespace)),
                pipeline.id,
                output::status_text(pipeline.status),
                output::dim(&pipeline.web_url)
            ),
            None => eprintln!(
                "{}",
                output::dim(format!(
                    "{} has no pipeline to retry",
                    view.project.path_with_namespace
                ))
            ),
        }

        Ok(())
    }

    async fn jobs(&self, config: &Config, data_dir: &Path, project_id: u64) -> Result<()> {
        let client = self.client(config, data_dir)?;
        let Some(pipeline) = client
            .latest_pipeline(project_id)
            .await
            .with_context(|| format!("Failed to fetch latest pipeline of project {project_id}"))?
        else {
            eprintln!("{}", output::dim(format!("Project {project_id} has no pipelines")));
            return Ok(());
        };

        let jobs = providers::jobs_or_empty(client.as_ref(), project_id, pipeline.id).await;

        println!(
            "Pipeline #{} ({}, {})\n{}",
            pipeline.id,
            pipeline.ref_,
            output::status_text(pipeline.status),
            output::render_jobs(&jobs)
        );
        Ok(())
    }

    fn export(&self, data_dir: &Path, output_path: Option<&Path>) -> Result<()> {
        let credentials = CredentialStore::open(data_dir)?;
        let pins = PinStore::open(data_dir)?;
        let document = session::export(credentials.current(), &pins);
        let json = serde_json::to_string_pretty(&document)?;

        if let Some(path) = output_path {
            std::fs::write(path, json)
                .with_context(|| format!("Failed to write session file: {}", path.display()))?;
            info!("Session exported to: {}", path.display());
        } else {
            println!("{json}");
        }

        Ok(())
    }

    fn import(data_dir: &Path, file: &Path) -> Result<()> {
        let content = std::fs::read_to_string(file)
            .with_context(|| format!("Failed to read session file: {}", file.display()))?;
        let imported = session::parse(&content)?;

        let mut credentials = CredentialStore::open(data_dir)?;
        let mut pins = PinStore::open(data_dir)?;
        session::apply(imported, &mut credentials, &mut pins)?;

        eprintln!("{}", output::bright_green("Session imported ✓"));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_reorder() {
        let cli = Cli::try_parse_from(["pipedash", "reorder", "2", "0"]).unwrap();
        assert!(matches!(cli.command, Commands::Reorder { from: 2, to: 0 }));
    }

    #[test]
    fn test_parse_global_format_after_subcommand() {
        let cli = Cli::try_parse_from(["pipedash", "status", "--format", "json", "--pretty"]).unwrap();
        assert_eq!(cli.format, Some(OutputFormat::Json));
        assert!(cli.pretty);
    }

    #[test]
    fn test_resolve_token_prefers_flag_over_store() {
        let temp_dir = tempfile::TempDir::new().unwrap();
        CredentialStore::open(temp_dir.path())
            .unwrap()
            .save(Credentials {
                username: "alice".to_string(),
                token: Token::from("stored"),
            })
            .unwrap();

        let cli = Cli::try_parse_from(["pipedash", "--token", "flag", "status"]).unwrap();
        let token = cli.resolve_token(&Config::default(), temp_dir.path()).unwrap();
        assert_eq!(token.as_str(), "flag");
    }

    #[test]
    fn test_import_then_export_via_files() {
        let temp_dir = tempfile::TempDir::new().unwrap();
        let session_file = temp_dir.path().join("session.json");
        std::fs::write(
            &session_file,
            r#"{"version": "1.0", "credentials": {"username": "bob", "token": "glpat-9"},
                "pinnedRepos": [12, 4]}"#,
        )
        .unwrap();

        Cli::import(temp_dir.path(), &session_file).unwrap();

        let exported = temp_dir.path().join("out.json");
        let cli = Cli::try_parse_from(["pipedash", "export"]).unwrap();
        cli.export(temp_dir.path(), Some(&exported)).unwrap();

        let content = std::fs::read_to_string(&exported).unwrap();
        let session = session::parse(&content).unwrap();
        assert_eq!(session.pinned_repos, Some(vec![12, 4]));
        assert_eq!(session.credentials.unwrap().username, "bob");
    }
}
