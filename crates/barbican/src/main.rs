use std::time::Duration;

use anyhow::{Context, Result};
use barbican_client::{parse_timestamp, Client, HttpTransportConfig, OutputFormat};
use chrono::{DateTime, Utc};
use clap::{Args, Parser, Subcommand};
use tracing_subscriber::EnvFilter;

mod cas;
mod config;
mod containers;
mod orders;
mod output;
mod secrets;

use cas::CaCommand;
use config::BarbicanConfig;
use containers::ContainerCommand;
use orders::OrderCommand;
use secrets::SecretCommand;

/// Barbican - command-line client for the Barbican secret management service
#[derive(Parser, Debug)]
#[command(name = "barbican")]
#[command(about = "Store and retrieve secrets, orders, containers and CAs in Barbican")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Barbican endpoint (e.g., http://localhost:9311)
    #[arg(long, env = "BARBICAN_ENDPOINT", global = true)]
    endpoint: Option<String>,

    /// Project the requests are scoped to
    #[arg(long, env = "OS_PROJECT_ID", global = true)]
    project_id: Option<String>,

    /// Pre-issued auth token
    #[arg(long, env = "OS_AUTH_TOKEN", global = true, hide_env_values = true)]
    auth_token: Option<String>,

    /// API version (default: v1)
    #[arg(long, global = true)]
    api_version: Option<String>,

    /// Config file (default: ~/.config/barbican/config.toml)
    #[arg(long, global = true)]
    config: Option<String>,

    /// Output format: table, json or value
    #[arg(short, long, global = true, default_value = "table")]
    format: OutputFormat,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Manage secrets
    Secret {
        #[command(subcommand)]
        command: SecretCommand,
    },

    /// Manage orders
    Order {
        #[command(subcommand)]
        command: OrderCommand,
    },

    /// Manage containers
    Container {
        #[command(subcommand)]
        command: ContainerCommand,
    },

    /// Inspect certificate authorities
    Ca {
        #[command(subcommand)]
        command: CaCommand,
    },
}

/// Paging options shared by every `list` command
#[derive(Args, Debug, Clone, Copy)]
pub struct ListArgs {
    /// Number of items per page (maximum: 100)
    #[arg(short, long, default_value_t = barbican_client::DEFAULT_LIMIT)]
    pub limit: u32,

    /// Page offset
    #[arg(short, long, default_value_t = 0)]
    pub offset: u32,
}

/// Resolved configuration from CLI args, environment and config file
#[derive(Debug)]
struct ResolvedConfig {
    endpoint: String,
    project_id: Option<String>,
    auth_token: Option<String>,
    api_version: Option<String>,
    timeout: Option<Duration>,
}

impl ResolvedConfig {
    /// Resolve configuration; flags and environment win over the config file
    fn resolve(cli: &Cli) -> Result<Self> {
        let config_file = match &cli.config {
            Some(path) => BarbicanConfig::load_from(path)?,
            None => BarbicanConfig::load_default()?,
        };
        config_file
            .validate()
            .map_err(|errors| anyhow::anyhow!("Invalid configuration: {}", errors.join("; ")))?;

        let endpoint = cli
            .endpoint
            .clone()
            .or(config_file.endpoint)
            .context("Endpoint required. Use --endpoint, set BARBICAN_ENDPOINT or add it to the config file")?;

        Ok(Self {
            endpoint,
            project_id: cli.project_id.clone().or(config_file.project_id),
            auth_token: cli.auth_token.clone().or(config_file.auth_token),
            api_version: cli.api_version.clone().or(config_file.api_version),
            timeout: config_file.timeout_secs.map(Duration::from_secs),
        })
    }

    fn transport_config(&self) -> HttpTransportConfig {
        let mut config = HttpTransportConfig::new(&self.endpoint);
        if let Some(project_id) = &self.project_id {
            config = config.with_project_id(project_id);
        }
        if let Some(token) = &self.auth_token {
            config = config.with_auth_token(token);
        }
        if let Some(version) = &self.api_version {
            config = config.with_api_version(version);
        }
        if let Some(timeout) = self.timeout {
            config = config.with_timeout(timeout);
        }
        config
    }
}

/// Parse an ISO 8601 expiration date
pub(crate) fn parse_expiration(value: &str) -> Result<DateTime<Utc>, String> {
    parse_timestamp(value).ok_or_else(|| format!("invalid ISO 8601 date: {value}"))
}

/// Read a user-supplied file, expanding `~`
pub(crate) fn read_file(path: &str) -> Result<Vec<u8>> {
    let expanded = shellexpand::tilde(path);
    std::fs::read(expanded.as_ref()).map_err(|e| anyhow::anyhow!("Failed to read {}: {}", path, e))
}

fn init_logging(verbose: bool) -> Result<()> {
    let filter = if verbose {
        EnvFilter::new("barbican=debug,barbican_client=debug")
    } else {
        EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new("barbican=warn,barbican_client=warn"))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init()
        .map_err(|e| anyhow::anyhow!("Failed to initialize logging: {}", e))
}

async fn run(cli: Cli) -> Result<()> {
    let config = ResolvedConfig::resolve(&cli)?;
    tracing::debug!(endpoint = %config.endpoint, api_version = ?config.api_version, "resolved configuration");

    let client = Client::new(config.transport_config())?;
    let format = cli.format;

    let output = execute(&client, cli.command, format).await?;
    output.print(format)?;
    Ok(())
}

async fn execute(client: &Client, command: Commands, format: OutputFormat) -> Result<output::Output> {
    match command {
        Commands::Secret { command } => command.run(client, format).await,
        Commands::Order { command } => command.run(client, format).await,
        Commands::Container { command } => command.run(client, format).await,
        Commands::Ca { command } => command.run(client, format).await,
    }
}

/// `<ErrorKind>: <message>` for library errors, the full chain otherwise
fn describe(err: &anyhow::Error) -> String {
    match err.downcast_ref::<barbican_client::Error>() {
        Some(e) => format!("{}: {}", e.kind(), e),
        None => format!("Error: {:#}", err),
    }
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    if let Err(e) = init_logging(cli.verbose) {
        eprintln!("{}", e);
    }

    if let Err(e) = run(cli).await {
        eprintln!("{}", describe(&e));
        std::process::exit(1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use barbican_functional::MockBarbican;

    fn parse(args: &[&str]) -> Cli {
        Cli::try_parse_from(args).unwrap()
    }

    fn config_file(contents: &str) -> (tempfile::TempDir, String) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, contents).unwrap();
        let path = path.to_str().unwrap().to_string();
        (dir, path)
    }

    #[test]
    fn test_flags_override_config_file() {
        let (_dir, path) = config_file(
            "endpoint = \"http://file:9311\"\nproject_id = \"file-project\"\ntimeout_secs = 5\n",
        );
        let cli = parse(&[
            "barbican",
            "--config",
            &path,
            "--endpoint",
            "http://flag:9311",
            "secret",
            "list",
        ]);

        let config = ResolvedConfig::resolve(&cli).unwrap();
        assert_eq!(config.endpoint, "http://flag:9311");
        assert_eq!(config.project_id.as_deref(), Some("file-project"));
        assert_eq!(config.timeout, Some(Duration::from_secs(5)));
    }

    #[test]
    fn test_invalid_config_file_is_rejected() {
        let (_dir, path) = config_file("endpoint = \"localhost\"\n");
        let cli = parse(&["barbican", "--config", &path, "ca", "list"]);

        let err = ResolvedConfig::resolve(&cli).unwrap_err();
        assert!(err.to_string().contains("Invalid configuration"));
    }

    #[test]
    fn test_global_options_after_subcommand() {
        let cli = parse(&[
            "barbican",
            "order",
            "list",
            "--limit",
            "5",
            "-f",
            "json",
            "--endpoint",
            "http://localhost:9311",
        ]);
        assert_eq!(cli.format, OutputFormat::Json);
        assert_eq!(cli.endpoint.as_deref(), Some("http://localhost:9311"));
        match cli.command {
            Commands::Order {
                command: OrderCommand::List { page },
            } => {
                assert_eq!(page.limit, 5);
                assert_eq!(page.offset, 0);
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn test_unknown_order_type_is_a_usage_error() {
        let result = Cli::try_parse_from(["barbican", "order", "create", "--type", "symmetric"]);
        assert!(result.is_err());
    }

    #[test]
    fn test_expiration_parsing() {
        assert!(parse_expiration("2030-01-01T00:00:00Z").is_ok());
        assert!(parse_expiration("2030-01-01T00:00:00.000000").is_ok());
        assert!(parse_expiration("next tuesday").is_err());
    }

    #[test]
    fn test_describe_uses_error_kind() {
        let err = anyhow::Error::new(barbican_client::Error::from_status(
            404,
            "http://localhost:9311/v1/secrets/x",
            "Not Found",
        ));
        assert!(describe(&err).starts_with("NotFoundError: "));

        let err = anyhow::anyhow!("Endpoint required");
        assert_eq!(describe(&err), "Error: Endpoint required");
    }

    async fn exec(client: &Client, args: &[&str]) -> Result<output::Output> {
        let mut argv = vec!["barbican"];
        argv.extend_from_slice(args);
        let cli = parse(&argv);
        execute(client, cli.command, cli.format).await
    }

    #[tokio::test]
    async fn test_secret_commands_against_mock_service() {
        let mock = MockBarbican::new();
        let client = mock.client();

        let stored = exec(
            &client,
            &["secret", "store", "-n", "cli-secret", "-p", "hunter2", "-f", "json"],
        )
        .await
        .unwrap();
        let body: serde_json::Value = serde_json::from_str(&stored.body).unwrap();
        let secret_ref = body["Secret href"].as_str().unwrap().to_string();
        assert_eq!(body["Name"], "cli-secret");
        assert_eq!(mock.secret_count(), 1);

        let payload = exec(&client, &["secret", "get", "--payload", &secret_ref, "-f", "value"])
            .await
            .unwrap();
        assert_eq!(payload.body, "hunter2");

        let listed = exec(&client, &["secret", "list", "-l", "1", "-n", "cli-secret"])
            .await
            .unwrap();
        assert!(listed.body.contains(&secret_ref));
        assert!(listed.cursors.is_empty());

        let deleted = exec(&client, &["secret", "delete", &secret_ref]).await.unwrap();
        assert_eq!(deleted, output::Output::default());
        assert_eq!(mock.secret_count(), 0);

        let err = exec(&client, &["secret", "delete", &secret_ref]).await.unwrap_err();
        assert!(describe(&err).starts_with("NotFoundError: "));
    }

    #[tokio::test]
    async fn test_list_output_carries_cursors() {
        let mock = MockBarbican::new();
        let client = mock.client();
        for name in ["one", "two", "three"] {
            exec(&client, &["secret", "store", "-n", name, "-p", "x"])
                .await
                .unwrap();
        }

        let listed = exec(&client, &["secret", "list", "-l", "2", "-o", "1"])
            .await
            .unwrap();
        assert_eq!(listed.cursors.len(), 1);
        assert!(listed.cursors[0].starts_with("Previous: "));
    }

    #[tokio::test]
    async fn test_container_from_generated_key_pair() {
        let mock = MockBarbican::new();
        let client = mock.client();

        exec(&client, &["order", "create", "--type", "asymmetric", "-n", "pair"])
            .await
            .unwrap();
        let mut orders = client.orders.list(10, 0).await.unwrap();
        let container_ref = orders.items[0].result_ref().await.unwrap().unwrap();
        let container = client.containers.get(&container_ref).await.unwrap();
        let public_ref = container.public_key().and_then(|s| s.secret_ref()).unwrap().to_string();

        let secret_arg = format!("key={public_ref}");
        let created = exec(
            &client,
            &["container", "create", "-n", "bundle", "-s", &secret_arg, "-f", "json"],
        )
        .await
        .unwrap();
        let body: serde_json::Value = serde_json::from_str(&created.body).unwrap();
        assert_eq!(body["Name"], "bundle");
        assert_eq!(mock.container_count(), 2);
    }
}
