mod commands;
mod context;
mod progress;

use std::path::PathBuf;

use anyhow::Result;
use clap::{Args, Parser, Subcommand};
use photoseries_core::ActionError;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use uuid::Uuid;

#[derive(Parser)]
#[command(name = "photoseries")]
#[command(about = "Publish and maintain photo series in an R2/S3 bucket", long_about = None)]
struct Cli {
    #[command(flatten)]
    store: StoreArgs,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Args)]
pub struct StoreArgs {
    /// JSON file with R2 credentials (accountId, accessKeyId, secretAccessKey)
    #[arg(long, global = true, env = "PHOTO_SECRETS_PATH")]
    pub secrets: Option<PathBuf>,

    /// Bucket name, overrides bucketName from the secrets file
    #[arg(short, long, global = true, env = "PHOTO_BUCKET")]
    pub bucket: Option<String>,

    /// Object key of the manifest document [default: manifest.json]
    #[arg(long, global = true, env = "PHOTO_MANIFEST_KEY")]
    pub manifest_key: Option<String>,

    /// Endpoint used when the secrets file names none, e.g. a local MinIO
    #[arg(long, global = true, env = "AWS_ENDPOINT_URL")]
    pub endpoint_url: Option<String>,

    /// Image file extensions to publish
    #[arg(
        long,
        global = true,
        env = "PHOTO_EXTENSIONS",
        value_delimiter = ',',
        default_value = "png"
    )]
    pub extension: Vec<String>,

    /// Log debug output
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Publish each directory as a new series at the top of the gallery
    Add {
        /// Series directories, each holding title.txt and row images
        #[arg(required = true, value_parser = existing_dir)]
        dirs: Vec<PathBuf>,

        /// Series uuid to use instead of a fresh one (single directory only)
        #[arg(long)]
        uuid: Option<Uuid>,
    },

    /// Publish each directory as a new series right after the series named next to it
    AddAfter {
        /// Pairs of a series directory and the series it is displayed after
        #[arg(required = true, num_args = 2.., value_name = "DIR AFTER")]
        pairs: Vec<String>,

        /// Series uuid to use instead of a fresh one (single pair only)
        #[arg(long)]
        uuid: Option<Uuid>,
    },

    /// Replace the images of series, keeping their uuids and positions
    Update {
        /// Pairs of a series directory and the series it replaces
        #[arg(required = true, num_args = 2.., value_name = "DIR SERIES")]
        pairs: Vec<String>,
    },

    /// Remove series from the gallery and delete their objects
    Delete {
        #[arg(required = true)]
        series: Vec<Uuid>,
    },

    /// Remove every series and leave an empty manifest
    DeleteAll {
        /// Confirm deleting everything
        #[arg(long)]
        yes: bool,
    },

    /// Show the published series in display order
    List,

    /// Compare the manifest with the bucket contents
    Check {
        /// Delete series objects the manifest does not reference
        #[arg(long)]
        purge: bool,
    },
}

/// Split `DIR UUID DIR UUID ...` into checked pairs.
fn dir_uuid_pairs(values: &[String]) -> Result<Vec<(PathBuf, Uuid)>> {
    if values.len() % 2 != 0 {
        anyhow::bail!("Expected DIR UUID pairs, got {} values", values.len());
    }
    values
        .chunks(2)
        .map(|pair| {
            let dir = existing_dir(&pair[0]).map_err(anyhow::Error::msg)?;
            let uuid = Uuid::parse_str(&pair[1])
                .map_err(|err| anyhow::anyhow!("{} is not a series uuid: {err}", pair[1]))?;
            Ok((dir, uuid))
        })
        .collect()
}

fn existing_dir(value: &str) -> Result<PathBuf, String> {
    let path = PathBuf::from(value);
    if path.is_dir() {
        Ok(path)
    } else {
        Err(format!("{value} is not a directory"))
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let default_filter = if cli.store.verbose {
        "photoseries_cli=debug,photoseries_core=debug"
    } else {
        "photoseries_cli=info,photoseries_core=info"
    };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_filter.into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let result = run(cli).await;
    if let Err(err) = &result {
        explain_failure(err);
    }
    result
}

async fn run(cli: Cli) -> Result<()> {
    // Malformed pairs fail before any connection is made
    let pairs = match &cli.command {
        Commands::AddAfter { pairs, .. } | Commands::Update { pairs } => dir_uuid_pairs(pairs)?,
        _ => Vec::new(),
    };
    let actions = context::connect(&cli.store).await?;

    match cli.command {
        Commands::Add { dirs, uuid } => commands::add::execute(&actions, dirs, uuid).await,
        Commands::AddAfter { uuid, .. } => {
            commands::add::execute_after(&actions, pairs, uuid).await
        }
        Commands::Update { .. } => commands::update::execute(&actions, pairs).await,
        Commands::Delete { series } => commands::delete::execute(&actions, series).await,
        Commands::DeleteAll { yes } => commands::delete::execute_all(&actions, yes).await,
        Commands::List => commands::list::execute(&actions).await,
        Commands::Check { purge } => commands::check::execute(&actions, purge).await,
    }
}

fn explain_failure(err: &anyhow::Error) {
    let Some(action_err) = err.downcast_ref::<ActionError>() else {
        return;
    };
    if action_err.is_out_of_sync() {
        eprintln!();
        eprintln!("!!! {action_err}");
        eprintln!(
            "!!! The gallery and the bucket disagree; fix this before running other commands."
        );
        eprintln!();
    } else if action_err.is_retryable() {
        eprintln!("Another command changed the gallery at the same time; run the command again.");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_is_well_formed() {
        Cli::command().debug_assert();
    }

    #[test]
    fn parses_add_after() {
        let dir = tempfile::TempDir::new().unwrap();
        let dir_arg = dir.path().to_str().unwrap();
        let after = "bbfb361e-88f8-4e1c-bf0a-8d813323eb52";

        let cli = Cli::try_parse_from([
            "photoseries",
            "add-after",
            dir_arg,
            after,
            "--bucket",
            "photos",
        ])
        .unwrap();
        assert_eq!(cli.store.bucket.as_deref(), Some("photos"));
        match cli.command {
            Commands::AddAfter { pairs, uuid } => {
                let pairs = dir_uuid_pairs(&pairs).unwrap();
                assert_eq!(pairs.len(), 1);
                assert_eq!(pairs[0].0, dir.path());
                assert_eq!(pairs[0].1.to_string(), after);
                assert!(uuid.is_none());
            }
            _ => panic!("expected add-after"),
        }
    }

    #[test]
    fn update_takes_repeated_pairs() {
        let first = tempfile::TempDir::new().unwrap();
        let second = tempfile::TempDir::new().unwrap();
        let first_uuid = "bbfb361e-88f8-4e1c-bf0a-8d813323eb52";
        let second_uuid = "0e7f1d52-55a4-4a0c-9d4c-3f2b58d1a7e1";

        let cli = Cli::try_parse_from([
            "photoseries",
            "update",
            first.path().to_str().unwrap(),
            first_uuid,
            second.path().to_str().unwrap(),
            second_uuid,
        ])
        .unwrap();
        let Commands::Update { pairs } = cli.command else {
            panic!("expected update");
        };

        let pairs = dir_uuid_pairs(&pairs).unwrap();
        assert_eq!(pairs.len(), 2);
        assert_eq!(pairs[0].0, first.path());
        assert_eq!(pairs[0].1.to_string(), first_uuid);
        assert_eq!(pairs[1].0, second.path());
        assert_eq!(pairs[1].1.to_string(), second_uuid);
    }

    #[test]
    fn malformed_pairs_are_rejected() {
        let dir = tempfile::TempDir::new().unwrap();
        let dir_arg = dir.path().to_string_lossy().into_owned();
        let uuid = "bbfb361e-88f8-4e1c-bf0a-8d813323eb52".to_string();

        // Odd count
        let odd = [dir_arg.clone(), uuid.clone(), dir_arg.clone()];
        assert!(dir_uuid_pairs(&odd).is_err());
        // Swapped order
        assert!(dir_uuid_pairs(&[uuid.clone(), dir_arg.clone()]).is_err());
        // Missing directory
        assert!(dir_uuid_pairs(&["/definitely/not/here".to_string(), uuid]).is_err());
        // A lone value never reaches the pair check
        assert!(Cli::try_parse_from(["photoseries", "update", dir_arg.as_str()]).is_err());
    }

    #[test]
    fn rejects_missing_directory_and_bad_uuid() {
        assert!(Cli::try_parse_from(["photoseries", "add", "/definitely/not/here"]).is_err());
        assert!(Cli::try_parse_from(["photoseries", "delete", "not-a-uuid"]).is_err());
    }

    #[test]
    fn extensions_split_on_commas() {
        let cli = Cli::try_parse_from(["photoseries", "list", "--extension", "png,JPG"]).unwrap();
        assert_eq!(cli.store.extension, ["png", "JPG"]);
    }
}
