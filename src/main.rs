use anyhow::Context;
use blobfs_files::{FileSystemStore, StoreConfig};
use blobfs_types::Identifier;
use clap::{Parser, Subcommand};
use std::fs::File;
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Reads a blob's content from a file, or from standard input when given `-`
const STDIN_MARKER: &str = "-";

#[derive(Parser)]
#[command(name = "blobfs")]
#[command(about = "Filesystem blob store CLI")]
struct Cli {
    /// Store root directory (overrides BLOBFS_ROOT_DIR)
    #[arg(long, global = true)]
    root: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Store a file under a newly generated identifier
    Put {
        /// File to store, or '-' for standard input
        input: String,
    },
    /// Store a file under the given identifier
    PutAs {
        id: Identifier,
        /// File to store, or '-' for standard input
        input: String,
    },
    /// Write a blob's content to standard output
    Get {
        id: Identifier,
        /// Write to this file instead of standard output
        #[arg(long)]
        out: Option<PathBuf>,
    },
    /// Delete a blob
    Delete { id: Identifier },
    /// List all stored identifiers
    List {
        /// Print a JSON array instead of one identifier per line
        #[arg(long)]
        json: bool,
    },
    /// Print the path a blob occupies
    Path {
        id: Identifier,
        /// Fail if no blob is stored under the identifier
        #[arg(long)]
        must_exist: bool,
    },
}

/// Main entry point for the blobfs CLI
///
/// # Environment Variables
/// - `BLOBFS_ROOT_DIR`: Store root directory (default: "blob_data")
/// - `BLOBFS_PATH_MAPPER`: `dash` or `fixed-width` (default: "dash")
/// - `BLOBFS_ID_GENERATOR`: `uuid`, `timestamp` or `sequential` (default: "uuid")
/// - `BLOBFS_UNIX_OWNER`: Owner applied to new blobs with `chown`
/// - `BLOBFS_UNIX_PERMISSIONS`: Mode applied to new blobs with `chmod`
///
/// Logs go to standard error so blob content on standard output stays clean.
fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("blobfs=info".parse()?),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(io::stderr))
        .init();

    let cli = Cli::parse();

    let Some(command) = cli.command else {
        println!("Use 'blobfs --help' for commands");
        return Ok(());
    };

    let mut config = StoreConfig::from_lookup(|key| std::env::var(key).ok())
        .context("Invalid store configuration")?;
    if let Some(root) = cli.root {
        config = config.with_root_directory(root);
    }

    let store = FileSystemStore::from_config(&config).context("Failed to open store")?;
    tracing::debug!("Using store at {}", store.root_directory().display());

    let stdout = io::stdout();
    let mut out = stdout.lock();
    execute(&store, command, &mut out)?;
    out.flush()?;

    Ok(())
}

fn execute(store: &FileSystemStore, command: Commands, out: &mut impl Write) -> anyhow::Result<()> {
    match command {
        Commands::Put { input } => {
            let id = store
                .create(open_input(&input)?)
                .with_context(|| format!("Failed to store {}", input))?;
            tracing::info!("Stored {} as {}", input, id);
            writeln!(out, "{}", id)?;
        }
        Commands::PutAs { id, input } => {
            store
                .create_with_id(open_input(&input)?, &id)
                .with_context(|| format!("Failed to store {} as {}", input, id))?;
            tracing::info!("Stored {} as {}", input, id);
            writeln!(out, "{}", id)?;
        }
        Commands::Get { id, out: None } => {
            let mut blob = store.read(&id)?;
            io::copy(&mut blob, out)?;
        }
        Commands::Get {
            id,
            out: Some(path),
        } => {
            let mut blob = store.read(&id)?;
            let mut file = File::create(&path)
                .with_context(|| format!("Failed to create {}", path.display()))?;
            io::copy(&mut blob, &mut file)?;
        }
        Commands::Delete { id } => {
            store.delete(&id)?;
            tracing::info!("Deleted {}", id);
        }
        Commands::List { json } => {
            let mut ids: Vec<Identifier> = store.list()?.into_iter().collect();
            ids.sort();
            if json {
                writeln!(out, "{}", serde_json::to_string(&ids)?)?;
            } else {
                for id in ids {
                    writeln!(out, "{}", id)?;
                }
            }
        }
        Commands::Path { id, must_exist } => {
            let path = if must_exist {
                store.existing_path(&id)?
            } else {
                store.resolve_path(&id)?
            };
            writeln!(out, "{}", path.display())?;
        }
    }

    Ok(())
}

fn open_input(input: &str) -> anyhow::Result<Box<dyn Read>> {
    if input == STDIN_MARKER {
        return Ok(Box::new(io::stdin().lock()));
    }
    let file = File::open(Path::new(input)).with_context(|| format!("Failed to open {}", input))?;
    Ok(Box::new(file))
}

#[cfg(test)]
mod tests {
    use super::*;
    use blobfs_files::StoreError;
    use tempfile::TempDir;

    fn test_store() -> (TempDir, FileSystemStore) {
        let temp = TempDir::new().unwrap();
        let store = FileSystemStore::new(&temp.path().join("store")).unwrap();
        (temp, store)
    }

    fn run(store: &FileSystemStore, args: &[&str]) -> anyhow::Result<String> {
        let cli = Cli::try_parse_from(std::iter::once("blobfs").chain(args.iter().copied()))?;
        let mut out = Vec::new();
        execute(store, cli.command.unwrap(), &mut out)?;
        Ok(String::from_utf8(out).unwrap())
    }

    #[test]
    fn test_put_get_delete() {
        let (temp, store) = test_store();
        let input = temp.path().join("input.txt");
        std::fs::write(&input, "hello").unwrap();

        let id = run(&store, &["put", input.to_str().unwrap()]).unwrap();
        let id = id.trim();
        assert_eq!(id.len(), 36);

        assert_eq!(run(&store, &["get", id]).unwrap(), "hello");
        assert_eq!(run(&store, &["list"]).unwrap(), format!("{}\n", id));

        run(&store, &["delete", id]).unwrap();
        assert_eq!(run(&store, &["list"]).unwrap(), "");
    }

    #[test]
    fn test_put_as_and_get_to_file() {
        let (temp, store) = test_store();
        let input = temp.path().join("input.bin");
        std::fs::write(&input, [0u8, 1, 2, 255]).unwrap();
        let output = temp.path().join("output.bin");

        run(&store, &["put-as", "ab-cd", input.to_str().unwrap()]).unwrap();
        run(&store, &["get", "ab-cd", "--out", output.to_str().unwrap()]).unwrap();

        assert_eq!(std::fs::read(&output).unwrap(), vec![0u8, 1, 2, 255]);
    }

    #[test]
    fn test_put_as_duplicate_fails() {
        let (temp, store) = test_store();
        let input = temp.path().join("input.txt");
        std::fs::write(&input, "x").unwrap();

        run(&store, &["put-as", "ab-cd", input.to_str().unwrap()]).unwrap();
        let err = run(&store, &["put-as", "ab-cd", input.to_str().unwrap()]).unwrap_err();

        assert!(matches!(
            err.downcast_ref::<StoreError>(),
            Some(StoreError::AlreadyExists(_))
        ));
    }

    #[test]
    fn test_list_json_is_sorted() {
        let (temp, store) = test_store();
        let input = temp.path().join("input.txt");
        std::fs::write(&input, "x").unwrap();
        for id in ["zz-1", "aa-2", "mm-3"] {
            run(&store, &["put-as", id, input.to_str().unwrap()]).unwrap();
        }

        let output = run(&store, &["list", "--json"]).unwrap();

        let ids: Vec<String> = serde_json::from_str(output.trim()).unwrap();
        assert_eq!(ids, vec!["aa-2", "mm-3", "zz-1"]);
    }

    #[test]
    fn test_path_with_and_without_existence() {
        let (_temp, store) = test_store();

        let path = run(&store, &["path", "ab-cd"]).unwrap();
        assert_eq!(
            PathBuf::from(path.trim()),
            store.root_directory().join("ab").join("cd")
        );

        let err = run(&store, &["path", "ab-cd", "--must-exist"]).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<StoreError>(),
            Some(StoreError::NotFound(_))
        ));
    }

    #[test]
    fn test_invalid_identifier_rejected_by_parser() {
        let (_temp, store) = test_store();
        assert!(run(&store, &["get", "a/b"]).is_err());
    }

    #[test]
    fn test_missing_input_file() {
        let (temp, store) = test_store();
        let missing = temp.path().join("missing.txt");

        let err = run(&store, &["put", missing.to_str().unwrap()]).unwrap_err();

        assert!(err.to_string().contains("Failed to open"));
    }
}
