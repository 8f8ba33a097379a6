//! # Material Library CLI (`matlib`)
//!
//! ## Usage
//!
//! ```bash
//! matlib --config ./config/matlib.toml --api-key "$DEEPSEEK_API_KEY" <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `matlib whoami` | Print the user fingerprint and library file |
//! | `matlib topics` | List the bookshelf vocabulary |
//! | `matlib analyze` | Draft an analysis for pasted material |
//! | `matlib save` | Append an (edited) analysis to the library |
//! | `matlib list` | Show records, newest first |
//! | `matlib delete <position>` | Delete the record at a stored position |
//! | `matlib export` | Write the library as CSV |
//! | `matlib serve` | Start the JSON HTTP API |
//!
//! ## Examples
//!
//! ```bash
//! matlib analyze --title "Material A" --topic 必修1 --topic 必修2 \
//!     --source-file article.txt --output draft.html
//! matlib save --title "Material A" --topic 必修1 --topic 必修2 \
//!     --source-file article.txt --analysis-file draft.html
//! matlib list --search 供给侧
//! matlib delete 0
//! ```

use anyhow::{bail, Context, Result};
use chrono::Local;
use clap::{Parser, Subcommand};
use material_library::analysis::AnalysisRequest;
use material_library::backend::Backend;
use material_library::config::{self, Config};
use material_library::export;
use material_library::server;
use material_library::session::{Credential, Session};
use material_library_core::models::{LibraryRecord, TOPIC_DELIMITER};
use material_library_core::user::UserId;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// LLM-assisted analysis of teaching material, kept in a personal CSV library.
#[derive(Parser)]
#[command(
    name = "matlib",
    about = "Material Library: LLM-assisted analysis of teaching material, kept in a personal CSV library",
    version
)]
struct Cli {
    /// Path to configuration file (TOML). Defaults apply when it is absent.
    #[arg(long, global = true, default_value = "./config/matlib.toml")]
    config: PathBuf,

    /// LLM API key. Also identifies the library.
    #[arg(long, global = true, env = "DEEPSEEK_API_KEY", hide_env_values = true)]
    api_key: Option<String>,

    /// Open the library of an existing fingerprint instead of deriving one.
    #[arg(long, global = true)]
    user: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the user fingerprint and library file name.
    Whoami,

    /// List reference-document names usable as topics.
    Topics,

    /// Ask the model for an analysis draft. Nothing is stored.
    Analyze {
        #[arg(long, default_value = "")]
        title: String,

        /// Topic label; repeat for several.
        #[arg(long = "topic", required = true)]
        topics: Vec<String>,

        /// Source text inline.
        #[arg(long, conflicts_with = "source_file")]
        source: Option<String>,

        /// File holding the source text (`-` for stdin).
        #[arg(long)]
        source_file: Option<PathBuf>,

        /// Write the draft here instead of stdout.
        #[arg(long)]
        output: Option<PathBuf>,
    },

    /// Append a record to the library.
    Save {
        #[arg(long, default_value = "")]
        title: String,

        /// Topic label; repeat for several.
        #[arg(long = "topic", required = true)]
        topics: Vec<String>,

        #[arg(long, conflicts_with = "source_file")]
        source: Option<String>,

        #[arg(long)]
        source_file: Option<PathBuf>,

        /// Analysis text inline.
        #[arg(long, conflicts_with = "analysis_file")]
        analysis: Option<String>,

        /// File holding the edited analysis (`-` for stdin).
        #[arg(long)]
        analysis_file: Option<PathBuf>,
    },

    /// Show records, newest first.
    List {
        /// Only rows where some field contains this text.
        #[arg(long)]
        search: Option<String>,

        /// Show only date, title and topics.
        #[arg(long)]
        brief: bool,
    },

    /// Delete the record at a stored position (as shown by `list`).
    ///
    /// Positions shift after every delete; run `list` again before
    /// deleting another record.
    Delete { position: usize },

    /// Write the library as CSV (same format as the store).
    Export {
        #[arg(long)]
        output: Option<PathBuf>,
    },

    /// Start the JSON HTTP API.
    Serve,
}

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let Cli {
        config: config_path,
        api_key,
        user,
        command,
    } = Cli::parse();

    let cfg = if config_path.exists() {
        config::load_config(&config_path)?
    } else {
        log::info!("config {} not found, using defaults", config_path.display());
        Config::minimal()
    };

    let backend = Arc::new(Backend::from_config(&cfg)?);
    let store = backend.store.as_ref();
    let session = || open_session(api_key.as_deref(), user.as_deref());

    match command {
        Commands::Whoami => {
            let session = session()?;
            println!("fingerprint: {}", session.user());
            println!("library:     {} ({})", session.file_name(), store.backend());
        }
        Commands::Topics => {
            for topic in backend.bookshelf.list_topics().await {
                println!("{}", topic);
            }
        }
        Commands::Analyze {
            title,
            topics,
            source,
            source_file,
            output,
        } => {
            let session = session()?;
            let request = AnalysisRequest {
                title,
                source_text: read_text(source, source_file.as_deref(), "source")?,
                topics,
            };
            let draft = session.analyze(&cfg.llm, &request).await?;
            match output {
                Some(path) => {
                    std::fs::write(&path, &draft)
                        .with_context(|| format!("Failed to write {}", path.display()))?;
                    eprintln!("Draft written to {}", path.display());
                }
                None => println!("{}", draft),
            }
        }
        Commands::Save {
            title,
            topics,
            source,
            source_file,
            analysis,
            analysis_file,
        } => {
            let mut session = session()?;
            let source_text = read_text(source, source_file.as_deref(), "source")?;
            let analysis = read_text(analysis, analysis_file.as_deref(), "analysis")?;
            let record = LibraryRecord::new(
                Local::now().date_naive(),
                &title,
                &topics,
                &analysis,
                &source_text,
            )?;
            let total = session.save(store, record).await?.len();
            println!("Saved. {} now holds {} records.", session.file_name(), total);
        }
        Commands::List { search, brief } => {
            let mut session = session()?;
            let library = session.load(store).await;
            if library.is_empty() {
                println!("The library is empty.");
                return Ok(());
            }
            let query = search.unwrap_or_default();
            let hits = library.search(query.trim());
            println!("{} of {} records", hits.len(), library.len());
            for (position, record) in hits {
                print_record(position, record, brief);
            }
        }
        Commands::Delete { position } => {
            let mut session = session()?;
            let library = session.delete(store, position).await?;
            println!("Deleted record {}. {} records remain.", position, library.len());
        }
        Commands::Export { output } => {
            let session = session()?;
            let (path, rows) = export::run_export(store, session.user(), output.as_deref()).await?;
            eprintln!("Exported {} records to {}", rows, path.display());
        }
        Commands::Serve => server::run_server(&cfg, backend.clone()).await?,
    }

    Ok(())
}

fn open_session(api_key: Option<&str>, user: Option<&str>) -> Result<Session> {
    match (user, api_key) {
        (Some(fp), key) => {
            let credential = key.map(Credential::new).transpose()?;
            Ok(Session::for_user(UserId::from_fingerprint(fp)?, credential))
        }
        (None, Some(key)) => Session::login(key),
        (None, None) => bail!("an API key is required (--api-key or DEEPSEEK_API_KEY)"),
    }
}

/// Inline text, or the contents of `file` (`-` reads stdin).
fn read_text(inline: Option<String>, file: Option<&Path>, what: &str) -> Result<String> {
    match (inline, file) {
        (Some(text), _) => Ok(text),
        (None, Some(path)) if path == Path::new("-") => {
            let mut buf = String::new();
            std::io::stdin().read_to_string(&mut buf)?;
            Ok(buf)
        }
        (None, Some(path)) => std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read {} file: {}", what, path.display())),
        (None, None) => bail!("--{0} or --{0}-file is required", what),
    }
}

fn print_record(position: usize, record: &LibraryRecord, brief: bool) {
    println!();
    println!("[{}] {} | {}", position, record.title, record.date);
    println!("    topics: {}", record.linked_topics.replace(TOPIC_DELIMITER, ", "));
    if !brief {
        println!("    analysis:");
        for line in record.analysis.lines() {
            println!("      {}", line);
        }
        println!("    source: {}", record.source_text);
    }
}
