use std::process::ExitCode;
use std::sync::Arc;

use clap::{Args, Parser, Subcommand};
use miette::IntoDiagnostic;
use tracing_subscriber::EnvFilter;

use tankobon::cancel::CancelToken;
use tankobon::config::{ConfigLoader, ResolvedConfig};
use tankobon::error::TankobonError;
use tankobon::output::{AuthStatus, ClearResult, JsonOutput, RecordResult, SearchResult};
use tankobon::resolver::{Credentials, MetadataResolver};
use tankobon::transport::HttpCatalogTransport;

#[derive(Parser)]
#[command(name = "tankobon")]
#[command(about = "Manga catalog metadata lookups and cache maintenance")]
#[command(version, author)]
struct Cli {
    #[arg(long, global = true)]
    config: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    #[command(about = "Query the metadata catalog")]
    Metadata(MetadataArgs),
    #[command(about = "Manage catalog authorization")]
    Auth(AuthArgs),
    #[command(about = "Manage the local metadata cache")]
    Cache(CacheArgs),
}

#[derive(Args)]
struct MetadataArgs {
    #[command(subcommand)]
    command: MetadataCommand,
}

#[derive(Subcommand)]
enum MetadataCommand {
    #[command(about = "Search the catalog by title")]
    Search { query: String },
    #[command(about = "Find the closest catalog record for a title")]
    Closest { title: String },
    #[command(about = "Fetch a catalog record by ID")]
    Get { id: u64 },
    #[command(about = "Pin a title to a catalog ID")]
    Bind { title: String, id: u64 },
}

#[derive(Args)]
struct AuthArgs {
    #[command(subcommand)]
    command: AuthCommand,
}

#[derive(Subcommand)]
enum AuthCommand {
    #[command(about = "Exchange an authorization code for an access token")]
    Login(LoginArgs),
    #[command(about = "Forget the stored access token")]
    Logout,
    #[command(about = "Report whether an access token is stored")]
    Status,
}

#[derive(Args)]
struct LoginArgs {
    #[arg(long)]
    id: String,
    #[arg(long)]
    secret: String,
    #[arg(long)]
    code: String,
}

#[derive(Args)]
struct CacheArgs {
    #[command(subcommand)]
    command: CacheCommand,
}

#[derive(Subcommand)]
enum CacheCommand {
    #[command(about = "Remove cached search, title and record entries")]
    Clear,
}

fn main() -> ExitCode {
    if let Err(report) = run() {
        eprintln!("{report:?}");
        if let Some(err) = report.downcast_ref::<TankobonError>() {
            return ExitCode::from(map_exit_code(err));
        }
        return ExitCode::from(1);
    }
    ExitCode::SUCCESS
}

fn map_exit_code(error: &TankobonError) -> u8 {
    match error {
        TankobonError::NotFound(_) => 2,
        TankobonError::CatalogHttp(_)
        | TankobonError::CatalogStatus { .. }
        | TankobonError::AssetHttp(_)
        | TankobonError::AssetStatus { .. } => 3,
        _ => 1,
    }
}

fn run() -> miette::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = ConfigLoader::resolve(cli.config.as_deref())?;

    match cli.command {
        Commands::Metadata(args) => run_metadata(args.command, &config),
        Commands::Auth(args) => run_auth(args.command, &config),
        Commands::Cache(args) => match args.command {
            CacheCommand::Clear => {
                let store = config.store()?;
                let removed = store.clear_cache()?;
                JsonOutput::print_clear(&ClearResult { removed }).into_diagnostic()
            }
        },
    }
}

fn build_resolver(config: &ResolvedConfig) -> miette::Result<MetadataResolver> {
    let store = config.store()?;
    let transport = HttpCatalogTransport::new()?;
    Ok(MetadataResolver::new(
        Arc::new(transport),
        store.resolver_stores(),
        config.resolver_options(),
    ))
}

fn run_metadata(command: MetadataCommand, config: &ResolvedConfig) -> miette::Result<()> {
    let resolver = build_resolver(config)?;
    let cancel = CancelToken::new();
    match command {
        MetadataCommand::Search { query } => {
            let records = resolver.search(&cancel, &query)?;
            JsonOutput::print_search(&SearchResult {
                query: &query,
                records: &records,
            })
            .into_diagnostic()
        }
        MetadataCommand::Closest { title } => {
            let record = resolver.find_closest(&cancel, &title)?;
            if record.is_none() {
                return Err(TankobonError::NotFound(title).into());
            }
            JsonOutput::print_record(&RecordResult {
                query: &title,
                record: record.as_ref(),
            })
            .into_diagnostic()
        }
        MetadataCommand::Get { id } => {
            let record = resolver.resolve_by_id(&cancel, id)?;
            let query = id.to_string();
            if record.is_none() {
                return Err(TankobonError::NotFound(query).into());
            }
            JsonOutput::print_record(&RecordResult {
                query: &query,
                record: record.as_ref(),
            })
            .into_diagnostic()
        }
        MetadataCommand::Bind { title, id } => {
            let record = resolver.bind_title(&cancel, &title, id)?;
            JsonOutput::print_record(&RecordResult {
                query: &title,
                record: Some(&record),
            })
            .into_diagnostic()
        }
    }
}

fn run_auth(command: AuthCommand, config: &ResolvedConfig) -> miette::Result<()> {
    let resolver = build_resolver(config)?;
    match command {
        AuthCommand::Login(args) => {
            let credentials = Credentials {
                id: args.id,
                secret: args.secret,
                code: args.code,
            };
            resolver.authorize(&CancelToken::new(), &credentials)?;
        }
        AuthCommand::Logout => resolver.logout()?,
        AuthCommand::Status => {}
    }
    JsonOutput::print_auth(&AuthStatus {
        authorized: resolver.is_authorized(),
    })
    .into_diagnostic()
}
