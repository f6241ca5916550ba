use std::fs;
use std::process::ExitCode;

use camino::Utf8PathBuf;
use clap::{Args, Parser, Subcommand};
use miette::IntoDiagnostic;
use tracing_subscriber::EnvFilter;

use kira_gdc::api::GdcHttpClient;
use kira_gdc::bulk::{BulkRetriever, DownloadOptions, DownloadOutcome};
use kira_gdc::config::{ConfigLoader, ResolvedConfig};
use kira_gdc::domain::{AuthToken, FileId, parse_file_ids};
use kira_gdc::error::GdcError;
use kira_gdc::output::{JsonOutput, OutputMode, print_tsv};
use kira_gdc::query::FileQuery;

#[derive(Parser)]
#[command(name = "kira-gdc")]
#[command(about = "Search the GDC file catalog and bulk-download data files")]
#[command(version, author)]
struct Cli {
    #[arg(long, global = true)]
    non_interactive: bool,

    /// Config file (defaults to kira-gdc.json in the current directory)
    #[arg(long, global = true)]
    config: Option<String>,

    /// GDC auth token; overrides GDC_TOKEN and the config file
    #[arg(long, global = true)]
    token: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    #[command(about = "Search the file catalog")]
    Query(QueryArgs),
    #[command(about = "Download files by id")]
    Download(DownloadArgs),
}

#[derive(Args)]
struct QueryArgs {
    /// FIELD=VALUE[,VALUE...]; `\,` is a literal comma; repeat for more fields
    #[arg(long = "filter", short = 'f')]
    filters: Vec<String>,

    #[arg(long)]
    size: Option<u32>,

    /// Write the TSV result here instead of stdout
    #[arg(long, short = 'o')]
    output: Option<Utf8PathBuf>,
}

#[derive(Args)]
struct DownloadArgs {
    ids: Vec<String>,

    /// File with one id per line
    #[arg(long)]
    ids_file: Option<Utf8PathBuf>,

    #[arg(long, default_value = ".")]
    dir: Utf8PathBuf,

    #[arg(long)]
    no_unzip: bool,

    #[arg(long)]
    no_cache: bool,
}

fn main() -> ExitCode {
    if let Err(report) = run() {
        eprintln!("{report:?}");
        if let Some(err) = report.downcast_ref::<GdcError>() {
            return ExitCode::from(map_exit_code(err));
        }
        return ExitCode::from(1);
    }
    ExitCode::SUCCESS
}

fn map_exit_code(error: &GdcError) -> u8 {
    match error {
        GdcError::InvalidFilter(_)
        | GdcError::InvalidFileId(_)
        | GdcError::ConfigRead(_)
        | GdcError::ConfigParse(_) => 2,
        GdcError::Http(_)
        | GdcError::Status { .. }
        | GdcError::RetriesExhausted { .. }
        | GdcError::MissingContentDisposition
        | GdcError::InvalidContentDisposition(_) => 3,
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
    let output_mode = if cli.non_interactive {
        OutputMode::NonInteractive
    } else {
        OutputMode::Interactive
    };

    let mut config = ConfigLoader::resolve(cli.config.as_deref())?;
    if let Some(token) = cli.token.and_then(AuthToken::new) {
        config.token = Some(token);
    }
    let client = GdcHttpClient::with_options(&config.api_url, config.timeout)?;

    match cli.command {
        Commands::Query(args) => run_query(args, client, config, output_mode),
        Commands::Download(args) => run_download(args, client, config, output_mode),
    }
}

fn run_query(
    args: QueryArgs,
    client: GdcHttpClient,
    config: ResolvedConfig,
    output_mode: OutputMode,
) -> miette::Result<()> {
    let predicates = args
        .filters
        .iter()
        .map(|raw| parse_filter(raw))
        .collect::<Result<Vec<_>, _>>()?;

    let table = FileQuery::new(client, config.token)
        .size(args.size.unwrap_or(config.page_size))
        .retry_policy(config.retry)
        .add_filters(predicates)
        .execute()?;

    if let Some(path) = args.output {
        fs::write(path.as_std_path(), table.to_tsv()).into_diagnostic()?;
        eprintln!("{} rows written to {path}", table.len());
        return Ok(());
    }
    match output_mode {
        OutputMode::NonInteractive => JsonOutput::print_table(&table).into_diagnostic(),
        OutputMode::Interactive => print_tsv(&table).into_diagnostic(),
    }
}

fn run_download(
    args: DownloadArgs,
    client: GdcHttpClient,
    config: ResolvedConfig,
    output_mode: OutputMode,
) -> miette::Result<()> {
    let mut ids = parse_file_ids(&args.ids)?;
    if let Some(path) = &args.ids_file {
        ids.extend(read_ids_file(path)?);
    }
    if ids.is_empty() {
        return Err(miette::Report::msg(
            "no file ids given (pass ids or --ids-file)",
        ));
    }

    let options = DownloadOptions {
        unzip: !args.no_unzip,
        cached: !args.no_cache,
    };
    let outcome = BulkRetriever::new(client, ids, config.token).download(&args.dir, options)?;

    match output_mode {
        OutputMode::NonInteractive => JsonOutput::print_download(&outcome).into_diagnostic(),
        OutputMode::Interactive => {
            print_download_summary(&outcome);
            Ok(())
        }
    }
}

/// `cases.project.project_id=TCGA-BRCA,TCGA-LUAD`; `\,` keeps a comma inside a value.
fn parse_filter(raw: &str) -> Result<(String, Vec<String>), GdcError> {
    let (field, values) = raw
        .split_once('=')
        .ok_or_else(|| GdcError::InvalidFilter(raw.to_string()))?;
    let field = field.trim();
    let values = split_values(values)
        .into_iter()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
        .collect::<Vec<_>>();
    if field.is_empty() || values.is_empty() {
        return Err(GdcError::InvalidFilter(raw.to_string()));
    }
    Ok((field.to_string(), values))
}

fn split_values(raw: &str) -> Vec<String> {
    let mut values = Vec::new();
    let mut current = String::new();
    let mut chars = raw.chars().peekable();
    while let Some(ch) = chars.next() {
        match ch {
            '\\' if chars.peek() == Some(&',') => {
                current.push(',');
                chars.next();
            }
            ',' => values.push(std::mem::take(&mut current)),
            _ => current.push(ch),
        }
    }
    values.push(current);
    values
}

fn read_ids_file(path: &Utf8PathBuf) -> Result<Vec<FileId>, GdcError> {
    let content = fs::read_to_string(path.as_std_path())
        .map_err(|err| GdcError::Filesystem(format!("read {path}: {err}")))?;
    parse_file_ids(
        content
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty() && !line.starts_with('#')),
    )
}

fn print_download_summary(outcome: &DownloadOutcome) {
    let green = "\x1b[32m";
    let cyan = "\x1b[36m";
    let reset = "\x1b[0m";

    match outcome {
        DownloadOutcome::UpToDate => println!("{green}All files already present{reset}"),
        DownloadOutcome::Downloaded(summary) => {
            println!("{cyan}Downloaded {} files{reset}", summary.ids.len());
            println!("{cyan}   archive: {}{reset}", summary.archive);
            if summary.extracted {
                println!("{green}   extracted{reset}");
            }
        }
    }
}
