//! Binary entry point for the linkstore command-line tool.
#![forbid(unsafe_code)]

#[path = "linkstore/config.rs"]
mod config;

use std::error::Error;
use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};
use linkstore::{
    admin::{verify, VerifyLevel, VerifyReport},
    cli::{load_fixture, LoadedFixture},
    db::Database,
    export::{render, LinkDepth, OutputMode, RenderOptions, UnresolvedMode},
    logging::init_logging,
    storage::RemovalStrategy,
    ObjRef,
};
use tracing::info;

use config::CliConfig;

#[derive(Parser, Debug)]
#[command(
    name = "linkstore",
    version,
    about = "Inspect link columns and backlinks of a JSON fixture",
    disable_help_subcommand = true
)]
struct Cli {
    #[arg(long, global = true, value_name = "FILE", help = "TOML configuration file")]
    config: Option<PathBuf>,

    #[arg(
        long,
        global = true,
        env = "LINKSTORE_LOG",
        value_name = "FILTER",
        help = "Log filter, e.g. `info` or `linkstore=debug`"
    )]
    log_level: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Render rows and their link neighborhood as JSON
    Render(RenderCmd),
    /// Check that every link column agrees with its backlink column
    Verify {
        #[arg(value_name = "FIXTURE")]
        fixture: PathBuf,
        #[arg(long, value_enum, default_value_t = VerifyLevelArg::Full)]
        level: VerifyLevelArg,
        #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
        format: OutputFormat,
    },
    /// Remove one row with cascading link cleanup and print the table afterwards
    RemoveRow {
        #[arg(value_name = "FIXTURE")]
        fixture: PathBuf,
        #[arg(long, help = "Table holding the row")]
        table: String,
        #[arg(long, value_name = "ORDINAL", help = "Row ordinal in the fixture")]
        row: usize,
        #[arg(long, value_enum, help = "Gap closing strategy")]
        strategy: Option<StrategyArg>,
        #[command(flatten)]
        render: RenderArgs,
    },
}

#[derive(Args, Debug)]
struct RenderCmd {
    #[arg(value_name = "FIXTURE")]
    fixture: PathBuf,

    #[arg(long, help = "Table whose rows are rendered")]
    table: String,

    #[arg(
        long = "row",
        value_name = "ORDINAL",
        help = "Render only these row ordinals (repeatable)"
    )]
    rows: Vec<usize>,

    #[command(flatten)]
    render: RenderArgs,
}

#[derive(Args, Debug)]
struct RenderArgs {
    #[arg(
        long,
        allow_negative_numbers = true,
        help = "Link depth: -1 follows every link once, n follows n hops"
    )]
    depth: Option<i64>,

    #[arg(long, value_enum, help = "Output dialect")]
    mode: Option<ModeArg>,

    #[arg(long, value_enum, help = "How references to missing primary keys print")]
    unresolved: Option<UnresolvedArg>,

    #[arg(
        long = "rename",
        value_name = "FROM=TO",
        value_parser = parse_rename,
        help = "Print column or table FROM as TO (repeatable)"
    )]
    renames: Vec<(String, String)>,

    #[arg(long, help = "Maximum number of rows rendered")]
    limit: Option<usize>,

    #[arg(long, help = "Maximum number of nested expansions")]
    expansion_limit: Option<usize>,

    #[arg(long, help = "Pretty-print the output")]
    pretty: bool,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, ValueEnum)]
enum OutputFormat {
    Text,
    Json,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, ValueEnum)]
enum VerifyLevelArg {
    Fast,
    Full,
}

impl From<VerifyLevelArg> for VerifyLevel {
    fn from(level: VerifyLevelArg) -> Self {
        match level {
            VerifyLevelArg::Fast => VerifyLevel::Fast,
            VerifyLevelArg::Full => VerifyLevel::Full,
        }
    }
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, ValueEnum)]
enum ModeArg {
    Json,
    Xjson,
    XjsonPlus,
}

impl From<ModeArg> for OutputMode {
    fn from(mode: ModeArg) -> Self {
        match mode {
            ModeArg::Json => OutputMode::Json,
            ModeArg::Xjson => OutputMode::XJson,
            ModeArg::XjsonPlus => OutputMode::XJsonPlus,
        }
    }
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, ValueEnum)]
enum UnresolvedArg {
    Placeholder,
    Null,
}

impl From<UnresolvedArg> for UnresolvedMode {
    fn from(mode: UnresolvedArg) -> Self {
        match mode {
            UnresolvedArg::Placeholder => UnresolvedMode::Placeholder,
            UnresolvedArg::Null => UnresolvedMode::Null,
        }
    }
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, ValueEnum)]
enum StrategyArg {
    SwapWithLast,
    OrderedErase,
}

impl From<StrategyArg> for RemovalStrategy {
    fn from(strategy: StrategyArg) -> Self {
        match strategy {
            StrategyArg::SwapWithLast => RemovalStrategy::SwapWithLast,
            StrategyArg::OrderedErase => RemovalStrategy::OrderedErase,
        }
    }
}

fn parse_rename(raw: &str) -> Result<(String, String), String> {
    match raw.split_once('=') {
        Some((from, to)) if !from.is_empty() && !to.is_empty() => {
            Ok((from.to_string(), to.to_string()))
        }
        _ => Err(format!("expected FROM=TO, got '{raw}'")),
    }
}

fn main() {
    if let Err(err) = run() {
        eprintln!("error: {err}");
        std::process::exit(1);
    }
}

fn run() -> Result<(), Box<dyn Error>> {
    let cli = Cli::parse();
    let config = CliConfig::load(cli.config.as_deref())?;
    let filter = cli
        .log_level
        .as_deref()
        .or(config.log_level.as_deref())
        .unwrap_or("warn");
    init_logging(filter)?;

    match cli.command {
        Command::Render(cmd) => {
            let loaded = load_fixture(&cmd.fixture, config.group_options())?;
            let table = loaded.table(&cmd.table)?;
            let roots: Vec<ObjRef> = if cmd.rows.is_empty() {
                loaded
                    .group
                    .table(table)?
                    .row_keys()
                    .iter()
                    .map(|&row| ObjRef::new(table, row))
                    .collect()
            } else {
                cmd.rows
                    .iter()
                    .map(|&ordinal| row_at(&loaded, &cmd.table, ordinal))
                    .collect::<Result<_, _>>()?
            };
            let opts = render_options(&config, &cmd.render)?;
            println!("{}", render(&loaded.group, &roots, &opts)?);
        }
        Command::Verify {
            fixture,
            level,
            format,
        } => {
            let loaded = load_fixture(&fixture, config.group_options())?;
            let report = verify(&loaded.group, level.into());
            emit(format, &report, print_verify_text)?;
            if !report.success {
                std::process::exit(2);
            }
        }
        Command::RemoveRow {
            fixture,
            table,
            row,
            strategy,
            render: render_args,
        } => {
            let mut options = config.group_options();
            if let Some(strategy) = strategy {
                options = options.removal(strategy.into());
            }
            let loaded = load_fixture(&fixture, options)?;
            let obj = row_at(&loaded, &table, row)?;
            let table_key = obj.table;
            let db = Database::from_group(loaded.group);
            db.update(|group| group.remove_row(obj))?;
            info!(table = %table, ordinal = row, "row removed");

            let snapshot = db.begin_read();
            let roots: Vec<ObjRef> = snapshot
                .table(table_key)?
                .row_keys()
                .iter()
                .map(|&row| ObjRef::new(table_key, row))
                .collect();
            let opts = render_options(&config, &render_args)?;
            println!("{}", render(&snapshot, &roots, &opts)?);
        }
    }
    Ok(())
}

fn row_at(loaded: &LoadedFixture, table: &str, ordinal: usize) -> Result<ObjRef, Box<dyn Error>> {
    loaded
        .row(table, ordinal)
        .ok_or_else(|| format!("table '{table}' has no row {ordinal}").into())
}

fn render_options(config: &CliConfig, args: &RenderArgs) -> Result<RenderOptions, Box<dyn Error>> {
    let mut opts = config.render_options()?;
    if let Some(depth) = args.depth {
        opts = opts.depth(LinkDepth::from_raw(depth)?);
    }
    if let Some(mode) = args.mode {
        opts = opts.mode(mode.into());
    }
    if let Some(unresolved) = args.unresolved {
        opts = opts.unresolved(unresolved.into());
    }
    for (from, to) in &args.renames {
        opts = opts.rename(from.as_str(), to.as_str());
    }
    if let Some(limit) = args.limit {
        opts = opts.row_limit(limit);
    }
    if let Some(limit) = args.expansion_limit {
        opts = opts.expansion_limit(limit);
    }
    if args.pretty {
        opts = opts.pretty(true);
    }
    Ok(opts)
}

fn emit<T, F>(format: OutputFormat, value: &T, printer: F) -> Result<(), Box<dyn Error>>
where
    T: serde::Serialize,
    F: Fn(&T),
{
    match format {
        OutputFormat::Json => {
            let json = serde_json::to_string_pretty(value)?;
            println!("{json}");
        }
        OutputFormat::Text => printer(value),
    }
    Ok(())
}

fn print_verify_text(report: &VerifyReport) {
    println!(
        "Verify ({:?}) => success={} tables={} rows={} link_columns={} forward_refs={} backlink_entries={} unresolved_refs={}",
        report.level,
        report.success,
        report.counts.tables,
        report.counts.rows,
        report.counts.link_columns,
        report.counts.forward_refs,
        report.counts.backlink_entries,
        report.counts.unresolved_refs,
    );
    for finding in &report.findings {
        println!("- {:?}: {}", finding.severity, finding.message);
    }
}
