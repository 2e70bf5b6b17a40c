#![cfg(not(target_family = "wasm"))]

mod logger;

use std::env;
use std::io::{self, Read, Write};
use std::path::Path;
use std::process::exit;
use std::str::FromStr;

use anstream::{eprintln, println};
use anyhow::{anyhow, bail, Result};
use clap::{Parser, Subcommand, ValueHint};
use clap_verbosity_flag::LogLevel;
use clio::Output;
use is_terminal::IsTerminal;
use schemars::schema_for;
use serde::Serialize;

use topkq::ir::request::{By, OrderBy, OrderByItem};
use topkq::ir::rq::RelationExpr;
use topkq::{
    ErrorMessages, IdentQuoting, Options, RankFunction, Strategy, TableRef, Target, TopK, TopKArgs,
};

/// Entrypoint called by [`crate::main`]
pub fn main() -> color_eyre::eyre::Result<()> {
    let mut cli = Cli::parse();

    static LOGGER: logger::StderrLogger = logger::StderrLogger;
    log::set_logger(&LOGGER).map(|()| log::set_max_level(cli.verbose.log_level_filter()))?;

    color_eyre::install()?;
    cli.color.write_global();

    if let Err(error) = cli.command.run() {
        eprintln!("{error}");
        // Copied from
        // https://doc.rust-lang.org/src/std/backtrace.rs.html#1-504, since it's private
        fn backtrace_enabled() -> bool {
            match env::var("RUST_LIB_BACKTRACE") {
                Ok(s) => s != "0",
                Err(_) => match env::var("RUST_BACKTRACE") {
                    Ok(s) => s != "0",
                    Err(_) => false,
                },
            }
        }
        if backtrace_enabled() {
            eprintln!("{:#}", error.backtrace());
        }

        exit(1)
    }

    Ok(())
}

#[derive(Parser, Debug, Clone)]
struct Cli {
    #[command(subcommand)]
    command: Command,
    #[command(flatten)]
    color: colorchoice_clap::Color,

    #[command(flatten)]
    verbose: clap_verbosity_flag::Verbosity<LoggingHelp>,
}

#[derive(Subcommand, Debug, Clone)]
#[command(name = env!("CARGO_PKG_NAME"), about, version)]
enum Command {
    /// Synthesize the SQL of a top-k request
    ///
    /// The request is read from INPUT as YAML or JSON, unless `--table` is
    /// given, in which case it is built from the request flags.
    Compile {
        #[command(flatten)]
        io_args: IoArgs,

        #[command(flatten)]
        request: RequestArgs,

        #[command(flatten)]
        synthesis: SynthesisArgs,

        /// Exclude the signature comment containing the topkq version
        #[arg(long = "hide-signature-comment", action = clap::ArgAction::SetFalse)]
        signature_comment: bool,

        /// Emit unformatted, dense SQL
        #[arg(long = "no-format", action = clap::ArgAction::SetFalse)]
        format: bool,
    },

    /// Show the canonical request, the chosen strategy and its output
    Plan {
        #[command(flatten)]
        io_args: IoArgs,

        #[command(flatten)]
        request: RequestArgs,

        #[command(flatten)]
        synthesis: SynthesisArgs,

        #[arg(value_enum, long, default_value = "yaml")]
        format: Format,
    },

    /// Show available compile target names
    #[command(name = "list-targets")]
    ListTargets,

    #[command(subcommand)]
    Debug(DebugCommand),
}

/// Commands meant for debugging, prone to change
#[derive(Subcommand, Debug, Clone)]
enum DebugCommand {
    /// Print JSON Schema
    JsonSchema {
        #[arg(value_enum, long)]
        schema_type: SchemaType,
    },
}

#[derive(clap::Args, Default, Debug, Clone)]
pub struct IoArgs {
    #[arg(value_parser, default_value = "-", value_hint(ValueHint::FilePath))]
    input: clio::ClioPath,

    #[arg(value_parser, default_value = "-", value_hint(ValueHint::FilePath))]
    output: Output,
}

/// A request spelled out as flags, instead of a file.
#[derive(clap::Args, Default, Debug, Clone)]
struct RequestArgs {
    /// Table to read from; the request is built from flags when given
    #[arg(long)]
    table: Option<String>,

    /// Columns of the table, when known
    #[arg(long, value_delimiter = ',', requires = "table")]
    columns: Vec<String>,

    /// Rows to keep per group
    #[arg(short, requires = "table", allow_hyphen_values = true)]
    k: Option<i64>,

    /// Partition columns
    #[arg(long, value_delimiter = ',', requires = "table")]
    by: Vec<String>,

    /// Columns to rank by, as `name`, `name:asc` or `name:desc`
    #[arg(long = "order-by", value_delimiter = ',', requires = "table")]
    order_by: Vec<String>,

    /// Sort order-by columns without a direction ascending, instead of
    /// descending
    #[arg(long, requires = "table")]
    asc: bool,

    /// Expected number of rows per group, passed to engines as a hint
    #[arg(long, requires = "table", allow_hyphen_values = true)]
    group_size: Option<i64>,
}

#[derive(clap::Args, Debug, Clone)]
struct SynthesisArgs {
    /// Target to compile to
    #[arg(short, long, default_value = "sql.any", env = "TOPKQ_TARGET")]
    target: String,

    /// Quote identifiers that are not plain lowercase names or are keywords
    #[arg(long)]
    quote_idents: bool,

    /// Ranking function of the window-rank strategy
    #[arg(long, default_value = "dense_rank")]
    rank_function: RankFunction,
}

impl Default for SynthesisArgs {
    fn default() -> Self {
        SynthesisArgs {
            target: "sql.any".to_string(),
            quote_idents: false,
            rank_function: RankFunction::default(),
        }
    }
}

impl SynthesisArgs {
    fn options(&self) -> Result<Options> {
        let ident_quoting = if self.quote_idents {
            IdentQuoting::Auto
        } else {
            IdentQuoting::Verbatim
        };

        Ok(Options::default()
            .with_target(Target::from_str(&self.target).map_err(ErrorMessages::from)?)
            .with_ident_quoting(ident_quoting)
            .with_rank_function(self.rank_function))
    }
}

impl RequestArgs {
    /// The request given by flags, or `None` when the request should be read
    /// from the input.
    fn to_args(&self) -> Result<Option<TopKArgs>> {
        let Some(table) = &self.table else {
            return Ok(None);
        };
        let Some(k) = self.k else {
            bail!("`-k` is required when the request is given with `--table`");
        };

        let mut table = TableRef::new(table.clone());
        if !self.columns.is_empty() {
            table = table.with_columns(self.columns.iter().cloned());
        }

        let order_by = (self.order_by.iter())
            .map(|item| parse_order_by_item(item))
            .collect::<Result<Vec<_>>>()?;

        let mut args = TopKArgs::new(
            table,
            k,
            By::Many(self.by.clone()),
            OrderBy::Many(order_by),
        )
        .with_desc(!self.asc);
        if let Some(group_size) = self.group_size {
            args = args.with_group_size(group_size);
        }
        Ok(Some(args))
    }
}

fn parse_order_by_item(item: &str) -> Result<OrderByItem> {
    Ok(match item.rsplit_once(':') {
        None => OrderByItem::Bare(item.to_string()),
        Some((column, "desc")) => OrderByItem::Directed(column.to_string(), true),
        Some((column, "asc")) => OrderByItem::Directed(column.to_string(), false),
        Some((_, direction)) => {
            bail!("unknown direction `{direction}` in `{item}`; expected `asc` or `desc`")
        }
    })
}

#[derive(Copy, Clone, Debug, Default)]
struct LoggingHelp;

impl LogLevel for LoggingHelp {
    /// By default, this will only report errors.
    fn default() -> Option<log::Level> {
        Some(log::Level::Error)
    }
    fn verbose_help() -> Option<&'static str> {
        Some("Increase logging verbosity")
    }

    fn verbose_long_help() -> Option<&'static str> {
        Some(
            r#"More `v`s, More vebose logging:
-v shows warnings
-vv shows info
-vvv shows debug
-vvvv shows trace"#,
        )
    }

    fn quiet_help() -> Option<&'static str> {
        Some("Silences logging output")
    }

    fn quiet_long_help() -> Option<&'static str> {
        Some("Silences logging output")
    }
}

#[derive(clap::ValueEnum, Clone, Debug)]
enum Format {
    Json,
    Yaml,
}

#[derive(clap::ValueEnum, Clone, Debug)]
enum SchemaType {
    Request,
    Relation,
}

/// What `plan` prints.
#[derive(Serialize)]
struct PlanReport {
    strategy: Strategy,
    request: TopKArgs,
    #[serde(skip_serializing_if = "Option::is_none")]
    sql: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    relation: Option<RelationExpr>,
}

impl Command {
    /// Entrypoint called by [`main`]
    pub fn run(&mut self) -> Result<()> {
        match self {
            Command::ListTargets => {
                println!("{}", Target::names().join("\n"));
                Ok(())
            }
            Command::Debug(DebugCommand::JsonSchema { schema_type }) => {
                let schema = match schema_type {
                    SchemaType::Request => schema_for!(TopKArgs),
                    SchemaType::Relation => schema_for!(RelationExpr),
                };
                io::stdout().write_all(&serde_json::to_string_pretty(&schema)?.into_bytes())?;
                Ok(())
            }
            _ => self.run_io_command(),
        }
    }

    fn run_io_command(&mut self) -> Result<()> {
        let args = self.read_input()?;
        let data = self.execute(args)?;

        self.write_output(&data)?;
        Ok(())
    }

    fn execute(&self, args: TopKArgs) -> Result<Vec<u8>> {
        Ok(match self {
            Command::Compile {
                synthesis,
                signature_comment,
                format,
                ..
            } => {
                let options = synthesis
                    .options()?
                    .with_format(*format)
                    .with_signature_comment(*signature_comment);

                topkq::compile_to_sql(args, &options)?.into_bytes()
            }
            Command::Plan {
                synthesis, format, ..
            } => {
                let options = synthesis.options()?.no_format().no_signature();

                let plan = topkq::plan(args, &options)?;
                let strategy = plan.strategy;
                let request = TopKArgs::from(plan.request.clone());

                let (sql, relation) = match plan.into_top_k(&options) {
                    TopK::Sql(sql) => (Some(sql), None),
                    TopK::Relation(rel) => (None, Some(rel)),
                };
                let report = PlanReport {
                    strategy,
                    request,
                    sql,
                    relation,
                };

                match format {
                    Format::Json => serde_json::to_string_pretty(&report)?.into_bytes(),
                    Format::Yaml => serde_yaml::to_string(&report)?.into_bytes(),
                }
            }
            _ => unreachable!("{self:?}"),
        })
    }

    fn read_input(&mut self) -> Result<TopKArgs> {
        use Command::*;
        let (io_args, request) = match self {
            Compile {
                io_args, request, ..
            }
            | Plan {
                io_args, request, ..
            } => (io_args, request),
            _ => unreachable!(),
        };

        if let Some(args) = request.to_args()? {
            return Ok(args);
        }

        let input = &io_args.input;

        // Don't wait without a prompt, it's confusing whether we're waiting
        // for input or not.
        if input.path() == Path::new("-") && std::io::stdin().is_terminal() {
            #[cfg(unix)]
            eprintln!("Enter a request as YAML or JSON, then press ctrl-d to compile:\n");
            #[cfg(windows)]
            eprintln!("Enter a request as YAML or JSON, then press ctrl-z to compile:\n");
        }

        let mut source = String::new();
        input.clone().open()?.read_to_string(&mut source)?;

        parse_request(&source)
    }

    fn write_output(&mut self, data: &[u8]) -> std::io::Result<()> {
        use Command::{Compile, Plan};
        let mut output = match self {
            Compile { io_args, .. } | Plan { io_args, .. } => io_args.output.clone(),
            _ => unreachable!(),
        };
        output.write_all(data)
    }
}

/// JSON is a subset of YAML, so one parser reads both.
fn parse_request(source: &str) -> Result<TopKArgs> {
    serde_yaml::from_str(source).map_err(|e| anyhow!("cannot read request: {e}"))
}
