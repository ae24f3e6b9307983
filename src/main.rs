//! `tallied` - commodity balances, outlier rankings and time series over a
//! ledger file, computed from `ledger xml` reports.

mod config;
mod report;

use crate::config::{Config, EnvOverride};
use crate::report::Format;

use libtallied::{
    balance, outliers,
    parser::parse_date,
    query,
    series::{self, Interval},
    view::LedgerView,
    LedgerCli, QueryCache,
};

use anyhow::{anyhow, Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use tracing_subscriber::{fmt, EnvFilter};

use std::io::{self, Write};
use std::path::PathBuf;

const DEFAULT_LOG_FILTER: &str = "tallied=info,libtallied=info";

#[derive(Parser, Debug)]
#[command(name = "tallied", version, about, long_about = None)]
struct Cli {
    #[arg(short, long, env = "TALLIED_CONFIG", value_name = "FILE")]
    config: Option<PathBuf>,

    /// Ledger file to query
    #[arg(short, long, env = "LEDGER_FILE", value_name = "FILE", global = true)]
    file: Option<PathBuf>,

    /// The `ledger` executable
    #[arg(long, env = "LEDGER_BIN", value_name = "BIN", global = true)]
    ledger_bin: Option<PathBuf>,

    #[arg(long, global = true)]
    json: bool,

    #[command(flatten)]
    view: ViewArgs,

    #[command(subcommand)]
    command: Command,
}

#[derive(clap::Args, Debug)]
struct ViewArgs {
    /// Period expression passed on to ledger
    #[arg(long, global = true)]
    period: Option<String>,

    #[arg(long, global = true, conflicts_with = "income")]
    expenses: bool,

    #[arg(long, global = true)]
    income: bool,
}

impl ViewArgs {
    fn view(&self) -> LedgerView {
        let period = self.period.clone();
        if self.expenses {
            LedgerView::expenses(period)
        } else if self.income {
            LedgerView::income(period)
        } else {
            LedgerView::new(period, None)
        }
    }
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Version of the ledger executable
    Version,
    /// Totals per commodity
    Balances {
        /// Extra query arguments
        args: Vec<String>,
    },
    /// Payees ranked by how far they pull the average
    Payees(Ranking),
    /// Accounts ranked by how far they pull the average
    Accounts(Ranking),
    /// Bucketed history of one payee or account
    Series(SeriesArgs),
}

#[derive(clap::Args, Debug)]
struct Ranking {
    #[arg(long, value_enum, default_value_t = RankBy::Count)]
    by: RankBy,
    #[arg(long)]
    commodity: Option<String>,
    #[arg(long)]
    limit: Option<usize>,
    args: Vec<String>,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum RankBy {
    Count,
    Amount,
}

#[derive(clap::Args, Debug)]
struct SeriesArgs {
    #[arg(long, required_unless_present = "account", conflicts_with = "account")]
    payee: Option<String>,
    #[arg(long, required_unless_present = "payee")]
    account: Option<String>,
    /// First day of the first bucket, YYYY-MM-DD or YYYY/MM/DD
    #[arg(long)]
    start: String,
    #[arg(long, default_value_t = 12)]
    count: usize,
    #[arg(long, default_value = "month")]
    interval: Interval,
    /// Matches every commodity when left out
    #[arg(long)]
    commodity: Option<String>,
    #[arg(long)]
    by_count: bool,
}

fn init_tracing(config: &Config) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(config.log_filter.as_deref().unwrap_or(DEFAULT_LOG_FILTER))
    });
    fmt().with_env_filter(filter).with_writer(io::stderr).init();
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = Config::load_config(
        cli.config.as_ref(),
        EnvOverride {
            ledger_file: cli.file.clone(),
            ledger_bin: cli.ledger_bin.clone(),
        },
    )?;
    init_tracing(&config);

    let stdout = io::stdout();
    let mut out = stdout.lock();
    run(&cli, &config, &mut out)?;
    out.flush()?;
    Ok(())
}

fn run<W: Write>(cli: &Cli, config: &Config, out: &mut W) -> Result<()> {
    let runner = LedgerCli::new(&config.ledger.program);
    let format = Format::new(cli.json);

    if let Command::Version = cli.command {
        let version = libtallied::version(&runner).context("Couldn't query ledger version")?;
        return report::version(&version, format, out);
    }

    let file = config
        .ledger
        .file
        .as_ref()
        .ok_or(anyhow!("no ledger file given, use --file or LEDGER_FILE"))?;
    let mut cache = QueryCache::new();
    let view = cli.view.view();

    match &cli.command {
        Command::Version => Ok(()),
        Command::Balances { args } => {
            let ledger = query(&runner, file, &query_args(&view, args), Some(&mut cache))?;
            report::balances(&balance::balances(&ledger)?, format, out)
        }
        Command::Payees(ranking) | Command::Accounts(ranking) => {
            let payees = matches!(cli.command, Command::Payees(_));
            let ledger = query(&runner, file, &query_args(&view, &ranking.args), Some(&mut cache))?;
            let limit = ranking.limit.unwrap_or(config.report.limit);
            let commodity = ranking
                .commodity
                .as_deref()
                .unwrap_or(&config.report.commodity);

            let entries = match (payees, ranking.by) {
                (true, RankBy::Count) => outliers::payees_by_count(&ledger, limit)?,
                (true, RankBy::Amount) => outliers::payees_by_amount(&ledger, commodity, limit)?,
                (false, RankBy::Count) => outliers::accounts_by_count(&ledger, limit)?,
                (false, RankBy::Amount) => outliers::accounts_by_amount(&ledger, commodity, limit)?,
            };
            report::ranking(&entries, format, out)
        }
        Command::Series(args) => {
            let start = parse_date(&args.start.replace('-', "/"))
                .with_context(|| format!("Couldn't parse start date '{}'", args.start))?;
            let ledger = query(&runner, file, &view.args(), Some(&mut cache))?;
            let transactions = ledger.transactions();
            let commodity = args.commodity.as_deref();

            let samples = match (&args.payee, &args.account, args.by_count) {
                (Some(payee), _, false) => series::sample_payee(
                    transactions, payee, commodity, start, args.count, args.interval,
                ),
                (Some(payee), _, true) => series::sample_payee_by_count(
                    transactions, payee, commodity, start, args.count, args.interval,
                ),
                (None, Some(account), false) => series::sample_account(
                    transactions, account, commodity, start, args.count, args.interval,
                ),
                (None, Some(account), true) => series::sample_account_by_count(
                    transactions, account, commodity, start, args.count, args.interval,
                ),
                (None, None, _) => return Err(anyhow!("either --payee or --account is required")),
            }?;
            report::series(&samples, start, args.interval, format, out)
        }
    }
}

/// View arguments first, then whatever the user typed.
fn query_args(view: &LedgerView, extra: &[String]) -> Vec<String> {
    let mut args = view.args();
    args.extend(extra.iter().cloned());
    args
}
