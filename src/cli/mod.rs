use crate::adsense::{AdSenseClient, ReportOperations};
use crate::config::Config;
use crate::dates;
use crate::error::Result;
use crate::models::ReportQuery;
use crate::output;
use chrono::NaiveDate;
use clap::{ArgAction, Parser};
use std::ffi::OsString;
use std::io::Write;

const AFTER_HELP: &str = "\
For metrics and dimensions list, visit <https://developers.google.com/adsense/management/metrics-dimensions>
For the dates parameter, visit <https://developers.google.com/adsense/management/reporting/relative_dates>";

/// Long flags that may also be written with a single dash (`-metric`).
const LONG_FLAGS: &[&str] = &[
    "metric",
    "dimension",
    "from",
    "to",
    "account",
    "no-header",
    "force-auth",
    "help",
    "version",
];

#[derive(Parser, Debug)]
#[command(name = "adsense-report")]
#[command(about = "Print an AdSense report as tab-aligned columns", long_about = None)]
#[command(version, after_help = AFTER_HELP)]
pub struct Cli {
    /// Report metric, or several separated by commas
    #[arg(long, default_value = "EARNINGS", value_delimiter = ',')]
    pub metric: Vec<String>,

    /// Report dimension, or several separated by commas
    #[arg(long, default_value = "DATE", value_delimiter = ',')]
    pub dimension: Vec<String>,

    /// Date range, from; relative dates use this machine's calendar
    #[arg(long, default_value = "today-6d", value_parser = parse_date)]
    pub from: NaiveDate,

    /// Date range, to
    #[arg(long, default_value = "today", value_parser = parse_date)]
    pub to: NaiveDate,

    /// Account to report on, e.g. pub-1234567890 (defaults to the first account)
    #[arg(long)]
    pub account: Option<String>,

    /// Do not show header
    #[arg(long, num_args = 0..=1, require_equals = true, default_value_t = false)]
    #[arg(default_missing_value = "true", action = ArgAction::Set)]
    pub no_header: bool,

    /// Force authorization
    #[arg(long, num_args = 0..=1, require_equals = true, default_value_t = false)]
    #[arg(default_missing_value = "true", action = ArgAction::Set)]
    pub force_auth: bool,
}

fn parse_date(value: &str) -> Result<NaiveDate> {
    dates::resolve_local(value)
}

/// Rewrite single-dash long flags (`-metric X`, `-no-header`) to the
/// double-dash form clap understands. Arguments after `--` are left alone.
pub fn normalize_args<I, T>(args: I) -> Vec<OsString>
where
    I: IntoIterator<Item = T>,
    T: Into<OsString>,
{
    let mut passthrough = false;

    args.into_iter()
        .map(Into::into)
        .enumerate()
        .map(|(i, arg)| {
            if i == 0 || passthrough {
                return arg;
            }
            let Some(text) = arg.to_str() else {
                return arg;
            };
            if text == "--" {
                passthrough = true;
                return arg;
            }

            match text.strip_prefix('-') {
                Some(rest) if !rest.starts_with('-') => {
                    let name = rest.split('=').next().unwrap_or(rest);
                    match LONG_FLAGS.contains(&name) {
                        true => OsString::from(format!("-{}", text)),
                        false => arg,
                    }
                }
                _ => arg,
            }
        })
        .collect()
}

impl Cli {
    pub async fn run(&self) -> Result<()> {
        let config = Config::new()?;
        let client = AdSenseClient::new(&config, self.force_auth).await?;

        print_report(&client, &self.query(), self.no_header, &mut std::io::stdout()).await
    }

    fn query(&self) -> ReportQuery {
        let account = self.account.as_ref().map(|account| {
            match account.starts_with("accounts/") {
                true => account.clone(),
                false => format!("accounts/{}", account),
            }
        });

        ReportQuery {
            metrics: self.metric.clone(),
            dimensions: self.dimension.clone(),
            from: self.from,
            to: self.to,
            account,
        }
    }
}

async fn print_report<R, W>(
    reports: &R,
    query: &ReportQuery,
    no_header: bool,
    out: &mut W,
) -> Result<()>
where
    R: ReportOperations + Sync,
    W: Write,
{
    let result = reports.generate(query).await?;
    output::render(out, &result, no_header)?;
    Ok(())
}
