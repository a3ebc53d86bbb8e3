use chrono::NaiveDate;
use time::macros::format_description;
use tracing_subscriber::fmt::time::LocalTime;
use tracing_subscriber::EnvFilter;

use crate::args::{BrowseArgs, EnrichArgs};
use crate::file_format::TableFormat;

/// `RUST_LOG` wins when set; otherwise `info` with --verbose, `error` without.
pub fn setup_logging(verbose: bool) {
    let default_level = if verbose { "info" } else { "error" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_timer(LocalTime::new(format_description!(
            "[hour]:[minute]:[second].[subsecond digits:3]"
        )))
        .with_writer(std::io::stderr)
        .init();
}

pub fn format_number(num: usize) -> String {
    let digits = num.to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(c);
    }
    out
}

pub fn parse_date(raw: &str) -> anyhow::Result<NaiveDate> {
    NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d")
        .map_err(|e| anyhow::anyhow!("invalid date '{}' (expected YYYY-MM-DD): {}", raw, e))
}

pub fn validate_enrich_args(args: &EnrichArgs) -> anyhow::Result<()> {
    if !args.input.exists() {
        anyhow::bail!("input file not found: {:?}", args.input);
    }

    if args.input == args.output {
        anyhow::bail!("--output must differ from the input file");
    }

    TableFormat::from_path(&args.input)?;
    TableFormat::from_path(&args.output)?;

    if args.columns.iter().any(|c| c.trim().is_empty()) {
        anyhow::bail!("--columns must not contain empty names");
    }

    Ok(())
}

pub fn validate_browse_args(args: &BrowseArgs) -> anyhow::Result<()> {
    if let Some(limit) = args.limit {
        if limit == 0 {
            anyhow::bail!("--limit must be greater than 0");
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn formats_thousands() {
        assert_eq!(format_number(0), "0");
        assert_eq!(format_number(999), "999");
        assert_eq!(format_number(1000), "1,000");
        assert_eq!(format_number(1234567), "1,234,567");
    }

    #[test]
    fn parses_iso_dates() {
        assert_eq!(
            parse_date("2024-05-01").unwrap(),
            NaiveDate::from_ymd_opt(2024, 5, 1).unwrap()
        );
        assert!(parse_date("01/05/2024").is_err());
    }
}
