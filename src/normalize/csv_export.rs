use std::str::FromStr;

use chrono::NaiveDate;
use rust_decimal::Decimal;
use tracing::{debug, warn};

use super::{Ladder, parse_open_interest};
use crate::error::ChainError;

const EXPIRATION_FORMATS: [&str; 3] = ["%a %b %d %Y", "%Y-%m-%d", "%m/%d/%Y"];

/// Parse a CBOE option-chain CSV export.
///
/// The export opens with a few metadata lines, one of which carries
/// `Last: <spot>`, followed by a header row. Calls and puts share a row, so
/// the header has two `Open Interest` columns: calls first, puts second.
pub(super) fn parse(
    text: &str,
    ticker: &str,
    expiration: NaiveDate,
) -> Result<(Decimal, Ladder), ChainError> {
    let lines: Vec<&str> = text.lines().collect();

    let price_idx = lines
        .iter()
        .position(|l| l.contains("Last:"))
        .ok_or_else(|| ChainError::malformed(ticker, "no `Last:` price line"))?;
    let price = parse_last_price(lines[price_idx])
        .ok_or_else(|| ChainError::malformed(ticker, "unparsable `Last:` price"))?;

    let header_idx = lines
        .iter()
        .skip(price_idx + 1)
        .position(|l| l.contains("Strike") && l.contains("Open Interest"))
        .map(|i| i + price_idx + 1)
        .ok_or_else(|| ChainError::malformed(ticker, "no header row with Strike and Open Interest"))?;

    let body = lines[header_idx..].join("\n");
    let mut rdr = csv::ReaderBuilder::new()
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(body.as_bytes());

    let headers = rdr
        .headers()
        .map_err(|e| ChainError::malformed(ticker, format!("reading header: {e}")))?
        .clone();
    let strike_col = headers
        .iter()
        .position(|h| h == "Strike")
        .ok_or_else(|| ChainError::malformed(ticker, "no Strike column"))?;
    let oi_cols: Vec<usize> = headers
        .iter()
        .enumerate()
        .filter(|(_, h)| *h == "Open Interest")
        .map(|(i, _)| i)
        .collect();
    let (call_col, put_col) = match oi_cols.as_slice() {
        [] => return Err(ChainError::malformed(ticker, "no Open Interest column")),
        [calls] => {
            warn!(%ticker, "export has a single Open Interest column; treating puts as zero");
            (*calls, None)
        }
        [calls, puts, ..] => (*calls, Some(*puts)),
    };
    let expiration_col = headers.iter().position(|h| h == "Expiration Date");

    let mut ladder = Ladder::default();
    let mut skipped = 0usize;
    for (i, record) in rdr.records().enumerate() {
        let row = i + 1;
        let record = record
            .map_err(|e| ChainError::malformed(ticker, format!("row {row}: {e}")))?;
        if record.iter().all(|cell| cell.is_empty()) {
            continue;
        }

        if let Some(listed) = expiration_col
            .and_then(|c| record.get(c))
            .and_then(parse_expiration)
        {
            if listed != expiration {
                skipped += 1;
                continue;
            }
        }

        let strike_cell = record.get(strike_col).unwrap_or("");
        let strike = Decimal::from_str(strike_cell).map_err(|_| {
            ChainError::malformed(ticker, format!("row {row}: unparsable strike `{strike_cell}`"))
        })?;
        if strike <= Decimal::ZERO {
            return Err(ChainError::malformed(
                ticker,
                format!("row {row}: non-positive strike {strike}"),
            ));
        }

        let cell = |col: Option<usize>| col.and_then(|c| record.get(c)).unwrap_or("");
        let call_oi = parse_open_interest(cell(Some(call_col)))
            .map_err(|e| ChainError::malformed(ticker, format!("row {row}: {e}")))?;
        let put_oi = parse_open_interest(cell(put_col))
            .map_err(|e| ChainError::malformed(ticker, format!("row {row}: {e}")))?;

        ladder
            .add(strike, call_oi, put_oi)
            .map_err(|e| ChainError::malformed(ticker, format!("row {row}: {e}")))?;
    }

    if skipped > 0 {
        debug!(%ticker, skipped, %expiration, "skipped rows for other expirations");
    }
    if ladder.rows.is_empty() {
        return Err(ChainError::no_data(
            ticker,
            format!("export has no rows for expiration {expiration}"),
        ));
    }

    Ok((price, ladder))
}

fn parse_last_price(line: &str) -> Option<Decimal> {
    let field = line.split(',').find(|part| part.contains("Last:"))?;
    let value = field.split("Last:").nth(1)?.trim().trim_matches('"');
    Decimal::from_str(value).ok()
}

fn parse_expiration(cell: &str) -> Option<NaiveDate> {
    EXPIRATION_FORMATS
        .iter()
        .find_map(|fmt| NaiveDate::parse_from_str(cell.trim(), fmt).ok())
}
