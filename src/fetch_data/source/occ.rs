use chrono::NaiveDate;
use rust_decimal::Decimal;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OptionKind {
    Call,
    Put,
}

/// Parsed OCC option symbol, e.g. `NVDA260220C00185000`.
///
/// Layout is `ROOT YYMMDD C|P STRIKE`, the strike being eight digits in
/// thousandths of a dollar. The root may be padded or carry a leading
/// underscore/class digit, so parsing works from the right.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OccSymbol {
    pub root: String,
    pub expiration: NaiveDate,
    pub kind: OptionKind,
    pub strike: Decimal,
}

impl OccSymbol {
    pub fn parse(symbol: &str) -> Option<Self> {
        let symbol = symbol.trim();
        if symbol.len() < 16 || !symbol.is_ascii() {
            return None;
        }
        let (root, tail) = symbol.split_at(symbol.len() - 15);
        let expiration = NaiveDate::parse_from_str(&tail[..6], "%y%m%d").ok()?;
        let kind = match &tail[6..7] {
            "C" => OptionKind::Call,
            "P" => OptionKind::Put,
            _ => return None,
        };
        if !tail[7..].bytes().all(|b| b.is_ascii_digit()) {
            return None;
        }
        let thousandths: i64 = tail[7..].parse().ok()?;
        Some(OccSymbol {
            root: root.trim().trim_start_matches('_').to_string(),
            expiration,
            kind,
            strike: Decimal::new(thousandths, 3).normalize(),
        })
    }
}
