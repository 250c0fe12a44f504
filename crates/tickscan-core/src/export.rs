//! CSV export of scan results.
//!
//! Display formatting (thousands separators, fixed decimals, BOM) happens
//! only here. [`read_csv`] parses a file back into numbers.

use std::fs::File;
use std::io::{BufWriter, Read, Write};
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::analysis::AnalyzedTicker;
use crate::universe::Region;
use crate::{CoreError, UtcDateTime};

const BOM: &str = "\u{feff}";

pub const KOREAN_HEADERS: [&str; 8] = [
    "종목코드",
    "종목명",
    "현재가",
    "RSI",
    "볼린저밴드%B",
    "볼린저밴드폭",
    "52주볼린저밴드폭평균",
    "시가총액",
];

pub const ENGLISH_HEADERS: [&str; 8] = [
    "ticker",
    "name",
    "price",
    "rsi",
    "percent_b",
    "band_width",
    "avg_52w_band_width",
    "market_cap",
];

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CsvLayout {
    #[default]
    Korean,
    English,
}

impl CsvLayout {
    pub const fn headers(self) -> [&'static str; 8] {
        match self {
            Self::Korean => KOREAN_HEADERS,
            Self::English => ENGLISH_HEADERS,
        }
    }
}

/// Decimal places for prices.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PriceStyle {
    Krw,
    Usd,
}

impl PriceStyle {
    pub const fn for_region(region: Region) -> Self {
        match region {
            Region::Korea => Self::Krw,
            Region::UnitedStates => Self::Usd,
        }
    }

    pub const fn decimals(self) -> usize {
        match self {
            Self::Krw => 0,
            Self::Usd => 2,
        }
    }
}

/// One flat table row. `None` cells are written empty.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExportRow {
    pub ticker: String,
    pub name: String,
    pub price: Option<f64>,
    pub rsi: Option<f64>,
    pub percent_b: Option<f64>,
    pub band_width: Option<f64>,
    pub avg_52w_band_width: Option<f64>,
    pub market_cap: Option<f64>,
}

impl From<&AnalyzedTicker> for ExportRow {
    fn from(item: &AnalyzedTicker) -> Self {
        let indicators = &item.indicators;
        Self {
            ticker: item.ticker.to_string(),
            name: item.name.clone(),
            price: Some(indicators.current_price),
            rsi: indicators.rsi,
            percent_b: indicators.percent_b,
            band_width: indicators.band_width,
            avg_52w_band_width: indicators.avg_52w_band_width,
            market_cap: item.market_cap,
        }
    }
}

/// `korean_stocks_analysis_YYYYMMDD_HHMMSS.csv` / `us_stocks_analysis_…`.
pub fn export_file_name(region: Region, at: UtcDateTime) -> String {
    let prefix = match region {
        Region::Korea => "korean",
        Region::UnitedStates => "us",
    };
    format!("{prefix}_stocks_analysis_{}.csv", at.format_compact())
}

/// Formats with a fixed number of decimals and `,` thousands separators.
pub fn format_grouped(value: f64, decimals: usize) -> String {
    let fixed = format!("{:.*}", decimals, value.abs());
    let (integer, fraction) = match fixed.split_once('.') {
        Some((integer, fraction)) => (integer, Some(fraction)),
        None => (fixed.as_str(), None),
    };

    let mut grouped = String::with_capacity(fixed.len() + integer.len() / 3 + 1);
    if value.is_sign_negative() && fixed.chars().any(|ch| ch.is_ascii_digit() && ch != '0') {
        grouped.push('-');
    }
    for (i, ch) in integer.chars().enumerate() {
        if i > 0 && (integer.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(ch);
    }
    if let Some(fraction) = fraction {
        grouped.push('.');
        grouped.push_str(fraction);
    }
    grouped
}

fn cell(value: Option<f64>, render: impl Fn(f64) -> String) -> String {
    value.map(render).unwrap_or_default()
}

pub fn write_csv<W: Write>(
    mut writer: W,
    rows: &[ExportRow],
    layout: CsvLayout,
    style: PriceStyle,
) -> Result<(), CoreError> {
    writer.write_all(BOM.as_bytes())?;
    let mut csv_writer = csv::Writer::from_writer(writer);
    csv_writer.write_record(layout.headers())?;

    for row in rows {
        csv_writer.write_record([
            row.ticker.clone(),
            row.name.clone(),
            cell(row.price, |v| format_grouped(v, style.decimals())),
            cell(row.rsi, |v| format!("{v:.2}")),
            cell(row.percent_b, |v| format!("{v:.4}")),
            cell(row.band_width, |v| format!("{v:.4}")),
            cell(row.avg_52w_band_width, |v| format!("{v:.4}")),
            cell(row.market_cap, |v| format_grouped(v, 0)),
        ])?;
    }

    csv_writer.flush()?;
    Ok(())
}

pub fn export_to_path(
    path: &Path,
    rows: &[ExportRow],
    layout: CsvLayout,
    style: PriceStyle,
) -> Result<(), CoreError> {
    let file = File::create(path)?;
    write_csv(BufWriter::new(file), rows, layout, style)
}

/// Parses either header layout back into rows.
pub fn read_csv<R: Read>(mut reader: R) -> Result<Vec<ExportRow>, CoreError> {
    let mut text = String::new();
    reader.read_to_string(&mut text)?;
    let text = text.strip_prefix(BOM).unwrap_or(&text);

    let mut csv_reader = csv::Reader::from_reader(text.as_bytes());
    let headers = csv_reader.headers()?.clone();
    let known = [KOREAN_HEADERS, ENGLISH_HEADERS]
        .iter()
        .any(|layout| headers.iter().eq(layout.iter().copied()));
    if !known {
        return Err(CoreError::CsvRow {
            row: 0,
            message: format!(
                "unrecognised header: {}",
                headers.iter().collect::<Vec<_>>().join(",")
            ),
        });
    }

    let mut rows = Vec::new();
    for (index, record) in csv_reader.records().enumerate() {
        let record = record?;
        let row = index + 1;
        let field = |column: usize| record.get(column).unwrap_or_default();
        let number = |column: usize| parse_cell(field(column), row);

        rows.push(ExportRow {
            ticker: field(0).to_owned(),
            name: field(1).to_owned(),
            price: number(2)?,
            rsi: number(3)?,
            percent_b: number(4)?,
            band_width: number(5)?,
            avg_52w_band_width: number(6)?,
            market_cap: number(7)?,
        });
    }
    Ok(rows)
}

fn parse_cell(raw: &str, row: usize) -> Result<Option<f64>, CoreError> {
    let cleaned: String = raw.chars().filter(|ch| *ch != ',').collect();
    let cleaned = cleaned.trim();
    if cleaned.is_empty() {
        return Ok(None);
    }
    cleaned
        .parse::<f64>()
        .map(Some)
        .map_err(|_| CoreError::CsvRow {
            row,
            message: format!("'{raw}' is not a number"),
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn groups_thousands() {
        assert_eq!(format_grouped(71_500.0, 0), "71,500");
        assert_eq!(format_grouped(1_234_567.891, 2), "1,234,567.89");
        assert_eq!(format_grouped(999.0, 0), "999");
        assert_eq!(format_grouped(-1_000.5, 1), "-1,000.5");
    }

    #[test]
    fn writes_bom_and_korean_header() {
        let mut buffer = Vec::new();
        write_csv(&mut buffer, &[], CsvLayout::Korean, PriceStyle::Krw).expect("write");
        let text = String::from_utf8(buffer).expect("utf8");

        assert!(text.starts_with(BOM));
        assert_eq!(
            text.trim_start_matches(BOM).trim_end(),
            "종목코드,종목명,현재가,RSI,볼린저밴드%B,볼린저밴드폭,52주볼린저밴드폭평균,시가총액"
        );
    }

    #[test]
    fn file_name_uses_region_prefix() {
        let at = UtcDateTime::parse("2024-06-03T09:05:07Z").expect("timestamp");
        assert_eq!(
            export_file_name(Region::Korea, at),
            "korean_stocks_analysis_20240603_090507.csv"
        );
        assert_eq!(
            export_file_name(Region::UnitedStates, at),
            "us_stocks_analysis_20240603_090507.csv"
        );
    }

    #[test]
    fn rejects_unknown_header() {
        let err = read_csv("a,b\n1,2\n".as_bytes()).expect_err("must fail");
        assert!(matches!(err, CoreError::CsvRow { row: 0, .. }));
    }
}
