use std::fs;

use tickscan_core::export::{export_to_path, read_csv, write_csv, ENGLISH_HEADERS};
use tickscan_core::{CsvLayout, ExportRow, PriceStyle};

fn row(ticker: &str, name: &str, price: f64) -> ExportRow {
    ExportRow {
        ticker: ticker.to_owned(),
        name: name.to_owned(),
        price: Some(price),
        rsi: Some(28.456_78),
        percent_b: Some(0.123_456),
        band_width: Some(0.087_654_3),
        avg_52w_band_width: Some(0.1),
        market_cap: Some(431_234_567_890_000.0),
    }
}

#[test]
fn korean_export_reads_back_at_display_precision() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("korean_stocks_analysis_20240628_153000.csv");
    let rows = vec![
        row("005930", "삼성전자", 71_500.0),
        ExportRow {
            rsi: None,
            percent_b: None,
            market_cap: None,
            ..row("000660", "SK하이닉스, 보통주", 231_000.4)
        },
    ];

    export_to_path(&path, &rows, CsvLayout::Korean, PriceStyle::Krw).expect("export");

    let text = fs::read_to_string(&path).expect("read file");
    assert!(text.starts_with('\u{feff}'));
    assert!(text.contains("\"71,500\""));
    assert!(text.contains("28.46"));
    assert!(text.contains("0.1235"));
    assert!(text.contains("\"SK하이닉스, 보통주\""));

    let back = read_csv(fs::File::open(&path).expect("open")).expect("parse");
    assert_eq!(back.len(), 2);

    let samsung = &back[0];
    assert_eq!(samsung.ticker, "005930");
    assert_eq!(samsung.name, "삼성전자");
    assert_eq!(samsung.price, Some(71_500.0));
    assert_eq!(samsung.rsi, Some(28.46));
    assert_eq!(samsung.percent_b, Some(0.1235));
    assert_eq!(samsung.band_width, Some(0.0877));
    assert_eq!(samsung.avg_52w_band_width, Some(0.1));
    assert_eq!(samsung.market_cap, Some(431_234_567_890_000.0));

    let hynix = &back[1];
    assert_eq!(hynix.name, "SK하이닉스, 보통주");
    assert_eq!(hynix.price, Some(231_000.0));
    assert_eq!(hynix.rsi, None);
    assert_eq!(hynix.percent_b, None);
    assert_eq!(hynix.market_cap, None);
}

#[test]
fn english_layout_keeps_cents_for_us_prices() {
    let mut buffer = Vec::new();
    let rows = vec![ExportRow {
        market_cap: None,
        ..row("AAPL", "Apple Inc.", 1_234.567)
    }];
    write_csv(&mut buffer, &rows, CsvLayout::English, PriceStyle::Usd).expect("write");

    let text = String::from_utf8(buffer.clone()).expect("utf8");
    let header = text.trim_start_matches('\u{feff}').lines().next().expect("header");
    assert_eq!(header, ENGLISH_HEADERS.join(","));
    assert!(text.contains("\"1,234.57\""));

    let back = read_csv(buffer.as_slice()).expect("parse");
    assert_eq!(back[0].ticker, "AAPL");
    assert_eq!(back[0].price, Some(1_234.57));
    assert_eq!(back[0].market_cap, None);
}

#[test]
fn empty_export_still_has_a_header() {
    let mut buffer = Vec::new();
    write_csv(&mut buffer, &[], CsvLayout::English, PriceStyle::Usd).expect("write");
    assert!(read_csv(buffer.as_slice()).expect("parse").is_empty());
}

#[test]
fn non_numeric_cell_reports_its_row() {
    let text = format!("{}\nAAPL,Apple,abc,,,,,\n", ENGLISH_HEADERS.join(","));
    let error = read_csv(text.as_bytes()).expect_err("must fail");
    assert!(error.to_string().contains("abc"));
}
