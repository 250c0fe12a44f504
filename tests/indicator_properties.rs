use tickscan_core::indicators::{
    avg_band_width, bollinger_series, rsi_series, stochastic, BollingerConfig, RsiMode,
    StochasticConfig,
};
use tickscan_core::{
    FilterPredicate, IndicatorEngine, IndicatorResult, PriceBar, PriceSeries, ResultFilter,
    StochasticReading, Ticker, TradingDate,
};

fn day(offset: usize) -> TradingDate {
    let start = TradingDate::from_ymd(2023, 1, 2).expect("valid date");
    TradingDate::new(start.into_inner() + time::Duration::days(offset as i64))
}

/// Bars with the close pinned to the high, so rising closes are always the
/// period's highest high.
fn series_closing_at_high(closes: &[f64]) -> PriceSeries {
    let bars = closes
        .iter()
        .enumerate()
        .map(|(i, &close)| {
            PriceBar::new(day(i), close, close, close - 1.0, close, None).expect("bar")
        })
        .collect();
    PriceSeries::new(Ticker::parse("TEST").expect("ticker"), bars).expect("series")
}

fn series_closing_at_low(closes: &[f64]) -> PriceSeries {
    let bars = closes
        .iter()
        .enumerate()
        .map(|(i, &close)| {
            PriceBar::new(day(i), close, close + 1.0, close, close, None).expect("bar")
        })
        .collect();
    PriceSeries::new(Ticker::parse("TEST").expect("ticker"), bars).expect("series")
}

fn ramp(len: usize, start: f64, step: f64) -> Vec<f64> {
    (0..len).map(|i| start + step * i as f64).collect()
}

fn wave(len: usize) -> Vec<f64> {
    (0..len)
        .map(|i| 100.0 + 10.0 * (i as f64 / 7.0).sin() + (i % 5) as f64)
        .collect()
}

#[test]
fn flat_series_has_zero_width_and_zero_percent_b() {
    let closes = vec![100.0; 60];
    let bands = bollinger_series(&closes, BollingerConfig::default());

    for point in bands.iter().flatten() {
        assert_eq!(point.width, 0.0);
        assert_eq!(point.percent_b, 0.0);
        assert!(!point.percent_b.is_nan());
    }

    let result = IndicatorEngine::default()
        .compute(&series_closing_at_high(&closes))
        .expect("result");
    assert_eq!(result.band_width, Some(0.0));
    assert_eq!(result.percent_b, Some(0.0));
    assert_eq!(result.avg_52w_band_width, Some(0.0));
}

#[test]
fn wilder_rsi_is_100_on_rising_and_0_on_falling_closes() {
    let rising = rsi_series(&ramp(40, 100.0, 1.0), 14, RsiMode::Wilder);
    assert!(rising[..14].iter().all(Option::is_none));
    assert!(rising[14..].iter().all(|value| *value == Some(100.0)));

    let falling = rsi_series(&ramp(40, 200.0, -1.0), 14, RsiMode::Wilder);
    assert!(falling[14..].iter().all(|value| *value == Some(0.0)));
}

#[test]
fn simple_rsi_agrees_on_monotonic_extremes() {
    let rising = rsi_series(&ramp(40, 100.0, 1.0), 14, RsiMode::Simple);
    assert_eq!(rising.last().copied().flatten(), Some(100.0));

    let falling = rsi_series(&ramp(40, 200.0, -1.0), 14, RsiMode::Simple);
    assert_eq!(falling.last().copied().flatten(), Some(0.0));
}

#[test]
fn rsi_stays_within_bounds() {
    for mode in [RsiMode::Wilder, RsiMode::Simple] {
        for value in rsi_series(&wave(200), 14, mode).into_iter().flatten() {
            assert!((0.0..=100.0).contains(&value), "{mode}: {value}");
        }
    }
}

#[test]
fn stochastic_k_hits_100_at_highest_high_and_0_at_lowest_low() {
    let up = series_closing_at_high(&ramp(40, 100.0, 1.0));
    let down = series_closing_at_low(&ramp(40, 200.0, -1.0));

    for config in StochasticConfig::PRESETS {
        let high_side = stochastic(&up.highs(), &up.lows(), &up.closes(), config);
        assert_eq!(high_side.latest_k(), Some(100.0), "{config}");

        let low_side = stochastic(&down.highs(), &down.lows(), &down.closes(), config);
        assert_eq!(low_side.latest_k(), Some(0.0), "{config}");
    }
}

#[test]
fn stochastic_is_undefined_on_zero_range() {
    let closes = vec![50.0; 30];
    let lines = stochastic(&closes, &closes, &closes, StochasticConfig::FAST);
    assert_eq!(lines.latest_k(), None);
    assert_eq!(lines.latest_d(), None);
}

#[test]
fn band_width_average_over_exactly_252_bars_uses_every_defined_bar() {
    let closes = wave(252);
    let bands = bollinger_series(&closes, BollingerConfig::default());
    let widths: Vec<f64> = bands.iter().flatten().map(|point| point.width).collect();
    assert_eq!(widths.len(), 252 - 19);

    let expected = widths.iter().sum::<f64>() / widths.len() as f64;
    let actual = avg_band_width(&bands, 252).expect("average");
    assert!((actual - expected).abs() < 1e-12);
}

#[test]
fn band_width_average_uses_only_the_trailing_252_bars() {
    let closes = wave(400);
    let bands = bollinger_series(&closes, BollingerConfig::default());
    let trailing: Vec<f64> = bands[400 - 252..]
        .iter()
        .flatten()
        .map(|point| point.width)
        .collect();
    assert_eq!(trailing.len(), 252);

    let expected = trailing.iter().sum::<f64>() / 252.0;
    let actual = avg_band_width(&bands, 252).expect("average");
    assert!((actual - expected).abs() < 1e-12);
}

#[test]
fn band_width_average_on_short_history_uses_what_exists() {
    let closes = wave(30);
    let result = IndicatorEngine::default()
        .compute(&series_closing_at_high(&closes))
        .expect("result");

    let bands = bollinger_series(&closes, BollingerConfig::default());
    let widths: Vec<f64> = bands.iter().flatten().map(|point| point.width).collect();
    assert_eq!(widths.len(), 11);
    let expected = widths.iter().sum::<f64>() / 11.0;

    let actual = result.avg_52w_band_width.expect("average");
    assert!((actual - expected).abs() < 1e-12);
}

#[test]
fn breakout_after_flat_stretch_lifts_percent_b_and_width() {
    let mut closes = vec![100.0; 20];
    closes.extend([102.0, 104.0, 106.0, 108.0, 110.0]);
    let series = series_closing_at_high(&closes);

    let result = IndicatorEngine::default().compute(&series).expect("result");
    assert!(result.percent_b.expect("%B") > 0.5);

    let bands = bollinger_series(&closes, BollingerConfig::default());
    let flat_width = bands[19].expect("defined at bar 20").width;
    assert_eq!(flat_width, 0.0);
    assert!(result.band_width.expect("width") > flat_width);

    assert!(result.stoch_k("stoch_5_3_3").is_some());
    assert_eq!(result.stoch_k("stoch_20_12_12"), None);
}

fn result(symbol: &str, rsi: Option<f64>, percent_b: Option<f64>) -> IndicatorResult {
    IndicatorResult {
        ticker: Ticker::parse(symbol).expect("ticker"),
        as_of: day(0),
        current_price: 100.0,
        rsi,
        percent_b,
        band_width: Some(0.1),
        avg_52w_band_width: Some(0.2),
        ma_20: Some(101.0),
        stochastic: vec![StochasticReading {
            label: StochasticConfig::FAST.label(),
            config: StochasticConfig::FAST,
            k: Some(25.0),
            d: Some(27.0),
        }],
    }
}

fn sample_results() -> Vec<IndicatorResult> {
    vec![
        result("A", Some(35.0), Some(0.3)),
        result("B", Some(45.0), Some(0.3)),
        result("C", Some(35.0), Some(0.7)),
        result("D", None, Some(0.1)),
        result("E", Some(20.0), None),
        result("F", Some(39.99), Some(0.49)),
    ]
}

fn tickers(results: &[IndicatorResult]) -> Vec<&str> {
    results.iter().map(|result| result.ticker.as_str()).collect()
}

#[test]
fn filter_order_does_not_change_the_result_set() {
    let rsi = FilterPredicate::RsiBelow {
        threshold: FilterPredicate::DEFAULT_RSI,
    };
    let percent_b = FilterPredicate::PercentBBelow {
        threshold: FilterPredicate::DEFAULT_PERCENT_B,
    };

    let (rsi_first, _) = ResultFilter::new(vec![percent_b])
        .apply(ResultFilter::new(vec![rsi]).apply(sample_results()).0);
    let (percent_b_first, _) = ResultFilter::new(vec![rsi])
        .apply(ResultFilter::new(vec![percent_b]).apply(sample_results()).0);
    let (combined, report) = ResultFilter::new(vec![rsi, percent_b]).apply(sample_results());

    assert_eq!(tickers(&rsi_first), vec!["A", "F"]);
    assert_eq!(tickers(&rsi_first), tickers(&percent_b_first));
    assert_eq!(tickers(&rsi_first), tickers(&combined));
    assert_eq!(report.total, 6);
    assert_eq!(report.matched, 2);
}

#[test]
fn missing_values_never_pass_a_threshold() {
    let (kept, _) = ResultFilter::default()
        .with(FilterPredicate::RsiBelow { threshold: 100.0 })
        .apply(sample_results());
    assert!(!tickers(&kept).contains(&"D"));

    let (kept, _) = ResultFilter::default()
        .with(FilterPredicate::PercentBBelow { threshold: 10.0 })
        .apply(sample_results());
    assert!(!tickers(&kept).contains(&"E"));
}

#[test]
fn empty_filter_keeps_everything() {
    let (kept, report) = ResultFilter::default().apply(sample_results());
    assert_eq!(kept.len(), 6);
    assert!(!report.filter_applied);
    assert!(!report.all_filtered_out());
}
