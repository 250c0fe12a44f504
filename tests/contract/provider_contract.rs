use std::sync::Arc;
use std::time::Duration;

use tickscan_core::{
    AlternativeMeAdapter, FearGreedSource, FixtureHttpClient, HistoryRequest, HttpClient,
    HttpError, HttpResponse, KrxAdapter, Market, MarketCapSource, MarketCapUniverse, Period,
    PriceHistorySource, ProviderId, RequestThrottle, RetryPolicy, SourceErrorKind, SymbolLookup,
    Ticker, TradingDate, UniverseError, YahooAdapter, MIN_BARS,
};

#[derive(Clone)]
struct ProviderCase {
    id: ProviderId,
    source: Arc<dyn PriceHistorySource>,
    symbol: &'static str,
}

fn mock_cases() -> Vec<ProviderCase> {
    vec![
        ProviderCase {
            id: ProviderId::Krx,
            source: Arc::new(KrxAdapter::default()),
            symbol: "005930",
        },
        ProviderCase {
            id: ProviderId::Yahoo,
            source: Arc::new(YahooAdapter::default()),
            symbol: "AAPL",
        },
    ]
}

fn ticker(symbol: &str) -> Ticker {
    Ticker::parse(symbol).expect("valid ticker")
}

fn date(raw: &str) -> TradingDate {
    TradingDate::parse(raw).expect("valid date")
}

fn krx_january() -> HistoryRequest {
    HistoryRequest::new(ticker("005930"), date("2024-01-01"), date("2024-01-31")).expect("range")
}

fn yahoo_january_february() -> HistoryRequest {
    HistoryRequest::new(ticker("AAPL"), date("2024-01-01"), date("2024-02-29")).expect("range")
}

fn krx(client: FixtureHttpClient) -> KrxAdapter {
    KrxAdapter::with_http_client(Arc::new(client), Some(String::from("test-key")))
        .with_retry(RetryPolicy::no_retry())
}

fn yahoo(client: FixtureHttpClient) -> YahooAdapter {
    YahooAdapter::with_http_client(Arc::new(client)).with_retry(RetryPolicy::no_retry())
}

/// Yahoo chart body with one bar per calendar day from 2024-01-02.
fn yahoo_chart(days: usize) -> String {
    let first = 1_704_205_800_i64;
    let timestamps: Vec<String> = (0..days)
        .map(|i| (first + i as i64 * 86_400).to_string())
        .collect();
    let closes: Vec<String> = (0..days).map(|i| format!("{:.2}", 180.0 + i as f64)).collect();
    let highs: Vec<String> = (0..days).map(|i| format!("{:.2}", 182.0 + i as f64)).collect();
    let lows: Vec<String> = (0..days).map(|i| format!("{:.2}", 178.0 + i as f64)).collect();

    format!(
        r#"{{"chart":{{"result":[{{"meta":{{"currency":"USD","symbol":"AAPL","longName":"Apple Inc.","exchangeName":"NMS","instrumentType":"EQUITY","gmtoffset":0}},"timestamp":[{ts}],"indicators":{{"quote":[{{"open":[{c}],"high":[{h}],"low":[{l}],"close":[{c}],"volume":[]}}]}}}}],"error":null}}}}"#,
        ts = timestamps.join(","),
        c = closes.join(","),
        h = highs.join(","),
        l = lows.join(","),
    )
}

/// KRX daily rows for 2024-01-02.. in reverse order, plus one malformed row.
fn krx_ohlcv_rows(days: usize) -> String {
    let mut rows: Vec<String> = (0..days)
        .rev()
        .map(|i| {
            let close = 70_000 + i * 100;
            format!(
                r#"{{"TRD_DD":"2024/01/{:02}","TDD_OPNPRC":"{}","TDD_HGPRC":"{}","TDD_LWPRC":"{}","TDD_CLSPRC":"{}","ACC_TRDVOL":"1,000"}}"#,
                i + 2,
                group(close),
                group(close + 500),
                group(close - 500),
                group(close),
            )
        })
        .collect();
    rows.push(String::from(r#"{"TRD_DD":"2024/01/31","TDD_CLSPRC":"-"}"#));
    format!(r#"{{"OutBlock_1":[{}]}}"#, rows.join(","))
}

fn group(value: usize) -> String {
    let digits = value.to_string();
    let mut out = String::new();
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(ch);
    }
    out
}

#[tokio::test]
async fn mock_history_meets_minimum_for_all_providers() {
    let end = date("2024-06-28");
    for case in mock_cases() {
        let request = HistoryRequest::lookback(ticker(case.symbol), end, 150);
        let series = case
            .source
            .fetch_ohlcv(request.clone())
            .await
            .unwrap_or_else(|error| panic!("provider '{}' failed: {error}", case.id));

        assert_eq!(case.source.id(), case.id);
        assert!(series.len() >= MIN_BARS, "provider '{}': bar count", case.id);
        assert!(
            series.bars().windows(2).all(|pair| pair[0].date < pair[1].date),
            "provider '{}': bars must ascend",
            case.id
        );
        assert!(
            series
                .bars()
                .iter()
                .all(|bar| bar.date >= request.start && bar.date <= request.end),
            "provider '{}': bars inside window",
            case.id
        );
    }
}

#[tokio::test]
async fn mock_history_is_deterministic() {
    let request = HistoryRequest::lookback(ticker("NVDA"), date("2024-06-28"), 150);
    let adapter = YahooAdapter::default();

    let first = adapter.fetch_ohlcv(request.clone()).await.expect("first");
    let second = adapter.fetch_ohlcv(request).await.expect("second");
    assert_eq!(first, second);
}

#[tokio::test]
async fn mock_history_shorter_than_minimum_is_insufficient_data() {
    for case in mock_cases() {
        let request = HistoryRequest::lookback(ticker(case.symbol), date("2024-06-28"), 10);
        let error = case
            .source
            .fetch_ohlcv(request)
            .await
            .expect_err("ten calendar days cannot hold twenty bars");
        assert_eq!(
            error.kind(),
            SourceErrorKind::InsufficientData,
            "provider '{}'",
            case.id
        );
        assert!(error.is_skip());
    }
}

#[tokio::test]
async fn krx_rows_are_sorted_and_malformed_rows_dropped() {
    let adapter = krx(FixtureHttpClient::new().with_json("stk_isu_ohlcv", krx_ohlcv_rows(25)));
    let request = krx_january();

    let series = adapter.fetch_ohlcv(request).await.expect("series");

    assert_eq!(series.len(), 25);
    assert_eq!(series.bars()[0].date, date("2024-01-02"));
    assert_eq!(series.bars()[0].close, 70_000.0);
    assert_eq!(series.bars()[24].close, 72_400.0);
    assert_eq!(series.bars()[0].volume, Some(1_000));
}

#[tokio::test]
async fn krx_sends_auth_header_and_compact_dates() {
    let client = Arc::new(FixtureHttpClient::new().with_json("stk_isu_ohlcv", krx_ohlcv_rows(20)));
    let adapter = KrxAdapter::with_http_client(client.clone(), Some(String::from("secret")))
        .with_retry(RetryPolicy::no_retry());
    let request = krx_january();

    adapter.fetch_ohlcv(request).await.expect("series");

    let sent = client.requests();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].headers.get("auth_key").map(String::as_str), Some("secret"));
    let url = sent[0].full_url();
    assert!(url.contains("isuCd=005930"), "{url}");
    assert!(url.contains("strtDd=20240101"), "{url}");
    assert!(url.contains("endDd=20240131"), "{url}");
}

#[tokio::test]
async fn krx_without_key_is_invalid_request_not_mock_data() {
    let adapter = KrxAdapter::with_http_client(Arc::new(FixtureHttpClient::new()), None);
    let request = HistoryRequest::lookback(ticker("005930"), date("2024-06-28"), 352);

    let error = adapter.fetch_ohlcv(request).await.expect_err("no key");
    assert_eq!(error.code(), "source.invalid_request");
    assert!(!adapter.is_mock());
}

#[tokio::test]
async fn krx_status_codes_map_to_error_kinds() {
    let cases = [
        (401, SourceErrorKind::InvalidRequest),
        (404, SourceErrorKind::NotFound),
        (429, SourceErrorKind::RateLimited),
        (503, SourceErrorKind::Unavailable),
    ];

    for (status, expected) in cases {
        let adapter = krx(FixtureHttpClient::new().with_response(
            "stk_isu_ohlcv",
            HttpResponse::with_status(status, "{}"),
        ));
        let request = HistoryRequest::lookback(ticker("005930"), date("2024-06-28"), 30);
        let error = adapter.fetch_ohlcv(request).await.expect_err("status error");
        assert_eq!(error.kind(), expected, "status {status}");
    }
}

#[tokio::test]
async fn krx_transport_timeout_is_retryable() {
    let adapter = krx(
        FixtureHttpClient::new()
            .with_error("stk_isu_ohlcv", HttpError::timeout("deadline elapsed")),
    );
    let request = HistoryRequest::lookback(ticker("005930"), date("2024-06-28"), 30);

    let error = adapter.fetch_ohlcv(request).await.expect_err("timeout");
    assert_eq!(error.kind(), SourceErrorKind::Timeout);
    assert!(error.retryable());
}

#[tokio::test]
async fn krx_market_caps_accept_localized_labels() {
    let body = r#"{"OutBlock_1":[
        {"종목코드":"005930","종목명":"삼성전자","시가총액":"430,000,000,000,000"},
        {"종목코드":"000660","종목명":"SK하이닉스","시가총액":"120,000,000,000,000"},
        {"종목코드":"999999","종목명":"정지","시가총액":"0"}
    ]}"#;
    let adapter = krx(FixtureHttpClient::new().with_json("stk_bydd_trd", body));

    let snapshot = adapter
        .market_caps(date("2024-06-28"), Market::Kospi)
        .await
        .expect("snapshot");

    assert_eq!(snapshot.entries.len(), 2);
    assert_eq!(snapshot.entries[0].name.as_deref(), Some("삼성전자"));
    assert_eq!(snapshot.entries[0].market_cap, 430_000_000_000_000.0);

    let name = adapter.ticker_name(ticker("000660")).await.expect("cached name");
    assert_eq!(name, "SK하이닉스");
}

#[tokio::test]
async fn universe_survives_one_failing_sub_market() {
    let kospi = r#"{"OutBlock_1":[
        {"ISU_SRT_CD":"000660","ISU_ABBRV":"SK하이닉스","MKTCAP":"100"},
        {"ISU_SRT_CD":"005930","ISU_ABBRV":"삼성전자","MKTCAP":"300"},
        {"ISU_SRT_CD":"005380","ISU_ABBRV":"현대차","MKTCAP":"100"}
    ]}"#;
    let client = FixtureHttpClient::new()
        .with_json("stk_bydd_trd", kospi)
        .with_response("ksq_bydd_trd", HttpResponse::with_status(503, "busy"));
    let adapter = Arc::new(krx(client));

    let universe = MarketCapUniverse::new(adapter, 2)
        .build(date("2024-06-28"))
        .await
        .expect("partial snapshot still builds");

    let tickers: Vec<&str> = universe.members.iter().map(|m| m.ticker.as_str()).collect();
    assert_eq!(tickers, vec!["005930", "000660"]);
    assert_eq!(universe.snapshot_id, "kr-20240628-top2");
    assert!(universe.warnings.iter().any(|w| w.contains("kosdaq")));
}

#[tokio::test]
async fn krx_retries_each_take_a_throttle_permit() {
    let body = r#"{"OutBlock_1":[
        {"ISU_SRT_CD":"005930","ISU_ABBRV":"삼성전자","MKTCAP":"300"}
    ]}"#;
    let client = Arc::new(
        FixtureHttpClient::new()
            .with_response("stk_bydd_trd", HttpResponse::with_status(503, "busy"))
            .with_response("stk_bydd_trd", HttpResponse::with_status(429, "slow down"))
            .with_json("stk_bydd_trd", body),
    );
    let throttle = RequestThrottle::per_second(1_000);
    let adapter = KrxAdapter::with_http_client(client.clone(), Some(String::from("test-key")))
        .with_retry(RetryPolicy::fixed(Duration::from_millis(1), 3))
        .with_throttle(throttle.clone());

    let snapshot = adapter
        .market_caps(date("2024-06-28"), Market::Kospi)
        .await
        .expect("third attempt succeeds");

    assert_eq!(snapshot.entries.len(), 1);
    assert_eq!(client.requests().len(), 3);
    assert_eq!(throttle.granted(), 3);
}

#[tokio::test]
async fn yahoo_retries_each_take_a_throttle_permit() {
    let client = Arc::new(
        FixtureHttpClient::new()
            .with_error("chart/AAPL", HttpError::timeout("deadline elapsed"))
            .with_response("chart/AAPL", HttpResponse::with_status(502, "bad gateway"))
            .with_json("chart/AAPL", yahoo_chart(5)),
    );
    let throttle = RequestThrottle::per_second(1_000);
    let adapter = YahooAdapter::with_http_client(client.clone())
        .with_retry(RetryPolicy::fixed(Duration::from_millis(1), 3))
        .with_throttle(throttle.clone());

    adapter.lookup(ticker("AAPL")).await.expect("profile after two failures");

    assert_eq!(client.requests().len(), 3);
    assert_eq!(throttle.granted(), 3);
}

#[tokio::test]
async fn adapters_sharing_a_throttle_share_its_permits() {
    let throttle = RequestThrottle::per_second(1_000);
    let krx_client =
        Arc::new(FixtureHttpClient::new().with_json("stk_isu_ohlcv", krx_ohlcv_rows(20)));
    let yahoo_client =
        Arc::new(FixtureHttpClient::new().with_json("chart/AAPL", yahoo_chart(25)));
    let krx = KrxAdapter::with_http_client(krx_client, Some(String::from("test-key")))
        .with_throttle(throttle.clone());
    let yahoo = YahooAdapter::with_http_client(yahoo_client).with_throttle(throttle.clone());

    krx.fetch_ohlcv(krx_january()).await.expect("krx series");
    yahoo
        .fetch_ohlcv(yahoo_january_february())
        .await
        .expect("yahoo series");

    assert_eq!(throttle.granted(), 2);
}

#[tokio::test]
async fn krx_name_lookup_falls_through_to_kosdaq_when_kospi_fails() {
    let kosdaq = r#"{"OutBlock_1":[
        {"ISU_SRT_CD":"247540","ISU_ABBRV":"에코프로비엠"}
    ]}"#;
    let client = Arc::new(
        FixtureHttpClient::new()
            .with_response("stk_isu_base_info", HttpResponse::with_status(503, "busy"))
            .with_json("ksq_isu_base_info", kosdaq),
    );
    let adapter = KrxAdapter::with_http_client(client.clone(), Some(String::from("test-key")))
        .with_retry(RetryPolicy::no_retry())
        .with_base_url("https://krx.test/openapi/");

    let name = adapter
        .ticker_name(ticker("247540"))
        .await
        .expect("kosdaq answers");

    assert_eq!(name, "에코프로비엠");
    let urls: Vec<String> = client.requests().iter().map(|r| r.full_url()).collect();
    assert_eq!(urls.len(), 2);
    assert!(urls[0].starts_with("https://krx.test/openapi/stk_isu_base_info?"));
    assert!(urls[1].starts_with("https://krx.test/openapi/ksq_isu_base_info?"));
}

#[tokio::test]
async fn krx_name_lookup_reports_the_upstream_error_when_no_market_answers() {
    let client = FixtureHttpClient::new()
        .with_response("stk_isu_base_info", HttpResponse::with_status(503, "busy"))
        .with_json("ksq_isu_base_info", r#"{"OutBlock_1":[]}"#);

    let error = krx(client)
        .ticker_name(ticker("247540"))
        .await
        .expect_err("no name anywhere");

    assert_eq!(error.kind(), SourceErrorKind::Unavailable);
}

#[tokio::test]
async fn universe_fails_when_every_sub_market_fails() {
    let client = FixtureHttpClient::new()
        .with_response("stk_bydd_trd", HttpResponse::with_status(503, "busy"))
        .with_response("ksq_bydd_trd", HttpResponse::with_status(503, "busy"));

    let error = MarketCapUniverse::new(Arc::new(krx(client)), 50)
        .build(date("2024-06-28"))
        .await
        .expect_err("no snapshot");

    match error {
        UniverseError::SnapshotUnavailable { failures, .. } => assert_eq!(failures.len(), 2),
        other => panic!("unexpected error: {other}"),
    }
}

#[tokio::test]
async fn yahoo_chart_parses_into_ascending_series() {
    let adapter = yahoo(FixtureHttpClient::new().with_json("chart/AAPL", yahoo_chart(25)));
    let request = yahoo_january_february();

    let series = adapter.fetch_ohlcv(request).await.expect("series");

    assert_eq!(series.len(), 25);
    assert_eq!(series.bars()[0].date, date("2024-01-02"));
    assert_eq!(series.bars()[24].close, 204.0);
    assert_eq!(series.bars()[0].volume, None);
}

#[tokio::test]
async fn yahoo_short_chart_is_insufficient_data() {
    let adapter = yahoo(FixtureHttpClient::new().with_json("chart/AAPL", yahoo_chart(12)));
    let request = yahoo_january_february();

    let error = adapter.fetch_ohlcv(request).await.expect_err("too short");
    assert_eq!(error.kind(), SourceErrorKind::InsufficientData);
}

#[tokio::test]
async fn yahoo_unknown_symbol_is_not_found() {
    let body = r#"{"chart":{"result":null,"error":{"code":"Not Found","description":"No data found, symbol may be delisted"}}}"#;
    let adapter = yahoo(
        FixtureHttpClient::new().with_response("chart/ZZZZ", HttpResponse::with_status(404, body)),
    );

    let error = adapter
        .lookup(ticker("ZZZZ"))
        .await
        .expect_err("unknown symbol");
    assert_eq!(error.kind(), SourceErrorKind::NotFound);
}

#[tokio::test]
async fn yahoo_lookup_reads_profile_from_chart_meta() {
    let adapter = yahoo(FixtureHttpClient::new().with_json("chart/AAPL", yahoo_chart(5)));

    let profile = adapter.lookup(ticker("AAPL")).await.expect("profile");
    assert_eq!(profile.name.as_deref(), Some("Apple Inc."));
    assert_eq!(profile.exchange.as_deref(), Some("NMS"));
    assert!(profile.is_identified());
}

#[tokio::test]
async fn yahoo_quote_history_requests_range_and_skips_minimum() {
    let client = Arc::new(FixtureHttpClient::new().with_json("chart/%5EVIX", yahoo_chart(2)));
    let adapter =
        YahooAdapter::with_http_client(client.clone()).with_retry(RetryPolicy::no_retry());

    let series = adapter
        .quote_history(ticker("^VIX"), Period::parse("5d").expect("period"))
        .await
        .expect("two bars are enough for quotes");

    assert_eq!(series.len(), 2);
    assert!(client.requests()[0].full_url().contains("range=5d"));
}

#[tokio::test]
async fn fear_greed_parses_latest_and_previous() {
    let body = r#"{"name":"Fear and Greed Index","data":[
        {"value":"72","value_classification":"Greed","timestamp":"1718064000"},
        {"value":"18","value_classification":"Extreme Fear","timestamp":"1717977600"}
    ]}"#;
    let client: Arc<dyn HttpClient> =
        Arc::new(FixtureHttpClient::new().with_json("api.alternative.me/fng/", body));
    let adapter = AlternativeMeAdapter::with_http_client(client);

    let history = adapter.fear_greed().await.expect("history");
    assert_eq!(history.latest.value, 72);
    assert_eq!(history.latest.classification, "Greed");
    assert_eq!(history.previous.map(|reading| reading.value), Some(18));
}

#[tokio::test]
async fn fear_greed_mock_is_within_range() {
    let history = AlternativeMeAdapter::default()
        .fear_greed()
        .await
        .expect("mock history");
    assert!(history.latest.value <= 100);
    assert!(!history.latest.classification.is_empty());
}
