use std::path::PathBuf;

use serde_json::json;
use tickscan_core::export::{export_file_name, export_to_path};
use tickscan_core::{
    BatchReport, EngineConfig, EnvelopeError, ExportRow, FilterPredicate, PriceStyle, ProviderId,
    Region, ResultFilter, UtcDateTime,
};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use super::universe::{curated, korea};
use super::{resolve_date, CommandResult, Context};
use crate::cli::ScanArgs;
use crate::error::CliError;

pub async fn run(args: &ScanArgs, context: &Context) -> Result<CommandResult, CliError> {
    let region = Region::from(args.market);
    let date = resolve_date(args.date.as_deref())?;

    let built = match region {
        Region::Korea => korea(context, args.top, date).await?,
        Region::UnitedStates => curated(context, false, &args.add, &args.remove).await?,
    };
    let universe = built.universe;

    let rsi_mode = args
        .rsi_mode
        .map(Into::into)
        .unwrap_or(context.config.rsi_mode);
    let pipeline = context.pipeline(region, EngineConfig::default().with_rsi_mode(rsi_mode), date);

    let cancel = CancellationToken::new();
    let watcher = spawn_ctrl_c_watcher(cancel.clone());
    let report = pipeline.run(&universe, &cancel).await;
    watcher.abort();

    let filter = build_filter(args);
    let (kept, filter_report) = filter.apply(report.results.clone());
    let rows: Vec<ExportRow> = kept.iter().map(ExportRow::from).collect();

    let mut warnings = universe.warnings.clone();
    warnings.extend(batch_warnings(&report));
    if filter_report.all_filtered_out() {
        warnings.push(format!("no results matched filter: {filter}"));
    }

    let csv_path = csv_target(args, region);
    if let Some(path) = &csv_path {
        export_to_path(path, &rows, args.layout.into(), PriceStyle::for_region(region))?;
        info!(path = %path.display(), rows = rows.len(), "csv written");
    }

    let mut errors = built.rejected;
    for failure in &report.failures {
        errors.push(
            EnvelopeError::new(failure.code.clone(), failure.message.clone())?
                .with_ticker(failure.ticker.as_str()),
        );
    }

    let source = match region {
        Region::Korea => ProviderId::Krx,
        Region::UnitedStates => ProviderId::Yahoo,
    };

    Ok(CommandResult::ok(
        json!({
            "snapshot_id": universe.snapshot_id,
            "region": region.as_str(),
            "status": report.status(),
            "analyzed": report.results.len(),
            "skipped": report.skipped_count(),
            "failed": report.failed_count(),
            "cancelled": report.cancelled,
            "filter": filter.to_string(),
            "filter_report": filter_report,
            "csv_path": csv_path.as_ref().map(|path| path.display().to_string()),
            "results": rows,
        }),
        vec![source],
    )
    .with_warnings(warnings)
    .with_errors(errors)
    .with_empty(report.results.is_empty()))
}

fn spawn_ctrl_c_watcher(cancel: CancellationToken) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("interrupt received, finishing in-flight tickers");
            cancel.cancel();
        }
    })
}

fn build_filter(args: &ScanArgs) -> ResultFilter {
    let mut filter = ResultFilter::default();
    if let Some(threshold) = args.rsi_below {
        filter = filter.with(FilterPredicate::RsiBelow { threshold });
    }
    if let Some(threshold) = args.percent_b_below {
        filter = filter.with(FilterPredicate::PercentBBelow { threshold });
    }
    if args.narrow_bands {
        filter = filter.with(FilterPredicate::BandWidthBelowAverage);
    }
    if args.below_ma20 {
        filter = filter.with(FilterPredicate::PriceBelowMa20);
    }
    if args.oversold {
        filter = filter.with(FilterPredicate::all_stoch_oversold());
    }
    filter
}

fn batch_warnings(report: &BatchReport) -> Vec<String> {
    let mut warnings = Vec::new();
    let skipped = report.skipped_count();
    if skipped > 0 {
        warnings.push(format!(
            "{skipped} of {} tickers skipped for insufficient data or unknown symbol",
            report.total()
        ));
    }
    if !report.cancelled.is_empty() {
        warnings.push(format!(
            "cancelled before {} of {} tickers started",
            report.cancelled.len(),
            report.total()
        ));
    }
    warnings
}

fn csv_target(args: &ScanArgs, region: Region) -> Option<PathBuf> {
    if let Some(path) = &args.csv {
        return Some(path.clone());
    }
    args.csv_auto
        .then(|| PathBuf::from(export_file_name(region, UtcDateTime::now())))
}
