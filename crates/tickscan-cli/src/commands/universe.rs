use serde_json::json;
use tickscan_core::universe::{AddOutcome, RemoveOutcome};
use tickscan_core::{
    CuratedUniverse, EnvelopeError, MarketCapUniverse, ProviderId, Region, TickerUniverse,
    TradingDate, UniverseError,
};
use tracing::info;

use super::{resolve_date, CommandResult, Context};
use crate::cli::UniverseArgs;
use crate::error::CliError;

/// Universe plus per-edit problems that did not stop the build.
pub struct BuiltUniverse {
    pub universe: TickerUniverse,
    pub rejected: Vec<EnvelopeError>,
}

pub async fn run(args: &UniverseArgs, context: &Context) -> Result<CommandResult, CliError> {
    let region = Region::from(args.market);
    let built = match region {
        Region::Korea => {
            let date = resolve_date(args.date.as_deref())?;
            korea(context, args.top, date).await?
        }
        Region::UnitedStates => curated(context, args.reset, &args.add, &args.remove).await?,
    };

    let source = match region {
        Region::Korea => ProviderId::Krx,
        Region::UnitedStates => ProviderId::Yahoo,
    };
    let warnings = built.universe.warnings.clone();
    let empty = built.universe.is_empty();

    Ok(CommandResult::ok(
        json!({
            "snapshot_id": built.universe.snapshot_id,
            "region": region.as_str(),
            "count": built.universe.len(),
            "results": built.universe.members,
        }),
        vec![source],
    )
    .with_warnings(warnings)
    .with_errors(built.rejected)
    .with_empty(empty))
}

pub async fn korea(
    context: &Context,
    top: Option<usize>,
    date: TradingDate,
) -> Result<BuiltUniverse, CliError> {
    let top_n = top.unwrap_or(context.config.top_n);
    if top_n == 0 {
        return Err(CliError::Command(String::from("--top must be at least 1")));
    }

    let universe = MarketCapUniverse::new(context.krx.clone(), top_n)
        .build(date)
        .await?;
    info!(snapshot = %universe.snapshot_id, members = universe.len(), "universe built");

    Ok(BuiltUniverse {
        universe,
        rejected: Vec::new(),
    })
}

/// Default U.S. list with this run's additions and removals applied in order.
pub async fn curated(
    context: &Context,
    reset: bool,
    add: &[String],
    remove: &[String],
) -> Result<BuiltUniverse, CliError> {
    let mut list = CuratedUniverse::with_default_list(context.yahoo.clone())?;
    if reset {
        list.reset();
    }

    let mut notes = Vec::new();
    let mut rejected = Vec::new();

    for symbol in add {
        match list.add(symbol).await {
            Ok(AddOutcome::Added { name }) => info!(symbol = %symbol, %name, "ticker added"),
            Ok(AddOutcome::AlreadyPresent) => {}
            Err(error) => rejected.push(rejection(symbol, &error)?),
        }
    }

    for symbol in remove {
        match list.remove(symbol) {
            Ok(RemoveOutcome::Removed) => {}
            Ok(RemoveOutcome::NotPresent) => {
                notes.push(format!("{symbol}: not in universe, nothing removed"));
            }
            Err(error) => rejected.push(rejection(symbol, &error)?),
        }
    }

    let mut universe = list.to_universe();
    universe.warnings.extend(notes);
    Ok(BuiltUniverse { universe, rejected })
}

fn rejection(symbol: &str, error: &UniverseError) -> Result<EnvelopeError, CliError> {
    let code = match error {
        UniverseError::Validation(_) => "universe.invalid_symbol",
        _ => "universe.rejected",
    };
    Ok(EnvelopeError::new(code, error.to_string())?.with_ticker(symbol.trim()))
}
