/*
[INPUT]:  TINKOFF_INVEST_TOKEN environment variable
[OUTPUT]: Instrument lookup, orderbook snapshot and recent candles
[POS]:    Examples - REST market data
[UPDATE]: When market endpoints change
*/

use chrono::{Duration as ChronoDuration, Utc};
use tinvest_adapter::*;

/// Example: REST market data in the sandbox
#[tokio::main]
async fn main() -> Result<()> {
    println!("=== Tinkoff Invest Market Data Example ===\n");

    let client = OpenApiClient::with_config(SecretToken::from_env()?, ClientConfig::sandbox())?;

    let apple = client.market_search_by_figi("BBG000B9XRY4").await?;
    println!("✓ {} ({}), lot {}", apple.name, apple.ticker, apple.lot);

    let book = client.market_orderbook(&apple.figi, Depth::default()).await?;
    println!("✓ orderbook: {} bids, {} asks, last {:?}", book.bids.len(), book.asks.len(), book.last_price);

    let to = Utc::now();
    let candles = client
        .market_candles(&apple.figi, to - ChronoDuration::hours(2), to, CandleInterval::FiveMinutes)
        .await?;
    println!("✓ {} candles", candles.candles.len());

    Ok(())
}
