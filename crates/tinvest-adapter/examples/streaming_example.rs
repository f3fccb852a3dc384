/*
[INPUT]:  TINKOFF_INVEST_TOKEN environment variable
[OUTPUT]: Live orderbook, candle and instrument status updates on stdout
[POS]:    Examples - streaming market data
[UPDATE]: When streaming API changes
*/

use futures_util::StreamExt;
use tinvest_adapter::*;
use tokio::time::{Duration, sleep};
use tracing_subscriber::EnvFilter;

const FIGI: &str = "BBG000B9XRY4";

/// Example: one connection, three channels
///
/// Orderbook updates go to a callback, candles arrive through an async
/// stream. Run with `RUST_LOG=tinvest_adapter=debug` to watch reconnects.
#[tokio::main]
async fn main() -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt().with_env_filter(filter).try_init();

    println!("=== Tinkoff Invest Streaming Example ===\n");

    let token = SecretToken::from_env()?;
    let client = StreamingClient::new(token)?;

    let book = client.subscribe_orderbook(
        FIGI,
        Some(Depth::new(5)?),
        Some(Box::new(|book: &OrderbookStreaming| {
            let best_bid = book.bids.first().map(|(price, _)| *price);
            let best_ask = book.asks.first().map(|(price, _)| *price);
            println!("book {}: bid {:?} ask {:?}", book.figi, best_bid, best_ask);
        })),
    );
    let status = client.subscribe_instrument_info(
        FIGI,
        Some(Box::new(|info: &InstrumentInfoStreaming| {
            println!("status {}: {:?}", info.figi, info.trade_status);
        })),
    );
    let mut candles = client.candle_updates(FIGI, Some(CandleInterval::OneMinute));

    let mut state = client.connection_state();
    tokio::spawn(async move {
        while state.changed().await.is_ok() {
            println!("connection: {:?}", *state.borrow());
        }
    });

    let reader = tokio::spawn(async move {
        while let Some(candle) = candles.next().await {
            println!("candle {} {}: close {}", candle.figi, candle.time, candle.c);
        }
    });

    sleep(Duration::from_secs(30)).await;

    book.unsubscribe();
    status.unsubscribe();
    client.shutdown().await?;
    reader.abort();

    println!("\n✓ Streaming example complete");
    Ok(())
}
