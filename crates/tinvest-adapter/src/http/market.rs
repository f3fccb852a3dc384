/*
[INPUT]:  Instrument identifiers and query parameters
[OUTPUT]: Market data (instruments, order book snapshot, candle history)
[POS]:    HTTP layer - market data endpoints
[UPDATE]: When adding new market endpoints or changing response format
*/

use chrono::{DateTime, SecondsFormat, Utc};
use reqwest::Method;

use crate::http::{OpenApiClient, Result};
use crate::types::{
    CandleInterval, Candles, Depth, InstrumentId, MarketInstrument, MarketInstrumentList, Orderbook,
};

impl OpenApiClient {
    /// List tradable stocks
    ///
    /// GET market/stocks
    pub async fn market_stocks(&self) -> Result<MarketInstrumentList> {
        let builder = self.request(Method::GET, "market/stocks")?;
        self.send_json(builder).await
    }

    /// GET market/bonds
    pub async fn market_bonds(&self) -> Result<MarketInstrumentList> {
        let builder = self.request(Method::GET, "market/bonds")?;
        self.send_json(builder).await
    }

    /// GET market/etfs
    pub async fn market_etfs(&self) -> Result<MarketInstrumentList> {
        let builder = self.request(Method::GET, "market/etfs")?;
        self.send_json(builder).await
    }

    /// GET market/currencies
    pub async fn market_currencies(&self) -> Result<MarketInstrumentList> {
        let builder = self.request(Method::GET, "market/currencies")?;
        self.send_json(builder).await
    }

    /// Instruments listed under `ticker` (one per exchange)
    ///
    /// GET market/search/by-ticker?ticker={ticker}
    pub async fn market_search_by_ticker(&self, ticker: &str) -> Result<MarketInstrumentList> {
        let builder = self
            .request(Method::GET, "market/search/by-ticker")?
            .query(&[("ticker", ticker)]);
        self.send_json(builder).await
    }

    /// Search by FIGI or ticker. An unknown FIGI yields an empty list.
    pub async fn search(&self, id: &InstrumentId) -> Result<MarketInstrumentList> {
        match id {
            InstrumentId::Ticker(ticker) => self.market_search_by_ticker(ticker).await,
            InstrumentId::Figi(figi) => match self.market_search_by_figi(figi).await {
                Ok(instrument) => Ok(MarketInstrumentList {
                    total: 1,
                    instruments: vec![instrument],
                }),
                Err(err) if err.is_not_found() => Ok(MarketInstrumentList {
                    total: 0,
                    instruments: Vec::new(),
                }),
                Err(err) => Err(err),
            },
        }
    }

    /// First instrument matching `id`, if any
    pub async fn search_one(&self, id: &InstrumentId) -> Result<Option<MarketInstrument>> {
        Ok(self.search(id).await?.instruments.into_iter().next())
    }

    /// Look up an instrument by FIGI
    ///
    /// GET market/search/by-figi?figi={figi}
    pub async fn market_search_by_figi(&self, figi: &str) -> Result<MarketInstrument> {
        let builder = self
            .request(Method::GET, "market/search/by-figi")?
            .query(&[("figi", figi)]);
        self.send_json(builder).await
    }

    /// Order book snapshot
    ///
    /// GET market/orderbook?figi={figi}&depth={depth}
    pub async fn market_orderbook(&self, figi: &str, depth: Depth) -> Result<Orderbook> {
        let builder = self
            .request(Method::GET, "market/orderbook")?
            .query(&[("figi", figi.to_string()), ("depth", depth.get().to_string())]);
        self.send_json(builder).await
    }

    /// Historical candles
    ///
    /// GET market/candles?figi={figi}&from={from}&to={to}&interval={interval}
    pub async fn market_candles(
        &self,
        figi: &str,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
        interval: CandleInterval,
    ) -> Result<Candles> {
        let builder = self.request(Method::GET, "market/candles")?.query(&[
            ("figi", figi.to_string()),
            ("from", from.to_rfc3339_opts(SecondsFormat::Secs, true)),
            ("to", to.to_rfc3339_opts(SecondsFormat::Secs, true)),
            ("interval", interval.as_str().to_string()),
        ]);
        self.send_json(builder).await
    }
}
