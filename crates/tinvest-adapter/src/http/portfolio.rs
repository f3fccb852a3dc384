/*
[INPUT]:  Broker account (optional) and access token
[OUTPUT]: Portfolio positions, currency balances, operation history, broker accounts
[POS]:    HTTP layer - account data endpoints
[UPDATE]: When adding new account endpoints or changing query parameters
*/

use chrono::{DateTime, SecondsFormat, Utc};
use reqwest::Method;

use crate::http::{OpenApiClient, Result};
use crate::types::{Currencies, InstrumentId, Operations, Portfolio, PortfolioPosition, UserAccounts};

impl OpenApiClient {
    /// Current portfolio positions
    ///
    /// GET portfolio?brokerAccountId={account}
    pub async fn portfolio(&self) -> Result<Portfolio> {
        let builder = self.account_request(Method::GET, "portfolio")?;
        self.send_json(builder).await
    }

    /// Currency balances
    ///
    /// GET portfolio/currencies?brokerAccountId={account}
    pub async fn portfolio_currencies(&self) -> Result<Currencies> {
        let builder = self.account_request(Method::GET, "portfolio/currencies")?;
        self.send_json(builder).await
    }

    /// The portfolio position for one instrument, if held
    pub async fn instrument_portfolio(&self, id: &InstrumentId) -> Result<Option<PortfolioPosition>> {
        let portfolio = self.portfolio().await?;
        Ok(portfolio
            .positions
            .into_iter()
            .find(|position| id.matches(&position.figi, position.ticker.as_deref())))
    }

    /// Account operations in `[from, to)`, optionally for one instrument
    ///
    /// GET operations?from={from}&to={to}&figi={figi}&brokerAccountId={account}
    pub async fn operations(
        &self,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
        figi: Option<&str>,
    ) -> Result<Operations> {
        let mut builder = self.account_request(Method::GET, "operations")?.query(&[
            ("from", from.to_rfc3339_opts(SecondsFormat::Secs, true)),
            ("to", to.to_rfc3339_opts(SecondsFormat::Secs, true)),
        ]);
        if let Some(figi) = figi {
            builder = builder.query(&[("figi", figi)]);
        }
        self.send_json(builder).await
    }

    /// Broker accounts of the token owner
    ///
    /// GET user/accounts
    pub async fn accounts(&self) -> Result<UserAccounts> {
        let builder = self.request(Method::GET, "user/accounts")?;
        self.send_json(builder).await
    }
}
