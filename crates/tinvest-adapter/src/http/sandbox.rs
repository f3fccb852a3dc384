/*
[INPUT]:  Sandbox account type and balance requests
[OUTPUT]: Registered sandbox account, seeded or cleared balances
[POS]:    HTTP layer - sandbox management endpoints
[UPDATE]: When sandbox endpoints or auto-registration change
*/

use reqwest::Method;

use crate::http::{OpenApiClient, Result};
use crate::types::{
    BrokerAccountType, Empty, SandboxRegisterRequest, SandboxSetCurrencyBalanceRequest,
    SandboxSetPositionBalanceRequest, UserAccount,
};

impl OpenApiClient {
    /// Create the sandbox account. Sandbox clients call this on their own
    /// before the first request.
    ///
    /// POST sandbox/register
    pub async fn sandbox_register(&self, broker_account_type: BrokerAccountType) -> Result<UserAccount> {
        let builder = self
            .request(Method::POST, "sandbox/register")?
            .json(&SandboxRegisterRequest { broker_account_type });
        let account: UserAccount = self.execute_json(builder).await?;
        self.mark_sandbox_registered();
        Ok(account)
    }

    /// Drop every position and balance of the sandbox account
    ///
    /// POST sandbox/clear?brokerAccountId={account}
    pub async fn sandbox_clear(&self) -> Result<()> {
        let builder = self.account_request(Method::POST, "sandbox/clear")?;
        let _: Empty = self.send_json(builder).await?;
        Ok(())
    }

    /// POST sandbox/positions/balance?brokerAccountId={account}
    pub async fn set_position_balance(&self, req: &SandboxSetPositionBalanceRequest) -> Result<()> {
        let builder = self
            .account_request(Method::POST, "sandbox/positions/balance")?
            .json(req);
        let _: Empty = self.send_json(builder).await?;
        Ok(())
    }

    /// POST sandbox/currencies/balance?brokerAccountId={account}
    pub async fn set_currencies_balance(&self, req: &SandboxSetCurrencyBalanceRequest) -> Result<()> {
        let builder = self
            .account_request(Method::POST, "sandbox/currencies/balance")?
            .json(req);
        let _: Empty = self.send_json(builder).await?;
        Ok(())
    }
}
