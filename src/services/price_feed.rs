use async_trait::async_trait;
use reqwest::Client;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::error::{AlertError, Result};
use crate::models::PriceSample;

/// Source of the current quote for a market (`BTC-USDT`).
///
/// A failure is always an error, never a zero or placeholder price.
#[async_trait]
pub trait PriceFeed: Send + Sync {
    async fn get_price(&self, market: &str) -> Result<PriceSample>;
}

#[derive(Clone)]
pub struct BingxClient {
    http: Client,
    base_url: String,
    api_key: String,
}

impl BingxClient {
    pub fn new(base_url: String, api_key: String) -> Self {
        Self {
            http: Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key,
        }
    }

    fn has_key(&self) -> bool {
        !self.api_key.trim().is_empty()
    }

    pub async fn ticker_price(&self, market: &str) -> Result<TickerResponse> {
        let url = format!("{}/openApi/spot/v1/ticker/price", self.base_url);

        let mut req = self.http.get(url).query(&[("symbol", market)]);
        if self.has_key() {
            req = req.header("X-BX-APIKEY", &self.api_key);
        }

        let res = req
            .send()
            .await
            .map_err(|e| AlertError::feed_unavailable(market, e.to_string()))?;

        if !res.status().is_success() {
            let status = res.status();
            let body = res.text().await.unwrap_or_default();
            return Err(AlertError::feed_unavailable(
                market,
                format!("ticker request failed: {status} {body}"),
            ));
        }

        res.json::<TickerResponse>()
            .await
            .map_err(|e| AlertError::feed_unavailable(market, e.to_string()))
    }
}

#[async_trait]
impl PriceFeed for BingxClient {
    async fn get_price(&self, market: &str) -> Result<PriceSample> {
        let res = self.ticker_price(market).await?;
        parse_ticker(market, &res)
    }
}

/// Picks the latest trade out of a ticker response.
pub fn parse_ticker(market: &str, res: &TickerResponse) -> Result<PriceSample> {
    if res.code != 0 {
        return Err(AlertError::feed_unavailable(
            market,
            format!("exchange returned code {}: {}", res.code, res.msg),
        ));
    }

    let trade = res
        .data
        .first()
        .and_then(|d| d.trades.first())
        .ok_or_else(|| AlertError::feed_unavailable(market, "no trades in response"))?;

    let price: Decimal = trade
        .price
        .trim()
        .parse()
        .map_err(|_| AlertError::invalid_sample(market, format!("unparseable price '{}'", trade.price)))?;

    PriceSample::new(market, price, trade.timestamp / 1000)
}

#[derive(Debug, Deserialize, Serialize)]
pub struct TickerResponse {
    #[serde(default)]
    pub code: i64,
    #[serde(default)]
    pub msg: String,
    #[serde(default)]
    pub data: Vec<TickerData>,
}

#[derive(Debug, Deserialize, Serialize)]
pub struct TickerData {
    pub symbol: String,
    #[serde(default)]
    pub trades: Vec<TickerTrade>,
}

#[derive(Debug, Deserialize, Serialize)]
pub struct TickerTrade {
    pub price: String,
    // milliseconds
    pub timestamp: i64,
}
