//! HTTP venue gateway for the Hyperliquid REST API.
//!
//! Reads go through the `/info` endpoint, order placement through the
//! signed `/exchange` endpoint. Orders are immediate-or-cancel limit
//! orders priced off the current mid with a slippage allowance, which
//! gives market-like execution with a bounded worst fill.

use std::collections::HashMap;
use std::time::Duration;

use alloy::primitives::Address;
use chrono::Utc;
use parking_lot::RwLock;
use reqwest::Client;
use rust_decimal::{Decimal, RoundingStrategy};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use vault_core::Usd;

use crate::error::{Result, VenueError};
use crate::gateway::{BoxFuture, VenueGateway};
use crate::signer::{Action, ExchangeSigner, OrderTypeWire, OrderWire};
use crate::types::{AccountSnapshot, OrderRequest, RawClearinghouseState, RawFill, VenueFill};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Venue-enforced minimum order notional in USD. Orders below this are
/// rejected outright, so undersized orders are bumped up to it.
const MIN_ORDER_NOTIONAL: Decimal = Decimal::from_parts(10, 0, 0, false, 0);

/// Prices carry at most 5 significant figures.
const MAX_PRICE_SIG_FIGS: i32 = 5;

/// Perp prices allow at most `6 - szDecimals` decimal places.
const MAX_PRICE_FIELD_DECIMALS: u32 = 6;

#[derive(Debug, Clone, Copy)]
struct AssetInfo {
    index: u32,
    sz_decimals: u32,
}

/// [`VenueGateway`] implementation over the venue REST API.
pub struct HyperliquidGateway {
    client: Client,
    info_url: String,
    exchange_url: String,
    user_address: Address,
    /// Set when trading on behalf of a venue vault/subaccount; included
    /// in both the action hash and the request payload.
    vault_address: Option<Address>,
    signer: ExchangeSigner,
    assets: RwLock<HashMap<String, AssetInfo>>,
}

impl HyperliquidGateway {
    /// Build a gateway for `api_url` (e.g. "https://api.hyperliquid.xyz").
    pub fn new(
        api_url: &str,
        signer: ExchangeSigner,
        user_address: Address,
        vault_address: Option<Address>,
    ) -> Result<Self> {
        let client = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| VenueError::Transport(e.to_string()))?;
        let base = api_url.trim_end_matches('/');
        Ok(Self {
            client,
            info_url: format!("{base}/info"),
            exchange_url: format!("{base}/exchange"),
            user_address,
            vault_address,
            signer,
            assets: RwLock::new(HashMap::new()),
        })
    }

    async fn post_info<T: DeserializeOwned>(&self, body: &impl Serialize) -> Result<T> {
        let response = self.client.post(&self.info_url).json(body).send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(VenueError::Api(format!("HTTP {status}: {body}")));
        }
        response
            .json()
            .await
            .map_err(|e| VenueError::MalformedResponse(e.to_string()))
    }

    /// Resolve asset index and size precision for `coin`, fetching the
    /// exchange meta on first use.
    async fn asset_info(&self, coin: &str) -> Result<AssetInfo> {
        if let Some(info) = self.assets.read().get(coin) {
            return Ok(*info);
        }

        let meta: RawMeta = self
            .post_info(&InfoRequest { request_type: "meta" })
            .await?;
        let mut assets = self.assets.write();
        for (idx, entry) in meta.universe.iter().enumerate() {
            assets.insert(
                entry.name.clone(),
                AssetInfo {
                    index: idx as u32,
                    sz_decimals: entry.sz_decimals,
                },
            );
        }
        debug!(asset_count = assets.len(), "Loaded exchange meta");

        assets
            .get(coin)
            .copied()
            .ok_or_else(|| VenueError::UnknownAsset(coin.to_string()))
    }

    async fn mid_price(&self, coin: &str) -> Result<Decimal> {
        let mids: HashMap<String, Decimal> = self
            .post_info(&InfoRequest {
                request_type: "allMids",
            })
            .await?;
        let mid = mids
            .get(coin)
            .copied()
            .ok_or_else(|| VenueError::MalformedResponse(format!("no mid price for {coin}")))?;
        if mid <= Decimal::ZERO {
            return Err(VenueError::MalformedResponse(format!(
                "non-positive mid price for {coin}: {mid}"
            )));
        }
        Ok(mid)
    }

    async fn place_order_inner(&self, request: OrderRequest) -> Result<u64> {
        let asset = self.asset_info(&request.coin).await?;
        let mid = self.mid_price(&request.coin).await?;
        let is_buy = request.side.is_buy();

        // Aggressive limit: mid shifted by the slippage allowance. IOC,
        // so anything beyond this price is cancelled rather than filled.
        let slip = Decimal::from(request.max_slippage_bps) / Decimal::from(10_000);
        let raw_px = if is_buy {
            mid * (Decimal::ONE + slip)
        } else {
            mid * (Decimal::ONE - slip)
        };
        let px = round_price(raw_px, asset.sz_decimals, is_buy);

        let mut sz = (request.size_usd.inner() / mid)
            .round_dp_with_strategy(asset.sz_decimals, RoundingStrategy::ToZero);
        if !request.reduce_only && sz * mid < MIN_ORDER_NOTIONAL {
            // Bump to the venue minimum rather than get rejected.
            sz = (MIN_ORDER_NOTIONAL / mid)
                .round_dp_with_strategy(asset.sz_decimals, RoundingStrategy::AwayFromZero);
            debug!(
                coin = %request.coin,
                requested = %request.size_usd,
                "Order below venue minimum, bumped to min notional"
            );
        }
        if sz <= Decimal::ZERO {
            return Err(VenueError::OrderRejected(format!(
                "size rounds to zero for {} at notional {}",
                request.coin, request.size_usd
            )));
        }

        let action = Action::single_order(OrderWire {
            asset: asset.index,
            is_buy,
            limit_px: format_decimal(px),
            sz: format_decimal(sz),
            reduce_only: request.reduce_only,
            order_type: OrderTypeWire::ioc(),
        });

        let nonce = Utc::now().timestamp_millis() as u64;
        let signature = self
            .signer
            .sign_action(&action, nonce, self.vault_address)
            .await?;

        let payload = ExchangePayload {
            action: &action,
            nonce,
            signature: SignatureWire {
                r: format!("0x{:064x}", signature.r()),
                s: format!("0x{:064x}", signature.s()),
                v: if signature.v() { 28 } else { 27 },
            },
            vault_address: self.vault_address.map(|a| a.to_string()),
        };

        let response = self
            .client
            .post(&self.exchange_url)
            .json(&payload)
            .send()
            .await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(VenueError::Api(format!("HTTP {status}: {body}")));
        }
        let body: ExchangeResponse = response
            .json()
            .await
            .map_err(|e| VenueError::MalformedResponse(e.to_string()))?;

        if body.status != "ok" {
            return Err(VenueError::OrderRejected(body.response.to_string()));
        }

        let parsed: ExchangeResponseBody = serde_json::from_value(body.response)
            .map_err(|e| VenueError::MalformedResponse(e.to_string()))?;
        let first = parsed
            .data
            .and_then(|d| d.statuses.into_iter().next())
            .ok_or_else(|| VenueError::MalformedResponse("empty order status list".into()))?;

        if let Some(reason) = first.error {
            return Err(VenueError::OrderRejected(reason));
        }
        let oid = first
            .filled
            .or(first.resting)
            .map(|s| s.oid)
            .ok_or_else(|| VenueError::MalformedResponse("order status without oid".into()))?;

        debug!(coin = %request.coin, side = %request.side, oid, "Order accepted");
        Ok(oid)
    }

    async fn fetch_account_state_inner(&self) -> Result<AccountSnapshot> {
        let raw: RawClearinghouseState = self
            .post_info(&UserInfoRequest {
                request_type: "clearinghouseState",
                user: self.user_address.to_string(),
            })
            .await?;
        Ok(raw.into())
    }

    async fn fetch_fills_inner(&self) -> Result<Vec<VenueFill>> {
        let raw: Vec<RawFill> = self
            .post_info(&UserInfoRequest {
                request_type: "userFills",
                user: self.user_address.to_string(),
            })
            .await?;
        Ok(raw.into_iter().map(VenueFill::from).collect())
    }
}

impl VenueGateway for HyperliquidGateway {
    fn place_order(&self, request: OrderRequest) -> BoxFuture<'_, Result<u64>> {
        Box::pin(async move {
            let result = self.place_order_inner(request).await;
            if let Err(e) = &result {
                warn!(error = %e, "Order placement failed");
            }
            result
        })
    }

    fn fetch_account_state(&self) -> BoxFuture<'_, Result<AccountSnapshot>> {
        Box::pin(self.fetch_account_state_inner())
    }

    fn fetch_fills(&self) -> BoxFuture<'_, Result<Vec<VenueFill>>> {
        Box::pin(self.fetch_fills_inner())
    }
}

// ============================================================================
// Precision helpers
// ============================================================================

/// Round a price to the venue's rules: at most 5 significant figures and
/// at most `6 - szDecimals` decimal places. Buys round up and sells round
/// down so the limit stays on the aggressive side of the raw price.
fn round_price(px: Decimal, sz_decimals: u32, round_up: bool) -> Decimal {
    if px <= Decimal::ZERO {
        return px;
    }

    // Exponent of the leading digit.
    let mut exponent = 0i32;
    let mut v = px;
    while v >= Decimal::TEN {
        v /= Decimal::TEN;
        exponent += 1;
    }
    while v < Decimal::ONE {
        v *= Decimal::TEN;
        exponent -= 1;
    }

    let sig_fig_dp = (MAX_PRICE_SIG_FIGS - 1 - exponent).max(0) as u32;
    let max_dp = MAX_PRICE_FIELD_DECIMALS.saturating_sub(sz_decimals);
    let dp = sig_fig_dp.min(max_dp);

    let strategy = if round_up {
        RoundingStrategy::AwayFromZero
    } else {
        RoundingStrategy::ToZero
    };
    px.round_dp_with_strategy(dp, strategy)
}

fn format_decimal(d: Decimal) -> String {
    d.normalize().to_string()
}

/// Minimum viable order notional exposed for sizing checks upstream.
#[must_use]
pub fn min_order_notional() -> Usd {
    Usd::new(MIN_ORDER_NOTIONAL)
}

// ============================================================================
// Request / response wire structs
// ============================================================================

#[derive(Debug, Serialize)]
struct InfoRequest<'a> {
    #[serde(rename = "type")]
    request_type: &'a str,
}

#[derive(Debug, Serialize)]
struct UserInfoRequest<'a> {
    #[serde(rename = "type")]
    request_type: &'a str,
    user: String,
}

#[derive(Debug, Serialize)]
struct ExchangePayload<'a> {
    action: &'a Action,
    nonce: u64,
    signature: SignatureWire,
    #[serde(rename = "vaultAddress", skip_serializing_if = "Option::is_none")]
    vault_address: Option<String>,
}

#[derive(Debug, Serialize)]
struct SignatureWire {
    r: String,
    s: String,
    v: u64,
}

#[derive(Debug, Deserialize)]
struct RawMeta {
    universe: Vec<RawMetaEntry>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawMetaEntry {
    name: String,
    sz_decimals: u32,
}

#[derive(Debug, Deserialize)]
struct ExchangeResponse {
    status: String,
    #[serde(default)]
    response: serde_json::Value,
}

#[derive(Debug, Deserialize)]
struct ExchangeResponseBody {
    data: Option<OrderResponseData>,
}

#[derive(Debug, Deserialize)]
struct OrderResponseData {
    statuses: Vec<OrderStatusWire>,
}

#[derive(Debug, Deserialize)]
struct OrderStatusWire {
    filled: Option<OidStatus>,
    resting: Option<OidStatus>,
    error: Option<String>,
}

#[derive(Debug, Deserialize)]
struct OidStatus {
    oid: u64,
}
