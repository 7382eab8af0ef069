//! L1 action signing for the venue exchange endpoint.
//!
//! Two-stage scheme:
//! 1. `action_hash` = keccak256(msgpack(action) || nonce_be || vault tag)
//! 2. EIP-712 sign the phantom `Agent { source, connectionId: action_hash }`
//!    under domain `Exchange / 1 / 1337 / 0x0`.
//!
//! Msgpack field order must match the venue's reference SDK exactly;
//! a reordered field produces a different hash and a rejected signature.

use alloy::primitives::{keccak256, Address, PrimitiveSignature, B256};
use alloy::signers::local::PrivateKeySigner;
use alloy::signers::Signer as AlloySigner;
use alloy::sol;
use alloy::sol_types::{eip712_domain, SolStruct};
use serde::Serialize;

use crate::error::{Result, VenueError};

// ============================================================================
// Wire format
// ============================================================================

/// L1 action. Only order placement is used here.
///
/// `Option` fields use `skip_serializing_if` so absent keys are omitted
/// from the msgpack map, matching the reference SDK.
#[derive(Debug, Clone, Serialize)]
pub struct Action {
    #[serde(rename = "type")]
    pub action_type: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub orders: Option<Vec<OrderWire>>,

    /// "na" for ungrouped orders.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub grouping: Option<String>,
}

impl Action {
    /// Single-order action with "na" grouping.
    #[must_use]
    pub fn single_order(order: OrderWire) -> Self {
        Self {
            action_type: "order".to_string(),
            orders: Some(vec![order]),
            grouping: Some("na".to_string()),
        }
    }
}

/// Order wire format. Field names and order follow the reference SDK.
#[derive(Debug, Clone, Serialize)]
pub struct OrderWire {
    /// Asset index.
    #[serde(rename = "a")]
    pub asset: u32,

    /// Buy (true) or sell (false).
    #[serde(rename = "b")]
    pub is_buy: bool,

    /// Limit price, pre-formatted to the venue's precision rules.
    #[serde(rename = "p")]
    pub limit_px: String,

    /// Size in base units, pre-formatted.
    #[serde(rename = "s")]
    pub sz: String,

    #[serde(rename = "r")]
    pub reduce_only: bool,

    #[serde(rename = "t")]
    pub order_type: OrderTypeWire,
}

/// Order type wire format: `{"limit": {"tif": ...}}`.
#[derive(Debug, Clone, Serialize)]
pub struct OrderTypeWire {
    pub limit: LimitOrderType,
}

impl OrderTypeWire {
    /// Immediate-or-cancel.
    #[must_use]
    pub fn ioc() -> Self {
        Self {
            limit: LimitOrderType {
                tif: "Ioc".to_string(),
            },
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct LimitOrderType {
    /// Time in force: "Ioc", "Gtc", "Alo".
    pub tif: String,
}

// ============================================================================
// Action hash
// ============================================================================

/// Compute the action hash over msgpack bytes, nonce and vault tag.
///
/// Layout: `msgpack(action) || nonce_be(8) || (0x00 | 0x01 || vault_addr)`.
/// The 0x00 tag byte is present even without a vault address.
pub fn action_hash(action: &Action, nonce: u64, vault_address: Option<Address>) -> Result<B256> {
    let mut data =
        rmp_serde::to_vec_named(action).map_err(|e| VenueError::Signing(e.to_string()))?;
    data.extend_from_slice(&nonce.to_be_bytes());
    match vault_address {
        None => data.push(0x00),
        Some(addr) => {
            data.push(0x01);
            data.extend_from_slice(addr.as_slice());
        }
    }
    Ok(keccak256(&data))
}

// ============================================================================
// Phantom agent signing
// ============================================================================

const EIP712_DOMAIN_NAME: &str = "Exchange";
const EIP712_DOMAIN_VERSION: &str = "1";
const EIP712_CHAIN_ID: u64 = 1337;
const EIP712_VERIFYING_CONTRACT: Address = Address::ZERO;

sol! {
    #[derive(Debug)]
    struct Agent {
        string source;
        bytes32 connectionId;
    }
}

/// Signs exchange actions with the venue agent key.
pub struct ExchangeSigner {
    signer: PrivateKeySigner,
    is_mainnet: bool,
}

impl ExchangeSigner {
    #[must_use]
    pub fn new(signer: PrivateKeySigner, is_mainnet: bool) -> Self {
        Self { signer, is_mainnet }
    }

    /// Address of the signing key.
    #[must_use]
    pub fn address(&self) -> Address {
        self.signer.address()
    }

    /// Sign an action for the given nonce.
    ///
    /// The signature is over the phantom agent, not the action bytes:
    /// source "a" on mainnet, "b" otherwise; connectionId = action hash.
    pub async fn sign_action(
        &self,
        action: &Action,
        nonce: u64,
        vault_address: Option<Address>,
    ) -> Result<PrimitiveSignature> {
        let hash = action_hash(action, nonce, vault_address)?;

        let domain = eip712_domain! {
            name: EIP712_DOMAIN_NAME,
            version: EIP712_DOMAIN_VERSION,
            chain_id: EIP712_CHAIN_ID,
            verifying_contract: EIP712_VERIFYING_CONTRACT,
        };
        let agent = Agent {
            source: if self.is_mainnet { "a" } else { "b" }.to_string(),
            connectionId: hash,
        };
        let signing_hash = agent.eip712_signing_hash(&domain);

        self.signer
            .sign_hash(&signing_hash)
            .await
            .map_err(|e| VenueError::Signing(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // Well-known test private key, never used in production.
    const TEST_PRIVATE_KEY: &str =
        "ac0974bec39a17e36ba4a6b4d238ff944bacb478cbed5efcae784d7bf4f2ff80";

    fn test_signer() -> PrivateKeySigner {
        let bytes = hex::decode(TEST_PRIVATE_KEY).unwrap();
        PrivateKeySigner::from_slice(&bytes).unwrap()
    }

    fn sample_action() -> Action {
        Action::single_order(OrderWire {
            asset: 4,
            is_buy: true,
            limit_px: "2000.5".to_string(),
            sz: "0.5".to_string(),
            reduce_only: false,
            order_type: OrderTypeWire::ioc(),
        })
    }

    #[test]
    fn test_order_type_serialization() {
        let json = serde_json::to_string(&OrderTypeWire::ioc()).unwrap();
        assert_eq!(json, r#"{"limit":{"tif":"Ioc"}}"#);
    }

    #[test]
    fn test_action_json_field_order() {
        let json = serde_json::to_string(&sample_action()).unwrap();
        // Field order is part of the signed bytes; type must come first.
        assert!(json.starts_with(r#"{"type":"order""#));
        assert!(json.contains(r#""grouping":"na""#));
    }

    #[test]
    fn test_action_hash_changes_with_nonce_and_vault() {
        let action = sample_action();

        let h1 = action_hash(&action, 1000, None).unwrap();
        let h2 = action_hash(&action, 1001, None).unwrap();
        let h3 = action_hash(&action, 1000, Some(Address::repeat_byte(0x42))).unwrap();

        assert_ne!(h1, h2);
        assert_ne!(h1, h3);
        assert!(!h1.is_zero());
    }

    #[tokio::test]
    async fn test_sign_action_produces_signature() {
        let signer = ExchangeSigner::new(test_signer(), false);
        let sig = signer.sign_action(&sample_action(), 1234567890, None).await.unwrap();
        assert!(!sig.r().is_zero());
        assert!(!sig.s().is_zero());
    }

    #[tokio::test]
    async fn test_signing_is_deterministic() {
        // RFC 6979 nonces: same key + same action hash = same signature.
        let signer = ExchangeSigner::new(test_signer(), true);
        let a = signer.sign_action(&sample_action(), 42, None).await.unwrap();
        let b = signer.sign_action(&sample_action(), 42, None).await.unwrap();
        assert_eq!(a.r(), b.r());
        assert_eq!(a.s(), b.s());
    }
}
