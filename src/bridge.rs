//! Wallet-bridge handshake state.
//!
//! Connecting a wallet from Telegram happens on a separate page: the bot
//! hands out a link carrying a connection id, the page asks the wallet to
//! sign a message embedding that id, and POSTs the result back. The callback
//! is verified server-side: the EIP-191 personal-sign digest is recovered to
//! a secp256k1 key and the derived address must match the claimed one.

use std::collections::HashMap;

use chrono::{DateTime, Duration, Utc};
use k256::ecdsa::{RecoveryId, Signature, VerifyingKey};
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::error::BridgeError;
use crate::executor::erc20::keccak256;

/// One in-flight or completed wallet connection.
#[derive(Debug, Clone)]
pub struct BridgeConnection {
    pub connection_id: String,
    pub creator_id: String,
    pub bot_name: String,
    pub wallet_address: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Callback payload POSTed by the bridge page.
#[derive(Debug, Clone, serde::Deserialize)]
pub struct BridgeCallback {
    pub connection_id: String,
    pub wallet_address: String,
    pub signature: String,
    pub message: String,
}

/// Publicly reportable connection state for the page's status poll.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum BridgeStatus {
    Pending,
    Connected { wallet_address: String },
}

/// In-memory store of handshake connections with TTL expiry.
pub struct BridgeStore {
    connections: RwLock<HashMap<String, BridgeConnection>>,
    ttl: Duration,
}

impl BridgeStore {
    pub fn new(ttl_secs: i64) -> Self {
        Self {
            connections: RwLock::new(HashMap::new()),
            ttl: Duration::seconds(ttl_secs),
        }
    }

    /// Open a new connection for a user and return its id.
    pub async fn begin(&self, creator_id: &str, bot_name: &str) -> String {
        let connection_id = Uuid::new_v4().simple().to_string();
        let connection = BridgeConnection {
            connection_id: connection_id.clone(),
            creator_id: creator_id.to_string(),
            bot_name: bot_name.to_string(),
            wallet_address: None,
            created_at: Utc::now(),
        };
        self.connections
            .write()
            .await
            .insert(connection_id.clone(), connection);
        connection_id
    }

    pub async fn status(&self, connection_id: &str) -> Result<BridgeStatus, BridgeError> {
        let connection = self.get_live(connection_id).await?;
        Ok(match connection.wallet_address {
            Some(wallet_address) => BridgeStatus::Connected { wallet_address },
            None => BridgeStatus::Pending,
        })
    }

    /// Verify a signed callback and mark the connection as complete.
    ///
    /// Returns the completed connection so the caller can attach the wallet
    /// to the owning session.
    pub async fn complete(&self, callback: &BridgeCallback) -> Result<BridgeConnection, BridgeError> {
        let connection = self.get_live(&callback.connection_id).await?;

        if !callback.message.contains(&connection.connection_id) {
            return Err(BridgeError::MessageMismatch(
                connection.connection_id.clone(),
            ));
        }

        let recovered = recover_personal_sign_address(&callback.message, &callback.signature)?;
        if !recovered.eq_ignore_ascii_case(&callback.wallet_address) {
            return Err(BridgeError::SignerMismatch {
                recovered,
                claimed: callback.wallet_address.clone(),
            });
        }

        let mut connections = self.connections.write().await;
        let stored = connections
            .get_mut(&callback.connection_id)
            .ok_or_else(|| BridgeError::UnknownConnection(callback.connection_id.clone()))?;
        stored.wallet_address = Some(recovered);
        Ok(stored.clone())
    }

    async fn get_live(&self, connection_id: &str) -> Result<BridgeConnection, BridgeError> {
        let mut connections = self.connections.write().await;
        let Some(connection) = connections.get(connection_id).cloned() else {
            return Err(BridgeError::UnknownConnection(connection_id.to_string()));
        };
        if Utc::now() - connection.created_at > self.ttl {
            connections.remove(connection_id);
            return Err(BridgeError::Expired(connection_id.to_string()));
        }
        Ok(connection)
    }
}

fn personal_sign_digest(message: &str) -> [u8; 32] {
    let prefixed = format!("\x19Ethereum Signed Message:\n{}{}", message.len(), message);
    keccak256(prefixed.as_bytes())
}

fn address_from_key(key: &VerifyingKey) -> String {
    let point = key.to_encoded_point(false);
    let hash = keccak256(&point.as_bytes()[1..]);
    format!("0x{}", hex::encode(&hash[12..]))
}

/// Recover the signer address of an EIP-191 `personal_sign` signature
/// (65 bytes r||s||v, v in {0, 1, 27, 28}).
pub fn recover_personal_sign_address(
    message: &str,
    signature: &str,
) -> Result<String, BridgeError> {
    let bytes = hex::decode(signature.trim_start_matches("0x"))
        .map_err(|e| BridgeError::InvalidSignature(format!("not hex: {e}")))?;
    if bytes.len() != 65 {
        return Err(BridgeError::InvalidSignature(format!(
            "expected 65 bytes, got {}",
            bytes.len()
        )));
    }

    let v = bytes[64];
    let recovery = match v {
        0 | 1 => v,
        27 | 28 => v - 27,
        other => {
            return Err(BridgeError::InvalidSignature(format!(
                "unsupported recovery byte {other}"
            )));
        }
    };
    let recovery_id = RecoveryId::try_from(recovery)
        .map_err(|e| BridgeError::InvalidSignature(e.to_string()))?;
    let signature = Signature::from_slice(&bytes[..64])
        .map_err(|e| BridgeError::InvalidSignature(e.to_string()))?;

    let digest = personal_sign_digest(message);
    let key = VerifyingKey::recover_from_prehash(&digest, &signature, recovery_id)
        .map_err(|e| BridgeError::InvalidSignature(e.to_string()))?;
    Ok(address_from_key(&key))
}

/// Message the bridge page asks the wallet to sign.
pub fn connection_message(connection_id: &str, wallet_address: &str, timestamp: i64) -> String {
    format!(
        "Connect wallet {wallet_address} to connection {connection_id} at {timestamp}"
    )
}
