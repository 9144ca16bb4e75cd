//! # 未署名トランザクションの構築
//!
//! ユーザーの意図（送金・リキー・アセットオプトイン・アセット送金）と
//! チェーンパラメータから、参加者全員が同じバイト列に署名できる
//! 決定的なエンコーディングの未署名トランザクションを組み立てる。
//!
//! ## エンコーディング
//! フィールド順が固定された構造体をCBOR（ciborium）で直列化する。
//! 2件以上になる場合はグループIDを計算して全トランザクションに設定する。

use base64::Engine;
use serde::{Deserialize, Serialize};
use txauth_crypto::Address;
use txauth_types::{ChainParams, TransactionIntent};

use crate::error::DraftError;

/// 最初の有効ラウンドから最後の有効ラウンドまでの幅
pub const VALIDITY_WINDOW: u64 = 1000;

/// 未署名トランザクション列を構築するトレイト。
pub trait DraftBuilder: Send + Sync {
    /// `sender` から意図を実行するトランザクション列を構築する。
    fn build(
        &self,
        sender: &str,
        intent: &TransactionIntent,
        params: &ChainParams,
    ) -> Result<Vec<Vec<u8>>, DraftError>;
}

/// 直列化される未署名トランザクション。フィールド順がエンコード順になる。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnsignedTransaction {
    #[serde(rename = "type")]
    pub tx_type: String,
    pub snd: String,
    pub fee: u64,
    pub fv: u64,
    pub lv: u64,
    #[serde(rename = "gen")]
    pub genesis_id: String,
    pub gh: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub grp: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rcv: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub amt: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rekey: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub xaid: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub arcv: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub aamt: Option<u64>,
}

impl UnsignedTransaction {
    pub fn encode(&self) -> Result<Vec<u8>, DraftError> {
        let mut bytes = Vec::new();
        ciborium::ser::into_writer(self, &mut bytes)
            .map_err(|e| DraftError::Encode(e.to_string()))?;
        Ok(bytes)
    }

    pub fn decode(bytes: &[u8]) -> Result<Self, DraftError> {
        ciborium::de::from_reader(bytes).map_err(|e| DraftError::Decode(e.to_string()))
    }
}

/// 標準の決定的ドラフトビルダー。
/// 手数料は `max(fee, min_fee)` の固定値、有効期間は `last_round` から `VALIDITY_WINDOW` ラウンド。
#[derive(Debug, Clone, Copy, Default)]
pub struct CanonicalDraftBuilder;

impl CanonicalDraftBuilder {
    fn base(
        &self,
        tx_type: &str,
        sender: &str,
        params: &ChainParams,
    ) -> Result<UnsignedTransaction, DraftError> {
        let last_valid = params
            .last_round
            .checked_add(VALIDITY_WINDOW)
            .ok_or(DraftError::RoundOverflow(params.last_round))?;
        Ok(UnsignedTransaction {
            tx_type: tx_type.to_string(),
            snd: checked_address(sender)?,
            fee: params.fee.max(params.min_fee),
            fv: params.last_round,
            lv: last_valid,
            genesis_id: params.genesis_id.clone(),
            gh: params.genesis_hash.clone(),
            grp: None,
            note: None,
            rcv: None,
            amt: None,
            rekey: None,
            xaid: None,
            arcv: None,
            aamt: None,
        })
    }

    fn payment(
        &self,
        sender: &str,
        receiver: &str,
        amount: u64,
        params: &ChainParams,
    ) -> Result<UnsignedTransaction, DraftError> {
        Ok(UnsignedTransaction {
            rcv: Some(checked_address(receiver)?),
            amt: Some(amount),
            ..self.base("pay", sender, params)?
        })
    }

    fn asset_transfer(
        &self,
        sender: &str,
        asset_id: u64,
        receiver: &str,
        amount: u64,
        params: &ChainParams,
    ) -> Result<UnsignedTransaction, DraftError> {
        Ok(UnsignedTransaction {
            xaid: Some(asset_id),
            arcv: Some(checked_address(receiver)?),
            aamt: Some(amount),
            ..self.base("axfer", sender, params)?
        })
    }
}

impl DraftBuilder for CanonicalDraftBuilder {
    fn build(
        &self,
        sender: &str,
        intent: &TransactionIntent,
        params: &ChainParams,
    ) -> Result<Vec<Vec<u8>>, DraftError> {
        let mut transactions = match intent {
            TransactionIntent::Send {
                receiver,
                amount,
                note,
            } => vec![UnsignedTransaction {
                note: note.clone(),
                ..self.payment(sender, receiver, *amount, params)?
            }],
            TransactionIntent::Rekey { auth_address } => vec![UnsignedTransaction {
                rekey: Some(checked_address(auth_address)?),
                ..self.payment(sender, sender, 0, params)?
            }],
            TransactionIntent::AssetOptIn { asset_id } => {
                vec![self.asset_transfer(sender, *asset_id, sender, 0, params)?]
            }
            TransactionIntent::AssetSend {
                asset_id,
                receiver,
                amount,
                receiver_funding,
            } => {
                let mut txs = Vec::with_capacity(2);
                if let Some(funding) = receiver_funding {
                    txs.push(self.payment(sender, receiver, *funding, params)?);
                }
                txs.push(self.asset_transfer(sender, *asset_id, receiver, *amount, params)?);
                txs
            }
        };

        if transactions.len() > 1 {
            assign_group(&mut transactions)?;
        }
        transactions.iter().map(UnsignedTransaction::encode).collect()
    }
}

/// グループ未設定のエンコードからトランザクションIDを計算し、グループIDを設定する
fn assign_group(transactions: &mut [UnsignedTransaction]) -> Result<(), DraftError> {
    let ids = transactions
        .iter()
        .map(|tx| tx.encode().map(|bytes| txauth_crypto::transaction_id(&bytes)))
        .collect::<Result<Vec<_>, _>>()?;
    let group = base64::engine::general_purpose::STANDARD.encode(txauth_crypto::group_id(&ids));
    for tx in transactions.iter_mut() {
        tx.grp = Some(group.clone());
    }
    Ok(())
}

fn checked_address(address: &str) -> Result<String, DraftError> {
    Address::decode(address)
        .map(|a| a.encode())
        .map_err(|e| DraftError::InvalidAddress {
            address: address.to_string(),
            reason: e.to_string(),
        })
}
