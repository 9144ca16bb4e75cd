//! # txauth 暗号処理
//!
//! トランザクション承認で使う暗号プリミティブを提供する。
//!
//! ## 暗号アルゴリズム
//! | 用途 | アルゴリズム |
//! |------|------------|
//! | 署名 | Ed25519 (`"TX" || 未署名トランザクション`) |
//! | トランザクションID | SHA-512/256 (`"TX" || 未署名トランザクション`) |
//! | グループID | SHA-512/256 (`"TG" || トランザクションID列`) |
//! | アドレス | Base32(公開鍵 + SHA-512/256チェックサム4バイト) |

pub mod address;

use ed25519_dalek::{Signer, Verifier};
use sha2::{Digest, Sha512_256};

pub use address::{is_valid_address, Address, AddressError, ADDRESS_LENGTH, PUBLIC_KEY_LENGTH};
pub use ed25519_dalek::{
    Signature as Ed25519Signature, SigningKey as Ed25519SigningKey,
    VerifyingKey as Ed25519VerifyingKey,
};

/// トランザクション署名・IDのドメイン分離プレフィックス
pub const TRANSACTION_PREFIX: &[u8] = b"TX";
/// グループIDのドメイン分離プレフィックス
pub const GROUP_PREFIX: &[u8] = b"TG";

/// 暗号処理のエラー型
#[derive(Debug, thiserror::Error)]
pub enum CryptoError {
    /// 公開鍵が曲線上の点として不正
    #[error("Ed25519公開鍵が不正です")]
    InvalidPublicKey,
    /// Ed25519署名検証エラー
    #[error("Ed25519署名検証に失敗しました")]
    SignatureVerifyError,
}

/// SHA-512/256ハッシュ計算。
pub fn sha512_256(data: &[u8]) -> [u8; 32] {
    let mut hasher = Sha512_256::new();
    hasher.update(data);
    let result = hasher.finalize();
    let mut hash = [0u8; 32];
    hash.copy_from_slice(&result);
    hash
}

/// 未署名トランザクションのIDを計算する。
pub fn transaction_id(unsigned: &[u8]) -> [u8; 32] {
    sha512_256(&prefixed(TRANSACTION_PREFIX, unsigned))
}

/// トランザクションID列からアトミックグループのIDを計算する。
/// ID列の順序がそのままグループ内の順序になる。
pub fn group_id(transaction_ids: &[[u8; 32]]) -> [u8; 32] {
    let body: Vec<u8> = transaction_ids.iter().flatten().copied().collect();
    sha512_256(&prefixed(GROUP_PREFIX, &body))
}

/// 未署名トランザクションへ署名する。
pub fn sign_transaction(signing_key: &Ed25519SigningKey, unsigned: &[u8]) -> Ed25519Signature {
    signing_key.sign(&prefixed(TRANSACTION_PREFIX, unsigned))
}

/// トランザクション署名を署名者のアドレスで検証する。
pub fn verify_transaction_signature(
    signer: &Address,
    unsigned: &[u8],
    signature: &Ed25519Signature,
) -> Result<(), CryptoError> {
    let verifying_key = Ed25519VerifyingKey::from_bytes(signer.public_key())
        .map_err(|_| CryptoError::InvalidPublicKey)?;
    verifying_key
        .verify(&prefixed(TRANSACTION_PREFIX, unsigned), signature)
        .map_err(|_| CryptoError::SignatureVerifyError)
}

/// 署名鍵に対応するアドレス
pub fn address_of(signing_key: &Ed25519SigningKey) -> Address {
    Address::from(&signing_key.verifying_key())
}

fn prefixed(prefix: &[u8], body: &[u8]) -> Vec<u8> {
    let mut message = Vec::with_capacity(prefix.len() + body.len());
    message.extend_from_slice(prefix);
    message.extend_from_slice(body);
    message
}
