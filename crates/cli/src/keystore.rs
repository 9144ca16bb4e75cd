//! キーストアファイル。
//!
//! `{"seeds": ["<base64 32バイトシード>", ...]}` 形式のJSONを `KeyStoreSigner` へ読み込む。

use base64::Engine;
use serde::{Deserialize, Serialize};
use txauth_core::KeyStoreSigner;
use txauth_crypto::Ed25519SigningKey;

#[derive(Debug, Default, Serialize, Deserialize)]
pub struct KeystoreFile {
    pub seeds: Vec<String>,
}

fn b64() -> base64::engine::GeneralPurpose {
    base64::engine::general_purpose::STANDARD
}

/// キーストアJSONを解析する
pub fn parse_keystore(json: &str) -> anyhow::Result<KeyStoreSigner> {
    let file: KeystoreFile = serde_json::from_str(json)?;
    let mut seeds = Vec::with_capacity(file.seeds.len());
    for (index, encoded) in file.seeds.iter().enumerate() {
        let bytes = b64().decode(encoded)?;
        let seed: [u8; 32] = bytes
            .try_into()
            .map_err(|_| anyhow::anyhow!("シード{index}は32バイトである必要があります"))?;
        seeds.push(seed);
    }
    let store = KeyStoreSigner::from_seeds(seeds.iter());
    tracing::debug!(keys = store.len(), "キーストアを読み込みました");
    Ok(store)
}

/// 新しい鍵を生成し、(アドレス, Base64シード) を返す
pub fn generate() -> (String, String) {
    let key = Ed25519SigningKey::generate(&mut rand::rngs::OsRng);
    let address = txauth_crypto::address_of(&key).encode();
    (address, b64().encode(key.to_bytes()))
}
