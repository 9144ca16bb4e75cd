//! # アカウントアドレス
//!
//! アドレスは `Base32(公開鍵 || SHA-512/256(公開鍵)[28..32])` で、パディングなしの58文字になる。
//! 5ビット単位への変換は bech32 の `ToBase32` / `FromBase32` を使い、
//! 各5ビット値を RFC 4648 のアルファベットに写像する。

use bech32::{FromBase32, ToBase32};

use crate::sha512_256;

/// Ed25519公開鍵の長さ
pub const PUBLIC_KEY_LENGTH: usize = 32;
/// アドレス文字列の長さ
pub const ADDRESS_LENGTH: usize = 58;

const CHECKSUM_LENGTH: usize = 4;
const ALPHABET: &[u8; 32] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ234567";

/// アドレスのデコードエラー
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AddressError {
    #[error("アドレス長が不正です: {0}文字 (期待値: {ADDRESS_LENGTH}文字)")]
    InvalidLength(usize),
    #[error("Base32に含まれない文字です: {0:?}")]
    InvalidCharacter(char),
    #[error("Base32デコードに失敗しました: {0}")]
    Decode(String),
    #[error("チェックサムが一致しません")]
    ChecksumMismatch,
}

/// 32バイト公開鍵で表されるアカウントアドレス
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Address([u8; PUBLIC_KEY_LENGTH]);

impl Address {
    pub fn from_public_key(public_key: [u8; PUBLIC_KEY_LENGTH]) -> Self {
        Self(public_key)
    }

    pub fn public_key(&self) -> &[u8; PUBLIC_KEY_LENGTH] {
        &self.0
    }

    /// 58文字のBase32文字列へエンコードする
    pub fn encode(&self) -> String {
        let mut raw = Vec::with_capacity(PUBLIC_KEY_LENGTH + CHECKSUM_LENGTH);
        raw.extend_from_slice(&self.0);
        raw.extend_from_slice(&checksum(&self.0));
        raw.to_base32()
            .into_iter()
            .map(|group| ALPHABET[group.to_u8() as usize] as char)
            .collect()
    }

    /// Base32文字列をデコードし、チェックサムを検証する
    pub fn decode(encoded: &str) -> Result<Self, AddressError> {
        let chars: Vec<char> = encoded.chars().collect();
        if chars.len() != ADDRESS_LENGTH {
            return Err(AddressError::InvalidLength(chars.len()));
        }

        let groups = chars
            .iter()
            .map(|&c| {
                let index = ALPHABET
                    .iter()
                    .position(|&a| a as char == c)
                    .ok_or(AddressError::InvalidCharacter(c))?;
                bech32::u5::try_from_u8(index as u8)
                    .map_err(|e| AddressError::Decode(e.to_string()))
            })
            .collect::<Result<Vec<_>, _>>()?;

        // 余りの2ビットが0でなければここでエラーになる
        let raw = Vec::<u8>::from_base32(&groups).map_err(|e| AddressError::Decode(e.to_string()))?;
        if raw.len() != PUBLIC_KEY_LENGTH + CHECKSUM_LENGTH {
            return Err(AddressError::Decode(format!(
                "デコード後の長さが不正です: {}バイト",
                raw.len()
            )));
        }

        let mut public_key = [0u8; PUBLIC_KEY_LENGTH];
        public_key.copy_from_slice(&raw[..PUBLIC_KEY_LENGTH]);
        if raw[PUBLIC_KEY_LENGTH..] != checksum(&public_key) {
            return Err(AddressError::ChecksumMismatch);
        }
        Ok(Self(public_key))
    }
}

impl std::fmt::Display for Address {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.encode())
    }
}

impl std::str::FromStr for Address {
    type Err = AddressError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Address::decode(s)
    }
}

impl From<&ed25519_dalek::VerifyingKey> for Address {
    fn from(key: &ed25519_dalek::VerifyingKey) -> Self {
        Address(key.to_bytes())
    }
}

/// 文字列が有効なアドレスか（長さ・文字種・チェックサムを検証）
pub fn is_valid_address(encoded: &str) -> bool {
    Address::decode(encoded).is_ok()
}

fn checksum(public_key: &[u8; PUBLIC_KEY_LENGTH]) -> [u8; CHECKSUM_LENGTH] {
    let digest = sha512_256(public_key);
    let mut out = [0u8; CHECKSUM_LENGTH];
    out.copy_from_slice(&digest[32 - CHECKSUM_LENGTH..]);
    out
}
