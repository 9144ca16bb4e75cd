//! # ローカル署名
//!
//! 端末上の鍵でトランザクションに署名する抽象インターフェース。
//! 署名は同期処理で、呼び出し側がブロッキングスレッドで実行する。

use std::collections::HashMap;

use txauth_crypto::Ed25519SigningKey;
use txauth_types::Account;

/// ローカル鍵による署名のトレイト。
pub trait LocalSigner: Send + Sync {
    /// アカウントの署名鍵でトランザクションに署名する。
    /// 鍵が無い・ハードウェア接続が無いなど署名できない場合はNone。
    fn sign(&self, account: &Account, transaction: &[u8]) -> Option<Vec<u8>>;
}

/// 署名者アドレスをキーにEd25519鍵を保持するキーストア。
/// リキー済みアカウントは認可アドレスの鍵で署名する。
#[derive(Default)]
pub struct KeyStoreSigner {
    keys: HashMap<String, Ed25519SigningKey>,
}

impl KeyStoreSigner {
    pub fn new() -> Self {
        Self::default()
    }

    /// 鍵を登録し、そのアドレスを返す。
    pub fn insert(&mut self, key: Ed25519SigningKey) -> String {
        let address = txauth_crypto::address_of(&key).encode();
        self.keys.insert(address.clone(), key);
        address
    }

    /// 32バイトのシード列から構築する
    pub fn from_seeds<'a>(seeds: impl IntoIterator<Item = &'a [u8; 32]>) -> Self {
        let mut store = Self::new();
        for seed in seeds {
            store.insert(Ed25519SigningKey::from_bytes(seed));
        }
        store
    }

    pub fn contains(&self, address: &str) -> bool {
        self.keys.contains_key(address)
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }
}

/// 秘密鍵は出力せず、保持しているアドレスだけを表示する
impl std::fmt::Debug for KeyStoreSigner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut addresses: Vec<_> = self.keys.keys().collect();
        addresses.sort();
        f.debug_struct("KeyStoreSigner")
            .field("addresses", &addresses)
            .finish()
    }
}

impl LocalSigner for KeyStoreSigner {
    fn sign(&self, account: &Account, transaction: &[u8]) -> Option<Vec<u8>> {
        let key = self.keys.get(account.signer_address())?;
        Some(txauth_crypto::sign_transaction(key, transaction).to_bytes().to_vec())
    }
}
