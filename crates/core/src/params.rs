//! # チェーンパラメータ
//!
//! 手数料・有効ラウンド・ジェネシス情報の取得を抽象化する。

use tokio::sync::RwLock;
use txauth_types::ChainParams;

use crate::error::NetworkError;

/// チェーンパラメータを取得するトレイト。
#[async_trait::async_trait]
pub trait ChainParamSource: Send + Sync {
    /// 現在のチェーンパラメータを取得する。
    /// `use_cache` が真なら、実装はキャッシュ済みの値を返してよい。
    async fn fetch_params(&self, use_cache: bool) -> Result<ChainParams, NetworkError>;
}

/// 直近に取得したパラメータを保持するラッパー。
///
/// `use_cache = true` でキャッシュがあればそれを返し、ネットワークに触れない。
/// それ以外は内側のソースから取得し、成功した値でキャッシュを更新する。
pub struct CachedChainParams<S> {
    source: S,
    cached: RwLock<Option<ChainParams>>,
}

impl<S: ChainParamSource> CachedChainParams<S> {
    pub fn new(source: S) -> Self {
        Self {
            source,
            cached: RwLock::new(None),
        }
    }

    /// キャッシュ済みの値（未取得ならNone）
    pub async fn cached(&self) -> Option<ChainParams> {
        self.cached.read().await.clone()
    }
}

#[async_trait::async_trait]
impl<S: ChainParamSource> ChainParamSource for CachedChainParams<S> {
    async fn fetch_params(&self, use_cache: bool) -> Result<ChainParams, NetworkError> {
        if use_cache {
            if let Some(params) = self.cached.read().await.clone() {
                tracing::debug!(last_round = params.last_round, "キャッシュ済みチェーンパラメータを使用");
                return Ok(params);
            }
        }
        let params = self.source.fetch_params(false).await?;
        *self.cached.write().await = Some(params.clone());
        Ok(params)
    }
}
