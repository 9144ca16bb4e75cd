//! # algodチェーンパラメータクライアント
//!
//! `GET {algod}/v2/transactions/params` で手数料・ラウンド・ジェネシス情報を取得する。

use txauth_core::{ChainParamSource, NetworkError};
use txauth_types::ChainParams;

use crate::config::ClientConfig;
use crate::http::{read_json, transport_error};

/// algodのAPIトークンヘッダー
pub const ALGOD_TOKEN_HEADER: &str = "X-Algo-API-Token";

/// algod REST APIからチェーンパラメータを取得するクライアント。
/// キャッシュは持たない（`CachedChainParams` で包んで使う）。
pub struct AlgodParamsClient {
    http: reqwest::Client,
    base_url: String,
    token: Option<String>,
}

impl AlgodParamsClient {
    pub fn new(http: reqwest::Client, base_url: impl Into<String>, token: Option<String>) -> Self {
        Self {
            http,
            base_url: base_url.into(),
            token,
        }
    }

    pub fn from_config(config: &ClientConfig, http: reqwest::Client) -> Self {
        Self::new(http, config.algod_url.clone(), config.algod_token.clone())
    }
}

#[async_trait::async_trait]
impl ChainParamSource for AlgodParamsClient {
    async fn fetch_params(&self, _use_cache: bool) -> Result<ChainParams, NetworkError> {
        let url = format!("{}/v2/transactions/params", self.base_url.trim_end_matches('/'));
        let mut request = self.http.get(&url);
        if let Some(token) = &self.token {
            request = request.header(ALGOD_TOKEN_HEADER, token);
        }
        let response = request.send().await.map_err(transport_error)?;
        let params: ChainParams = read_json(response).await?;
        tracing::debug!(
            genesis_id = %params.genesis_id,
            last_round = params.last_round,
            min_fee = params.min_fee,
            "チェーンパラメータを取得"
        );
        Ok(params)
    }
}
