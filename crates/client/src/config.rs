//! # クライアント設定
//!
//! 環境変数から接続先と認証情報を読み込む。
//!
//! | 環境変数 | 既定値 |
//! |---------|-------|
//! | `TXAUTH_NETWORK` | `testnet` |
//! | `TXAUTH_ALGOD_URL` | ネットワークごとの公開algodノード |
//! | `TXAUTH_ALGOD_TOKEN` | なし（`X-Algo-API-Token` ヘッダー） |
//! | `TXAUTH_COORDINATOR_URL` | `http://127.0.0.1:8080` |
//! | `TXAUTH_API_KEY` | なし（`X-API-Key` ヘッダー） |
//! | `TXAUTH_DEVICE_ID` | なし（拒否回答に添付） |
//! | `TXAUTH_HTTP_TIMEOUT_SEC` | `30` |

use std::time::Duration;

use txauth_types::{Network, NetworkContext};

/// 設定読み込みのエラー
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("TXAUTH_NETWORK が不正です: {0}")]
    InvalidNetwork(String),
    #[error("TXAUTH_HTTP_TIMEOUT_SEC が不正です: {0}")]
    InvalidTimeout(String),
    #[error("HTTPクライアントの構築に失敗: {0}")]
    HttpClient(String),
}

/// 既定のコーディネーションサービスURL
pub const DEFAULT_COORDINATOR_URL: &str = "http://127.0.0.1:8080";
/// 既定のHTTPタイムアウト（秒）
pub const DEFAULT_HTTP_TIMEOUT_SEC: u64 = 30;

/// ネットワークごとの既定algodノード
pub fn default_algod_url(network: Network) -> &'static str {
    match network {
        Network::Mainnet => "https://mainnet-api.algonode.cloud",
        Network::Testnet => "https://testnet-api.algonode.cloud",
    }
}

/// クライアント設定
#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub network: Network,
    pub algod_url: String,
    pub algod_token: Option<String>,
    pub coordinator_url: String,
    pub api_key: Option<String>,
    pub device_id: Option<String>,
    pub http_timeout: Duration,
}

impl ClientConfig {
    /// 環境変数から読み込む
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// 任意の参照関数から読み込む
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let network = match lookup("TXAUTH_NETWORK") {
            Some(value) => value.parse().map_err(ConfigError::InvalidNetwork)?,
            None => Network::Testnet,
        };
        let algod_url = lookup("TXAUTH_ALGOD_URL")
            .unwrap_or_else(|| default_algod_url(network).to_string());
        let coordinator_url = lookup("TXAUTH_COORDINATOR_URL")
            .unwrap_or_else(|| DEFAULT_COORDINATOR_URL.to_string());
        let timeout_secs = match lookup("TXAUTH_HTTP_TIMEOUT_SEC") {
            Some(value) => value
                .parse::<u64>()
                .map_err(|_| ConfigError::InvalidTimeout(value))?,
            None => DEFAULT_HTTP_TIMEOUT_SEC,
        };
        Ok(Self {
            network,
            algod_url,
            algod_token: lookup("TXAUTH_ALGOD_TOKEN").filter(|v| !v.is_empty()),
            coordinator_url,
            api_key: lookup("TXAUTH_API_KEY").filter(|v| !v.is_empty()),
            device_id: lookup("TXAUTH_DEVICE_ID").filter(|v| !v.is_empty()),
            http_timeout: Duration::from_secs(timeout_secs),
        })
    }

    /// 接続中ネットワークの識別情報
    pub fn network_context(&self) -> NetworkContext {
        NetworkContext::for_network(self.network)
    }

    /// タイムアウトを設定したHTTPクライアントを構築する
    pub fn http_client(&self) -> Result<reqwest::Client, ConfigError> {
        reqwest::Client::builder()
            .timeout(self.http_timeout)
            .build()
            .map_err(|e| ConfigError::HttpClient(e.to_string()))
    }
}
