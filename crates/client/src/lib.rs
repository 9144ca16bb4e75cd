//! # txauth Client
//!
//! `txauth-core` の外部境界トレイトのHTTP実装。
//! - `AlgodParamsClient`: algodからチェーンパラメータを取得する `ChainParamSource`
//! - `HttpCoordinationClient`: ジョイントアカウント署名依頼を中継する `CoordinationService`
//! - `ClientConfig`: 環境変数からの接続設定

pub mod algod;
pub mod config;
pub mod coordinator;
mod http;

#[cfg(test)]
pub(crate) mod test_helpers;

pub use algod::AlgodParamsClient;
pub use config::{ClientConfig, ConfigError};
pub use coordinator::HttpCoordinationClient;
