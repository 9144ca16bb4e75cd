//! reqwestのエラーとレスポンスを `NetworkError` へ写像する共通処理。

use serde::de::DeserializeOwned;
use txauth_core::NetworkError;

pub(crate) fn transport_error(error: reqwest::Error) -> NetworkError {
    if error.is_timeout() {
        NetworkError::Timeout
    } else if error.is_decode() {
        NetworkError::Decode(error.to_string())
    } else {
        NetworkError::Transport(error.to_string())
    }
}

/// 非2xxなら本文付きの `Status` エラーにする
pub(crate) async fn ensure_success(
    response: reqwest::Response,
) -> Result<reqwest::Response, NetworkError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(NetworkError::Status {
        status: status.as_u16(),
        body,
    })
}

pub(crate) async fn read_json<T: DeserializeOwned>(
    response: reqwest::Response,
) -> Result<T, NetworkError> {
    let response = ensure_success(response).await?;
    let bytes = response.bytes().await.map_err(transport_error)?;
    serde_json::from_slice(&bytes).map_err(|e| NetworkError::Decode(e.to_string()))
}
