//! # コーディネーションサービスHTTPクライアント
//!
//! | メソッド | パス | 内容 |
//! |---------|------|------|
//! | POST | `/v1/joint-accounts/sign-requests/` | 署名提案の作成 |
//! | GET | `/v1/joint-accounts/sign-requests/{id}/` | 署名依頼の取得 |
//! | POST | `/v1/joint-accounts/sign-requests/{id}/responses/` | 回答の追加 |
//!
//! 404は `NotFound`、その他の4xxは `Rejected`、5xxと通信障害は `Network` に分類する。

use txauth_core::{CoordinationService, NetworkError, ServiceError};
use txauth_types::{
    ProposalMetadata, SignRequest, SignRequestResponse, SignResponsesSubmission, SigningProposal,
};

use crate::config::ClientConfig;
use crate::http::{read_json, transport_error};

/// APIキーヘッダー
pub const API_KEY_HEADER: &str = "X-API-Key";

const SIGN_REQUESTS_PATH: &str = "/v1/joint-accounts/sign-requests";

/// `CoordinationService` のHTTP実装
pub struct HttpCoordinationClient {
    http: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
}

impl HttpCoordinationClient {
    pub fn new(
        http: reqwest::Client,
        base_url: impl Into<String>,
        api_key: Option<String>,
    ) -> Self {
        Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key,
        }
    }

    pub fn from_config(config: &ClientConfig, http: reqwest::Client) -> Self {
        Self::new(http, config.coordinator_url.clone(), config.api_key.clone())
    }

    fn url(&self, suffix: &str) -> String {
        format!("{}{}{}", self.base_url, SIGN_REQUESTS_PATH, suffix)
    }

    fn authorize(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.api_key {
            Some(key) => request.header(API_KEY_HEADER, key),
            None => request,
        }
    }
}

/// `NetworkError::Status` をHTTPステータスに応じてサービスエラーへ振り分ける
fn classify(error: NetworkError, resource: &str) -> ServiceError {
    match error {
        NetworkError::Status { status: 404, .. } => ServiceError::NotFound(resource.to_string()),
        NetworkError::Status { status, body } if (400..500).contains(&status) => {
            ServiceError::Rejected(body)
        }
        other => ServiceError::Network(other),
    }
}

#[async_trait::async_trait]
impl CoordinationService for HttpCoordinationClient {
    async fn submit_proposal(
        &self,
        proposal: &SigningProposal,
    ) -> Result<ProposalMetadata, ServiceError> {
        let response = self
            .authorize(self.http.post(self.url("/")))
            .json(proposal)
            .send()
            .await
            .map_err(transport_error)?;
        let metadata: ProposalMetadata = read_json(response)
            .await
            .map_err(|e| classify(e, &proposal.joint_account_address))?;
        tracing::info!(
            sign_request_id = %metadata.id,
            joint = %metadata.joint_account_address,
            status = ?metadata.status,
            "署名提案を登録"
        );
        Ok(metadata)
    }

    async fn submit_responses(
        &self,
        sign_request_id: &str,
        responses: &[SignRequestResponse],
    ) -> Result<(), ServiceError> {
        let body = SignResponsesSubmission {
            responses: responses.to_vec(),
        };
        let response = self
            .authorize(self.http.post(self.url(&format!("/{sign_request_id}/responses/"))))
            .json(&body)
            .send()
            .await
            .map_err(transport_error)?;
        crate::http::ensure_success(response)
            .await
            .map_err(|e| classify(e, sign_request_id))?;
        tracing::info!(sign_request_id, count = responses.len(), "回答を送信");
        Ok(())
    }

    async fn fetch_sign_request(&self, sign_request_id: &str) -> Result<SignRequest, ServiceError> {
        let response = self
            .authorize(self.http.get(self.url(&format!("/{sign_request_id}/"))))
            .send()
            .await
            .map_err(transport_error)?;
        read_json(response)
            .await
            .map_err(|e| classify(e, sign_request_id))
    }
}
