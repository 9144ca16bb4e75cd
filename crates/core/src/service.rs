//! # コーディネーションサービス
//!
//! ジョイントアカウントの署名提案を参加者間で中継するバックエンドの抽象インターフェース。
//! HTTP実装は `txauth-client` クレートを参照。

use txauth_types::{ProposalMetadata, SignRequest, SignRequestResponse, SigningProposal};

use crate::error::ServiceError;

/// コーディネーションサービスのトレイト。
#[async_trait::async_trait]
pub trait CoordinationService: Send + Sync {
    /// 未署名トランザクションとローカル参加者の回答を含む署名提案を送信する。
    async fn submit_proposal(
        &self,
        proposal: &SigningProposal,
    ) -> Result<ProposalMetadata, ServiceError>;

    /// 既存の署名依頼へ参加者の回答（署名または拒否）を追加する。
    async fn submit_responses(
        &self,
        sign_request_id: &str,
        responses: &[SignRequestResponse],
    ) -> Result<(), ServiceError>;

    /// 署名依頼の現在の状態を取得する。
    async fn fetch_sign_request(&self, sign_request_id: &str) -> Result<SignRequest, ServiceError>;
}
