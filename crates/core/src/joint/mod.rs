//! # ジョイントアカウント署名コーディネーター
//!
//! 閾値署名アカウントの1回の操作について、署名提案を組み立ててコーディネーションサービスへ送る。
//!
//! ## 状態遷移
//! `Idle → FetchingParams → BuildingDrafts → CollectingLocalSignatures → SubmittingProposal → Completed | Failed`
//!
//! 1. チェーンパラメータを取得する（キャッシュ利用は呼び出し側が指定）
//! 2. 意図から未署名トランザクションを決定的に構築する
//! 3. この端末で署名できる参加者ごとに、全トランザクションへ署名する（署名者単位で全件成功か除外）
//! 4. 参加者リスト順で最初に署名できた参加者を提案者として提案を送信する
//!
//! ネットワーク待ちの間にキャンセルされた場合は、遅れて届いた結果を破棄し、以降の送信も行わない。
//! 内部でのリトライは行わない。

mod respond;
mod status;

#[cfg(test)]
mod tests;

use std::sync::Arc;

use base64::Engine;
use tokio::sync::watch;
use tokio::task::JoinSet;
use tracing::Instrument;
use txauth_types::{
    Account, JointAccount, ProposalMetadata, SignRequestResponse, SignRequestType, SigningProposal,
    TransactionIntent,
};

use crate::cancel::Cancellation;
use crate::directory::AccountDirectory;
use crate::draft::DraftBuilder;
use crate::error::{AuthorizationError, DraftError};
use crate::params::ChainParamSource;
use crate::service::CoordinationService;
use crate::signer::LocalSigner;

pub use respond::SignDecision;
pub use status::{poll_until_settled, SignatureTally, DEFAULT_POLL_INTERVAL};

pub(crate) fn b64() -> base64::engine::GeneralPurpose {
    base64::engine::general_purpose::STANDARD
}

/// 承認フローの状態
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AuthorizationState {
    Idle,
    FetchingParams,
    BuildingDrafts,
    CollectingLocalSignatures,
    SubmittingProposal,
    Completed,
    Failed,
}

impl AuthorizationState {
    pub fn is_terminal(self) -> bool {
        matches!(self, AuthorizationState::Completed | AuthorizationState::Failed)
    }
}

/// コーディネーターが利用する外部コンポーネント一式
pub struct Collaborators {
    pub directory: Arc<dyn AccountDirectory>,
    pub params: Arc<dyn ChainParamSource>,
    pub drafts: Arc<dyn DraftBuilder>,
    pub signer: Arc<dyn LocalSigner>,
    pub service: Arc<dyn CoordinationService>,
}

/// ジョイントアカウントの署名コーディネーター。
///
/// 呼び出し間で共有する可変状態を持たないため、異なる意図の `authorize` を並行に実行できる。
pub struct JointSigningCoordinator {
    directory: Arc<dyn AccountDirectory>,
    params: Arc<dyn ChainParamSource>,
    drafts: Arc<dyn DraftBuilder>,
    signer: Arc<dyn LocalSigner>,
    service: Arc<dyn CoordinationService>,
    use_cached_params: bool,
    device_id: Option<String>,
}

impl JointSigningCoordinator {
    pub fn new(collaborators: Collaborators) -> Self {
        Self {
            directory: collaborators.directory,
            params: collaborators.params,
            drafts: collaborators.drafts,
            signer: collaborators.signer,
            service: collaborators.service,
            use_cached_params: false,
            device_id: None,
        }
    }

    /// チェーンパラメータ取得でキャッシュを許可するか
    pub fn with_cached_params(mut self, use_cache: bool) -> Self {
        self.use_cached_params = use_cache;
        self
    }

    /// 拒否回答に添えるデバイスID
    pub fn with_device_id(mut self, device_id: impl Into<String>) -> Self {
        self.device_id = Some(device_id.into());
        self
    }

    pub fn service(&self) -> &Arc<dyn CoordinationService> {
        &self.service
    }

    /// ジョイントアカウントで意図を実行する署名提案を作成・送信する。
    pub async fn authorize(
        &self,
        joint: &JointAccount,
        intent: &TransactionIntent,
        cancel: &Cancellation,
    ) -> Result<ProposalMetadata, AuthorizationError> {
        let (progress, _) = watch::channel(AuthorizationState::Idle);
        self.authorize_with_progress(joint, intent, cancel, &progress)
            .await
    }

    /// `authorize` と同じ。状態遷移を `progress` へ通知する。
    pub async fn authorize_with_progress(
        &self,
        joint: &JointAccount,
        intent: &TransactionIntent,
        cancel: &Cancellation,
        progress: &watch::Sender<AuthorizationState>,
    ) -> Result<ProposalMetadata, AuthorizationError> {
        let attempt = uuid::Uuid::new_v4();
        let span = tracing::info_span!("authorize", %attempt, joint = %joint.address());
        async {
            progress.send_replace(AuthorizationState::Idle);
            let result = self.run_authorization(joint, intent, cancel, progress).await;
            match &result {
                Ok(metadata) => {
                    transition(progress, AuthorizationState::Completed);
                    tracing::info!(
                        request_id = %metadata.id,
                        proposer = %metadata.proposer_address,
                        "署名提案を送信しました"
                    );
                }
                Err(e) if e.is_cancelled() => {
                    transition(progress, AuthorizationState::Failed);
                    tracing::info!("承認処理はキャンセルされました");
                }
                Err(e) => {
                    transition(progress, AuthorizationState::Failed);
                    tracing::warn!(error = %e, "承認処理に失敗しました");
                }
            }
            result
        }
        .instrument(span)
        .await
    }

    async fn run_authorization(
        &self,
        joint: &JointAccount,
        intent: &TransactionIntent,
        cancel: &Cancellation,
        progress: &watch::Sender<AuthorizationState>,
    ) -> Result<ProposalMetadata, AuthorizationError> {
        let no_local_signer = || AuthorizationError::NoLocalSigner {
            joint_address: joint.address().to_string(),
        };

        let signers = self.local_signers(joint);
        if signers.is_empty() {
            return Err(no_local_signer());
        }

        transition(progress, AuthorizationState::FetchingParams);
        let params = cancel
            .run(self.params.fetch_params(self.use_cached_params))
            .await
            .ok_or(AuthorizationError::Cancelled)??;

        transition(progress, AuthorizationState::BuildingDrafts);
        let drafts = self.drafts.build(joint.address(), intent, &params)?;
        if drafts.is_empty() {
            return Err(DraftError::Empty.into());
        }
        for draft in &drafts {
            tracing::debug!(
                tx_id = %hex::encode(txauth_crypto::transaction_id(draft)),
                "未署名トランザクションを構築"
            );
        }

        transition(progress, AuthorizationState::CollectingLocalSignatures);
        let transaction_lists = Arc::new(vec![drafts]);
        let responses = cancel
            .run(collect_signatures(
                Arc::clone(&self.signer),
                signers,
                Arc::clone(&transaction_lists),
            ))
            .await
            .ok_or(AuthorizationError::Cancelled)?;

        // 提案者は必ずローカル署名を持つ参加者になる
        let proposer = responses
            .first()
            .map(|response| response.address.clone())
            .ok_or_else(no_local_signer)?;

        let proposal = SigningProposal {
            joint_account_address: joint.address().to_string(),
            proposer_address: proposer,
            request_type: SignRequestType::Async,
            raw_transaction_lists: encode_transaction_lists(&transaction_lists),
            responses,
        };

        transition(progress, AuthorizationState::SubmittingProposal);
        let metadata = cancel
            .run(self.service.submit_proposal(&proposal))
            .await
            .ok_or(AuthorizationError::Cancelled)??;
        Ok(metadata)
    }

    /// この端末で署名できる参加者（参加者リスト順）
    fn local_signers(&self, joint: &JointAccount) -> Vec<Account> {
        self.directory
            .participants(joint)
            .iter()
            .filter_map(|address| {
                let account = self.directory.resolve_signer(address);
                if account.is_none() {
                    tracing::debug!(participant = %address, "他端末の参加者のため省略");
                }
                account
            })
            .filter(|account| self.directory.is_signing_capable(account))
            .collect()
    }
}

fn transition(progress: &watch::Sender<AuthorizationState>, state: AuthorizationState) {
    let previous = progress.send_replace(state);
    tracing::debug!(from = ?previous, to = ?state, "状態遷移");
}

/// 各アカウントで全トランザクションに署名する。
///
/// 署名はブロッキングスレッドで署名者ごとに独立して実行し、
/// 結果は `accounts` の順に並べ直す。1件でも署名できなかった署名者は結果から除外する。
pub(crate) async fn collect_signatures(
    signer: Arc<dyn LocalSigner>,
    accounts: Vec<Account>,
    transaction_lists: Arc<Vec<Vec<Vec<u8>>>>,
) -> Vec<SignRequestResponse> {
    let mut tasks = JoinSet::new();
    for (index, account) in accounts.into_iter().enumerate() {
        let signer = Arc::clone(&signer);
        let lists = Arc::clone(&transaction_lists);
        tasks.spawn_blocking(move || (index, sign_all(signer.as_ref(), &account, &lists)));
    }

    let mut collected = Vec::new();
    while let Some(joined) = tasks.join_next().await {
        match joined {
            Ok((index, Some(response))) => collected.push((index, response)),
            Ok((_, None)) => {}
            Err(e) => tracing::warn!(error = %e, "署名タスクが異常終了しました"),
        }
    }
    collected.sort_by_key(|(index, _)| *index);
    collected.into_iter().map(|(_, response)| response).collect()
}

fn sign_all(
    signer: &dyn LocalSigner,
    account: &Account,
    transaction_lists: &[Vec<Vec<u8>>],
) -> Option<SignRequestResponse> {
    let signatures = transaction_lists
        .iter()
        .map(|list| {
            list.iter()
                .map(|tx| signer.sign(account, tx).map(|sig| b64().encode(sig)))
                .collect::<Option<Vec<_>>>()
        })
        .collect::<Option<Vec<_>>>();
    match signatures {
        Some(signatures) => Some(SignRequestResponse::signed(account.address.clone(), signatures)),
        None => {
            tracing::warn!(participant = %account.address, "署名できないトランザクションがあるため除外");
            None
        }
    }
}

fn encode_transaction_lists(lists: &[Vec<Vec<u8>>]) -> Vec<Vec<String>> {
    lists
        .iter()
        .map(|list| list.iter().map(|tx| b64().encode(tx)).collect())
        .collect()
}
