//! サブコマンドの実装。

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tokio::sync::watch;
use txauth_client::{AlgodParamsClient, ClientConfig, HttpCoordinationClient};
use txauth_core::{
    poll_until_settled, AuthorizationState, CachedChainParams, CanonicalDraftBuilder, Cancellation,
    Collaborators, CoordinationService, JointSigningCoordinator, Rejection, SignDecision,
    SignatureTally, StaticAccountDirectory, ValidationGate,
};
use txauth_types::{
    NetworkContext, ProposedTransaction, SignRequest, SignRequestProgress, SignRequestStatus,
    TransactionIntent,
};

use crate::keystore::parse_keystore;

// ---------------------------------------------------------------------------
// 共通
// ---------------------------------------------------------------------------

fn read_file(path: &Path) -> anyhow::Result<String> {
    std::fs::read_to_string(path)
        .map_err(|e| anyhow::anyhow!("{} を読み込めません: {e}", path.display()))
}

fn load_directory(path: &Path) -> anyhow::Result<StaticAccountDirectory> {
    Ok(StaticAccountDirectory::from_json(&read_file(path)?)?)
}

pub fn print_json<T: Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

/// Ctrl-Cでキャンセルされるシグナルを作る
fn cancel_on_ctrl_c() -> Cancellation {
    let cancel = Cancellation::new();
    let handle = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("中断要求を受信しました");
            handle.cancel();
        }
    });
    cancel
}

/// アカウント一覧・キーストア・設定からコーディネーターを組み立てる
fn build_coordinator(
    config: &ClientConfig,
    directory: Arc<StaticAccountDirectory>,
    keystore: &Path,
) -> anyhow::Result<JointSigningCoordinator> {
    let signer = parse_keystore(&read_file(keystore)?)?;
    let http = config.http_client()?;
    let params = CachedChainParams::new(AlgodParamsClient::from_config(config, http.clone()));
    let service = HttpCoordinationClient::from_config(config, http);
    let coordinator = JointSigningCoordinator::new(Collaborators {
        directory,
        params: Arc::new(params),
        drafts: Arc::new(CanonicalDraftBuilder),
        signer: Arc::new(signer),
        service: Arc::new(service),
    });
    Ok(match &config.device_id {
        Some(device_id) => coordinator.with_device_id(device_id.clone()),
        None => coordinator,
    })
}

// ---------------------------------------------------------------------------
// validate
// ---------------------------------------------------------------------------

/// 検証結果の出力形式
#[derive(Debug, Serialize, PartialEq, Eq)]
pub struct ValidationReport {
    pub accepted: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rejection: Option<Rejection>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<u16>,
}

pub fn validation_report(
    network: &NetworkContext,
    directory: &StaticAccountDirectory,
    transactions: &[ProposedTransaction],
) -> ValidationReport {
    match ValidationGate::new(network, directory).validate_batch(transactions) {
        Ok(()) => ValidationReport {
            accepted: true,
            rejection: None,
            code: None,
        },
        Err(rejection) => ValidationReport {
            accepted: false,
            code: Some(rejection.code()),
            rejection: Some(rejection),
        },
    }
}

/// トランザクション要求ファイルを検証する。拒否されたらfalse。
pub fn validate(
    config: &ClientConfig,
    transactions: &Path,
    accounts: &Path,
) -> anyhow::Result<bool> {
    let transactions: Vec<ProposedTransaction> = serde_json::from_str(&read_file(transactions)?)?;
    let directory = load_directory(accounts)?;
    let report = validation_report(&config.network_context(), &directory, &transactions);
    print_json(&report)?;
    Ok(report.accepted)
}

// ---------------------------------------------------------------------------
// propose
// ---------------------------------------------------------------------------

pub async fn propose(
    config: &ClientConfig,
    accounts: &Path,
    keystore: &Path,
    joint_address: &str,
    intent: &Path,
    use_cached_params: bool,
) -> anyhow::Result<()> {
    let directory = Arc::new(load_directory(accounts)?);
    let joint = directory
        .joint_account(joint_address)
        .cloned()
        .ok_or_else(|| anyhow::anyhow!("ジョイントアカウントが見つかりません: {joint_address}"))?;
    let intent: TransactionIntent = serde_json::from_str(&read_file(intent)?)?;
    let coordinator =
        build_coordinator(config, directory, keystore)?.with_cached_params(use_cached_params);

    let (progress, mut states) = watch::channel(AuthorizationState::Idle);
    let reporter = tokio::spawn(async move {
        while states.changed().await.is_ok() {
            let state = *states.borrow_and_update();
            tracing::info!(?state, "状態遷移");
            if state.is_terminal() {
                break;
            }
        }
    });

    let cancel = cancel_on_ctrl_c();
    let result = coordinator
        .authorize_with_progress(&joint, &intent, &cancel, &progress)
        .await;
    drop(progress);
    let _ = reporter.await;

    let metadata = result?;
    print_json(&metadata)
}

// ---------------------------------------------------------------------------
// respond / cancel
// ---------------------------------------------------------------------------

pub async fn respond(
    config: &ClientConfig,
    accounts: &Path,
    keystore: &Path,
    sign_request_id: &str,
    decision: SignDecision,
) -> anyhow::Result<()> {
    let coordinator = build_coordinator(config, Arc::new(load_directory(accounts)?), keystore)?;
    let request = coordinator.service().fetch_sign_request(sign_request_id).await?;
    let cancel = cancel_on_ctrl_c();
    let responses = coordinator.respond(&request, decision, &cancel).await?;
    print_json(&responses)
}

pub async fn cancel_proposal(
    config: &ClientConfig,
    accounts: &Path,
    keystore: &Path,
    sign_request_id: &str,
) -> anyhow::Result<()> {
    let coordinator = build_coordinator(config, Arc::new(load_directory(accounts)?), keystore)?;
    let request = coordinator.service().fetch_sign_request(sign_request_id).await?;
    let cancel = cancel_on_ctrl_c();
    coordinator.cancel_proposal(&request, &cancel).await?;
    print_json(&serde_json::json!({ "id": request.id, "cancelled": true }))
}

// ---------------------------------------------------------------------------
// status
// ---------------------------------------------------------------------------

/// 署名依頼の状態の出力形式
#[derive(Debug, Serialize)]
pub struct StatusReport {
    pub id: String,
    pub status: SignRequestStatus,
    pub progress: SignRequestProgress,
    pub tally: SignatureTally,
    pub can_still_succeed: bool,
}

impl StatusReport {
    pub fn from_request(request: &SignRequest) -> Self {
        let tally = SignatureTally::from_request(request);
        Self {
            id: request.id.clone(),
            status: request.status,
            progress: request.status.progress(),
            can_still_succeed: tally.can_still_succeed(),
            tally,
        }
    }
}

pub async fn status(
    config: &ClientConfig,
    sign_request_id: &str,
    watch_interval: Option<Duration>,
) -> anyhow::Result<()> {
    let service = HttpCoordinationClient::from_config(config, config.http_client()?);
    let request = match watch_interval {
        None => service.fetch_sign_request(sign_request_id).await?,
        Some(interval) => {
            let cancel = cancel_on_ctrl_c();
            match poll_until_settled(&service, sign_request_id, interval, &cancel).await? {
                Some(request) => request,
                None => {
                    tracing::info!(sign_request_id, "監視を中断しました");
                    return Ok(());
                }
            }
        }
    };
    print_json(&StatusReport::from_request(&request))
}
