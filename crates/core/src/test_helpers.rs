//! # テスト用共通ヘルパー
//!
//! 検証ゲートとコーディネーターのテストで共有する鍵・フェイク実装群。

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use txauth_crypto::Ed25519SigningKey;
use txauth_types::{
    Account, ChainParams, JointAccount, NetworkContext, ProposalMetadata, SignRequest,
    SignRequestResponse, SignRequestStatus, SigningProposal,
};

use crate::error::{NetworkError, ServiceError};
use crate::params::ChainParamSource;
use crate::service::CoordinationService;
use crate::signer::{KeyStoreSigner, LocalSigner};

/// シードから決定的に作る署名鍵
pub fn signing_key(seed: u8) -> Ed25519SigningKey {
    Ed25519SigningKey::from_bytes(&[seed; 32])
}

/// シードに対応するアドレス
pub fn address(seed: u8) -> String {
    txauth_crypto::address_of(&signing_key(seed)).encode()
}

/// 指定シードの鍵を持つキーストア
pub fn key_store(seeds: &[u8]) -> KeyStoreSigner {
    let mut store = KeyStoreSigner::new();
    for &seed in seeds {
        store.insert(signing_key(seed));
    }
    store
}

/// シード1,2,3を参加者とする閾値2のジョイントアカウント
pub fn joint_account() -> JointAccount {
    JointAccount::new(address(100), vec![address(1), address(2), address(3)], 2).unwrap()
}

/// testnet向けのチェーンパラメータ
pub fn chain_params() -> ChainParams {
    let network = NetworkContext::testnet();
    ChainParams {
        consensus_version: "future".to_string(),
        fee: 0,
        genesis_hash: network.genesis_hash,
        genesis_id: network.genesis_id,
        last_round: 40_000_000,
        min_fee: 1_000,
    }
}

// ---------------------------------------------------------------------------
// チェーンパラメータ
// ---------------------------------------------------------------------------

pub struct FakeParams {
    result: Result<ChainParams, NetworkError>,
    delay: Option<Duration>,
    calls: AtomicUsize,
}

impl FakeParams {
    pub fn ok(params: ChainParams) -> Self {
        Self {
            result: Ok(params),
            delay: None,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn err(error: NetworkError) -> Self {
        Self {
            result: Err(error),
            delay: None,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn slow(params: ChainParams, delay: Duration) -> Self {
        Self {
            delay: Some(delay),
            ..Self::ok(params)
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait::async_trait]
impl ChainParamSource for FakeParams {
    async fn fetch_params(&self, _use_cache: bool) -> Result<ChainParams, NetworkError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        self.result.clone()
    }
}

// ---------------------------------------------------------------------------
// コーディネーションサービス
// ---------------------------------------------------------------------------

/// 送信内容を記録するフェイクサービス。
/// `fetch_sign_request` は登録された状態を順に返し、最後の1件は返し続ける。
#[derive(Default)]
pub struct RecordingService {
    pub proposals: Mutex<Vec<SigningProposal>>,
    pub submitted: Mutex<Vec<(String, Vec<SignRequestResponse>)>>,
    pub scripted: Mutex<VecDeque<SignRequest>>,
    pub fail_with: Option<ServiceError>,
    pub delay: Option<Duration>,
    pub fetches: AtomicUsize,
}

impl RecordingService {
    pub fn failing(error: ServiceError) -> Self {
        Self {
            fail_with: Some(error),
            ..Self::default()
        }
    }

    pub fn slow(delay: Duration) -> Self {
        Self {
            delay: Some(delay),
            ..Self::default()
        }
    }

    pub fn with_requests(requests: Vec<SignRequest>) -> Self {
        Self {
            scripted: Mutex::new(requests.into()),
            ..Self::default()
        }
    }

    pub fn proposals(&self) -> Vec<SigningProposal> {
        self.proposals.lock().unwrap().clone()
    }

    pub fn submitted(&self) -> Vec<(String, Vec<SignRequestResponse>)> {
        self.submitted.lock().unwrap().clone()
    }

    async fn pause(&self) {
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
    }
}

#[async_trait::async_trait]
impl CoordinationService for RecordingService {
    async fn submit_proposal(
        &self,
        proposal: &SigningProposal,
    ) -> Result<ProposalMetadata, ServiceError> {
        self.pause().await;
        if let Some(error) = &self.fail_with {
            return Err(error.clone());
        }
        self.proposals.lock().unwrap().push(proposal.clone());
        Ok(ProposalMetadata {
            id: "sign-request-1".to_string(),
            joint_account_address: proposal.joint_account_address.clone(),
            proposer_address: proposal.proposer_address.clone(),
            status: SignRequestStatus::Pending,
            expires_at: None,
        })
    }

    async fn submit_responses(
        &self,
        sign_request_id: &str,
        responses: &[SignRequestResponse],
    ) -> Result<(), ServiceError> {
        self.pause().await;
        if let Some(error) = &self.fail_with {
            return Err(error.clone());
        }
        self.submitted
            .lock()
            .unwrap()
            .push((sign_request_id.to_string(), responses.to_vec()));
        Ok(())
    }

    async fn fetch_sign_request(&self, sign_request_id: &str) -> Result<SignRequest, ServiceError> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        if let Some(error) = &self.fail_with {
            return Err(error.clone());
        }
        let mut scripted = self.scripted.lock().unwrap();
        let request = if scripted.len() > 1 {
            scripted.pop_front()
        } else {
            scripted.front().cloned()
        };
        request.ok_or_else(|| ServiceError::NotFound(sign_request_id.to_string()))
    }
}

// ---------------------------------------------------------------------------
// 署名
// ---------------------------------------------------------------------------

/// 特定アドレスについて特定のトランザクションだけ署名を拒むラッパー
pub struct RefusingSigner {
    pub inner: KeyStoreSigner,
    pub refuse_address: String,
    pub refuse_transaction: Vec<u8>,
}

impl LocalSigner for RefusingSigner {
    fn sign(&self, account: &Account, transaction: &[u8]) -> Option<Vec<u8>> {
        if account.address == self.refuse_address
            && transaction == self.refuse_transaction.as_slice()
        {
            return None;
        }
        self.inner.sign(account, transaction)
    }
}
