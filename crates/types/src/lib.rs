//! # txauth 共有型定義
//!
//! トランザクション承認コアで共有するデータ構造をRust構造体として提供する。
//!
//! ## エンコーディング規則
//! - アドレス: 58文字のチェックサム付きBase32文字列（32バイト公開鍵 + 4バイトチェックサム）
//! - Base64: バイナリデータ（未署名トランザクション、署名、グループID、ジェネシスハッシュ）
//! - トランザクションリスト: 外側がリスト、内側がトランザクションの二重配列

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Base32エンコードされた58文字のアカウントアドレス
pub type Address = String;

/// Base64エンコードされた32バイトのグループID
pub type GroupId = String;

/// グループIDごとにまとめたトランザクション
pub type TransactionGroups = BTreeMap<GroupId, Vec<ProposedTransaction>>;

// ---------------------------------------------------------------------------
// ネットワーク
// ---------------------------------------------------------------------------

/// 接続先ネットワーク
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Network {
    Mainnet,
    Testnet,
}

impl std::str::FromStr for Network {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "mainnet" => Ok(Network::Mainnet),
            "testnet" => Ok(Network::Testnet),
            other => Err(format!("未知のネットワークです: {other}")),
        }
    }
}

impl std::fmt::Display for Network {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Network::Mainnet => f.write_str("mainnet"),
            Network::Testnet => f.write_str("testnet"),
        }
    }
}

/// ウォレットが現在接続しているチェーンの識別情報。
/// 要求されたトランザクションのジェネシス情報はこれと一致しなければならない。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetworkContext {
    pub network: Network,
    /// ジェネシスID (例: "mainnet-v1.0")
    pub genesis_id: String,
    /// Base64エンコードされたジェネシスハッシュ
    pub genesis_hash: String,
}

impl NetworkContext {
    pub fn mainnet() -> Self {
        Self {
            network: Network::Mainnet,
            genesis_id: "mainnet-v1.0".to_string(),
            genesis_hash: "wGHE2Pwdvd7S12BL5FaOP20EGYesN73ktiC1qzkkit8=".to_string(),
        }
    }

    pub fn testnet() -> Self {
        Self {
            network: Network::Testnet,
            genesis_id: "testnet-v1.0".to_string(),
            genesis_hash: "SGO1GKSzyE7IEPItTxCByw9x8FmnrCDexi9/cOUJOiI=".to_string(),
        }
    }

    pub fn for_network(network: Network) -> Self {
        match network {
            Network::Mainnet => Self::mainnet(),
            Network::Testnet => Self::testnet(),
        }
    }
}

/// algodの `/v2/transactions/params` が返すチェーンパラメータ
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct ChainParams {
    #[serde(default)]
    pub consensus_version: String,
    /// バイト単位の推奨手数料
    #[serde(default)]
    pub fee: u64,
    pub genesis_hash: String,
    pub genesis_id: String,
    pub last_round: u64,
    pub min_fee: u64,
}

// ---------------------------------------------------------------------------
// アカウント
// ---------------------------------------------------------------------------

/// ローカルアカウントの種別
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AccountKind {
    /// ニーモニックを端末に保持する通常アカウント
    Standard,
    /// ハードウェアウォレット上の鍵で署名するアカウント
    Hardware,
    /// 別アカウントに署名権限を移譲したアカウント
    Rekeyed,
    /// 閲覧専用（署名不可）
    Watch,
    /// 複数参加者の閾値署名で操作するアカウント
    Joint,
}

/// ハードウェアウォレットとの接続方式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HardwareTransport {
    Bluetooth,
    Usb,
}

impl HardwareTransport {
    /// 1回のセッションでアトミックグループ全体に署名できるか。
    /// Bluetooth接続はトランザクションごとに再接続が必要なため不可。
    pub fn supports_atomic_session(self) -> bool {
        matches!(self, HardwareTransport::Usb)
    }
}

/// 端末が把握しているアカウント
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Account {
    pub address: Address,
    pub kind: AccountKind,
    /// オンチェーンの認可アドレス（リキー先）
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub auth_address: Option<Address>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hardware_transport: Option<HardwareTransport>,
}

impl Account {
    pub fn standard(address: impl Into<Address>) -> Self {
        Self {
            address: address.into(),
            kind: AccountKind::Standard,
            auth_address: None,
            hardware_transport: None,
        }
    }

    pub fn hardware(address: impl Into<Address>, transport: HardwareTransport) -> Self {
        Self {
            address: address.into(),
            kind: AccountKind::Hardware,
            auth_address: None,
            hardware_transport: Some(transport),
        }
    }

    pub fn watch(address: impl Into<Address>) -> Self {
        Self {
            address: address.into(),
            kind: AccountKind::Watch,
            auth_address: None,
            hardware_transport: None,
        }
    }

    pub fn rekeyed(address: impl Into<Address>, auth_address: impl Into<Address>) -> Self {
        Self {
            address: address.into(),
            kind: AccountKind::Rekeyed,
            auth_address: Some(auth_address.into()),
            hardware_transport: None,
        }
    }

    /// 実際に署名する鍵のアドレス（リキー済みなら認可アドレス）
    pub fn signer_address(&self) -> &str {
        self.auth_address.as_deref().unwrap_or(&self.address)
    }

    /// 自分以外のアドレスへリキーされているか
    pub fn has_auth_account(&self) -> bool {
        self.auth_address
            .as_deref()
            .is_some_and(|auth| auth != self.address)
    }

    pub fn is_watch(&self) -> bool {
        self.kind == AccountKind::Watch
    }
}

/// ジョイントアカウントの構築エラー
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum JointAccountError {
    #[error("参加者が1人もいません")]
    NoParticipants,
    #[error("参加者が重複しています: {0}")]
    DuplicateParticipant(Address),
    #[error("閾値が不正です: {threshold} (参加者数: {participants})")]
    InvalidThreshold { threshold: u32, participants: usize },
}

/// 閾値署名で操作するジョイントアカウント。
///
/// 参加者は順序付きの重複なし集合で、`1 <= threshold <= participants.len()` を満たす。
/// 不変条件はコンストラクタとデシリアライズの両方で検証する。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "JointAccountRecord", into = "JointAccountRecord")]
pub struct JointAccount {
    address: Address,
    participants: Vec<Address>,
    threshold: u32,
}

#[derive(Serialize, Deserialize)]
struct JointAccountRecord {
    address: Address,
    participants: Vec<Address>,
    threshold: u32,
}

impl JointAccount {
    pub fn new(
        address: impl Into<Address>,
        participants: Vec<Address>,
        threshold: u32,
    ) -> Result<Self, JointAccountError> {
        if participants.is_empty() {
            return Err(JointAccountError::NoParticipants);
        }
        for (i, participant) in participants.iter().enumerate() {
            if participants[..i].contains(participant) {
                return Err(JointAccountError::DuplicateParticipant(participant.clone()));
            }
        }
        if threshold == 0 || threshold as usize > participants.len() {
            return Err(JointAccountError::InvalidThreshold {
                threshold,
                participants: participants.len(),
            });
        }
        Ok(Self {
            address: address.into(),
            participants,
            threshold,
        })
    }

    pub fn address(&self) -> &str {
        &self.address
    }

    pub fn participants(&self) -> &[Address] {
        &self.participants
    }

    pub fn threshold(&self) -> u32 {
        self.threshold
    }

    /// 参加者集合が一致するか（順序は問わない）
    pub fn has_same_participants(&self, participants: &[Address]) -> bool {
        let mut mine: Vec<&str> = self.participants.iter().map(String::as_str).collect();
        let mut theirs: Vec<&str> = participants.iter().map(String::as_str).collect();
        mine.sort_unstable();
        theirs.sort_unstable();
        mine == theirs
    }
}

impl TryFrom<JointAccountRecord> for JointAccount {
    type Error = JointAccountError;

    fn try_from(record: JointAccountRecord) -> Result<Self, Self::Error> {
        JointAccount::new(record.address, record.participants, record.threshold)
    }
}

impl From<JointAccount> for JointAccountRecord {
    fn from(account: JointAccount) -> Self {
        Self {
            address: account.address,
            participants: account.participants,
            threshold: account.threshold,
        }
    }
}

// ---------------------------------------------------------------------------
// 署名要求されたトランザクション
// ---------------------------------------------------------------------------

/// アプリケーションコールの完了アクション
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OnComplete {
    #[default]
    NoOp,
    OptIn,
    CloseOut,
    ClearState,
    UpdateApplication,
    DeleteApplication,
}

/// アプリケーションコールの内容
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct AppCall {
    /// 0はアプリケーション作成
    pub app_id: u64,
    #[serde(default)]
    pub on_complete: OnComplete,
    #[serde(default)]
    pub accounts: Vec<Address>,
    /// Base64エンコードされた引数
    #[serde(default)]
    pub args: Vec<String>,
    #[serde(default)]
    pub foreign_apps: Vec<u64>,
    #[serde(default)]
    pub foreign_assets: Vec<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub approval_program: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub clear_program: Option<String>,
}

/// トランザクション種別ごとの内容
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum TransactionKind {
    #[serde(rename = "pay")]
    Payment { receiver: Address, amount: u64 },
    #[serde(rename = "axfer")]
    AssetTransfer {
        asset_id: u64,
        receiver: Address,
        amount: u64,
        /// クローバック送金時の送金元
        #[serde(default, skip_serializing_if = "Option::is_none")]
        clawback_from: Option<Address>,
    },
    #[serde(rename = "acfg")]
    AssetConfig {
        /// 未指定はアセット作成
        #[serde(default, skip_serializing_if = "Option::is_none")]
        asset_id: Option<u64>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        manager: Option<Address>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        reserve: Option<Address>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        freeze: Option<Address>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        clawback: Option<Address>,
    },
    #[serde(rename = "afrz")]
    AssetFreeze {
        asset_id: u64,
        target: Address,
        frozen: bool,
    },
    #[serde(rename = "keyreg")]
    KeyRegistration { online: bool },
    #[serde(rename = "appl")]
    ApplicationCall(AppCall),
}

/// dAppから署名を要求されたトランザクション（デコード済みメタデータ）
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProposedTransaction {
    pub kind: TransactionKind,
    pub sender: Address,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub close_to: Option<Address>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rekey_to: Option<Address>,
    /// 要求側が指定した署名者の上書き
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub auth_address: Option<Address>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub group_id: Option<GroupId>,
    pub genesis_hash: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub genesis_id: Option<String>,
    /// 事前署名済みマルチシグ形式か
    #[serde(default)]
    pub is_multisig: bool,
    /// 明示された署名者。空リストは「このウォレットでは署名しない」を意味する。
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub signers: Option<Vec<Address>>,
}

impl ProposedTransaction {
    /// 送金トランザクションを作成する
    pub fn payment(
        sender: impl Into<Address>,
        receiver: impl Into<Address>,
        amount: u64,
        network: &NetworkContext,
    ) -> Self {
        Self::with_kind(
            TransactionKind::Payment {
                receiver: receiver.into(),
                amount,
            },
            sender,
            network,
        )
    }

    pub fn with_kind(
        kind: TransactionKind,
        sender: impl Into<Address>,
        network: &NetworkContext,
    ) -> Self {
        Self {
            kind,
            sender: sender.into(),
            close_to: None,
            rekey_to: None,
            auth_address: None,
            group_id: None,
            genesis_hash: network.genesis_hash.clone(),
            genesis_id: Some(network.genesis_id.clone()),
            is_multisig: false,
            signers: None,
        }
    }

    pub fn in_group(mut self, group_id: impl Into<GroupId>) -> Self {
        self.group_id = Some(group_id.into());
        self
    }

    /// トランザクションが参照する全アドレス
    pub fn referenced_addresses(&self) -> Vec<&str> {
        let mut addresses = vec![self.sender.as_str()];
        addresses.extend(self.close_to.as_deref());
        addresses.extend(self.rekey_to.as_deref());
        addresses.extend(self.auth_address.as_deref());
        if let Some(signers) = &self.signers {
            addresses.extend(signers.iter().map(String::as_str));
        }
        match &self.kind {
            TransactionKind::Payment { receiver, .. } => addresses.push(receiver),
            TransactionKind::AssetTransfer {
                receiver,
                clawback_from,
                ..
            } => {
                addresses.push(receiver);
                addresses.extend(clawback_from.as_deref());
            }
            TransactionKind::AssetConfig {
                manager,
                reserve,
                freeze,
                clawback,
                ..
            } => {
                for role in [manager, reserve, freeze, clawback] {
                    addresses.extend(role.as_deref());
                }
            }
            TransactionKind::AssetFreeze { target, .. } => addresses.push(target),
            TransactionKind::KeyRegistration { .. } => {}
            TransactionKind::ApplicationCall(call) => {
                addresses.extend(call.accounts.iter().map(String::as_str));
            }
        }
        addresses
    }

    /// アセットのオプトイン（自分宛ての0量アセット送金）か
    pub fn is_asset_opt_in(&self) -> bool {
        match &self.kind {
            TransactionKind::AssetTransfer {
                receiver,
                amount,
                clawback_from,
                ..
            } => {
                *amount == 0
                    && *receiver == self.sender
                    && clawback_from.is_none()
                    && self.close_to.is_none()
            }
            _ => false,
        }
    }

    /// アセットのオプトアウト（残高をclose_toへ移してアセットを外す）か
    pub fn is_asset_opt_out(&self) -> bool {
        matches!(self.kind, TransactionKind::AssetTransfer { .. }) && self.close_to.is_some()
    }

    pub fn is_rekey(&self) -> bool {
        self.rekey_to.is_some()
    }

    pub fn is_close(&self) -> bool {
        self.close_to.is_some()
    }

    /// 署名者が明示的に空リストで指定されているか
    pub fn is_excluded_from_signing(&self) -> bool {
        self.signers.as_ref().is_some_and(Vec::is_empty)
    }
}

// ---------------------------------------------------------------------------
// 検証ゲートの拒否理由
// ---------------------------------------------------------------------------

/// 署名要求を拒否する理由。閉じた集合で、それぞれ安定した数値コードを持つ。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RejectionReason {
    /// 要求形式・機能に対応していない
    Unsupported,
    /// 要求元がこのネットワークでの操作を許可されていない
    Unauthorized,
    /// 要求内容が不正
    InvalidInput,
}

impl RejectionReason {
    /// 要求元へ返す数値コード
    pub fn code(self) -> u16 {
        match self {
            RejectionReason::Unauthorized => 4100,
            RejectionReason::Unsupported => 4200,
            RejectionReason::InvalidInput => 4300,
        }
    }
}

impl std::fmt::Display for RejectionReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RejectionReason::Unsupported => f.write_str("unsupported"),
            RejectionReason::Unauthorized => f.write_str("unauthorized"),
            RejectionReason::InvalidInput => f.write_str("invalid_input"),
        }
    }
}

// ---------------------------------------------------------------------------
// ジョイントアカウント署名の意図
// ---------------------------------------------------------------------------

/// ユーザーがジョイントアカウントで実行したい操作
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "intent", rename_all = "snake_case")]
pub enum TransactionIntent {
    Send {
        receiver: Address,
        amount: u64,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        note: Option<String>,
    },
    Rekey { auth_address: Address },
    AssetOptIn { asset_id: u64 },
    AssetSend {
        asset_id: u64,
        receiver: Address,
        amount: u64,
        /// 受取人の最低残高を補うために同じグループで送るAlgo量
        #[serde(default, skip_serializing_if = "Option::is_none")]
        receiver_funding: Option<u64>,
    },
}

// ---------------------------------------------------------------------------
// コーディネーションサービスとの送受信データ
// ---------------------------------------------------------------------------

/// 参加者1人分の回答種別
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResponseKind {
    Signed,
    Declined,
    #[serde(other)]
    Unknown,
}

/// 参加者1人分の回答。
/// `signatures` はトランザクションリストと同じ二重配列の形を持つ。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignRequestResponse {
    pub address: Address,
    pub response: ResponseKind,
    /// Base64エンコードされた署名
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub signatures: Vec<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub device_id: Option<String>,
}

impl SignRequestResponse {
    pub fn signed(address: impl Into<Address>, signatures: Vec<Vec<String>>) -> Self {
        Self {
            address: address.into(),
            response: ResponseKind::Signed,
            signatures,
            device_id: None,
        }
    }

    pub fn declined(address: impl Into<Address>, device_id: impl Into<String>) -> Self {
        Self {
            address: address.into(),
            response: ResponseKind::Declined,
            signatures: Vec::new(),
            device_id: Some(device_id.into()),
        }
    }

    /// 署名の形がトランザクションリストと一致するか
    pub fn matches_shape(&self, transaction_lists: &[Vec<String>]) -> bool {
        self.signatures.len() == transaction_lists.len()
            && self
                .signatures
                .iter()
                .zip(transaction_lists)
                .all(|(sigs, txs)| sigs.len() == txs.len())
    }
}

/// 署名依頼の種別
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SignRequestType {
    #[default]
    Async,
}

/// コーディネーションサービスへ送る署名提案
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SigningProposal {
    pub joint_account_address: Address,
    pub proposer_address: Address,
    #[serde(rename = "type", default)]
    pub request_type: SignRequestType,
    /// Base64エンコードされた未署名トランザクション
    pub raw_transaction_lists: Vec<Vec<String>>,
    pub responses: Vec<SignRequestResponse>,
}

/// サービス側の署名依頼ステータス
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SignRequestStatus {
    Pending,
    Ready,
    Submitting,
    Confirmed,
    Failed,
    Expired,
    Declined,
}

/// 利用者向けに集約した進行状況
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SignRequestProgress {
    InProgress,
    Success,
    Cancelled,
}

impl SignRequestStatus {
    pub fn progress(self) -> SignRequestProgress {
        match self {
            SignRequestStatus::Pending
            | SignRequestStatus::Ready
            | SignRequestStatus::Submitting => SignRequestProgress::InProgress,
            SignRequestStatus::Confirmed => SignRequestProgress::Success,
            SignRequestStatus::Failed
            | SignRequestStatus::Expired
            | SignRequestStatus::Declined => SignRequestProgress::Cancelled,
        }
    }

    pub fn is_terminal(self) -> bool {
        self.progress() != SignRequestProgress::InProgress
    }
}

/// 署名提案の受理結果
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProposalMetadata {
    pub id: String,
    pub joint_account_address: Address,
    pub proposer_address: Address,
    pub status: SignRequestStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<String>,
}

/// サービスが保持する署名依頼の全体像
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignRequest {
    pub id: String,
    pub joint_account: JointAccount,
    pub proposer_address: Address,
    pub status: SignRequestStatus,
    pub raw_transaction_lists: Vec<Vec<String>>,
    #[serde(default)]
    pub responses: Vec<SignRequestResponse>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<String>,
}

impl SignRequest {
    /// 指定アドレスの回答（複数あれば最後のもの）
    pub fn response_of(&self, address: &str) -> Option<&SignRequestResponse> {
        self.responses.iter().rev().find(|r| r.address == address)
    }
}

/// 既存の署名依頼へ回答を追加する際のリクエストボディ
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignResponsesSubmission {
    pub responses: Vec<SignRequestResponse>,
}
