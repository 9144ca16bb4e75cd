//! # アカウントディレクトリ
//!
//! 端末が把握しているアカウントを解決する抽象インターフェース。
//!
//! ## 実装
//! - `StaticAccountDirectory`: JSONファイルやテストで与えたアカウント一覧を保持する

use serde::{Deserialize, Serialize};
use txauth_types::{Account, AccountKind, Address, JointAccount};

/// ローカルアカウントを解決するトレイト。
pub trait AccountDirectory: Send + Sync {
    /// アドレスに対応するローカルアカウントを返す（閲覧専用も含む）。
    fn resolve_signer(&self, address: &str) -> Option<Account>;

    /// 端末が保持するジョイントアカウント一覧
    fn joint_accounts(&self) -> Vec<JointAccount> {
        Vec::new()
    }

    /// アカウントがこの端末で署名できるか。
    ///
    /// 閲覧専用とジョイントアカウントは署名できない。
    /// 自分以外へリキーされている場合は認可アカウントが署名可能でなければならない。
    fn is_signing_capable(&self, account: &Account) -> bool {
        match account.kind {
            AccountKind::Watch | AccountKind::Joint => false,
            _ if account.has_auth_account() => account
                .auth_address
                .as_deref()
                .and_then(|auth| self.resolve_signer(auth))
                .is_some_and(|auth| !matches!(auth.kind, AccountKind::Watch | AccountKind::Joint)),
            _ => true,
        }
    }

    /// ジョイントアカウントの参加者アドレス（構成順）
    fn participants(&self, joint: &JointAccount) -> Vec<Address> {
        joint.participants().to_vec()
    }

    /// 同じ参加者集合のジョイントアカウントがすでに存在するか
    fn has_joint_account(&self, participants: &[Address]) -> bool {
        self.joint_accounts()
            .iter()
            .any(|joint| joint.has_same_participants(participants))
    }
}

/// 実際に署名鍵を持つアカウントを解決する。
/// リキー済みなら認可アカウント、そうでなければアカウント自身。
pub fn signing_account(directory: &dyn AccountDirectory, account: &Account) -> Option<Account> {
    if !directory.is_signing_capable(account) {
        return None;
    }
    if account.has_auth_account() {
        directory.resolve_signer(account.signer_address())
    } else {
        Some(account.clone())
    }
}

/// メモリ上のアカウント一覧によるディレクトリ
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StaticAccountDirectory {
    #[serde(default)]
    accounts: Vec<Account>,
    #[serde(default)]
    joint_accounts: Vec<JointAccount>,
}

impl StaticAccountDirectory {
    pub fn new(accounts: Vec<Account>, joint_accounts: Vec<JointAccount>) -> Self {
        Self {
            accounts,
            joint_accounts,
        }
    }

    /// `{"accounts": [...], "joint_accounts": [...]}` 形式のJSONから読み込む
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    pub fn accounts(&self) -> &[Account] {
        &self.accounts
    }

    pub fn joint_account(&self, address: &str) -> Option<&JointAccount> {
        self.joint_accounts.iter().find(|j| j.address() == address)
    }
}

impl AccountDirectory for StaticAccountDirectory {
    fn resolve_signer(&self, address: &str) -> Option<Account> {
        self.accounts.iter().find(|a| a.address == address).cloned()
    }

    fn joint_accounts(&self) -> Vec<JointAccount> {
        self.joint_accounts.clone()
    }
}
