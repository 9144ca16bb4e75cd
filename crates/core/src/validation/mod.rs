//! # 検証ゲート
//!
//! dAppから署名を要求されたトランザクション一式を、ユーザーに提示する前に検査する。
//!
//! ## 検査順序
//! ルールは固定順に評価し、最初に失敗したルールの拒否理由だけを返す。
//! 1. 件数上限 (unsupported)
//! 2. ネットワーク不一致 (unauthorized)
//! 3. 不正なアドレス (invalid_input)
//! 4. 事前署名済みマルチシグ (unsupported)
//! 5. 認可アドレスの不一致 (invalid_input)
//! 6. アトミックグループ内のBluetooth接続ハードウェアウォレット (unsupported)
//! 7. 未対応のアプリケーションコール (unsupported)
//! 8. 署名できるトランザクションが無いグループ (invalid_input)
//!
//! 検査は読み取り専用で、同じ入力に対して常に同じ結果を返す。

mod rules;


use serde::{Deserialize, Serialize};
use txauth_types::{
    Account, NetworkContext, ProposedTransaction, RejectionReason, TransactionGroups,
};

use crate::directory::{signing_account, AccountDirectory};

pub use rules::{is_supported_app_call, MAX_APP_ACCOUNTS, MAX_APP_ARGS, MAX_APP_REFERENCES};

/// 1回の要求で受け付けるトランザクションの最大件数
pub const MAX_TRANSACTION_COUNT: usize = 16;

/// 検査ルールの識別子（評価順）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ValidationRule {
    TransactionLimit,
    NetworkMismatch,
    InvalidAddress,
    PresignedMultisig,
    AuthAddressMismatch,
    HardwareInAtomicGroup,
    UnsupportedAppCall,
    UnsignableGroup,
}

/// 検証ゲートによる拒否
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, thiserror::Error)]
#[error("トランザクション要求を拒否しました: {reason} ({rule:?})")]
pub struct Rejection {
    pub reason: RejectionReason,
    pub rule: ValidationRule,
}

impl Rejection {
    pub fn code(&self) -> u16 {
        self.reason.code()
    }
}

/// 検査に必要な入力一式
pub struct ValidationContext<'a> {
    pub transactions: &'a [ProposedTransaction],
    pub groups: &'a TransactionGroups,
    pub network: &'a NetworkContext,
    pub directory: &'a dyn AccountDirectory,
}

impl ValidationContext<'_> {
    /// トランザクションに署名するローカルアカウントを解決する。
    ///
    /// 署名者が空リストで除外されている、送信者が未知、あるいは
    /// 署名鍵をこの端末が持たない場合はNone。
    pub fn signer_for(&self, transaction: &ProposedTransaction) -> Option<Account> {
        if transaction.is_excluded_from_signing() {
            return None;
        }
        let account = match transaction.auth_address.as_deref() {
            Some(auth) => self.directory.resolve_signer(auth)?,
            None => self.directory.resolve_signer(&transaction.sender)?,
        };
        signing_account(self.directory, &account)
    }
}

/// 検証ゲート。現在のネットワークとアカウントディレクトリに対して要求を検査する。
pub struct ValidationGate<'a> {
    network: &'a NetworkContext,
    directory: &'a dyn AccountDirectory,
}

impl<'a> ValidationGate<'a> {
    pub fn new(network: &'a NetworkContext, directory: &'a dyn AccountDirectory) -> Self {
        Self { network, directory }
    }

    /// 要求を検査する。最初に失敗したルールの拒否を返す。
    pub fn validate(
        &self,
        transactions: &[ProposedTransaction],
        groups: &TransactionGroups,
    ) -> Result<(), Rejection> {
        let context = ValidationContext {
            transactions,
            groups,
            network: self.network,
            directory: self.directory,
        };
        match rules::evaluate(&context) {
            Ok(()) => {
                tracing::debug!(count = transactions.len(), "トランザクション要求を受理");
                Ok(())
            }
            Err(rejection) => {
                tracing::warn!(
                    rule = ?rejection.rule,
                    reason = %rejection.reason,
                    code = rejection.code(),
                    "トランザクション要求を拒否"
                );
                Err(rejection)
            }
        }
    }

    /// グループ分けを自動で行って検査する
    pub fn validate_batch(&self, transactions: &[ProposedTransaction]) -> Result<(), Rejection> {
        let groups = group_transactions(transactions);
        self.validate(transactions, &groups)
    }
}

/// グループIDを持つトランザクションをグループごとにまとめる（要求内の順序を保持）
pub fn group_transactions(transactions: &[ProposedTransaction]) -> TransactionGroups {
    let mut groups = TransactionGroups::new();
    for tx in transactions {
        if let Some(group_id) = &tx.group_id {
            groups.entry(group_id.clone()).or_default().push(tx.clone());
        }
    }
    groups
}
