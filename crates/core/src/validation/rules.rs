use txauth_types::{AccountKind, AppCall, OnComplete, RejectionReason, TransactionKind};

use super::{Rejection, ValidationContext, ValidationRule, MAX_TRANSACTION_COUNT};

/// アプリケーションコールで参照できるアカウント数の上限
pub const MAX_APP_ACCOUNTS: usize = 4;
/// アプリケーションコール引数の上限
pub const MAX_APP_ARGS: usize = 16;
/// アカウント・アプリ・アセット参照の合計上限
pub const MAX_APP_REFERENCES: usize = 8;

struct Rule {
    rule: ValidationRule,
    reason: RejectionReason,
    check: fn(&ValidationContext<'_>) -> bool,
}

/// 評価順に並んだルール一覧
const RULES: [Rule; 8] = [
    Rule {
        rule: ValidationRule::TransactionLimit,
        reason: RejectionReason::Unsupported,
        check: within_transaction_limit,
    },
    Rule {
        rule: ValidationRule::NetworkMismatch,
        reason: RejectionReason::Unauthorized,
        check: matches_network,
    },
    Rule {
        rule: ValidationRule::InvalidAddress,
        reason: RejectionReason::InvalidInput,
        check: addresses_are_valid,
    },
    Rule {
        rule: ValidationRule::PresignedMultisig,
        reason: RejectionReason::Unsupported,
        check: no_presigned_multisig,
    },
    Rule {
        rule: ValidationRule::AuthAddressMismatch,
        reason: RejectionReason::InvalidInput,
        check: auth_addresses_consistent,
    },
    Rule {
        rule: ValidationRule::HardwareInAtomicGroup,
        reason: RejectionReason::Unsupported,
        check: hardware_can_sign_groups,
    },
    Rule {
        rule: ValidationRule::UnsupportedAppCall,
        reason: RejectionReason::Unsupported,
        check: app_calls_supported,
    },
    Rule {
        rule: ValidationRule::UnsignableGroup,
        reason: RejectionReason::InvalidInput,
        check: every_group_signable,
    },
];

pub(super) fn evaluate(context: &ValidationContext<'_>) -> Result<(), Rejection> {
    match RULES.iter().find(|rule| !(rule.check)(context)) {
        Some(failed) => Err(Rejection {
            reason: failed.reason,
            rule: failed.rule,
        }),
        None => Ok(()),
    }
}

fn within_transaction_limit(context: &ValidationContext<'_>) -> bool {
    context.transactions.len() <= MAX_TRANSACTION_COUNT
}

fn matches_network(context: &ValidationContext<'_>) -> bool {
    context.transactions.iter().all(|tx| {
        tx.genesis_hash == context.network.genesis_hash
            && tx
                .genesis_id
                .as_deref()
                .map_or(true, |id| id == context.network.genesis_id)
    })
}

fn addresses_are_valid(context: &ValidationContext<'_>) -> bool {
    context.transactions.iter().all(|tx| {
        tx.referenced_addresses()
            .into_iter()
            .all(txauth_crypto::is_valid_address)
    })
}

fn no_presigned_multisig(context: &ValidationContext<'_>) -> bool {
    context.transactions.iter().all(|tx| !tx.is_multisig)
}

/// 指定された認可アドレスは署名可能なローカルアカウントで、
/// かつ送信者のオンチェーン上の認可状態と一致していなければならない。
/// 署名対象外と明示されたトランザクションは検査しない。
/// 署名対象の送信者がこの端末で未知の場合は一致を確認できないため不合格とする。
fn auth_addresses_consistent(context: &ValidationContext<'_>) -> bool {
    context.transactions.iter().all(|tx| {
        if tx.is_excluded_from_signing() {
            return true;
        }
        let Some(auth) = tx.auth_address.as_deref() else {
            return true;
        };
        let auth_capable = context
            .directory
            .resolve_signer(auth)
            .is_some_and(|account| context.directory.is_signing_capable(&account));
        let sender_consistent = context
            .directory
            .resolve_signer(&tx.sender)
            .is_some_and(|sender| sender.signer_address() == auth);
        auth_capable && sender_consistent
    })
}

/// 2件以上のグループでは、ハードウェアウォレットの署名者が
/// 1セッションで全件に署名できる接続方式でなければならない。
fn hardware_can_sign_groups(context: &ValidationContext<'_>) -> bool {
    context
        .groups
        .values()
        .filter(|group| group.len() > 1)
        .flatten()
        .all(|tx| match context.signer_for(tx) {
            Some(account) if account.kind == AccountKind::Hardware => account
                .hardware_transport
                .is_some_and(|transport| transport.supports_atomic_session()),
            _ => true,
        })
}

fn app_calls_supported(context: &ValidationContext<'_>) -> bool {
    context.transactions.iter().all(|tx| match &tx.kind {
        TransactionKind::ApplicationCall(call) => is_supported_app_call(call),
        _ => true,
    })
}

fn every_group_signable(context: &ValidationContext<'_>) -> bool {
    context
        .groups
        .values()
        .all(|group| group.iter().any(|tx| context.signer_for(tx).is_some()))
}

/// アプリケーションコールの形が対応範囲内か。
///
/// 作成・更新は承認プログラムとクリアプログラムの両方を伴うこと、
/// それ以外はプログラムを伴わないことを要求し、
/// 参照数はプロトコル上限に収まっていなければならない。
pub fn is_supported_app_call(call: &AppCall) -> bool {
    let both_programs = call.approval_program.is_some() && call.clear_program.is_some();
    let any_program = call.approval_program.is_some() || call.clear_program.is_some();
    let shape_ok = match call.on_complete {
        OnComplete::UpdateApplication => call.app_id != 0 && both_programs,
        OnComplete::NoOp | OnComplete::OptIn if call.app_id == 0 => both_programs,
        _ if call.app_id == 0 => false,
        _ => !any_program,
    };
    let references = call.accounts.len() + call.foreign_apps.len() + call.foreign_assets.len();
    shape_ok
        && call.accounts.len() <= MAX_APP_ACCOUNTS
        && call.args.len() <= MAX_APP_ARGS
        && references <= MAX_APP_REFERENCES
}
