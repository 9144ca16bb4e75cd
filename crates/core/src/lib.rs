//! # txauth Core
//!
//! トランザクション承認コア。署名前の検証ゲートと、
//! ジョイントアカウントの閾値署名を調整するコーディネーターを実装する。
//!
//! ## 処理フロー
//! 1. dAppからの署名要求を検証ゲートで検査する（`validation`）
//! 2. ジョイントアカウントの操作はコーディネーターが署名提案を作成する（`joint`）
//! 3. 他の参加者は署名依頼に回答し、閾値に達するまで状態を追跡する
//!
//! 外部との境界（アカウントディレクトリ、チェーンパラメータ、ドラフト構築、
//! ローカル署名、コーディネーションサービス）はトレイトで抽象化する。

pub mod cancel;
pub mod directory;
pub mod draft;
pub mod error;
pub mod joint;
pub mod params;
pub mod service;
pub mod signer;
pub mod validation;

#[cfg(test)]
pub(crate) mod test_helpers;

pub use cancel::Cancellation;
pub use directory::{AccountDirectory, StaticAccountDirectory};
pub use draft::{CanonicalDraftBuilder, DraftBuilder, UnsignedTransaction};
pub use error::{AuthorizationError, DraftError, NetworkError, ResponseError, ServiceError};
pub use joint::{
    poll_until_settled, AuthorizationState, Collaborators, JointSigningCoordinator, SignDecision,
    SignatureTally, DEFAULT_POLL_INTERVAL,
};
pub use params::{CachedChainParams, ChainParamSource};
pub use service::CoordinationService;
pub use signer::{KeyStoreSigner, LocalSigner};
pub use validation::{Rejection, ValidationGate, ValidationRule, MAX_TRANSACTION_COUNT};
