//! # エラー型定義
//!
//! 外部インターフェース（ネットワーク、コーディネーションサービス、ドラフト構築）と
//! ジョイントアカウント署名フローのエラーを区別して表現する。

use txauth_types::SignRequestStatus;

/// チェーンパラメータ取得などのネットワークエラー
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum NetworkError {
    /// タイムアウト
    #[error("ネットワーク要求がタイムアウトしました")]
    Timeout,
    /// 接続失敗など送信前後のエラー
    #[error("HTTP送信に失敗: {0}")]
    Transport(String),
    /// サーバーが非2xxを返した
    #[error("サーバーがエラーを返しました: HTTP {status} - {body}")]
    Status { status: u16, body: String },
    /// レスポンスのパース失敗
    #[error("レスポンスのパースに失敗: {0}")]
    Decode(String),
}

/// コーディネーションサービスのエラー
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ServiceError {
    #[error(transparent)]
    Network(#[from] NetworkError),
    /// 署名依頼が存在しない
    #[error("署名依頼が見つかりません: {0}")]
    NotFound(String),
    /// サービスが要求を受理しなかった（4xx）
    #[error("コーディネーションサービスが要求を拒否しました: {0}")]
    Rejected(String),
}

/// 未署名トランザクションの構築エラー
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DraftError {
    #[error("アドレスが不正です ({address}): {reason}")]
    InvalidAddress { address: String, reason: String },
    #[error("有効ラウンドの計算でオーバーフローしました: last_round={0}")]
    RoundOverflow(u64),
    #[error("未署名トランザクションのエンコードに失敗: {0}")]
    Encode(String),
    #[error("未署名トランザクションのデコードに失敗: {0}")]
    Decode(String),
    #[error("構築されたトランザクションがありません")]
    Empty,
}

/// ジョイントアカウントの署名提案フローのエラー。
///
/// `Cancelled` は失敗ではなく、呼び出し側が中断したことを示す終端状態。
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AuthorizationError {
    /// ローカルで署名できる参加者が1人もいない
    #[error("ローカルで署名可能な参加者がいません: {joint_address}")]
    NoLocalSigner { joint_address: String },
    #[error("チェーンパラメータの取得に失敗: {0}")]
    Network(#[from] NetworkError),
    #[error("未署名トランザクションの構築に失敗: {0}")]
    Draft(#[from] DraftError),
    #[error("署名提案の送信に失敗: {0}")]
    Service(#[from] ServiceError),
    #[error("承認処理がキャンセルされました")]
    Cancelled,
}

impl AuthorizationError {
    pub fn is_cancelled(&self) -> bool {
        matches!(self, AuthorizationError::Cancelled)
    }
}

/// 既存の署名依頼への回答・取り消しのエラー
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ResponseError {
    /// 署名依頼がすでに終端状態
    #[error("署名依頼はすでに終了しています: {0:?}")]
    RequestClosed(SignRequestStatus),
    /// このウォレットに未回答の参加者がいない
    #[error("回答できるローカル参加者がいません")]
    NoLocalParticipant,
    /// 取り消しは提案者のみ可能
    #[error("提案者ではありません: {0}")]
    NotProposer(String),
    /// 拒否回答にはデバイスIDが必要
    #[error("デバイスIDが設定されていません")]
    MissingDeviceId,
    #[error("トランザクションのデコードに失敗: {0}")]
    MalformedTransaction(String),
    #[error("回答の送信に失敗: {0}")]
    Service(#[from] ServiceError),
    #[error("回答処理がキャンセルされました")]
    Cancelled,
}
