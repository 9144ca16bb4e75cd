//! 署名依頼の進捗集計とポーリング。

use std::time::Duration;

use serde::Serialize;
use tokio::time::MissedTickBehavior;
use txauth_types::{ResponseKind, SignRequest};

use crate::cancel::Cancellation;
use crate::error::ServiceError;
use crate::service::CoordinationService;

/// 署名依頼の状態を問い合わせる既定の間隔
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(6);

/// 参加者ごとの回答を閾値に対して集計したもの
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SignatureTally {
    pub signed: usize,
    pub declined: usize,
    pub pending: usize,
    pub threshold: u32,
}

impl SignatureTally {
    pub fn from_request(request: &SignRequest) -> Self {
        let mut tally = Self {
            signed: 0,
            declined: 0,
            pending: 0,
            threshold: request.joint_account.threshold(),
        };
        for participant in request.joint_account.participants() {
            match request.response_of(participant).map(|r| r.response) {
                Some(ResponseKind::Signed) => tally.signed += 1,
                Some(ResponseKind::Declined) => tally.declined += 1,
                _ => tally.pending += 1,
            }
        }
        tally
    }

    pub fn is_threshold_met(&self) -> bool {
        self.signed >= self.threshold as usize
    }

    /// 未回答の参加者が全員署名すれば閾値に届くか
    pub fn can_still_succeed(&self) -> bool {
        self.signed + self.pending >= self.threshold as usize
    }
}

/// 署名依頼が終端状態になるまで一定間隔で問い合わせる。
/// キャンセルされた場合は `Ok(None)`。
pub async fn poll_until_settled(
    service: &dyn CoordinationService,
    sign_request_id: &str,
    interval: Duration,
    cancel: &Cancellation,
) -> Result<Option<SignRequest>, ServiceError> {
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    loop {
        if cancel.run(ticker.tick()).await.is_none() {
            return Ok(None);
        }
        let Some(request) = cancel.run(service.fetch_sign_request(sign_request_id)).await else {
            return Ok(None);
        };
        let request = request?;
        let tally = SignatureTally::from_request(&request);
        tracing::debug!(
            request_id = %request.id,
            status = ?request.status,
            signed = tally.signed,
            declined = tally.declined,
            pending = tally.pending,
            threshold = tally.threshold,
            "署名依頼の状態を取得"
        );
        if request.status.is_terminal() {
            return Ok(Some(request));
        }
    }
}
