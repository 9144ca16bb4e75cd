//! # キャンセル
//!
//! 進行中の承認・回答処理を呼び出し側から中断するためのハンドル。
//! `tokio::sync::watch` で状態を共有し、クローンはすべて同じ状態を参照する。

use std::future::Future;
use std::sync::Arc;

use tokio::sync::watch;

/// 協調的キャンセルのハンドル
#[derive(Debug, Clone)]
pub struct Cancellation {
    sender: Arc<watch::Sender<bool>>,
    receiver: watch::Receiver<bool>,
}

impl Default for Cancellation {
    fn default() -> Self {
        Self::new()
    }
}

impl Cancellation {
    pub fn new() -> Self {
        let (sender, receiver) = watch::channel(false);
        Self {
            sender: Arc::new(sender),
            receiver,
        }
    }

    /// キャンセルを要求する。複数回呼んでも同じ。
    pub fn cancel(&self) {
        self.sender.send_replace(true);
    }

    pub fn is_cancelled(&self) -> bool {
        *self.receiver.borrow()
    }

    /// キャンセルされるまで待機する
    pub async fn cancelled(&self) {
        let mut receiver = self.receiver.clone();
        // 送信側は自身が保持しているため、待機中に閉じることはない
        let _ = receiver.wait_for(|cancelled| *cancelled).await;
    }

    /// Futureを実行し、先にキャンセルされた場合はNoneを返す。
    /// 開始前にキャンセル済みならFutureは一度もポーリングされない。
    pub async fn run<F: Future>(&self, future: F) -> Option<F::Output> {
        tokio::select! {
            biased;
            _ = self.cancelled() => None,
            output = future => Some(output),
        }
    }
}
