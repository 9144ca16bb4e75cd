//! 他の参加者が作成した署名依頼への回答と、提案者による取り消し。

use std::sync::Arc;

use base64::Engine;
use txauth_types::{ResponseKind, SignRequest, SignRequestResponse};

use super::{b64, collect_signatures, JointSigningCoordinator};
use crate::cancel::Cancellation;
use crate::error::ResponseError;

/// 署名依頼への回答
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignDecision {
    Confirm,
    Decline,
}

impl JointSigningCoordinator {
    /// 署名依頼に、この端末の未回答の参加者として回答する。
    ///
    /// 承認時は各参加者が全トランザクションに署名し（署名者単位で全件成功か除外）、
    /// 拒否時は参加者ごとにデバイスID付きの拒否回答を作る。送信した回答を返す。
    pub async fn respond(
        &self,
        request: &SignRequest,
        decision: SignDecision,
        cancel: &Cancellation,
    ) -> Result<Vec<SignRequestResponse>, ResponseError> {
        if request.status.is_terminal() {
            return Err(ResponseError::RequestClosed(request.status));
        }

        let participants: Vec<_> = self
            .local_signers(&request.joint_account)
            .into_iter()
            .filter(|account| {
                request
                    .response_of(&account.address)
                    .map_or(true, |r| r.response == ResponseKind::Unknown)
            })
            .collect();
        if participants.is_empty() {
            return Err(ResponseError::NoLocalParticipant);
        }

        let responses = match decision {
            SignDecision::Confirm => {
                let lists = decode_transaction_lists(&request.raw_transaction_lists)?;
                let responses = cancel
                    .run(collect_signatures(
                        Arc::clone(&self.signer),
                        participants,
                        Arc::new(lists),
                    ))
                    .await
                    .ok_or(ResponseError::Cancelled)?;
                if responses.is_empty() {
                    return Err(ResponseError::NoLocalParticipant);
                }
                responses
            }
            SignDecision::Decline => {
                let device_id = self.device_id.clone().ok_or(ResponseError::MissingDeviceId)?;
                participants
                    .into_iter()
                    .map(|account| {
                        SignRequestResponse::declined(account.address, device_id.clone())
                    })
                    .collect()
            }
        };

        cancel
            .run(self.service.submit_responses(&request.id, &responses))
            .await
            .ok_or(ResponseError::Cancelled)??;
        tracing::info!(
            request_id = %request.id,
            decision = ?decision,
            count = responses.len(),
            "署名依頼に回答しました"
        );
        Ok(responses)
    }

    /// 提案者として署名依頼を取り消す（提案者アドレスの拒否回答を送る）。
    pub async fn cancel_proposal(
        &self,
        request: &SignRequest,
        cancel: &Cancellation,
    ) -> Result<(), ResponseError> {
        if request.status.is_terminal() {
            return Err(ResponseError::RequestClosed(request.status));
        }
        let proposer = &request.proposer_address;
        let is_local = self
            .directory
            .resolve_signer(proposer)
            .is_some_and(|account| self.directory.is_signing_capable(&account));
        if !is_local {
            return Err(ResponseError::NotProposer(proposer.clone()));
        }
        let device_id = self.device_id.clone().ok_or(ResponseError::MissingDeviceId)?;

        let responses = [SignRequestResponse::declined(proposer.clone(), device_id)];
        cancel
            .run(self.service.submit_responses(&request.id, &responses))
            .await
            .ok_or(ResponseError::Cancelled)??;
        tracing::info!(request_id = %request.id, proposer = %proposer, "署名依頼を取り消しました");
        Ok(())
    }
}

fn decode_transaction_lists(lists: &[Vec<String>]) -> Result<Vec<Vec<Vec<u8>>>, ResponseError> {
    lists
        .iter()
        .map(|list| {
            list.iter()
                .map(|tx| {
                    b64()
                        .decode(tx)
                        .map_err(|e| ResponseError::MalformedTransaction(e.to_string()))
                })
                .collect()
        })
        .collect()
}
