use std::sync::Arc;
use std::time::Duration;

use txauth_types::{
    Account, AccountKind, JointAccount, ResponseKind, SignRequest, SignRequestStatus,
    TransactionIntent,
};

use super::*;
use crate::directory::StaticAccountDirectory;
use crate::draft::CanonicalDraftBuilder;
use crate::error::{NetworkError, ResponseError, ServiceError};
use crate::test_helpers::{
    address, chain_params, joint_account, key_store, FakeParams, RecordingService, RefusingSigner,
};

fn send_intent() -> TransactionIntent {
    TransactionIntent::Send {
        receiver: address(9),
        amount: 250_000,
        note: None,
    }
}

fn funded_asset_send() -> TransactionIntent {
    TransactionIntent::AssetSend {
        asset_id: 31566704,
        receiver: address(9),
        amount: 10,
        receiver_funding: Some(100_000),
    }
}

/// `local` に含まれるシードの参加者だけがこの端末にいるディレクトリ
fn directory_with(local: &[u8]) -> StaticAccountDirectory {
    StaticAccountDirectory::new(
        local.iter().map(|&seed| Account::standard(address(seed))).collect(),
        vec![joint_account()],
    )
}

struct Harness {
    coordinator: JointSigningCoordinator,
    params: Arc<FakeParams>,
    service: Arc<RecordingService>,
}

fn harness_with(
    directory: StaticAccountDirectory,
    signer: Arc<dyn LocalSigner>,
    params: FakeParams,
    service: RecordingService,
) -> Harness {
    let params = Arc::new(params);
    let service = Arc::new(service);
    let coordinator = JointSigningCoordinator::new(Collaborators {
        directory: Arc::new(directory),
        params: params.clone(),
        drafts: Arc::new(CanonicalDraftBuilder),
        signer,
        service: service.clone(),
    })
    .with_device_id("device-1");
    Harness {
        coordinator,
        params,
        service,
    }
}

fn harness(local: &[u8]) -> Harness {
    harness_with(
        directory_with(local),
        Arc::new(key_store(local)),
        FakeParams::ok(chain_params()),
        RecordingService::default(),
    )
}

fn pending_request(raw_transaction_lists: Vec<Vec<String>>) -> SignRequest {
    SignRequest {
        id: "sign-request-1".to_string(),
        joint_account: joint_account(),
        proposer_address: address(1),
        status: SignRequestStatus::Pending,
        raw_transaction_lists,
        responses: vec![],
        expires_at: None,
    }
}

// ---------------------------------------------------------------------------
// authorize
// ---------------------------------------------------------------------------

#[tokio::test]
async fn test_single_local_participant_proposes() {
    // 参加者 [1, 2, 3]、閾値2で1だけがローカル
    let h = harness(&[1]);
    let metadata = h
        .coordinator
        .authorize(&joint_account(), &send_intent(), &Cancellation::new())
        .await
        .unwrap();
    assert_eq!(metadata.proposer_address, address(1));
    assert_eq!(metadata.id, "sign-request-1");

    let proposals = h.service.proposals();
    assert_eq!(proposals.len(), 1);
    let proposal = &proposals[0];
    assert_eq!(proposal.joint_account_address, joint_account().address());
    assert_eq!(proposal.proposer_address, address(1));
    assert_eq!(proposal.responses.len(), 1);
    assert_eq!(proposal.responses[0].address, address(1));
    assert_eq!(proposal.responses[0].response, ResponseKind::Signed);
    assert!(proposal.responses[0].matches_shape(&proposal.raw_transaction_lists));
    assert_eq!(proposal.raw_transaction_lists.len(), 1);
    assert_eq!(proposal.raw_transaction_lists[0].len(), 1);
}

#[tokio::test]
async fn test_signatures_verify_against_drafts() {
    let h = harness(&[2]);
    h.coordinator
        .authorize(&joint_account(), &funded_asset_send(), &Cancellation::new())
        .await
        .unwrap();
    let proposal = h.service.proposals().remove(0);
    let signer: txauth_crypto::Address = address(2).parse().unwrap();

    let transactions = &proposal.raw_transaction_lists[0];
    let signatures = &proposal.responses[0].signatures[0];
    assert_eq!(transactions.len(), 2);
    assert_eq!(signatures.len(), 2);
    for (tx, sig) in transactions.iter().zip(signatures) {
        let tx = b64().decode(tx).unwrap();
        let sig = txauth_crypto::Ed25519Signature::from_slice(&b64().decode(sig).unwrap()).unwrap();
        assert!(txauth_crypto::verify_transaction_signature(&signer, &tx, &sig).is_ok());
    }
}

#[tokio::test]
async fn test_all_local_participants_in_list_order() {
    // ディレクトリの登録順に関わらず参加者リスト順になる
    let directory = StaticAccountDirectory::new(
        vec![
            Account::standard(address(3)),
            Account::standard(address(2)),
            Account::standard(address(1)),
        ],
        vec![],
    );
    let h = harness_with(
        directory,
        Arc::new(key_store(&[1, 2, 3])),
        FakeParams::ok(chain_params()),
        RecordingService::default(),
    );
    let metadata = h
        .coordinator
        .authorize(&joint_account(), &funded_asset_send(), &Cancellation::new())
        .await
        .unwrap();
    assert_eq!(metadata.proposer_address, address(1));

    let proposal = h.service.proposals().remove(0);
    let order: Vec<_> = proposal.responses.iter().map(|r| r.address.clone()).collect();
    assert_eq!(order, vec![address(1), address(2), address(3)]);
    for response in &proposal.responses {
        assert_eq!(response.signatures[0].len(), proposal.raw_transaction_lists[0].len());
    }
}

#[tokio::test]
async fn test_partial_signer_is_excluded_entirely() {
    // 参加者1は2件目に署名できない → 除外され、提案者は2になる
    let drafts = CanonicalDraftBuilder
        .build(joint_account().address(), &funded_asset_send(), &chain_params())
        .unwrap();
    let signer = RefusingSigner {
        inner: key_store(&[1, 2]),
        refuse_address: address(1),
        refuse_transaction: drafts[1].clone(),
    };
    let h = harness_with(
        directory_with(&[1, 2]),
        Arc::new(signer),
        FakeParams::ok(chain_params()),
        RecordingService::default(),
    );
    let metadata = h
        .coordinator
        .authorize(&joint_account(), &funded_asset_send(), &Cancellation::new())
        .await
        .unwrap();
    assert_eq!(metadata.proposer_address, address(2));

    let proposal = h.service.proposals().remove(0);
    assert_eq!(proposal.responses.len(), 1);
    assert_eq!(proposal.responses[0].address, address(2));
    assert_eq!(proposal.responses[0].signatures[0].len(), 2);
}

#[tokio::test]
async fn test_no_local_signer_fails_before_network() {
    let h = harness(&[]);
    let err = h
        .coordinator
        .authorize(&joint_account(), &send_intent(), &Cancellation::new())
        .await
        .unwrap_err();
    assert_eq!(
        err,
        AuthorizationError::NoLocalSigner {
            joint_address: joint_account().address().to_string()
        }
    );
    assert_eq!(h.params.calls(), 0);
    assert!(h.service.proposals().is_empty());
}

#[tokio::test]
async fn test_watch_only_participant_is_not_a_signer() {
    let directory = StaticAccountDirectory::new(vec![Account::watch(address(1))], vec![]);
    let h = harness_with(
        directory,
        Arc::new(key_store(&[1])),
        FakeParams::ok(chain_params()),
        RecordingService::default(),
    );
    let err = h
        .coordinator
        .authorize(&joint_account(), &send_intent(), &Cancellation::new())
        .await
        .unwrap_err();
    assert!(matches!(err, AuthorizationError::NoLocalSigner { .. }));
}

#[tokio::test]
async fn test_local_account_without_key_yields_no_signer() {
    // ディレクトリには居るが鍵が無い
    let h = harness_with(
        directory_with(&[1]),
        Arc::new(key_store(&[])),
        FakeParams::ok(chain_params()),
        RecordingService::default(),
    );
    let err = h
        .coordinator
        .authorize(&joint_account(), &send_intent(), &Cancellation::new())
        .await
        .unwrap_err();
    assert!(matches!(err, AuthorizationError::NoLocalSigner { .. }));
    assert_eq!(h.params.calls(), 1);
    assert!(h.service.proposals().is_empty());
}

#[tokio::test]
async fn test_param_timeout_never_reaches_service() {
    let h = harness_with(
        directory_with(&[1]),
        Arc::new(key_store(&[1])),
        FakeParams::err(NetworkError::Timeout),
        RecordingService::default(),
    );
    let (progress, watcher) = watch::channel(AuthorizationState::Idle);
    let err = h
        .coordinator
        .authorize_with_progress(&joint_account(), &send_intent(), &Cancellation::new(), &progress)
        .await
        .unwrap_err();
    assert_eq!(err, AuthorizationError::Network(NetworkError::Timeout));
    assert_eq!(*watcher.borrow(), AuthorizationState::Failed);
    assert!(h.service.proposals().is_empty());
}

#[tokio::test]
async fn test_service_error_surfaces_verbatim() {
    let rejected = ServiceError::Rejected("joint account not registered".to_string());
    let h = harness_with(
        directory_with(&[1]),
        Arc::new(key_store(&[1])),
        FakeParams::ok(chain_params()),
        RecordingService::failing(rejected.clone()),
    );
    let err = h
        .coordinator
        .authorize(&joint_account(), &send_intent(), &Cancellation::new())
        .await
        .unwrap_err();
    assert_eq!(err, AuthorizationError::Service(rejected));
}

#[tokio::test]
async fn test_invalid_intent_is_draft_error() {
    let h = harness(&[1]);
    let intent = TransactionIntent::Send {
        receiver: "bogus".to_string(),
        amount: 1,
        note: None,
    };
    let err = h
        .coordinator
        .authorize(&joint_account(), &intent, &Cancellation::new())
        .await
        .unwrap_err();
    assert!(matches!(err, AuthorizationError::Draft(DraftError::InvalidAddress { .. })));
}

#[tokio::test]
async fn test_completed_state_reported() {
    let h = harness(&[1]);
    let (progress, watcher) = watch::channel(AuthorizationState::Idle);
    h.coordinator
        .authorize_with_progress(&joint_account(), &send_intent(), &Cancellation::new(), &progress)
        .await
        .unwrap();
    assert_eq!(*watcher.borrow(), AuthorizationState::Completed);
    assert!(watcher.borrow().is_terminal());
}

#[tokio::test]
async fn test_cancel_during_param_fetch() {
    let h = harness_with(
        directory_with(&[1]),
        Arc::new(key_store(&[1])),
        FakeParams::slow(chain_params(), Duration::from_secs(30)),
        RecordingService::default(),
    );
    let cancel = Cancellation::new();
    let remote = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(20)).await;
        remote.cancel();
    });
    let err = h
        .coordinator
        .authorize(&joint_account(), &send_intent(), &cancel)
        .await
        .unwrap_err();
    assert!(err.is_cancelled());
    assert!(h.service.proposals().is_empty());
}

#[tokio::test]
async fn test_cancel_during_submission_discards_result() {
    let h = harness_with(
        directory_with(&[1]),
        Arc::new(key_store(&[1])),
        FakeParams::ok(chain_params()),
        RecordingService::slow(Duration::from_secs(30)),
    );
    let cancel = Cancellation::new();
    let remote = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(50)).await;
        remote.cancel();
    });
    let err = h
        .coordinator
        .authorize(&joint_account(), &send_intent(), &cancel)
        .await
        .unwrap_err();
    assert_eq!(err, AuthorizationError::Cancelled);
    assert!(h.service.proposals().is_empty());
}

#[tokio::test]
async fn test_precancelled_authorize_does_nothing() {
    let h = harness(&[1]);
    let cancel = Cancellation::new();
    cancel.cancel();
    let err = h
        .coordinator
        .authorize(&joint_account(), &send_intent(), &cancel)
        .await
        .unwrap_err();
    assert!(err.is_cancelled());
    assert_eq!(h.params.calls(), 0);
    assert!(h.service.proposals().is_empty());
}

#[tokio::test]
async fn test_concurrent_authorizations_are_independent() {
    let h = harness(&[1, 3]);
    let other_intent = TransactionIntent::Rekey {
        auth_address: address(7),
    };
    let send = send_intent();
    let cancel = Cancellation::new();
    let joint = joint_account();
    let (a, b) = tokio::join!(
        h.coordinator.authorize(&joint, &send, &cancel),
        h.coordinator.authorize(&joint, &other_intent, &cancel),
    );
    assert!(a.is_ok());
    assert!(b.is_ok());

    let proposals = h.service.proposals();
    assert_eq!(proposals.len(), 2);
    assert_ne!(proposals[0].raw_transaction_lists, proposals[1].raw_transaction_lists);
    for proposal in proposals {
        assert_eq!(proposal.proposer_address, address(1));
        assert_eq!(proposal.responses.len(), 2);
    }
}

#[tokio::test]
async fn test_rekeyed_participant_signs_with_auth_key() {
    // 参加者2はシード8へリキー済みで、鍵はシード8のものだけを持つ
    let directory = StaticAccountDirectory::new(
        vec![
            Account::rekeyed(address(2), address(8)),
            Account::standard(address(8)),
        ],
        vec![],
    );
    let h = harness_with(
        directory,
        Arc::new(key_store(&[8])),
        FakeParams::ok(chain_params()),
        RecordingService::default(),
    );
    let metadata = h
        .coordinator
        .authorize(&joint_account(), &send_intent(), &Cancellation::new())
        .await
        .unwrap();
    assert_eq!(metadata.proposer_address, address(2));

    let proposal = h.service.proposals().remove(0);
    let tx = b64().decode(&proposal.raw_transaction_lists[0][0]).unwrap();
    let sig = b64().decode(&proposal.responses[0].signatures[0][0]).unwrap();
    let sig = txauth_crypto::Ed25519Signature::from_slice(&sig).unwrap();
    let auth: txauth_crypto::Address = address(8).parse().unwrap();
    assert!(txauth_crypto::verify_transaction_signature(&auth, &tx, &sig).is_ok());
}

// ---------------------------------------------------------------------------
// respond / cancel_proposal
// ---------------------------------------------------------------------------

async fn proposed_lists() -> Vec<Vec<String>> {
    let h = harness(&[1]);
    h.coordinator
        .authorize(&joint_account(), &funded_asset_send(), &Cancellation::new())
        .await
        .unwrap();
    h.service.proposals().remove(0).raw_transaction_lists
}

#[tokio::test]
async fn test_respond_confirm_signs_every_transaction() {
    let lists = proposed_lists().await;
    let h = harness(&[2, 3]);
    let request = pending_request(lists.clone());
    let responses = h
        .coordinator
        .respond(&request, SignDecision::Confirm, &Cancellation::new())
        .await
        .unwrap();
    assert_eq!(responses.len(), 2);
    assert!(responses.iter().all(|r| r.matches_shape(&lists)));

    let submitted = h.service.submitted();
    assert_eq!(submitted.len(), 1);
    assert_eq!(submitted[0].0, "sign-request-1");
    assert_eq!(submitted[0].1, responses);
}

#[tokio::test]
async fn test_respond_skips_participants_that_already_answered() {
    let lists = proposed_lists().await;
    let h = harness(&[1, 2]);
    let mut request = pending_request(lists);
    request.responses = vec![SignRequestResponse::signed(address(1), vec![vec![]])];
    let responses = h
        .coordinator
        .respond(&request, SignDecision::Confirm, &Cancellation::new())
        .await
        .unwrap();
    assert_eq!(responses.len(), 1);
    assert_eq!(responses[0].address, address(2));
}

#[tokio::test]
async fn test_respond_decline_carries_device_id() {
    let h = harness(&[3]);
    let request = pending_request(vec![vec!["AAAA".to_string()]]);
    let responses = h
        .coordinator
        .respond(&request, SignDecision::Decline, &Cancellation::new())
        .await
        .unwrap();
    assert_eq!(responses, vec![SignRequestResponse::declined(address(3), "device-1")]);
}

#[tokio::test]
async fn test_respond_rejects_closed_request() {
    let h = harness(&[2]);
    let mut request = pending_request(vec![]);
    request.status = SignRequestStatus::Expired;
    let err = h
        .coordinator
        .respond(&request, SignDecision::Confirm, &Cancellation::new())
        .await
        .unwrap_err();
    assert_eq!(err, ResponseError::RequestClosed(SignRequestStatus::Expired));
    assert!(h.service.submitted().is_empty());
}

#[tokio::test]
async fn test_respond_without_local_participant() {
    let h = harness(&[]);
    let err = h
        .coordinator
        .respond(&pending_request(vec![]), SignDecision::Confirm, &Cancellation::new())
        .await
        .unwrap_err();
    assert_eq!(err, ResponseError::NoLocalParticipant);
}

#[tokio::test]
async fn test_respond_rejects_malformed_transaction() {
    let h = harness(&[2]);
    let request = pending_request(vec![vec!["***".to_string()]]);
    let err = h
        .coordinator
        .respond(&request, SignDecision::Confirm, &Cancellation::new())
        .await
        .unwrap_err();
    assert!(matches!(err, ResponseError::MalformedTransaction(_)));
}

#[tokio::test]
async fn test_decline_requires_device_id() {
    let coordinator = JointSigningCoordinator::new(Collaborators {
        directory: Arc::new(directory_with(&[2])),
        params: Arc::new(FakeParams::ok(chain_params())),
        drafts: Arc::new(CanonicalDraftBuilder),
        signer: Arc::new(key_store(&[2])),
        service: Arc::new(RecordingService::default()),
    });
    let err = coordinator
        .respond(&pending_request(vec![]), SignDecision::Decline, &Cancellation::new())
        .await
        .unwrap_err();
    assert_eq!(err, ResponseError::MissingDeviceId);
}

#[tokio::test]
async fn test_proposer_cancels_with_declined_response() {
    let h = harness(&[1]);
    h.coordinator
        .cancel_proposal(&pending_request(vec![]), &Cancellation::new())
        .await
        .unwrap();
    let submitted = h.service.submitted();
    assert_eq!(submitted.len(), 1);
    assert_eq!(
        submitted[0].1,
        vec![SignRequestResponse::declined(address(1), "device-1")]
    );
}

#[tokio::test]
async fn test_non_proposer_cannot_cancel() {
    let h = harness(&[2]);
    let err = h
        .coordinator
        .cancel_proposal(&pending_request(vec![]), &Cancellation::new())
        .await
        .unwrap_err();
    assert_eq!(err, ResponseError::NotProposer(address(1)));
}

// ---------------------------------------------------------------------------
// 集計とポーリング
// ---------------------------------------------------------------------------

fn request_with(status: SignRequestStatus, responses: Vec<SignRequestResponse>) -> SignRequest {
    SignRequest {
        status,
        responses,
        ..pending_request(vec![vec!["AAAA".to_string()]])
    }
}

#[test]
fn test_tally_counts_against_threshold() {
    let request = request_with(
        SignRequestStatus::Pending,
        vec![
            SignRequestResponse::signed(address(1), vec![vec!["s".to_string()]]),
            SignRequestResponse::declined(address(2), "d"),
        ],
    );
    let tally = SignatureTally::from_request(&request);
    assert_eq!(
        tally,
        SignatureTally {
            signed: 1,
            declined: 1,
            pending: 1,
            threshold: 2
        }
    );
    assert!(!tally.is_threshold_met());
    assert!(tally.can_still_succeed());

    let request = request_with(
        SignRequestStatus::Declined,
        vec![
            SignRequestResponse::declined(address(1), "d"),
            SignRequestResponse::declined(address(2), "d"),
        ],
    );
    assert!(!SignatureTally::from_request(&request).can_still_succeed());
}

#[test]
fn test_tally_ignores_non_participants() {
    let joint = JointAccount::new(address(100), vec![address(1)], 1).unwrap();
    let request = SignRequest {
        joint_account: joint,
        ..request_with(
            SignRequestStatus::Ready,
            vec![
                SignRequestResponse::signed(address(1), vec![]),
                SignRequestResponse::signed(address(50), vec![]),
            ],
        )
    };
    let tally = SignatureTally::from_request(&request);
    assert_eq!(tally.signed, 1);
    assert!(tally.is_threshold_met());
}

#[tokio::test]
async fn test_poll_until_terminal_status() {
    let service = RecordingService::with_requests(vec![
        request_with(SignRequestStatus::Pending, vec![]),
        request_with(SignRequestStatus::Ready, vec![]),
        request_with(SignRequestStatus::Confirmed, vec![]),
    ]);
    let settled = poll_until_settled(
        &service,
        "sign-request-1",
        Duration::from_millis(5),
        &Cancellation::new(),
    )
    .await
    .unwrap()
    .unwrap();
    assert_eq!(settled.status, SignRequestStatus::Confirmed);
    assert_eq!(service.fetches.load(std::sync::atomic::Ordering::SeqCst), 3);
}

#[tokio::test]
async fn test_poll_stops_on_cancel() {
    let service =
        RecordingService::with_requests(vec![request_with(SignRequestStatus::Pending, vec![])]);
    let cancel = Cancellation::new();
    let remote = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(30)).await;
        remote.cancel();
    });
    let outcome = poll_until_settled(&service, "sign-request-1", Duration::from_millis(5), &cancel)
        .await
        .unwrap();
    assert!(outcome.is_none());
}

#[tokio::test]
async fn test_poll_propagates_service_error() {
    let service = RecordingService::with_requests(vec![]);
    let err = poll_until_settled(
        &service,
        "missing",
        Duration::from_millis(5),
        &Cancellation::new(),
    )
    .await
    .unwrap_err();
    assert_eq!(err, ServiceError::NotFound("missing".to_string()));
}

#[test]
fn test_joint_kind_is_not_signing_capable() {
    let directory = StaticAccountDirectory::default();
    let joint = Account {
        kind: AccountKind::Joint,
        ..Account::standard(address(100))
    };
    assert!(!directory.is_signing_capable(&joint));
}
