//! Voting-protocol scenarios for a four-peer BFT cluster (threshold three).
//!
//! Each test drives the machine of one peer, P1, with literal vote
//! sequences and checks the exact finalization behavior.

use ordo_consensus::{
    Answer, ConsensusGate, ConsensusOutcome, ConsistencyModel, OutboundMessage, OutcomeDelay,
    VoteMessage, Yac, YacEvent, YacHash,
};
use ordo_crypto::Keypair;
use ordo_primitives::{Round, H256};
use ordo_types::{Block, LedgerState, Peer, TopBlockInfo};
use std::time::Duration;

struct Cluster {
    keypairs: Vec<Keypair>,
    peers: Vec<Peer>,
}

fn cluster(n: usize) -> Cluster {
    let keypairs: Vec<Keypair> = (0..n).map(|_| Keypair::generate()).collect();
    let peers = keypairs
        .iter()
        .enumerate()
        .map(|(i, k)| Peer::new(k.public_key(), format!("node{}:50541", i)))
        .collect();
    Cluster { keypairs, peers }
}

fn p1(c: &Cluster, round: Round) -> Yac {
    Yac::new(
        c.keypairs[0].clone(),
        ConsistencyModel::Bft,
        round,
        c.peers.clone(),
        3,
    )
}

fn ledger_state(height: u64) -> LedgerState {
    LedgerState::new(
        TopBlockInfo {
            height,
            hash: H256::from_bytes([height as u8; 32]),
        },
        vec![],
        vec![],
    )
}

fn vote(hash: YacHash, keypair: &Keypair) -> VoteMessage {
    VoteMessage::sign(hash, keypair)
}

const R: Round = Round::new(5, 0);

/// S1 - happy commit: the first three votes to arrive at P1 are from P2, P3
/// and P4, all for the same hash. The third vote finalizes the round with
/// exactly those votes, and the driver-side round successor is (6, 0).
#[test]
fn s1_happy_commit() {
    let c = cluster(4);
    let mut yac = p1(&c, R);
    let h = YacHash::new(R, H256::from_bytes([1; 32]), H256::from_bytes([2; 32]));

    assert!(yac.on_state(vec![vote(h, &c.keypairs[1])]).is_none());
    assert!(yac.on_state(vec![vote(h, &c.keypairs[2])]).is_none());
    let event = yac.on_state(vec![vote(h, &c.keypairs[3])]);

    match event {
        Some(YacEvent::Outcome(Answer::Commit(commit))) => {
            assert_eq!(commit.votes.len(), 3);
            let signers: Vec<_> = commit.votes.iter().map(|v| v.signer()).collect();
            assert_eq!(
                signers,
                vec![
                    c.keypairs[1].public_key(),
                    c.keypairs[2].public_key(),
                    c.keypairs[3].public_key()
                ]
            );
        }
        other => panic!("expected commit, got {:?}", other),
    }
    assert_eq!(R.next_commit(), Round::new(6, 0));
}

/// S2 - reject via split: votes arrive P1(H1), P2(H2), P3(H1), P4(H2). At
/// the insertion of the fourth vote no hash can reach three any more and
/// the round rejects. Two such rounds bump the back-off delay once.
#[test]
fn s2_reject_via_split() {
    let c = cluster(4);
    let mut yac = p1(&c, R);
    let h1 = YacHash::new(R, H256::from_bytes([1; 32]), H256::from_bytes([2; 32]));
    let h2 = YacHash::new(R, H256::from_bytes([3; 32]), H256::from_bytes([4; 32]));

    assert!(yac.vote(h1).is_none());
    assert!(yac.on_state(vec![vote(h2, &c.keypairs[1])]).is_none());
    assert!(yac.on_state(vec![vote(h1, &c.keypairs[2])]).is_none());
    let event = yac.on_state(vec![vote(h2, &c.keypairs[3])]);
    let reject = match event {
        Some(YacEvent::Outcome(answer @ Answer::Reject(_))) => answer,
        other => panic!("expected reject, got {:?}", other),
    };
    assert_eq!(reject.round(), R);
    assert_eq!(R.next_reject(), Round::new(5, 1));

    // Two consecutive non-commits raise the delay by the one-second
    // increment
    let mut gate = ConsensusGate::new(R);
    gate.process_round_switch(R, ledger_state(5));
    let outcome = gate
        .process_event(YacEvent::Outcome(reject))
        .expect("gate outcome");
    let mut delay = OutcomeDelay::new(Duration::from_secs(5));
    assert_eq!(delay.on_outcome(&outcome), Duration::ZERO);
    assert_eq!(delay.on_outcome(&outcome), Duration::from_secs(1));
}

/// S3 - nothing round: all four peers vote the empty hash; the outcome maps
/// to `Nothing` and the round successor is (5, 1).
#[test]
fn s3_nothing_round() {
    let c = cluster(4);
    let mut yac = p1(&c, R);
    let nothing = YacHash::nothing(R);

    yac.vote(nothing);
    yac.on_state(vec![vote(nothing, &c.keypairs[1])]);
    let event = yac
        .on_state(vec![vote(nothing, &c.keypairs[2])])
        .expect("third vote finalizes");

    let mut gate = ConsensusGate::new(R);
    gate.process_round_switch(R, ledger_state(5));
    match gate.process_event(event) {
        Some(ConsensusOutcome::Nothing { round, .. }) => assert_eq!(round, R),
        other => panic!("expected nothing, got {:?}", other),
    }
    assert_eq!(R.next_reject(), Round::new(5, 1));
}

/// S4 - future vote: P1 at (5, 0) receives a vote for (6, 0). The vote is
/// buffered without touching round (5, 0) storage and replayed when P1
/// enters (6, 0).
#[test]
fn s4_future_vote_buffered_and_replayed() {
    let c = cluster(4);
    let mut yac = p1(&c, R);
    let next = Round::new(6, 0);
    let h = YacHash::new(next, H256::from_bytes([1; 32]), H256::from_bytes([2; 32]));

    let event = yac.on_state(vec![vote(h, &c.keypairs[1])]);
    assert_eq!(event, Some(YacEvent::Future { round: next }));
    assert!(yac.storage().get_state(R).is_none());
    assert!(yac.storage().get_state(next).is_none());

    // Entering (6, 0) replays the buffered vote: two more remote votes are
    // now enough to finalize
    let peers = yac.cluster().to_vec();
    assert!(yac.start_round(next, peers).is_none());
    yac.on_state(vec![vote(h, &c.keypairs[2])]);
    let event = yac.on_state(vec![vote(h, &c.keypairs[3])]);
    assert!(matches!(
        event,
        Some(YacEvent::Outcome(Answer::Commit(_)))
    ));
}

/// S6 - stale-vote sync helper: P1 is at (8, 0) with a cached commit for
/// (5, 0). A vote from Q for (5, 0) triggers exactly one reply carrying
/// that commit; the storage of (5, 0) is untouched.
#[test]
fn s6_stale_vote_sync_helper() {
    let c = cluster(4);
    let mut yac = p1(&c, R);
    let h = YacHash::new(R, H256::from_bytes([1; 32]), H256::from_bytes([2; 32]));

    // Finalize (5, 0) locally
    yac.vote(h);
    yac.on_state(vec![vote(h, &c.keypairs[1])]);
    yac.on_state(vec![vote(h, &c.keypairs[2])]);
    yac.take_messages();
    let cached = yac.storage().get_state(R).expect("commit cached");

    let peers = yac.cluster().to_vec();
    yac.start_round(Round::new(8, 0), peers);

    let q = &c.keypairs[3];
    let stale = vote(YacHash::nothing(R), q);
    assert!(yac.on_state(vec![stale]).is_none());

    let messages = yac.take_messages();
    assert_eq!(messages.len(), 1);
    match &messages[0] {
        OutboundMessage::SendState { to, votes } => {
            assert_eq!(*to, q.public_key());
            match &cached {
                Answer::Commit(commit) => assert_eq!(votes, &commit.votes),
                _ => unreachable!(),
            }
        }
        other => panic!("expected a single SendState, got {:?}", other),
    }
    assert_eq!(yac.storage().get_state(R), Some(cached));
}

/// The gate attaches the local candidate and the commit certificate when
/// the round commits on the candidate's hash.
#[test]
fn commit_carries_candidate_and_certificate() {
    let c = cluster(4);
    let mut yac = p1(&c, R);

    let candidate = Block::new(6, H256::from_bytes([5; 32]), 1000, vec![], vec![]);
    let h = YacHash::new(R, H256::from_bytes([1; 32]), candidate.hash());

    let mut gate = ConsensusGate::new(R);
    gate.process_round_switch(R, ledger_state(5));
    gate.set_candidate(candidate.clone());

    yac.vote(h);
    yac.on_state(vec![vote(h, &c.keypairs[1])]);
    let event = yac
        .on_state(vec![vote(h, &c.keypairs[2])])
        .expect("third vote finalizes");

    match gate.process_event(event) {
        Some(ConsensusOutcome::Commit {
            block: Some(block),
            votes,
            ..
        }) => {
            assert_eq!(block.hash(), candidate.hash());
            assert_eq!(votes.len(), 3);
            // Every commit vote became a block endorsement
            assert_eq!(block.signatures.len(), 3);
        }
        other => panic!("expected commit with candidate, got {:?}", other),
    }
}
