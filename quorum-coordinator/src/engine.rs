// The coordinator's protocol engine (§4.1). Both 2PC and 3PC are driven
// through the same `Participant` trait, which abstracts "talk to one
// participant" the way the reference abstracts storage behind a `Store`
// trait: the voting/decision logic is unit-testable against an in-memory
// fake and only swapped for a real HTTP client in production.

use async_trait::async_trait;
use quorum_base::Result;
use quorum_wire::{Decision, Op, Protocol, Vote};
use std::collections::BTreeMap;
use std::sync::Mutex;
use std::time::Duration;
use tracing::info;

use crate::decision_log::DecisionLog;

#[async_trait]
pub trait Participant: Send + Sync {
    /// `None` stands for any transport error, timeout, non-200 status,
    /// missing field, or unparsable body (§4.1.1) — the caller folds that
    /// into the synthetic `NO_TIMEOUT` vote.
    async fn prepare(&self, endpoint: &str, txid: &str, op: &Op) -> Option<Vote>;
    async fn can_commit(&self, endpoint: &str, txid: &str, op: &Op) -> Option<Vote>;
    async fn precommit(&self, endpoint: &str, txid: &str);
    async fn commit(&self, endpoint: &str, txid: &str);
    async fn abort(&self, endpoint: &str, txid: &str);
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub enum CoordState {
    PrepareSent,
    CanCommitSent,
    PrecommitSent,
    CommitSent,
    AbortSent,
    Done,
}

#[derive(Clone, Debug)]
pub struct TxRecord {
    pub protocol: Protocol,
    pub op: Op,
    pub state: CoordState,
    pub votes: BTreeMap<String, Vote>,
}

pub struct Engine<P: Participant> {
    client: P,
    participants: Vec<String>,
    crash_window: Duration,
    decision_log: Mutex<DecisionLog>,
    tx: Mutex<BTreeMap<String, TxRecord>>,
    // Serializes transaction execution: the coordinator drives at most one
    // transaction at a time (§5), but status reads never wait on this.
    exec_lock: tokio::sync::Mutex<()>,
}

impl<P: Participant> Engine<P> {
    pub fn new(
        client: P,
        participants: Vec<String>,
        crash_window: Duration,
        decision_log: DecisionLog,
    ) -> Self {
        Engine {
            client,
            participants,
            crash_window,
            decision_log: Mutex::new(decision_log),
            tx: Mutex::new(BTreeMap::new()),
            exec_lock: tokio::sync::Mutex::new(()),
        }
    }

    pub async fn start_tx(
        &self,
        txid: String,
        op: Op,
        protocol: Protocol,
    ) -> Result<(Decision, BTreeMap<String, Vote>)> {
        let _guard = self.exec_lock.lock().await;
        match protocol {
            Protocol::TwoPc => self.run_2pc(txid, op).await,
            Protocol::ThreePc => self.run_3pc(txid, op).await,
        }
    }

    pub fn status(&self) -> BTreeMap<String, TxRecord> {
        self.tx.lock().unwrap().clone()
    }

    async fn run_2pc(&self, txid: String, op: Op) -> Result<(Decision, BTreeMap<String, Vote>)> {
        self.insert_record(&txid, Protocol::TwoPc, op.clone(), CoordState::PrepareSent);

        let mut votes = BTreeMap::new();
        let mut all_yes = true;
        for endpoint in &self.participants {
            let vote = self
                .client
                .prepare(endpoint, &txid, &op)
                .await
                .unwrap_or(Vote::NoTimeout);
            all_yes &= vote.is_yes();
            votes.insert(endpoint.clone(), vote);
        }

        if !self.crash_window.is_zero() {
            info!(
                txid = %txid,
                ms = self.crash_window.as_millis() as u64,
                "sleeping in post-vote crash window"
            );
            tokio::time::sleep(self.crash_window).await;
        }

        let decision = Decision::from_all_yes(all_yes);
        self.log_decision(&txid, decision)?;
        self.set_state(
            &txid,
            match decision {
                Decision::Commit => CoordState::CommitSent,
                Decision::Abort => CoordState::AbortSent,
            },
        );

        for endpoint in &self.participants {
            match decision {
                Decision::Commit => self.client.commit(endpoint, &txid).await,
                Decision::Abort => self.client.abort(endpoint, &txid).await,
            }
        }

        self.set_votes(&txid, votes.clone());
        self.set_state(&txid, CoordState::Done);
        Ok((decision, votes))
    }

    async fn run_3pc(&self, txid: String, op: Op) -> Result<(Decision, BTreeMap<String, Vote>)> {
        self.insert_record(&txid, Protocol::ThreePc, op.clone(), CoordState::CanCommitSent);

        let mut votes = BTreeMap::new();
        let mut all_yes = true;
        for endpoint in &self.participants {
            let vote = self
                .client
                .can_commit(endpoint, &txid, &op)
                .await
                .unwrap_or(Vote::NoTimeout);
            all_yes &= vote.is_yes();
            votes.insert(endpoint.clone(), vote);
        }

        if !all_yes {
            self.log_decision(&txid, Decision::Abort)?;
            self.set_state(&txid, CoordState::AbortSent);
            for endpoint in &self.participants {
                self.client.abort(endpoint, &txid).await;
            }
            self.set_votes(&txid, votes.clone());
            self.set_state(&txid, CoordState::Done);
            return Ok((Decision::Abort, votes));
        }

        self.set_state(&txid, CoordState::PrecommitSent);
        for endpoint in &self.participants {
            self.client.precommit(endpoint, &txid).await;
        }

        self.log_decision(&txid, Decision::Commit)?;
        self.set_state(&txid, CoordState::CommitSent);
        for endpoint in &self.participants {
            self.client.commit(endpoint, &txid).await;
        }

        self.set_votes(&txid, votes.clone());
        self.set_state(&txid, CoordState::Done);
        Ok((Decision::Commit, votes))
    }

    fn insert_record(&self, txid: &str, protocol: Protocol, op: Op, state: CoordState) {
        self.tx.lock().unwrap().insert(
            txid.to_string(),
            TxRecord {
                protocol,
                op,
                state,
                votes: BTreeMap::new(),
            },
        );
    }

    fn set_state(&self, txid: &str, state: CoordState) {
        if let Some(record) = self.tx.lock().unwrap().get_mut(txid) {
            record.state = state;
        }
    }

    fn set_votes(&self, txid: &str, votes: BTreeMap<String, Vote>) {
        if let Some(record) = self.tx.lock().unwrap().get_mut(txid) {
            record.votes = votes;
        }
    }

    fn log_decision(&self, txid: &str, decision: Decision) -> Result<()> {
        self.decision_log.lock().unwrap().append(txid, decision)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use proptest::prelude::*;
    use std::collections::BTreeMap as Map;
    use std::sync::Mutex as StdMutex;
    use test_log::test;

    /// An in-memory participant fake: votes and reachability are scripted
    /// per endpoint, and every dispatched message is recorded so tests can
    /// assert on fan-out order and idempotence.
    #[derive(Default)]
    struct FakeParticipant {
        votes: Map<String, Option<Vote>>,
        calls: StdMutex<Vec<String>>,
    }

    impl FakeParticipant {
        fn new(votes: Map<String, Option<Vote>>) -> Self {
            FakeParticipant {
                votes,
                calls: StdMutex::new(Vec::new()),
            }
        }

        fn calls(&self) -> Vec<String> {
            self.calls.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl Participant for FakeParticipant {
        async fn prepare(&self, endpoint: &str, txid: &str, _op: &Op) -> Option<Vote> {
            self.calls
                .lock()
                .unwrap()
                .push(format!("{endpoint} prepare {txid}"));
            self.votes.get(endpoint).copied().flatten()
        }
        async fn can_commit(&self, endpoint: &str, txid: &str, _op: &Op) -> Option<Vote> {
            self.calls
                .lock()
                .unwrap()
                .push(format!("{endpoint} can_commit {txid}"));
            self.votes.get(endpoint).copied().flatten()
        }
        async fn precommit(&self, endpoint: &str, txid: &str) {
            self.calls
                .lock()
                .unwrap()
                .push(format!("{endpoint} precommit {txid}"));
        }
        async fn commit(&self, endpoint: &str, txid: &str) {
            self.calls
                .lock()
                .unwrap()
                .push(format!("{endpoint} commit {txid}"));
        }
        async fn abort(&self, endpoint: &str, txid: &str) {
            self.calls
                .lock()
                .unwrap()
                .push(format!("{endpoint} abort {txid}"));
        }
    }

    fn set_op() -> Op {
        serde_json::json!({"type": "SET", "key": "x", "value": "1"})
    }

    fn engine(client: FakeParticipant, participants: Vec<&str>, log_path: &std::path::Path) -> Engine<FakeParticipant> {
        Engine::new(
            client,
            participants.into_iter().map(String::from).collect(),
            Duration::ZERO,
            DecisionLog::open(log_path).unwrap(),
        )
    }

    #[test(tokio::test)]
    async fn s1_happy_2pc_commits() {
        let dir = tempfile::tempdir().unwrap();
        let client = FakeParticipant::new(Map::from([
            ("p1".to_string(), Some(Vote::Yes)),
            ("p2".to_string(), Some(Vote::Yes)),
        ]));
        let e = engine(client, vec!["p1", "p2"], &dir.path().join("d.log"));
        let (decision, votes) = e
            .start_tx("T1".into(), set_op(), Protocol::TwoPc)
            .await
            .unwrap();
        assert_eq!(decision, Decision::Commit);
        assert_eq!(votes["p1"], Vote::Yes);
        assert_eq!(votes["p2"], Vote::Yes);
    }

    #[test(tokio::test)]
    async fn s2_any_no_vote_aborts() {
        let dir = tempfile::tempdir().unwrap();
        let client = FakeParticipant::new(Map::from([
            ("p1".to_string(), Some(Vote::Yes)),
            ("p2".to_string(), Some(Vote::No)),
        ]));
        let e = engine(client, vec!["p1", "p2"], &dir.path().join("d.log"));
        let (decision, _votes) = e
            .start_tx("T1".into(), set_op(), Protocol::TwoPc)
            .await
            .unwrap();
        assert_eq!(decision, Decision::Abort);
    }

    #[test(tokio::test)]
    async fn s3_unreachable_participant_is_no_timeout() {
        let dir = tempfile::tempdir().unwrap();
        let client = FakeParticipant::new(Map::from([("p1".to_string(), Some(Vote::Yes))]));
        let e = engine(client, vec!["p1", "p2"], &dir.path().join("d.log"));
        let (decision, votes) = e
            .start_tx("T1".into(), set_op(), Protocol::TwoPc)
            .await
            .unwrap();
        assert_eq!(decision, Decision::Abort);
        assert_eq!(votes["p1"], Vote::Yes);
        assert_eq!(votes["p2"], Vote::NoTimeout);
    }

    #[test(tokio::test)]
    async fn s4_3pc_happy_path_precommits_then_commits() {
        let dir = tempfile::tempdir().unwrap();
        let client = FakeParticipant::new(Map::from([
            ("p1".to_string(), Some(Vote::Yes)),
            ("p2".to_string(), Some(Vote::Yes)),
        ]));
        let e = engine(client, vec!["p1", "p2"], &dir.path().join("d.log"));
        let (decision, _) = e
            .start_tx("T1".into(), set_op(), Protocol::ThreePc)
            .await
            .unwrap();
        assert_eq!(decision, Decision::Commit);
        let calls = e.client.calls();
        let precommit_idx = calls.iter().position(|c| c.contains("precommit")).unwrap();
        let commit_idx = calls.iter().position(|c| c.contains("commit T1") && !c.contains("can_commit")).unwrap();
        assert!(precommit_idx < commit_idx);
    }

    #[test(tokio::test)]
    async fn decision_log_precedes_dispatch() {
        let dir = tempfile::tempdir().unwrap();
        let log_path = dir.path().join("d.log");
        let client = FakeParticipant::new(Map::from([("p1".to_string(), Some(Vote::Yes))]));
        let e = engine(client, vec!["p1"], &log_path);
        e.start_tx("T1".into(), set_op(), Protocol::TwoPc)
            .await
            .unwrap();
        let records = e.decision_log.lock().unwrap().read_all().unwrap();
        assert_eq!(records, vec!["T1 COMMIT"]);
        assert_eq!(e.client.calls(), vec!["p1 prepare T1", "p1 commit T1"]);
    }

    #[test(tokio::test)]
    async fn status_reflects_final_state() {
        let dir = tempfile::tempdir().unwrap();
        let client = FakeParticipant::new(Map::from([("p1".to_string(), Some(Vote::Yes))]));
        let e = engine(client, vec!["p1"], &dir.path().join("d.log"));
        e.start_tx("T1".into(), set_op(), Protocol::TwoPc)
            .await
            .unwrap();
        let status = e.status();
        assert_eq!(status["T1"].state, CoordState::Done);
        assert_eq!(status["T1"].votes["p1"], Vote::Yes);
    }

    fn vote_strategy() -> impl Strategy<Value = Option<Vote>> {
        prop_oneof![Just(Some(Vote::Yes)), Just(Some(Vote::No)), Just(None)]
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(64))]

        /// The decision is COMMIT iff every participant voted YES, the
        /// decision log holds exactly that outcome, and dispatch only ever
        /// fans out the commit or abort that matches it — for any number of
        /// participants, any vote mix (including timeouts), under either
        /// protocol.
        #[test]
        fn decision_matches_vote_unanimity(
            votes in proptest::collection::vec(vote_strategy(), 1..5),
            use_3pc in any::<bool>(),
        ) {
            let rt = tokio::runtime::Runtime::new().unwrap();
            rt.block_on(async {
                let dir = tempfile::tempdir().unwrap();
                let participants: Vec<String> = (0..votes.len()).map(|i| format!("p{i}")).collect();
                let scripted: Map<String, Option<Vote>> =
                    participants.iter().cloned().zip(votes.iter().copied()).collect();
                let client = FakeParticipant::new(scripted);
                let e = engine(client, participants.iter().map(String::as_str).collect(), &dir.path().join("d.log"));
                let protocol = if use_3pc { Protocol::ThreePc } else { Protocol::TwoPc };

                let (decision, result_votes) = e.start_tx("T1".into(), set_op(), protocol).await.unwrap();

                let all_yes = votes.iter().all(|v| matches!(v, Some(Vote::Yes)));
                prop_assert_eq!(decision, Decision::from_all_yes(all_yes));
                prop_assert_eq!(result_votes.len(), participants.len());

                let records = e.decision_log.lock().unwrap().read_all().unwrap();
                prop_assert_eq!(records, vec![format!("T1 {decision}")]);

                let calls = e.client.calls();
                match decision {
                    Decision::Commit => {
                        prop_assert!(!calls.iter().any(|c| c.contains(" abort ")));
                        for p in &participants {
                            prop_assert!(calls.iter().any(|c| *c == format!("{p} commit T1")));
                        }
                    }
                    Decision::Abort => {
                        prop_assert!(!calls.iter().any(|c| c.contains(" commit ")));
                        for p in &participants {
                            prop_assert!(calls.iter().any(|c| *c == format!("{p} abort T1")));
                        }
                    }
                }
                Ok(())
            })?;
        }
    }
}
