use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use parking_lot::RwLock;
use tracing::{info, warn};

use crate::core::error::{Error, ErrorKind, Result};
use crate::replication::log::{LogEntry, LogOp, ReplicatedLog};
use crate::replication::snapshot;
use crate::storage::layout::StorageLayout;
use crate::storage::store::Store;

/// Follower progress below this many operations behind the leader is
/// considered caught up.
const CATCHUP_MIN_SEQUENCE_DIFF: u64 = 100;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeState {
    Follower,
    Candidate,
    Leader,
}

/// The write-path state machine: only the leader accepts writes, every
/// committed entry is applied in log order, and snapshots checkpoint the
/// backing store. Transport between peers lives outside the core; a
/// single-node cluster elects itself immediately.
#[derive(Debug)]
pub struct ReplicationState {
    log: ReplicatedLog,
    store: Arc<Store>,
    layout: StorageLayout,

    state: RwLock<NodeState>,
    peers: RwLock<Vec<String>>,
    leader_addr: RwLock<Option<String>>,
    caught_up: AtomicBool,
    election_timeout_ms: u64,
}

impl ReplicationState {
    pub fn start(
        store: Arc<Store>,
        layout: StorageLayout,
        peers: Vec<String>,
        election_timeout_ms: u64,
    ) -> Result<Self> {
        let log = ReplicatedLog::open(&layout)?;

        let state = ReplicationState {
            log,
            store,
            layout,
            state: RwLock::new(NodeState::Follower),
            peers: RwLock::new(peers),
            leader_addr: RwLock::new(None),
            caught_up: AtomicBool::new(false),
            election_timeout_ms,
        };

        // a lone node has nobody to wait for
        if state.peers.read().len() <= 1 {
            state.trigger_vote()?;
        }

        Ok(state)
    }

    pub fn node_state(&self) -> NodeState {
        *self.state.read()
    }

    pub fn is_leader(&self) -> bool {
        self.node_state() == NodeState::Leader
    }

    /// A node is alive when it either leads or knows a leader.
    pub fn is_alive(&self) -> bool {
        self.is_leader() || self.leader_addr.read().is_some()
    }

    pub fn is_caught_up(&self) -> bool {
        self.caught_up.load(Ordering::Relaxed)
    }

    pub fn leader_addr(&self) -> Option<String> {
        self.leader_addr.read().clone()
    }

    pub fn log(&self) -> &ReplicatedLog {
        &self.log
    }

    /// Serialize a write through the log. Followers reject the write and
    /// surface the leader's address so the transport can redirect.
    pub fn replicate(&self, op: LogOp) -> Result<LogEntry> {
        match self.node_state() {
            NodeState::Leader => self.log.append(op),
            _ => match self.leader_addr() {
                Some(addr) => Err(Error::new(
                    ErrorKind::Consensus,
                    format!("Not the leader. Please write to the leader at {}.", addr),
                )),
                None => Err(Error::new(
                    ErrorKind::Consensus,
                    "Could not find a leader.",
                )),
            },
        }
    }

    /// Force an election. With at most one peer the node wins outright.
    pub fn trigger_vote(&self) -> Result<bool> {
        *self.state.write() = NodeState::Candidate;
        let term = self.log.bump_term()?;

        if self.peers.read().len() <= 1 {
            *self.state.write() = NodeState::Leader;
            *self.leader_addr.write() = self.peers.read().first().cloned();
            self.caught_up.store(true, Ordering::Relaxed);
            info!(term, "elected self as leader");
            return Ok(true);
        }

        info!(
            term,
            timeout_ms = self.election_timeout_ms,
            "election started, waiting on peers"
        );
        Ok(false)
    }

    /// Refresh the peer set. A single-node cluster with no leader resets
    /// its peers outright (e.g. after its address changed); a multi-node
    /// cluster without a leader refuses.
    pub fn refresh_nodes(&self, nodes: &[String]) -> Result<()> {
        if self.is_leader() {
            *self.peers.write() = nodes.to_vec();
            self.caught_up.store(true, Ordering::Relaxed);
            return Ok(());
        }

        if self.leader_addr().is_none() {
            if nodes.len() == 1 {
                // giving up on consensus guarantees to recover a lone
                // node whose address changed
                warn!("single node with no leader, resetting peers");
                *self.peers.write() = nodes.to_vec();
                self.trigger_vote()?;
            } else {
                warn!("multi-node cluster with no leader, refusing to reset peers");
                self.caught_up.store(false, Ordering::Relaxed);
            }
            return Ok(());
        }

        *self.peers.write() = nodes.to_vec();
        Ok(())
    }

    /// Follower catch-up assessment against the leader's op count.
    pub fn update_catch_up(&self, leader_seq: u64) {
        let local_seq = self.store.latest_seq_number();
        if leader_seq < local_seq {
            warn!(leader_seq, local_seq, "leader sequence is behind local sequence");
            self.caught_up.store(false, Ordering::Relaxed);
            return;
        }

        let caught_up = leader_seq - local_seq < CATCHUP_MIN_SEQUENCE_DIFF;
        self.caught_up.store(caught_up, Ordering::Relaxed);
    }

    /// Checkpoint the store, trim the log, and issue the follow-up noop
    /// write that keeps the next snapshot eligible.
    pub fn do_snapshot(&self) -> Result<snapshot::SnapshotMeta> {
        let meta = snapshot::save_snapshot(&self.store, &self.layout, &self.log)?;
        self.store.compact()?;
        self.log.append(LogOp::Noop)?;
        Ok(meta)
    }

    /// Interval-timer entry point: snapshot only when committed entries
    /// exist past the last snapshot (the min-index-gap rule).
    pub fn maybe_snapshot(&self) -> Result<Option<snapshot::SnapshotMeta>> {
        if self.log.commit_index() <= self.log.meta().last_snapshot_index {
            return Ok(None);
        }
        self.do_snapshot().map(Some)
    }

    /// Copy the current snapshot into an external directory as well.
    pub fn do_snapshot_to(&self, external_path: &std::path::Path) -> Result<snapshot::SnapshotMeta> {
        let meta = self.do_snapshot()?;
        let src = self.layout.snapshot_path(&meta.id);
        crate::storage::layout::copy_dir(&src, external_path)?;
        Ok(meta)
    }
}
