//! Per-branch run state.
//!
//! Each feed's extract→transform→load chain advances through a strictly
//! sequential state machine; `Failed` is reachable from any in-progress
//! state. An empty upstream result terminates at `Succeeded` with zero rows,
//! which is deliberately distinct from failure.

use std::collections::BTreeMap;
use std::fmt::Display;

use ldp_core::DropReason;
use serde::Serialize;
use tracing::{error, info};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum BranchState {
    Pending,
    Extracting,
    Transforming,
    Loading,
    Succeeded,
    Failed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum FeedKind {
    Bikes,
    Flights,
}

impl FeedKind {
    pub fn as_str(self) -> &'static str {
        match self {
            FeedKind::Bikes => "bikes",
            FeedKind::Flights => "flights",
        }
    }
}

/// Terminal report for one branch run. A failed branch never affects its
/// sibling's outcome.
#[derive(Debug, Clone, Serialize)]
pub struct BranchOutcome {
    pub feed: FeedKind,
    pub state: BranchState,
    pub extracted: usize,
    pub loaded: u64,
    pub dropped: BTreeMap<DropReason, usize>,
    pub error: Option<String>,
}

#[derive(Debug)]
pub(crate) struct BranchRun {
    feed: FeedKind,
    state: BranchState,
    pub(crate) extracted: usize,
    pub(crate) dropped: BTreeMap<DropReason, usize>,
}

impl BranchRun {
    pub(crate) fn new(feed: FeedKind) -> Self {
        Self {
            feed,
            state: BranchState::Pending,
            extracted: 0,
            dropped: BTreeMap::new(),
        }
    }

    pub(crate) fn enter(&mut self, state: BranchState) {
        info!(feed = self.feed.as_str(), ?state, "branch stage");
        self.state = state;
    }

    pub(crate) fn succeed(self, loaded: u64) -> BranchOutcome {
        info!(
            feed = self.feed.as_str(),
            loaded,
            dropped = self.dropped.values().sum::<usize>(),
            "branch succeeded"
        );
        BranchOutcome {
            feed: self.feed,
            state: BranchState::Succeeded,
            extracted: self.extracted,
            loaded,
            dropped: self.dropped,
            error: None,
        }
    }

    pub(crate) fn fail(self, err: impl Display) -> BranchOutcome {
        error!(feed = self.feed.as_str(), error = %err, "branch failed");
        BranchOutcome {
            feed: self.feed,
            state: BranchState::Failed,
            extracted: self.extracted,
            loaded: 0,
            dropped: self.dropped,
            error: Some(err.to_string()),
        }
    }
}
