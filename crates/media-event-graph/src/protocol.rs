//! Internal request/response protocol between delegates and the arbiter.
//!
//! Requests travel on the arbiter's intake channel, responses on each
//! delegate's control channel. Neither ever reaches a data channel, so user
//! `cmd` numbering cannot collide with them.

use std::sync::Arc;

use crossbeam_channel::Sender;

use crate::delegate::{DelegateCore, PendingNode};
use crate::error::GraphError;
use crate::graph::GraphStats;
use crate::link::Link;

/// Reply channel of [`crate::EventGraph::add_node_and_wait`].
pub(crate) type AddNodeAck = Sender<Result<(), GraphError>>;

/// Outcome codes of link requests.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(i32)]
pub(crate) enum LinkStatus {
    Success = 0,
    LinkNotExist = -1,
    LinkRefuse = -2,
    LinkDuplicated = -3,
    NodeNotExist = -4,
    NodeExceedMaxLink = -5,
}

impl LinkStatus {
    pub(crate) fn code(self) -> i32 {
        self as i32
    }

    pub(crate) fn is_success(self) -> bool {
        self == Self::Success
    }

    pub(crate) fn as_str(self) -> &'static str {
        match self {
            Self::Success => "success",
            Self::LinkNotExist => "link_not_exist",
            Self::LinkRefuse => "link_refuse",
            Self::LinkDuplicated => "link_duplicated",
            Self::NodeNotExist => "node_not_exist",
            Self::NodeExceedMaxLink => "link_exceed_max",
        }
    }
}

/// Requests applied by the arbiter in arrival order.
pub(crate) enum GraphRequest {
    AddNode {
        pending: PendingNode,
        ack: Option<AddNodeAck>,
    },
    LinkUp {
        from: Arc<DelegateCore>,
        scope: String,
        name: String,
    },
    LinkDown {
        link: Arc<Link>,
    },
    NodeExit {
        delegate: Arc<DelegateCore>,
    },
    Stats {
        resp_tx: Sender<GraphStats>,
    },
}

/// Responses consumed by a delegate's control loop.
pub(crate) enum ControlResponse {
    NodeAdded {
        ack: Option<AddNodeAck>,
    },
    LinkUp {
        status: LinkStatus,
        link: Option<Arc<Link>>,
        scope: String,
        name: String,
    },
    LinkDown {
        status: LinkStatus,
        link: Arc<Link>,
    },
    /// Terminal message of a node's control loop.
    NodeExit,
}
