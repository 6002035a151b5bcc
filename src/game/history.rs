//! 悔棋历史：每步落子前保存的快照，以共享节点的持久链表存放。

use std::fmt;
use std::sync::Arc;

use rand::Rng;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use thiserror::Error;
use tracing::{debug, info};

use super::board::{self, Board, BoardDefinition, BoardError, Orientation, Point, ValueRange};
use super::state::{GameState, Outcome, Player};

/// 某一时刻的完整对局状态（不含历史本身）。
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Snapshot {
    pub board: Board,
    pub players: [Player; 2],
    pub current_player: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_move: Option<Point>,
    pub constraint: Orientation,
    pub constraint_index: usize,
    #[serde(default)]
    pub is_over: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub outcome: Option<Outcome>,
}

impl Snapshot {
    /// 以给定历史重建完整状态。
    pub fn restore(&self, history: History) -> GameState {
        GameState {
            board: self.board.clone(),
            players: self.players.clone(),
            current_player: self.current_player,
            last_move: self.last_move,
            constraint: self.constraint,
            constraint_index: self.constraint_index,
            is_over: self.is_over,
            outcome: self.outcome,
            history,
        }
    }
}

struct Node {
    snapshot: Snapshot,
    prev: Option<Arc<Node>>,
    len: usize,
}

/// 持久化的快照栈，克隆时共享已有节点。
#[derive(Clone, Default)]
pub struct History {
    head: Option<Arc<Node>>,
}

impl History {
    pub fn len(&self) -> usize {
        self.head.as_ref().map_or(0, |node| node.len)
    }

    pub fn is_empty(&self) -> bool {
        self.head.is_none()
    }

    pub fn latest(&self) -> Option<&Snapshot> {
        self.head.as_deref().map(|node| &node.snapshot)
    }

    pub fn push(&mut self, snapshot: Snapshot) {
        let len = self.len() + 1;
        let prev = self.head.take();
        self.head = Some(Arc::new(Node {
            snapshot,
            prev,
            len,
        }));
    }

    /// 取出最新的快照，返回它和缩短后的历史。
    pub fn pop(&self) -> Option<(Snapshot, History)> {
        let node = self.head.as_ref()?;
        let rest = History {
            head: node.prev.clone(),
        };
        Some((node.snapshot.clone(), rest))
    }

    /// 从新到旧遍历。
    pub fn iter(&self) -> impl Iterator<Item = &Snapshot> {
        std::iter::successors(self.head.as_deref(), |node| node.prev.as_deref())
            .map(|node| &node.snapshot)
    }

    /// 从旧到新排列的快照。
    pub fn to_vec(&self) -> Vec<Snapshot> {
        let mut snapshots: Vec<Snapshot> = self.iter().cloned().collect();
        snapshots.reverse();
        snapshots
    }
}

impl FromIterator<Snapshot> for History {
    fn from_iter<I: IntoIterator<Item = Snapshot>>(iter: I) -> Self {
        let mut history = History::default();
        for snapshot in iter {
            history.push(snapshot);
        }
        history
    }
}

impl PartialEq for History {
    fn eq(&self, other: &Self) -> bool {
        match (&self.head, &other.head) {
            (Some(a), Some(b)) if Arc::ptr_eq(a, b) => true,
            _ => self.len() == other.len() && self.iter().eq(other.iter()),
        }
    }
}

impl Eq for History {}

impl fmt::Debug for History {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("History").field("len", &self.len()).finish()
    }
}

impl Serialize for History {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_seq(self.to_vec())
    }
}

impl<'de> Deserialize<'de> for History {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let snapshots = Vec::<Snapshot>::deserialize(deserializer)?;
        Ok(snapshots.into_iter().collect())
    }
}

#[derive(Debug, Clone, Copy, Error, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type")]
pub enum HistoryError {
    #[error("there is no move to undo")]
    Empty,
    #[error("the game is over")]
    GameOver,
}

pub fn snapshot(state: &GameState) -> Snapshot {
    Snapshot {
        board: state.board.clone(),
        players: state.players.clone(),
        current_player: state.current_player,
        last_move: state.last_move,
        constraint: state.constraint,
        constraint_index: state.constraint_index,
        is_over: state.is_over,
        outcome: state.outcome,
    }
}

/// 回到上一步之前的状态。对局结束后不可悔棋。
pub fn undo(state: &GameState) -> Result<GameState, HistoryError> {
    if state.is_over {
        return Err(HistoryError::GameOver);
    }
    let (previous, rest) = state.history.pop().ok_or(HistoryError::Empty)?;
    debug!(remaining = rest.len(), "undo");
    Ok(previous.restore(rest))
}

/// 恢复到开局时的状态（同样的数值，空历史）。
pub fn restart(initial: &Snapshot) -> GameState {
    info!("restarting match");
    initial.restore(History::default())
}

/// 以同样的配置重新生成棋盘数值。
pub fn rematch<R: Rng + ?Sized>(
    definition: &BoardDefinition,
    players: [Player; 2],
    range: ValueRange,
    rng: &mut R,
) -> Result<GameState, BoardError> {
    info!(board = %definition.id, "starting rematch");
    board::build(definition, players, range, rng)
}
