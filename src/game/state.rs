use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::board::{Board, Orientation, Point};
use super::history::History;
use super::rules::RuleEngine;
use crate::ai::AiTier;

/// 玩家标识，同时也是玩家在对局中的座位索引。
pub type PlayerId = u8;

/// 玩家的操控方式。
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", content = "tier", rename_all = "lowercase")]
pub enum ControlKind {
    Human,
    Ai(AiTier),
}

impl ControlKind {
    pub fn is_human(&self) -> bool {
        matches!(self, ControlKind::Human)
    }

    pub fn ai_tier(&self) -> Option<AiTier> {
        match self {
            ControlKind::Human => None,
            ControlKind::Ai(tier) => Some(*tier),
        }
    }
}

impl Default for ControlKind {
    fn default() -> Self {
        ControlKind::Human
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Player {
    pub id: PlayerId,
    pub name: String,
    #[serde(default)]
    pub control: ControlKind,
    #[serde(default)]
    pub score: i32,
}

impl Player {
    pub fn new(id: PlayerId, name: impl Into<String>, control: ControlKind) -> Self {
        Self {
            id,
            name: name.into(),
            control,
            score: 0,
        }
    }
}

/// 对局结果。
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type")]
pub enum Outcome {
    Winner { player: PlayerId },
    Draw,
}

impl Outcome {
    /// 分数严格更高者获胜，相同则平局。
    pub fn from_scores(players: &[Player; 2]) -> Self {
        let [first, second] = players;
        if first.score > second.score {
            Outcome::Winner { player: first.id }
        } else if second.score > first.score {
            Outcome::Winner { player: second.id }
        } else {
            Outcome::Draw
        }
    }

    pub fn winner(&self) -> Option<PlayerId> {
        match self {
            Outcome::Winner { player } => Some(*player),
            Outcome::Draw => None,
        }
    }
}

#[derive(Debug, Clone, Error, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type")]
pub enum IntegrityError {
    #[error("active player index {index} is out of range")]
    InvalidPlayerIndex { index: usize },
    #[error("constraint index {index} is outside 0..{limit}")]
    ConstraintOutOfBounds { index: usize, limit: usize },
    #[error("player {player_id} has score {score} but owns cells worth {owned}")]
    ScoreMismatch {
        player_id: PlayerId,
        score: i32,
        owned: i32,
    },
    #[error("terminal flag is {is_over} while {legal_moves} legal moves remain")]
    TerminalMismatch { is_over: bool, legal_moves: usize },
}

/// 游戏整体状态。发布后不再修改，每步落子都会产生新的状态。
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct GameState {
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
    #[serde(default)]
    pub history: History,
}

impl GameState {
    pub fn new(
        board: Board,
        players: [Player; 2],
        constraint: Orientation,
        constraint_index: usize,
    ) -> Self {
        Self {
            board,
            players,
            current_player: 0,
            last_move: None,
            constraint,
            constraint_index,
            is_over: false,
            outcome: None,
            history: History::default(),
        }
    }

    pub fn active_player(&self) -> &Player {
        &self.players[self.current_player]
    }

    pub fn active_player_id(&self) -> PlayerId {
        self.active_player().id
    }

    pub fn get_player(&self, id: PlayerId) -> Option<&Player> {
        self.players.iter().find(|player| player.id == id)
    }

    pub fn opponent_of(&self, id: PlayerId) -> Option<&Player> {
        self.players.iter().find(|player| player.id != id)
    }

    pub fn history_len(&self) -> usize {
        self.history.len()
    }

    pub fn integrity_check(&self) -> Result<(), IntegrityError> {
        if self.current_player >= self.players.len() {
            return Err(IntegrityError::InvalidPlayerIndex {
                index: self.current_player,
            });
        }

        let limit = self.board.line_count(self.constraint);
        if self.constraint_index >= limit {
            return Err(IntegrityError::ConstraintOutOfBounds {
                index: self.constraint_index,
                limit,
            });
        }

        for player in &self.players {
            let owned = self.board.owned_total(player.id);
            if owned != player.score {
                return Err(IntegrityError::ScoreMismatch {
                    player_id: player.id,
                    score: player.score,
                    owned,
                });
            }
        }

        let legal_moves = RuleEngine::legal_moves(self).len();
        if self.is_over != (legal_moves == 0) {
            return Err(IntegrityError::TerminalMismatch {
                is_over: self.is_over,
                legal_moves,
            });
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::board::{build_with, BoardDefinition, StartOption};

    fn players() -> [Player; 2] {
        [
            Player::new(0, "Ada", ControlKind::Human),
            Player::new(1, "Bob", ControlKind::Human),
        ]
    }

    fn open_state() -> GameState {
        let def = BoardDefinition::new(
            "square",
            "Square",
            vec!["XXX".into(), "XXX".into(), "XXX".into()],
            vec![StartOption::new(Orientation::Horizontal, [1])],
        );
        build_with(&def, players(), |p| (p.y * 3 + p.x + 1) as i32, (Orientation::Horizontal, 1))
            .expect("board should build")
    }

    #[test]
    fn outcome_prefers_strictly_higher_score() {
        let mut players = players();
        players[0].score = 4;
        players[1].score = -2;
        assert_eq!(Outcome::from_scores(&players), Outcome::Winner { player: 0 });
        players[1].score = 9;
        assert_eq!(Outcome::from_scores(&players), Outcome::Winner { player: 1 });
        players[0].score = 9;
        assert_eq!(Outcome::from_scores(&players), Outcome::Draw);
        assert_eq!(Outcome::Draw.winner(), None);
    }

    #[test]
    fn fresh_state_passes_integrity_check() {
        let state = open_state();
        assert_eq!(state.integrity_check(), Ok(()));
        assert_eq!(state.active_player_id(), 0);
        assert_eq!(state.opponent_of(0).map(|p| p.id), Some(1));
    }

    #[test]
    fn integrity_check_flags_score_drift() {
        let mut state = open_state();
        state.players[1].score = 3;
        assert_eq!(
            state.integrity_check(),
            Err(IntegrityError::ScoreMismatch {
                player_id: 1,
                score: 3,
                owned: 0
            })
        );
    }

    #[test]
    fn integrity_check_flags_constraint_out_of_bounds() {
        let mut state = open_state();
        state.constraint_index = 3;
        assert_eq!(
            state.integrity_check(),
            Err(IntegrityError::ConstraintOutOfBounds { index: 3, limit: 3 })
        );
    }

    #[test]
    fn integrity_check_flags_bad_player_index() {
        let mut state = open_state();
        state.current_player = 2;
        assert_eq!(
            state.integrity_check(),
            Err(IntegrityError::InvalidPlayerIndex { index: 2 })
        );
    }

    #[test]
    fn control_kind_round_trips_through_json() {
        let json = serde_json::to_string(&ControlKind::Ai(AiTier::Smart)).expect("serializes");
        assert_eq!(json, r#"{"type":"ai","tier":"smart"}"#);
        let human: ControlKind = serde_json::from_str(r#"{"type":"human"}"#).expect("parses");
        assert_eq!(human, ControlKind::Human);
    }
}
