//! 对局会话：持有当前状态、开局快照和版本号。
//! AI 的计算结果只有在版本未变时才会落子。

use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::ai::{AiAgent, AiConfig, AiDecision, AiTier};
use crate::game::{
    catalog, history, Board, BoardDefinition, BoardError, ControlKind, GameState, HistoryError,
    MoveResolution, Orientation, Outcome, Player, PlayerId, Point, RuleEngine, Snapshot,
    ValueRange,
};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PlayerConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default)]
    pub control: ControlKind,
}

impl PlayerConfig {
    pub fn human(name: impl Into<String>) -> Self {
        Self {
            name: Some(name.into()),
            control: ControlKind::Human,
        }
    }

    pub fn ai(tier: AiTier) -> Self {
        Self {
            name: None,
            control: ControlKind::Ai(tier),
        }
    }

    /// 未指定名字时，AI 用其代号，人类玩家用 "Player N"。
    pub fn resolved_name(&self, seat: usize) -> String {
        match (&self.name, self.control) {
            (Some(name), _) if !name.trim().is_empty() => name.clone(),
            (_, ControlKind::Ai(tier)) => tier.display_name().to_string(),
            (_, ControlKind::Human) => format!("Player {}", seat + 1),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct MatchConfig {
    pub board: BoardDefinition,
    pub players: [PlayerConfig; 2],
    pub value_range: ValueRange,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub seed: Option<u64>,
}

impl MatchConfig {
    pub fn new(board: BoardDefinition, players: [PlayerConfig; 2]) -> Self {
        Self {
            board,
            players,
            ..Self::default()
        }
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    pub fn with_value_range(mut self, range: ValueRange) -> Self {
        self.value_range = range;
        self
    }

    pub fn build_players(&self) -> [Player; 2] {
        [0, 1].map(|seat| {
            let config = &self.players[seat];
            Player::new(seat as PlayerId, config.resolved_name(seat), config.control)
        })
    }
}

impl Default for MatchConfig {
    fn default() -> Self {
        Self {
            board: catalog::default_board().clone(),
            players: [PlayerConfig::human("Player 1"), PlayerConfig::ai(AiTier::Greedy)],
            value_range: ValueRange::default(),
            seed: None,
        }
    }
}

#[derive(Debug, Clone, Error, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type")]
pub enum SessionError {
    #[error("the game is over")]
    GameOver,
    #[error("it is not a human player's turn")]
    NotHumanTurn,
    #[error("({x}, {y}) is not a legal move")]
    IllegalMove { x: usize, y: usize },
    #[error("{error}")]
    History {
        #[from]
        error: HistoryError,
    },
    #[error("{error}")]
    Board {
        #[from]
        error: BoardError,
    },
}

/// 交给 AI 计算的请求，携带计算时的状态版本。
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AiRequest {
    pub version: u64,
    pub seed: u64,
    pub config: AiConfig,
    pub state: GameState,
}

impl AiRequest {
    pub fn compute(&self) -> AiReply {
        let mut agent = AiAgent::with_seed(self.config, self.seed);
        AiReply {
            version: self.version,
            player_id: self.state.active_player_id(),
            decision: agent.decide_action(&self.state),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AiReply {
    pub version: u64,
    pub player_id: PlayerId,
    pub decision: AiDecision,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type")]
pub enum AiCommit {
    Applied { resolution: MoveResolution },
    /// 计算期间状态已被替换（悔棋、重开等），结果作废。
    Stale { requested: u64, current: u64 },
    /// AI 给出的落点在当前状态下不合法，本回合不变。
    Rejected { point: Point },
    NoMove,
    NotAiTurn,
}

/// 提供给界面的只读视图。
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct GameView {
    pub board: Board,
    pub width: usize,
    pub height: usize,
    pub players: [Player; 2],
    pub current_player: usize,
    pub last_move: Option<Point>,
    pub constraint: Orientation,
    pub constraint_index: usize,
    pub is_over: bool,
    pub outcome: Option<Outcome>,
    pub history_depth: usize,
    pub legal_moves: Vec<Point>,
    pub version: u64,
}

pub struct GameSession {
    config: MatchConfig,
    rng: SmallRng,
    initial: Snapshot,
    state: GameState,
    version: u64,
}

impl GameSession {
    pub fn new(config: MatchConfig) -> Result<Self, SessionError> {
        let mut rng = match config.seed {
            Some(seed) => SmallRng::seed_from_u64(seed),
            None => SmallRng::from_entropy(),
        };
        let state = history::rematch(
            &config.board,
            config.build_players(),
            config.value_range,
            &mut rng,
        )?;
        info!(
            board = %config.board.id,
            constraint = ?state.constraint,
            index = state.constraint_index,
            "new match"
        );
        Ok(Self {
            initial: history::snapshot(&state),
            config,
            rng,
            state,
            version: 0,
        })
    }

    pub fn state(&self) -> &GameState {
        &self.state
    }

    pub fn config(&self) -> &MatchConfig {
        &self.config
    }

    pub fn initial(&self) -> &Snapshot {
        &self.initial
    }

    /// 每次状态被替换都会递增。
    pub fn version(&self) -> u64 {
        self.version
    }

    pub fn legal_moves(&self) -> Vec<Point> {
        if self.state.is_over {
            Vec::new()
        } else {
            RuleEngine::legal_moves(&self.state)
        }
    }

    pub fn view(&self) -> GameView {
        let state = &self.state;
        GameView {
            board: state.board.clone(),
            width: state.board.width,
            height: state.board.height,
            players: state.players.clone(),
            current_player: state.current_player,
            last_move: state.last_move,
            constraint: state.constraint,
            constraint_index: state.constraint_index,
            is_over: state.is_over,
            outcome: state.outcome,
            history_depth: state.history_len(),
            legal_moves: self.legal_moves(),
            version: self.version,
        }
    }

    /// 当前轮到的 AI 等级；人类回合或对局结束时为 `None`。
    pub fn ai_due(&self) -> Option<AiTier> {
        if self.state.is_over {
            return None;
        }
        self.state.active_player().control.ai_tier()
    }

    fn replace(&mut self, state: GameState) {
        self.state = state;
        self.version += 1;
    }

    fn play(&mut self, point: Point) -> MoveResolution {
        let next = RuleEngine::apply_move(&self.state, point);
        let resolution = MoveResolution::new(&self.state, point, &next);
        self.replace(next);
        resolution
    }

    pub fn apply_player_move(&mut self, point: Point) -> Result<MoveResolution, SessionError> {
        if self.state.is_over {
            return Err(SessionError::GameOver);
        }
        if !self.state.active_player().control.is_human() {
            return Err(SessionError::NotHumanTurn);
        }
        if !RuleEngine::is_legal(&self.state, point) {
            return Err(SessionError::IllegalMove {
                x: point.x,
                y: point.y,
            });
        }
        Ok(self.play(point))
    }

    pub fn undo(&mut self) -> Result<(), SessionError> {
        let previous = history::undo(&self.state)?;
        self.replace(previous);
        Ok(())
    }

    pub fn restart_same_match(&mut self) {
        let state = history::restart(&self.initial);
        self.replace(state);
    }

    /// 重新生成棋盘数值。传入新配置时改用新配置，否则沿用当前配置。
    pub fn start_fresh_match(&mut self, config: Option<MatchConfig>) -> Result<(), SessionError> {
        let (config, seed) = match config {
            Some(config) => {
                let seed = config.seed;
                (config, seed)
            }
            None => (self.config.clone(), None),
        };
        let mut rng = match seed {
            Some(seed) => SmallRng::seed_from_u64(seed),
            None => SmallRng::seed_from_u64(self.rng.gen()),
        };
        let state = history::rematch(
            &config.board,
            config.build_players(),
            config.value_range,
            &mut rng,
        )?;

        self.rng = rng;
        self.initial = history::snapshot(&state);
        self.config = config;
        self.replace(state);
        Ok(())
    }

    pub fn request_ai_move(&mut self) -> Option<AiRequest> {
        let tier = self.ai_due()?;
        Some(AiRequest {
            version: self.version,
            seed: self.rng.gen(),
            config: AiConfig::from_tier(tier),
            state: self.state.clone(),
        })
    }

    pub fn commit_ai_move(&mut self, reply: AiReply) -> AiCommit {
        if reply.version != self.version {
            warn!(
                requested = reply.version,
                current = self.version,
                "discarding stale AI reply"
            );
            return AiCommit::Stale {
                requested: reply.version,
                current: self.version,
            };
        }
        if self.ai_due().is_none() || self.state.active_player_id() != reply.player_id {
            return AiCommit::NotAiTurn;
        }
        match reply.decision.action {
            None => AiCommit::NoMove,
            Some(point) if !RuleEngine::is_legal(&self.state, point) => {
                warn!(x = point.x, y = point.y, "AI proposed an illegal move");
                AiCommit::Rejected { point }
            }
            Some(point) => {
                debug!(
                    player = reply.player_id,
                    x = point.x,
                    y = point.y,
                    nodes = reply.decision.nodes,
                    "AI move"
                );
                AiCommit::Applied {
                    resolution: self.play(point),
                }
            }
        }
    }

    /// 同步地完成请求、计算、提交。
    pub fn compute_ai_move(&mut self) -> AiCommit {
        match self.request_ai_move() {
            Some(request) => {
                let reply = request.compute();
                self.commit_ai_move(reply)
            }
            None => AiCommit::NotAiTurn,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn arena(players: [PlayerConfig; 2], seed: u64) -> MatchConfig {
        let board = catalog::find("the_arena").expect("arena is in the catalog").clone();
        MatchConfig::new(board, players).with_seed(seed)
    }

    fn human_vs_ai(seed: u64) -> GameSession {
        GameSession::new(arena(
            [PlayerConfig::human("Ada"), PlayerConfig::ai(AiTier::Smart)],
            seed,
        ))
        .expect("session should start")
    }

    #[test]
    fn seeded_sessions_are_reproducible() {
        let a = human_vs_ai(11);
        let b = human_vs_ai(11);
        assert_eq!(a.state(), b.state());
        assert_eq!(a.state().constraint_index, 3);
        assert_eq!(a.state().players[1].name, "Cortana");
    }

    #[test]
    fn player_moves_are_checked() {
        let mut session = human_vs_ai(5);
        let off_line = match session.state().constraint {
            Orientation::Horizontal => Point::new(0, 0),
            Orientation::Vertical => Point::new(6, 6),
        };
        assert_eq!(
            session.apply_player_move(off_line),
            Err(SessionError::IllegalMove { x: off_line.x, y: off_line.y })
        );
        assert_eq!(session.version(), 0);

        let mv = session.legal_moves()[0];
        let resolution = session.apply_player_move(mv).expect("legal move should apply");
        assert_eq!(resolution.player_id, 0);
        assert_eq!(resolution.point, mv);
        assert_eq!(session.version(), 1);
        assert_eq!(session.state().players[0].score, resolution.value);

        let next = session.legal_moves()[0];
        assert_eq!(session.apply_player_move(next), Err(SessionError::NotHumanTurn));
    }

    #[test]
    fn ai_reply_is_discarded_after_undo() {
        let mut session = human_vs_ai(8);
        let before = session.state().clone();
        let mv = session.legal_moves()[0];
        session.apply_player_move(mv).expect("legal move should apply");

        let request = session.request_ai_move().expect("AI should be due");
        session.undo().expect("undo should succeed");
        assert_eq!(session.state(), &before);

        let reply = request.compute();
        assert_eq!(
            session.commit_ai_move(reply),
            AiCommit::Stale {
                requested: 1,
                current: 2
            }
        );
        assert_eq!(session.state(), &before);
    }

    #[test]
    fn ai_move_applies_when_state_is_unchanged() {
        let mut session = human_vs_ai(3);
        assert_eq!(session.compute_ai_move(), AiCommit::NotAiTurn);

        let mv = session.legal_moves()[0];
        session.apply_player_move(mv).expect("legal move should apply");
        match session.compute_ai_move() {
            AiCommit::Applied { resolution } => assert_eq!(resolution.player_id, 1),
            AiCommit::NoMove => assert!(session.state().is_over),
            other => panic!("unexpected commit {other:?}"),
        }
        assert_eq!(session.state().integrity_check(), Ok(()));
    }

    #[test]
    fn illegal_ai_proposal_is_a_no_op() {
        let mut session = GameSession::new(arena(
            [PlayerConfig::ai(AiTier::Random), PlayerConfig::ai(AiTier::Random)],
            21,
        ))
        .expect("session should start");
        let request = session.request_ai_move().expect("AI should be due");
        let mut reply = request.compute();
        reply.decision.action = Some(Point::new(99, 99));

        let before = session.state().clone();
        assert_eq!(
            session.commit_ai_move(reply),
            AiCommit::Rejected {
                point: Point::new(99, 99)
            }
        );
        assert_eq!(session.state(), &before);
        assert_eq!(session.version(), 0);
    }

    #[test]
    fn ai_versus_ai_plays_to_completion() {
        let mut session = GameSession::new(arena(
            [PlayerConfig::ai(AiTier::Genius), PlayerConfig::ai(AiTier::Random)],
            2,
        ))
        .expect("session should start");
        let mut turns = 0;
        while session.ai_due().is_some() {
            assert!(matches!(session.compute_ai_move(), AiCommit::Applied { .. }));
            turns += 1;
            assert!(turns <= 49);
        }
        let state = session.state();
        assert!(state.is_over);
        assert!(state.outcome.is_some());
        assert_eq!(state.integrity_check(), Ok(()));
        assert!(session.legal_moves().is_empty());
        assert_eq!(session.view().history_depth, turns);
        assert_eq!(session.undo(), Err(SessionError::History { error: HistoryError::GameOver }));
    }

    #[test]
    fn restart_and_rematch() {
        let mut session = human_vs_ai(13);
        let initial = session.state().clone();
        let mv = session.legal_moves()[0];
        session.apply_player_move(mv).expect("legal move should apply");

        session.restart_same_match();
        assert_eq!(session.state(), &initial);

        session.start_fresh_match(None).expect("rematch should build");
        let fresh = session.state();
        assert!(fresh.history.is_empty());
        assert_eq!(fresh.players[0].name, "Ada");
        assert_eq!((fresh.board.width, fresh.board.height), (7, 7));
        assert_ne!(fresh.board, initial.board);
        assert_eq!(session.version(), 3);
    }

    #[test]
    fn fresh_match_with_bad_config_keeps_current_game() {
        let mut session = human_vs_ai(4);
        let before = session.state().clone();
        let mut config = session.config().clone();
        config.board.layout.clear();
        assert_eq!(
            session.start_fresh_match(Some(config)),
            Err(SessionError::Board {
                error: BoardError::EmptyLayout
            })
        );
        assert_eq!(session.state(), &before);
    }

    #[test]
    fn value_range_bounds_every_cell() {
        let range = ValueRange::new(-2, 2).expect("range is valid");
        let config = arena([PlayerConfig::human("Ada"), PlayerConfig::human("Bob")], 4)
            .with_value_range(range);
        let session = GameSession::new(config).expect("session should start");
        assert!(session
            .state()
            .board
            .cells()
            .iter()
            .all(|cell| (-2..=2).contains(&cell.value)));

        let inverted = arena([PlayerConfig::human("Ada"), PlayerConfig::human("Bob")], 4)
            .with_value_range(ValueRange { min: 3, max: -3 });
        assert_eq!(
            GameSession::new(inverted).err(),
            Some(SessionError::Board {
                error: BoardError::InvalidValueRange { min: 3, max: -3 }
            })
        );
    }

    #[test]
    fn view_reports_state() {
        let session = human_vs_ai(6);
        let view = session.view();
        assert_eq!((view.width, view.height), (7, 7));
        assert_eq!(view.history_depth, 0);
        assert_eq!(view.legal_moves, session.legal_moves());
        assert_eq!(view.legal_moves.len(), 7);
        let json = serde_json::to_value(&view).expect("view serializes");
        assert_eq!(json["constraint_index"], 3);
    }

    #[test]
    fn config_defaults_fill_missing_fields() {
        let json = r#"{"players":[
            {"control":{"type":"human"}},
            {"control":{"type":"ai","tier":"genius"}}
        ]}"#;
        let config: MatchConfig = serde_json::from_str(json).expect("config parses");
        assert_eq!(config.board.id, "classic_cross");
        assert_eq!(config.value_range, ValueRange::default());
        let players = config.build_players();
        assert_eq!(players[0].name, "Player 1");
        assert_eq!(players[1].name, "HAL 9000");
    }
}
