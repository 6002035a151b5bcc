use std::str::FromStr;

use rand::rngs::SmallRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

use crate::game::{GameState, PlayerId, Point, RuleEngine};

/// 终局时胜负带来的额外评分。
pub const WIN_BONUS: i64 = 10_000;

/// AI 难度等级。
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum AiTier {
    /// 0 级：随机落子。
    Random,
    /// 1 级：只看一步。
    Greedy,
    /// 2 级：考虑对手的应对。
    Smart,
    /// 3 级：再多看一步。
    Genius,
}

impl AiTier {
    pub fn level(self) -> u8 {
        match self {
            AiTier::Random => 0,
            AiTier::Greedy => 1,
            AiTier::Smart => 2,
            AiTier::Genius => 3,
        }
    }

    /// 搜索深度；随机等级不搜索。
    pub fn search_depth(self) -> Option<u8> {
        match self {
            AiTier::Random => None,
            tier => Some(tier.level()),
        }
    }

    pub fn display_name(self) -> &'static str {
        match self {
            AiTier::Random => "Bender",
            AiTier::Greedy => "GLaDOS",
            AiTier::Smart => "Cortana",
            AiTier::Genius => "HAL 9000",
        }
    }
}

impl FromStr for AiTier {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "random" | "0" => Ok(AiTier::Random),
            "greedy" | "1" => Ok(AiTier::Greedy),
            "smart" | "2" => Ok(AiTier::Smart),
            "genius" | "3" => Ok(AiTier::Genius),
            _ => Err(()),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct AiConfig {
    pub tier: AiTier,
    /// `None` 表示随机落子。
    pub depth: Option<u8>,
}

impl AiConfig {
    pub fn from_tier(tier: AiTier) -> Self {
        Self {
            tier,
            depth: tier.search_depth(),
        }
    }
}

impl Default for AiConfig {
    fn default() -> Self {
        AiConfig::from_tier(AiTier::Greedy)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AiDecision {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub action: Option<Point>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub evaluation: Option<i64>,
    /// 搜索深度上限；随机落子或无需搜索时为 `None`。
    #[serde(skip_serializing_if = "Option::is_none")]
    pub depth_limit: Option<u8>,
    pub depth_reached: u8,
    pub nodes: u64,
}

struct SearchStats {
    nodes: u64,
    depth_reached: u8,
}

impl SearchStats {
    fn new() -> Self {
        Self {
            nodes: 0,
            depth_reached: 0,
        }
    }
}

pub struct AiAgent {
    config: AiConfig,
    rng: SmallRng,
}

impl AiAgent {
    pub fn new(config: AiConfig) -> Self {
        Self {
            config,
            rng: SmallRng::from_entropy(),
        }
    }

    pub fn with_seed(config: AiConfig, seed: u64) -> Self {
        Self {
            config,
            rng: SmallRng::seed_from_u64(seed),
        }
    }

    pub fn config(&self) -> AiConfig {
        self.config
    }

    pub fn choose_move(&mut self, state: &GameState) -> Option<Point> {
        self.decide_action(state).action
    }

    #[instrument(skip_all, fields(tier = ?self.config.tier))]
    pub fn decide_action(&mut self, state: &GameState) -> AiDecision {
        let moves = RuleEngine::legal_moves(state);
        if moves.len() <= 1 {
            return AiDecision {
                action: moves.first().copied(),
                evaluation: None,
                depth_limit: None,
                depth_reached: 0,
                nodes: 0,
            };
        }

        match self.config.depth {
            None => AiDecision {
                action: moves.choose(&mut self.rng).copied(),
                evaluation: None,
                depth_limit: None,
                depth_reached: 0,
                nodes: 0,
            },
            Some(depth) => search(state, depth),
        }
    }
}

/// 以给定深度搜索当前玩家的最佳落点。
pub fn choose_move(state: &GameState, depth: u8) -> Option<Point> {
    let moves = RuleEngine::legal_moves(state);
    match moves.len() {
        0 => None,
        1 => Some(moves[0]),
        _ => search(state, depth).action,
    }
}

/// 带 alpha-beta 剪枝的 minimax，从当前玩家的视角最大化评分。
pub fn search(state: &GameState, depth: u8) -> AiDecision {
    let root_player = state.active_player_id();
    let mut stats = SearchStats::new();

    let mut moves = RuleEngine::legal_moves(state);
    if state.is_over || moves.is_empty() {
        return AiDecision {
            action: None,
            evaluation: Some(evaluate(state, root_player)),
            depth_limit: Some(depth),
            depth_reached: 0,
            nodes: 0,
        };
    }
    order_moves(state, &mut moves, true);

    // 深度为 0 时不展开，直接取数值最大的落点。
    if depth == 0 {
        return AiDecision {
            action: moves.first().copied(),
            evaluation: Some(evaluate(state, root_player)),
            depth_limit: Some(depth),
            depth_reached: 0,
            nodes: 0,
        };
    }

    let mut alpha = i64::MIN;
    let beta = i64::MAX;
    let mut best_action = None;
    let mut best_score = i64::MIN;

    for mv in moves {
        let child = RuleEngine::successor(state, mv);
        let score = minimax_rec(&child, depth - 1, 1, alpha, beta, root_player, &mut stats);
        if best_action.is_none() || score > best_score {
            best_score = score;
            best_action = Some(mv);
        }
        alpha = alpha.max(score);
    }

    debug!(
        ?best_action,
        best_score,
        nodes = stats.nodes,
        depth_reached = stats.depth_reached,
        "search finished"
    );

    AiDecision {
        action: best_action,
        evaluation: Some(best_score),
        depth_limit: Some(depth),
        depth_reached: stats.depth_reached,
        nodes: stats.nodes,
    }
}

fn minimax_rec(
    state: &GameState,
    depth_remaining: u8,
    ply: u8,
    mut alpha: i64,
    mut beta: i64,
    root_player: PlayerId,
    stats: &mut SearchStats,
) -> i64 {
    stats.nodes += 1;
    stats.depth_reached = stats.depth_reached.max(ply);

    if depth_remaining == 0 || state.is_over {
        return evaluate(state, root_player);
    }

    let mut moves = RuleEngine::legal_moves(state);
    if moves.is_empty() {
        return evaluate(state, root_player);
    }

    let maximizing = state.active_player_id() == root_player;
    order_moves(state, &mut moves, maximizing);

    if maximizing {
        let mut value = i64::MIN;
        for mv in moves {
            let child = RuleEngine::successor(state, mv);
            let score = minimax_rec(
                &child,
                depth_remaining - 1,
                ply + 1,
                alpha,
                beta,
                root_player,
                stats,
            );
            value = value.max(score);
            alpha = alpha.max(value);
            if beta <= alpha {
                break;
            }
        }
        value
    } else {
        let mut value = i64::MAX;
        for mv in moves {
            let child = RuleEngine::successor(state, mv);
            let score = minimax_rec(
                &child,
                depth_remaining - 1,
                ply + 1,
                alpha,
                beta,
                root_player,
                stats,
            );
            value = value.min(score);
            beta = beta.min(value);
            if beta <= alpha {
                break;
            }
        }
        value
    }
}

/// 按格子数值排序以提高剪枝效率：最大化时降序，最小化时升序。
fn order_moves(state: &GameState, moves: &mut [Point], descending: bool) {
    let value_of = |point: &Point| state.board.get(*point).map_or(0, |cell| cell.value);
    if descending {
        moves.sort_by(|a, b| value_of(b).cmp(&value_of(a)));
    } else {
        moves.sort_by(|a, b| value_of(a).cmp(&value_of(b)));
    }
}

/// 分差评分；终局时按胜负加减 `WIN_BONUS`，平局不加。
pub fn evaluate(state: &GameState, player_id: PlayerId) -> i64 {
    let own = state.get_player(player_id).map_or(0, |p| p.score as i64);
    let other = state.opponent_of(player_id).map_or(0, |p| p.score as i64);
    let diff = own - other;

    if !state.is_over {
        return diff;
    }
    match state.outcome.and_then(|outcome| outcome.winner()) {
        Some(winner) if winner == player_id => WIN_BONUS + diff,
        Some(_) => -WIN_BONUS + diff,
        None => diff,
    }
}
