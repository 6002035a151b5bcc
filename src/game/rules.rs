use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use super::{
    board::{CellStatus, Point},
    history,
    state::{GameState, Outcome, PlayerId},
};

/// 一次落子的结果摘要。
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct MoveResolution {
    pub player_id: PlayerId,
    pub point: Point,
    pub value: i32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub outcome: Option<Outcome>,
}

impl MoveResolution {
    pub fn new(before: &GameState, point: Point, after: &GameState) -> Self {
        Self {
            player_id: before.active_player_id(),
            point,
            value: before.board.get(point).map_or(0, |cell| cell.value),
            outcome: after.outcome,
        }
    }
}

/// 落子合法性判断与状态推进。
pub struct RuleEngine;

impl RuleEngine {
    /// 目标格子是否为当前玩家的合法选择。
    pub fn is_legal(state: &GameState, target: Point) -> bool {
        let Some(cell) = state.board.get(target) else {
            return false;
        };
        if !cell.is_open() {
            return false;
        }
        if state.constraint.line_of(target) != state.constraint_index {
            return false;
        }
        match state.last_move {
            Some(last) => Self::has_line_of_sight(state, last, target),
            None => true,
        }
    }

    /// 上一步与目标之间（不含两端）不能有空洞。
    fn has_line_of_sight(state: &GameState, from: Point, to: Point) -> bool {
        let orientation = state.constraint;
        let line = orientation.line_of(to);
        let (a, b) = (orientation.along(from), orientation.along(to));
        let (start, end) = if a < b { (a, b) } else { (b, a) };
        ((start + 1)..end).all(|position| {
            state
                .board
                .get(orientation.point_at(line, position))
                .map_or(false, |cell| !cell.is_void())
        })
    }

    /// 当前约束线上所有合法落点，按沿线顺序排列。
    pub fn legal_moves(state: &GameState) -> Vec<Point> {
        let orientation = state.constraint;
        if state.constraint_index >= state.board.line_count(orientation) {
            return Vec::new();
        }
        (0..state.board.line_len(orientation))
            .map(|position| orientation.point_at(state.constraint_index, position))
            .filter(|&point| Self::is_legal(state, point))
            .collect()
    }

    /// 执行一步落子并返回新状态。调用方需保证 `target` 合法。
    pub fn apply_move(state: &GameState, target: Point) -> GameState {
        let next = Self::transition(state, target, true);
        if let Some(outcome) = next.outcome {
            info!(?outcome, history = next.history_len(), "game over");
        }
        next
    }

    /// 搜索用的推进：与 `apply_move` 相同但不记录历史。
    pub fn successor(state: &GameState, target: Point) -> GameState {
        Self::transition(state, target, false)
    }

    fn transition(state: &GameState, target: Point, record: bool) -> GameState {
        debug_assert!(
            !state.is_over && Self::is_legal(state, target),
            "illegal move {target:?}"
        );

        let mut next = state.clone();
        let mover = state.current_player;
        let mover_id = state.players[mover].id;

        if let Some(cell) = next.board.get_mut(target) {
            cell.status = CellStatus::Taken;
            cell.owner = Some(mover_id);
            next.players[mover].score += cell.value;
        }

        if record {
            next.history.push(history::snapshot(state));
        }

        next.constraint = state.constraint.flipped();
        next.constraint_index = next.constraint.line_of(target);
        next.current_player = (mover + 1) % next.players.len();
        next.last_move = Some(target);

        if Self::legal_moves(&next).is_empty() {
            next.is_over = true;
            next.outcome = Some(Outcome::from_scores(&next.players));
        }

        if record {
            debug!(
                player = mover_id,
                x = target.x,
                y = target.y,
                constraint = ?next.constraint,
                index = next.constraint_index,
                "move applied"
            );
        }
        next
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::board::{
        build, build_with, BoardDefinition, Orientation, StartOption, ValueRange,
    };
    use crate::game::state::{ControlKind, Player};
    use rand::rngs::SmallRng;
    use rand::seq::SliceRandom;
    use rand::SeedableRng;

    fn players() -> [Player; 2] {
        [
            Player::new(0, "Ada", ControlKind::Human),
            Player::new(1, "Bob", ControlKind::Human),
        ]
    }

    fn definition(layout: &[&str], start: (Orientation, usize)) -> BoardDefinition {
        BoardDefinition::new(
            "test",
            "Test",
            layout.iter().map(|row| row.to_string()).collect(),
            vec![StartOption::new(start.0, [start.1])],
        )
    }

    fn setup_state() -> GameState {
        let start = (Orientation::Horizontal, 1);
        build_with(
            &definition(&["XXX", "XXX", "XXX"], start),
            players(),
            |p| (p.y * 3 + p.x + 1) as i32,
            start,
        )
        .expect("board should build")
    }

    #[test]
    fn first_move_is_restricted_to_start_row() {
        let state = setup_state();
        assert_eq!(
            RuleEngine::legal_moves(&state),
            vec![Point::new(0, 1), Point::new(1, 1), Point::new(2, 1)]
        );
        assert!(!RuleEngine::is_legal(&state, Point::new(0, 0)));
        assert!(!RuleEngine::is_legal(&state, Point::new(3, 1)));
    }

    #[test]
    fn picking_a_cell_hands_opponent_its_column() {
        let state = setup_state();
        let next = RuleEngine::apply_move(&state, Point::new(2, 1));

        assert_eq!(next.players[0].score, 6);
        assert_eq!(next.players[1].score, 0);
        assert_eq!(next.current_player, 1);
        assert_eq!(next.constraint, Orientation::Vertical);
        assert_eq!(next.constraint_index, 2);
        assert_eq!(next.last_move, Some(Point::new(2, 1)));

        let moves = RuleEngine::legal_moves(&next);
        assert_eq!(moves, vec![Point::new(2, 0), Point::new(2, 2)]);
        let values: Vec<i32> = moves
            .iter()
            .filter_map(|&p| next.board.get(p).map(|cell| cell.value))
            .collect();
        assert_eq!(values, vec![3, 9]);

        let taken = next.board.get(Point::new(2, 1)).expect("in bounds");
        assert_eq!(taken.status, CellStatus::Taken);
        assert_eq!(taken.owner, Some(0));
    }

    #[test]
    fn void_between_moves_blocks_line_of_sight() {
        let start = (Orientation::Horizontal, 0);
        let state = build_with(
            &definition(&["X", " ", "X"], start),
            players(),
            |_| 5,
            start,
        )
        .expect("board should build");
        assert_eq!(RuleEngine::legal_moves(&state), vec![Point::new(0, 0)]);

        let next = RuleEngine::apply_move(&state, Point::new(0, 0));
        assert_eq!(next.constraint, Orientation::Vertical);
        assert!(!RuleEngine::is_legal(&next, Point::new(0, 2)));
        assert!(RuleEngine::legal_moves(&next).is_empty());
        assert!(next.is_over);
        assert_eq!(next.outcome, Some(Outcome::Winner { player: 0 }));
    }

    #[test]
    fn blocked_mover_with_equal_score_is_a_draw() {
        let start = (Orientation::Horizontal, 0);
        let state = build_with(
            &definition(&["X", " ", "X"], start),
            players(),
            |_| 0,
            start,
        )
        .expect("board should build");
        let next = RuleEngine::apply_move(&state, Point::new(0, 0));
        assert_eq!(next.outcome, Some(Outcome::Draw));
    }

    #[test]
    fn first_move_ignores_voids_on_the_line() {
        let start = (Orientation::Horizontal, 0);
        let state = build_with(&definition(&["X X"], start), players(), |_| 1, start)
            .expect("board should build");
        assert_eq!(
            RuleEngine::legal_moves(&state),
            vec![Point::new(0, 0), Point::new(2, 0)]
        );
    }

    #[test]
    fn negative_values_lower_the_score() {
        let start = (Orientation::Vertical, 0);
        let state = build_with(&definition(&["X", "X"], start), players(), |_| -7, start)
            .expect("board should build");
        let next = RuleEngine::apply_move(&state, Point::new(0, 1));
        assert_eq!(next.players[0].score, -7);
    }

    #[test]
    fn successor_skips_history() {
        let state = setup_state();
        let next = RuleEngine::successor(&state, Point::new(1, 1));
        assert!(next.history.is_empty());
        let recorded = RuleEngine::apply_move(&state, Point::new(1, 1));
        assert_eq!(next.board, recorded.board);
        assert_eq!(next.players, recorded.players);
    }

    #[test]
    fn random_playouts_keep_invariants() {
        let board = definition(
            &[
                "   XXXXX   ",
                "XXXXXXXXXXX",
                "XXXXX XXXXX",
                "XXXXXXXXXXX",
                "   XXXXX   ",
            ],
            (Orientation::Horizontal, 1),
        );
        for seed in 0..24 {
            let mut rng = SmallRng::seed_from_u64(seed);
            let mut state = build(&board, players(), ValueRange::default(), &mut rng)
                .expect("board should build");
            loop {
                assert_eq!(state.integrity_check(), Ok(()));
                let score_sum: i32 = state.players.iter().map(|p| p.score).sum();
                assert_eq!(score_sum, state.board.taken_total());

                let moves = RuleEngine::legal_moves(&state);
                assert_eq!(state.is_over, moves.is_empty());
                for mv in &moves {
                    assert_eq!(state.constraint.line_of(*mv), state.constraint_index);
                    let cell = state.board.get(*mv).expect("legal moves are in bounds");
                    assert!(cell.is_open());
                }

                let Some(&mv) = moves.choose(&mut rng) else {
                    break;
                };
                let next = RuleEngine::apply_move(&state, mv);
                if !next.is_over {
                    let back = crate::game::history::undo(&next).expect("undo should succeed");
                    assert_eq!(back, state);
                }
                state = next;
            }
            assert!(state.outcome.is_some());
        }
    }
}
