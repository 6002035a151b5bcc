//! 游戏核心逻辑模块（棋盘、状态机、规则引擎、悔棋历史）。

pub mod board;
pub mod catalog;
pub mod history;
pub mod rules;
pub mod state;

pub use board::{
    build,
    build_with,
    Board,
    BoardDefinition,
    BoardError,
    Cell,
    CellKind,
    CellStatus,
    Orientation,
    Point,
    StartOption,
    ValueRange,
    MAX_VALUE,
    MIN_VALUE,
};
pub use history::{History, HistoryError, Snapshot};
pub use rules::{MoveResolution, RuleEngine};
pub use state::{ControlKind, GameState, IntegrityError, Outcome, Player, PlayerId};
