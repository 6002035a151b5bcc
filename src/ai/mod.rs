//! AI 模块：按难度等级随机落子或进行 minimax 搜索。

pub mod minimax;

pub use minimax::{choose_move, evaluate, search, AiAgent, AiConfig, AiDecision, AiTier, WIN_BONUS};
