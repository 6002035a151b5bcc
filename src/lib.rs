pub mod ai;
pub mod game;
pub mod session;

use gloo_timers::future::TimeoutFuture;
use serde::Serialize;
use serde_wasm_bindgen::{from_value, to_value};
use std::str::FromStr;
use wasm_bindgen::prelude::*;
use wasm_bindgen_futures::future_to_promise;
use web_sys::js_sys::Promise;

pub use ai::{AiAgent, AiConfig, AiDecision, AiTier};
pub use game::{
    catalog, Board, BoardDefinition, BoardError, Cell, CellKind, CellStatus, ControlKind,
    GameState, History, HistoryError, IntegrityError, MoveResolution, Orientation, Outcome,
    Player, PlayerId, Point, RuleEngine, Snapshot, StartOption, ValueRange,
};
pub use session::{
    AiCommit, AiReply, AiRequest, GameSession, GameView, MatchConfig, PlayerConfig, SessionError,
};

#[cfg(feature = "wee_alloc")]
#[global_allocator]
static ALLOC: wee_alloc::WeeAlloc = wee_alloc::WeeAlloc::INIT;

#[wasm_bindgen(start)]
pub fn start() {
    set_panic_hook();
}

fn to_js_error<E: Serialize + std::fmt::Display>(error: E) -> JsValue {
    to_value(&error).unwrap_or_else(|_| JsValue::from_str(&error.to_string()))
}

fn serde_to_js_error<E: std::fmt::Display>(error: E) -> JsValue {
    JsValue::from_str(&error.to_string())
}

fn to_json<T: Serialize>(value: &T) -> Result<String, JsValue> {
    serde_json::to_string(value).map_err(serde_to_js_error)
}

fn parse_config(config_json: Option<String>) -> Result<Option<MatchConfig>, JsValue> {
    config_json
        .map(|json| serde_json::from_str(&json).map_err(serde_to_js_error))
        .transpose()
}

/// 从 JS 读入状态并先做完整性检查，避免越界的玩家或约束索引进入规则引擎。
fn checked_state(value: JsValue) -> Result<GameState, JsValue> {
    let state: GameState = from_value(value).map_err(JsValue::from)?;
    state.integrity_check().map_err(to_js_error)?;
    Ok(state)
}

fn report_commit(commit: &AiCommit) {
    match commit {
        AiCommit::Stale { requested, current } => web_sys::console::warn_1(
            &format!("AI reply for version {requested} discarded (now at {current})").into(),
        ),
        AiCommit::Rejected { point } => web_sys::console::warn_1(
            &format!("AI proposed illegal move ({}, {})", point.x, point.y).into(),
        ),
        _ => {}
    }
}

#[derive(Serialize)]
struct MoveResponse {
    resolution: MoveResolution,
    view: GameView,
}

#[derive(Serialize)]
struct CommitResponse {
    commit: AiCommit,
    view: GameView,
}

#[wasm_bindgen]
pub struct NumsEngine {
    session: GameSession,
}

#[wasm_bindgen]
impl NumsEngine {
    #[wasm_bindgen(constructor)]
    pub fn new(config_json: Option<String>) -> Result<NumsEngine, JsValue> {
        let config = parse_config(config_json)?.unwrap_or_default();
        let session = GameSession::new(config).map_err(to_js_error)?;
        Ok(NumsEngine { session })
    }

    pub fn view_json(&self) -> Result<String, JsValue> {
        to_json(&self.session.view())
    }

    pub fn state_json(&self) -> Result<String, JsValue> {
        to_json(self.session.state())
    }

    pub fn legal_moves_json(&self) -> Result<String, JsValue> {
        to_json(&self.session.legal_moves())
    }

    pub fn version(&self) -> f64 {
        self.session.version() as f64
    }

    pub fn apply_player_move(&mut self, x: usize, y: usize) -> Result<String, JsValue> {
        let resolution = self
            .session
            .apply_player_move(Point::new(x, y))
            .map_err(to_js_error)?;
        to_json(&MoveResponse {
            resolution,
            view: self.session.view(),
        })
    }

    pub fn undo(&mut self) -> Result<String, JsValue> {
        self.session.undo().map_err(to_js_error)?;
        self.view_json()
    }

    pub fn restart_same_match(&mut self) -> Result<String, JsValue> {
        self.session.restart_same_match();
        self.view_json()
    }

    pub fn start_fresh_match(&mut self, config_json: Option<String>) -> Result<String, JsValue> {
        let config = parse_config(config_json)?;
        self.session
            .start_fresh_match(config)
            .map_err(to_js_error)?;
        self.view_json()
    }

    pub fn compute_ai_move(&mut self) -> Result<String, JsValue> {
        let commit = self.session.compute_ai_move();
        report_commit(&commit);
        to_json(&CommitResponse {
            commit,
            view: self.session.view(),
        })
    }

    /// 延迟后在 Promise 中计算 AI 落点，结果需通过 `commit_ai_json` 提交。
    /// 没有轮到 AI 时 Promise 以 `null` 完成。
    pub fn think_ai(&mut self, delay_ms: Option<u32>) -> Promise {
        let request = self.session.request_ai_move();
        let delay = delay_ms.unwrap_or(0);

        future_to_promise(async move {
            let Some(request) = request else {
                return Ok(JsValue::NULL);
            };
            if delay > 0 {
                TimeoutFuture::new(delay).await;
            }
            let reply = request.compute();
            let json = serde_json::to_string(&reply).map_err(serde_to_js_error)?;
            Ok(JsValue::from_str(&json))
        })
    }

    pub fn commit_ai_json(&mut self, reply_json: &str) -> Result<String, JsValue> {
        let reply: AiReply = serde_json::from_str(reply_json).map_err(serde_to_js_error)?;
        let commit = self.session.commit_ai_move(reply);
        report_commit(&commit);
        to_json(&CommitResponse {
            commit,
            view: self.session.view(),
        })
    }
}

/// 内置棋盘列表。
#[wasm_bindgen(js_name = "boardCatalog")]
pub fn board_catalog() -> Result<JsValue, JsValue> {
    to_value(&catalog::boards()).map_err(JsValue::from)
}

/// 按配置创建一局新对局的初始状态。
#[wasm_bindgen(js_name = "createMatch")]
pub fn create_match(config: JsValue) -> Result<JsValue, JsValue> {
    let config: MatchConfig = if config.is_undefined() || config.is_null() {
        MatchConfig::default()
    } else {
        from_value(config).map_err(JsValue::from)?
    };
    let session = GameSession::new(config).map_err(to_js_error)?;
    to_value(session.state()).map_err(JsValue::from)
}

#[wasm_bindgen(js_name = "legalMoves")]
pub fn legal_moves(state: JsValue) -> Result<JsValue, JsValue> {
    let state = checked_state(state)?;
    to_value(&RuleEngine::legal_moves(&state)).map_err(JsValue::from)
}

#[wasm_bindgen(js_name = "applyMove")]
pub fn apply_move(state: JsValue, x: usize, y: usize) -> Result<JsValue, JsValue> {
    let state = checked_state(state)?;
    if state.is_over {
        return Err(to_js_error(SessionError::GameOver));
    }
    let point = Point::new(x, y);
    if !RuleEngine::is_legal(&state, point) {
        return Err(to_js_error(SessionError::IllegalMove { x, y }));
    }
    to_value(&RuleEngine::apply_move(&state, point)).map_err(JsValue::from)
}

#[wasm_bindgen(js_name = "computeAiMove")]
pub fn compute_ai_move(state: JsValue, tier: Option<String>) -> Result<JsValue, JsValue> {
    let state = checked_state(state)?;
    let tier = tier
        .as_deref()
        .and_then(|value| AiTier::from_str(value).ok())
        .or_else(|| state.active_player().control.ai_tier())
        .unwrap_or(AiTier::Greedy);
    let mut agent = AiAgent::new(AiConfig::from_tier(tier));
    let decision = agent.decide_action(&state);
    to_value(&decision).map_err(JsValue::from)
}

#[wasm_bindgen(js_name = "validateState")]
pub fn validate_state(state: JsValue) -> Result<(), JsValue> {
    let state: GameState = from_value(state).map_err(JsValue::from)?;
    state.integrity_check().map_err(to_js_error)
}

#[cfg(feature = "console_error_panic_hook")]
fn set_panic_hook() {
    console_error_panic_hook::set_once();
}

#[cfg(not(feature = "console_error_panic_hook"))]
fn set_panic_hook() {}
