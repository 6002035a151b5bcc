use rand::seq::SliceRandom;
use rand::Rng;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};

use super::state::{GameState, Player, PlayerId};

/// 默认数值区间下限。
pub const MIN_VALUE: i32 = -20;
/// 默认数值区间上限。
pub const MAX_VALUE: i32 = 50;
/// 布局字符串中表示空洞的字符。
pub const VOID_CHAR: char = ' ';

/// 棋盘坐标：x 为列，y 为行。
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct Point {
    pub x: usize,
    pub y: usize,
}

impl Point {
    pub const fn new(x: usize, y: usize) -> Self {
        Self { x, y }
    }
}

/// 当前玩家受限的方向。
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Orientation {
    /// 限定在某一行（y 固定），在列之间选择。
    Horizontal,
    /// 限定在某一列（x 固定），在行之间选择。
    Vertical,
}

impl Orientation {
    pub fn flipped(self) -> Self {
        match self {
            Orientation::Horizontal => Orientation::Vertical,
            Orientation::Vertical => Orientation::Horizontal,
        }
    }

    /// 该方向下约束索引所对应的坐标分量。
    pub fn line_of(self, point: Point) -> usize {
        match self {
            Orientation::Horizontal => point.y,
            Orientation::Vertical => point.x,
        }
    }

    /// 沿约束线移动时变化的坐标分量。
    pub fn along(self, point: Point) -> usize {
        match self {
            Orientation::Horizontal => point.x,
            Orientation::Vertical => point.y,
        }
    }

    /// 由约束线索引和线上位置还原坐标。
    pub fn point_at(self, line: usize, position: usize) -> Point {
        match self {
            Orientation::Horizontal => Point::new(position, line),
            Orientation::Vertical => Point::new(line, position),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum CellKind {
    Void,
    Playable,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum CellStatus {
    Available,
    Taken,
}

impl Default for CellStatus {
    fn default() -> Self {
        CellStatus::Available
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct Cell {
    pub kind: CellKind,
    pub value: i32,
    #[serde(default)]
    pub status: CellStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub owner: Option<PlayerId>,
}

impl Cell {
    pub const fn void() -> Self {
        Self {
            kind: CellKind::Void,
            value: 0,
            status: CellStatus::Available,
            owner: None,
        }
    }

    pub const fn playable(value: i32) -> Self {
        Self {
            kind: CellKind::Playable,
            value,
            status: CellStatus::Available,
            owner: None,
        }
    }

    pub fn is_void(&self) -> bool {
        self.kind == CellKind::Void
    }

    pub fn is_taken(&self) -> bool {
        self.status == CellStatus::Taken
    }

    /// 可被选择：非空洞且尚未被占据。
    pub fn is_open(&self) -> bool {
        !self.is_void() && !self.is_taken()
    }
}

#[derive(Debug, Clone, Error, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type")]
pub enum BoardError {
    #[error("board layout has no rows")]
    EmptyLayout,
    #[error("first layout row is empty")]
    EmptyRow,
    #[error("layout row {row} has {len} cells but the board is {width} wide")]
    RowTooLong { row: usize, len: usize, width: usize },
    #[error("board definition declares no start options")]
    NoStartOptions,
    #[error("start option {option} has no indices")]
    EmptyStartIndices { option: usize },
    #[error("start index {index} is outside 0..{limit} for {orientation:?}")]
    StartIndexOutOfBounds {
        orientation: Orientation,
        index: usize,
        limit: usize,
    },
    #[error("start line {index} ({orientation:?}) has no playable cell")]
    DeadStartLine {
        orientation: Orientation,
        index: usize,
    },
    #[error("value range {min}..={max} is empty")]
    InvalidValueRange { min: i32, max: i32 },
}

/// 可玩格子的数值区间（闭区间）。
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct ValueRange {
    pub min: i32,
    pub max: i32,
}

impl ValueRange {
    pub fn new(min: i32, max: i32) -> Result<Self, BoardError> {
        let range = Self { min, max };
        range.validate()?;
        Ok(range)
    }

    pub fn validate(&self) -> Result<(), BoardError> {
        if self.min > self.max {
            return Err(BoardError::InvalidValueRange {
                min: self.min,
                max: self.max,
            });
        }
        Ok(())
    }

    pub fn sample<R: Rng + ?Sized>(&self, rng: &mut R) -> i32 {
        rng.gen_range(self.min..=self.max)
    }
}

impl Default for ValueRange {
    fn default() -> Self {
        Self {
            min: MIN_VALUE,
            max: MAX_VALUE,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct StartOption {
    pub orientation: Orientation,
    pub indices: Vec<usize>,
}

impl StartOption {
    pub fn new(orientation: Orientation, indices: impl Into<Vec<usize>>) -> Self {
        Self {
            orientation,
            indices: indices.into(),
        }
    }
}

/// 棋盘定义：布局字符串 + 可选的起始约束。
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct BoardDefinition {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub layout: Vec<String>,
    pub start_options: Vec<StartOption>,
}

impl BoardDefinition {
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        layout: Vec<String>,
        start_options: Vec<StartOption>,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            description: String::new(),
            layout,
            start_options,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// 检查起始选项是否都落在棋盘范围内，且每条起始线上至少有一个可玩格子。
    pub fn validate_start_options(&self, board: &Board) -> Result<(), BoardError> {
        if self.start_options.is_empty() {
            return Err(BoardError::NoStartOptions);
        }
        for (option_index, option) in self.start_options.iter().enumerate() {
            if option.indices.is_empty() {
                return Err(BoardError::EmptyStartIndices {
                    option: option_index,
                });
            }
            let limit = board.line_count(option.orientation);
            if let Some(&index) = option.indices.iter().find(|&&index| index >= limit) {
                return Err(BoardError::StartIndexOutOfBounds {
                    orientation: option.orientation,
                    index,
                    limit,
                });
            }
            board.check_start_line(option.orientation, &option.indices)?;
        }
        Ok(())
    }

    /// 先均匀抽取一个起始选项，再在其中均匀抽取索引。
    pub fn pick_start<R: Rng + ?Sized>(
        &self,
        rng: &mut R,
    ) -> Result<(Orientation, usize), BoardError> {
        let option = self
            .start_options
            .choose(rng)
            .ok_or(BoardError::NoStartOptions)?;
        let index = option
            .indices
            .choose(rng)
            .copied()
            .ok_or(BoardError::EmptyStartIndices { option: 0 })?;
        Ok((option.orientation, index))
    }
}

/// 行优先存储的矩形棋盘。
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Board {
    pub width: usize,
    pub height: usize,
    cells: Vec<Cell>,
}

impl Board {
    /// 解析布局：宽度取第一行长度，较短的行以空洞补齐。
    pub fn parse<S, F>(layout: &[S], mut value_at: F) -> Result<Self, BoardError>
    where
        S: AsRef<str>,
        F: FnMut(Point) -> i32,
    {
        let first = layout.first().ok_or(BoardError::EmptyLayout)?;
        let width = first.as_ref().chars().count();
        if width == 0 {
            return Err(BoardError::EmptyRow);
        }
        let height = layout.len();

        let mut cells = Vec::with_capacity(width * height);
        for (y, row) in layout.iter().enumerate() {
            let row = row.as_ref();
            let len = row.chars().count();
            if len > width {
                return Err(BoardError::RowTooLong { row: y, len, width });
            }
            if len < width {
                warn!(row = y, len, width, "layout row is short; padding with void cells");
            }
            let mut chars = row.chars();
            for x in 0..width {
                let cell = match chars.next() {
                    Some(ch) if ch != VOID_CHAR => Cell::playable(value_at(Point::new(x, y))),
                    _ => Cell::void(),
                };
                cells.push(cell);
            }
        }

        Ok(Self {
            width,
            height,
            cells,
        })
    }

    fn index(&self, point: Point) -> Option<usize> {
        if self.contains(point) {
            Some(point.y * self.width + point.x)
        } else {
            None
        }
    }

    pub fn contains(&self, point: Point) -> bool {
        point.x < self.width && point.y < self.height
    }

    pub fn get(&self, point: Point) -> Option<&Cell> {
        self.index(point).and_then(|index| self.cells.get(index))
    }

    pub(crate) fn get_mut(&mut self, point: Point) -> Option<&mut Cell> {
        self.index(point).and_then(move |index| self.cells.get_mut(index))
    }

    /// 给定方向下可用的约束线数量（行数或列数）。
    pub fn line_count(&self, orientation: Orientation) -> usize {
        match orientation {
            Orientation::Horizontal => self.height,
            Orientation::Vertical => self.width,
        }
    }

    /// 一条约束线的长度。
    pub fn line_len(&self, orientation: Orientation) -> usize {
        match orientation {
            Orientation::Horizontal => self.width,
            Orientation::Vertical => self.height,
        }
    }

    /// 约束线上是否还有可选的格子。
    pub fn line_has_open_cell(&self, orientation: Orientation, line: usize) -> bool {
        (0..self.line_len(orientation))
            .filter_map(|position| self.get(orientation.point_at(line, position)))
            .any(Cell::is_open)
    }

    fn check_start_line(
        &self,
        orientation: Orientation,
        indices: &[usize],
    ) -> Result<(), BoardError> {
        match indices
            .iter()
            .find(|&&index| !self.line_has_open_cell(orientation, index))
        {
            Some(&index) => Err(BoardError::DeadStartLine { orientation, index }),
            None => Ok(()),
        }
    }

    pub fn cells(&self) -> &[Cell] {
        &self.cells
    }

    pub fn rows(&self) -> impl Iterator<Item = &[Cell]> {
        self.cells.chunks(self.width.max(1))
    }

    /// 某玩家已占据格子的数值之和。
    pub fn owned_total(&self, player: PlayerId) -> i32 {
        self.cells
            .iter()
            .filter(|cell| cell.is_taken() && cell.owner == Some(player))
            .map(|cell| cell.value)
            .sum()
    }

    pub fn taken_total(&self) -> i32 {
        self.cells
            .iter()
            .filter(|cell| cell.is_taken())
            .map(|cell| cell.value)
            .sum()
    }
}

/// 按棋盘定义创建一局新游戏，格子数值从 `range` 中均匀抽取。
pub fn build<R: Rng + ?Sized>(
    definition: &BoardDefinition,
    players: [Player; 2],
    range: ValueRange,
    rng: &mut R,
) -> Result<GameState, BoardError> {
    range.validate()?;
    let board = Board::parse(&definition.layout, |_| range.sample(rng))?;
    definition.validate_start_options(&board)?;
    let (orientation, index) = definition.pick_start(rng)?;
    debug!(
        board = %definition.id,
        width = board.width,
        height = board.height,
        ?orientation,
        index,
        "built board"
    );
    Ok(GameState::new(board, players, orientation, index))
}

/// 确定性版本：数值由 `value_at` 给出，起始约束显式指定。
pub fn build_with<F>(
    definition: &BoardDefinition,
    players: [Player; 2],
    value_at: F,
    start: (Orientation, usize),
) -> Result<GameState, BoardError>
where
    F: FnMut(Point) -> i32,
{
    let board = Board::parse(&definition.layout, value_at)?;
    definition.validate_start_options(&board)?;
    let (orientation, index) = start;
    let limit = board.line_count(orientation);
    if index >= limit {
        return Err(BoardError::StartIndexOutOfBounds {
            orientation,
            index,
            limit,
        });
    }
    board.check_start_line(orientation, &[index])?;
    Ok(GameState::new(board, players, orientation, index))
}
