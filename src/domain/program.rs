/// Program tree: the instruction blocks a player assembles.
///
/// ## File format (editor JSON)
///   ```json
///   [
///     { "id": 1, "type": "REPEAT", "times": 4, "children": [
///         { "id": 2, "type": "MOVE" }
///     ]},
///     { "id": 3, "type": "INC_VAR", "varName": "a" }
///   ]
///   ```
///
/// `id` may be a number or a string. Blocks without one get a path id
/// (`"0.1"` = second child of the first root block). Unrecognised or
/// malformed blocks (no `type`, a func without `name`, unreadable `times`,
/// non-array `children`) load as [`BlockKind::Unknown`] and are skipped at
/// run time instead of failing the whole program. Only a file that is not
/// a JSON array is rejected.

use std::path::Path;

use serde_json::{Map, Value};

pub const DEFAULT_VAR: &str = "a";
pub const DEFAULT_REPEAT: u32 = 3;

/// Stable block identifier, echoed in highlight events.
#[derive(Clone, PartialEq, Eq, Hash, Debug, Default)]
pub struct BlockId(pub String);

impl std::fmt::Display for BlockId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Clone, PartialEq, Debug)]
pub struct Block {
    pub id: BlockId,
    pub kind: BlockKind,
}

#[derive(Clone, PartialEq, Debug)]
pub enum BlockKind {
    Move,
    TurnLeft,
    TurnRight,
    Jump,
    Repeat { times: u32, body: Vec<Block> },
    WhileClear { body: Vec<Block> },
    IfObstacle { body: Vec<Block> },
    IfNotObstacle { body: Vec<Block> },
    IncVar { var: String },
    DecVar { var: String },
    DefineFunc { name: String, body: Vec<Block> },
    CallFunc { name: String },
    Unknown { tag: String },
}

impl BlockKind {
    /// The editor's tag for this kind.
    pub fn tag(&self) -> &str {
        match self {
            BlockKind::Move => "MOVE",
            BlockKind::TurnLeft => "TURN_LEFT",
            BlockKind::TurnRight => "TURN_RIGHT",
            BlockKind::Jump => "JUMP",
            BlockKind::Repeat { .. } => "REPEAT",
            BlockKind::WhileClear { .. } => "WHILE_CLEAR",
            BlockKind::IfObstacle { .. } => "IF_OBSTACLE",
            BlockKind::IfNotObstacle { .. } => "IF_NOT_OBSTACLE",
            BlockKind::IncVar { .. } => "INC_VAR",
            BlockKind::DecVar { .. } => "DEC_VAR",
            BlockKind::DefineFunc { .. } => "DEFINE_FUNC",
            BlockKind::CallFunc { .. } => "CALL_FUNC",
            BlockKind::Unknown { tag } => tag,
        }
    }

    /// Leaf instructions are the ones that count toward the star rating
    /// and are followed by a world step and a pacing pause.
    pub fn is_leaf(&self) -> bool {
        matches!(
            self,
            BlockKind::Move
                | BlockKind::TurnLeft
                | BlockKind::TurnRight
                | BlockKind::Jump
                | BlockKind::IncVar { .. }
                | BlockKind::DecVar { .. }
        )
    }

    pub fn body(&self) -> Option<&[Block]> {
        match self {
            BlockKind::Repeat { body, .. }
            | BlockKind::WhileClear { body }
            | BlockKind::IfObstacle { body }
            | BlockKind::IfNotObstacle { body }
            | BlockKind::DefineFunc { body, .. } => Some(body),
            _ => None,
        }
    }
}

impl Block {
    pub fn new(id: impl Into<String>, kind: BlockKind) -> Self {
        Block { id: BlockId(id.into()), kind }
    }
}

/// Ordered root-level blocks.
#[derive(Clone, PartialEq, Debug, Default)]
pub struct Program {
    pub blocks: Vec<Block>,
}

#[derive(Debug, thiserror::Error)]
pub enum ProgramError {
    #[error("could not read program file {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid program JSON: {0}")]
    Json(#[from] serde_json::Error),
}

impl Program {
    pub fn new(blocks: Vec<Block>) -> Self {
        Program { blocks }
    }

    pub fn from_json(text: &str) -> Result<Self, ProgramError> {
        let raw: Vec<Value> = serde_json::from_str(text)?;
        let blocks = raw
            .iter()
            .enumerate()
            .map(|(i, v)| parse_block(v, &i.to_string()))
            .collect();
        Ok(Program { blocks })
    }

    pub fn from_json_file(path: &Path) -> Result<Self, ProgramError> {
        let text = std::fs::read_to_string(path).map_err(|source| ProgramError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_json(&text)
    }

    /// Total number of blocks, nested ones included.
    pub fn block_count(&self) -> usize {
        fn count(blocks: &[Block]) -> usize {
            blocks.iter().map(|b| 1 + b.kind.body().map_or(0, count)).sum()
        }
        count(&self.blocks)
    }
}

// ── Editor JSON schema ──

fn parse_block(value: &Value, path: &str) -> Block {
    let id = value.get("id").and_then(id_text).unwrap_or_else(|| path.to_string());
    let kind = match value {
        Value::Object(fields) => parse_kind(fields, path).unwrap_or_else(|| {
            let tag = fields.get("type").and_then(Value::as_str).unwrap_or_default();
            BlockKind::Unknown { tag: tag.to_string() }
        }),
        _ => BlockKind::Unknown { tag: String::new() },
    };
    Block { id: BlockId(id), kind }
}

fn id_text(id: &Value) -> Option<String> {
    match id {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// `None` when the block is unknown or one of its fields is unusable.
fn parse_kind(fields: &Map<String, Value>, path: &str) -> Option<BlockKind> {
    let body = || -> Option<Vec<Block>> {
        match fields.get("children") {
            None | Some(Value::Null) => Some(vec![]),
            Some(Value::Array(children)) => Some(
                children
                    .iter()
                    .enumerate()
                    .map(|(i, c)| parse_block(c, &format!("{path}.{i}")))
                    .collect(),
            ),
            Some(_) => None,
        }
    };
    let var = || -> Option<String> {
        match fields.get("varName") {
            None | Some(Value::Null) => Some(DEFAULT_VAR.to_string()),
            Some(Value::String(s)) if s.is_empty() => Some(DEFAULT_VAR.to_string()),
            Some(Value::String(s)) => Some(s.clone()),
            Some(_) => None,
        }
    };
    let name = || -> Option<String> {
        fields.get("name").and_then(Value::as_str).filter(|n| !n.is_empty()).map(str::to_string)
    };

    let kind = match fields.get("type")?.as_str()? {
        "MOVE" => BlockKind::Move,
        "TURN_LEFT" => BlockKind::TurnLeft,
        "TURN_RIGHT" => BlockKind::TurnRight,
        "JUMP" => BlockKind::Jump,
        "REPEAT" => BlockKind::Repeat { times: repeat_count(fields.get("times"))?, body: body()? },
        "WHILE_CLEAR" => BlockKind::WhileClear { body: body()? },
        "IF_OBSTACLE" => BlockKind::IfObstacle { body: body()? },
        "IF_NOT_OBSTACLE" => BlockKind::IfNotObstacle { body: body()? },
        "INC_VAR" => BlockKind::IncVar { var: var()? },
        "DEC_VAR" => BlockKind::DecVar { var: var()? },
        "DEFINE_FUNC" => BlockKind::DefineFunc { name: name()?, body: body()? },
        "CALL_FUNC" => BlockKind::CallFunc { name: name()? },
        _ => return None,
    };
    Some(kind)
}

/// `times` as the editor writes it: a number or a numeric string.
/// Negative counts run zero times, fractional ones round up.
fn repeat_count(times: Option<&Value>) -> Option<u32> {
    let n = match times {
        None | Some(Value::Null) => return Some(DEFAULT_REPEAT),
        Some(Value::Number(n)) => n.as_f64()?,
        Some(Value::String(s)) => s.trim().parse::<f64>().ok()?,
        Some(_) => return None,
    };
    if !n.is_finite() {
        return None;
    }
    Some(n.max(0.0).ceil().min(u32::MAX as f64) as u32)
}
