//! Domain types shared by the planner, store, scheduler, and transports.

use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

/// Expression lifecycle states as persisted in `expressions.status`.
pub mod expr_status {
    pub const PENDING: &str = "pending";
    pub const IN_PROGRESS: &str = "in_progress";
    pub const DONE: &str = "done";
}

/// Task lifecycle states as persisted in `tasks.status`.
pub mod task_status {
    pub const PENDING: &str = "pending";
    pub const IN_PROGRESS: &str = "in_progress";
}

/// One of the four supported binary operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operator {
    Add,
    Sub,
    Mul,
    Div,
}

impl Operator {
    pub fn as_str(&self) -> &'static str {
        match self {
            Operator::Add => "+",
            Operator::Sub => "-",
            Operator::Mul => "*",
            Operator::Div => "/",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "+" => Some(Operator::Add),
            "-" => Some(Operator::Sub),
            "*" => Some(Operator::Mul),
            "/" => Some(Operator::Div),
            _ => None,
        }
    }

    pub fn from_char(c: char) -> Option<Self> {
        match c {
            '+' => Some(Operator::Add),
            '-' => Some(Operator::Sub),
            '*' => Some(Operator::Mul),
            '/' => Some(Operator::Div),
            _ => None,
        }
    }

    /// Shunting-yard precedence: additive 1, multiplicative 2.
    pub fn precedence(&self) -> u8 {
        match self {
            Operator::Add | Operator::Sub => 1,
            Operator::Mul | Operator::Div => 2,
        }
    }
}

/// A user-submitted expression and its lifecycle record.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct Expression {
    pub id: Uuid,
    #[serde(skip_serializing)]
    pub user_id: Uuid,
    pub expression: String,
    pub status: String,
    pub result: Option<f64>,
}

/// A task operand: either a literal value or a back-reference to another
/// task of the same expression whose result it is waiting for.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Operand {
    pub value: f64,
    pub task_id: Option<Uuid>,
}

impl Operand {
    pub fn literal(value: f64) -> Self {
        Operand {
            value,
            task_id: None,
        }
    }

    pub fn back_ref(task_id: Uuid) -> Self {
        Operand {
            value: f64::NAN,
            task_id: Some(task_id),
        }
    }
}

/// One binary operation node of an expression DAG, as produced by the
/// planner and persisted by the store.
#[derive(Debug, Clone)]
pub struct Task {
    pub id: Uuid,
    pub expression_id: Uuid,
    pub arg1: Operand,
    pub arg2: Operand,
    pub operator: Operator,
    pub final_task: bool,
}

/// A leased task projected for dispatch: both operands are literals and
/// `operation_time` is the deadline the agent sleeps until before replying.
#[derive(Debug, Clone, PartialEq)]
pub struct LeasedTask {
    pub id: Uuid,
    pub expression_id: Uuid,
    pub arg1: f64,
    pub arg2: f64,
    pub operator: String,
    pub operation_time: DateTime<Utc>,
    pub final_task: bool,
}
