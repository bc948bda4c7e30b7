//! Expression lowering: infix → postfix → dependency DAG of binary tasks.
//!
//! The planner assumes validator-accepted input. Lowering is the classic
//! shunting-yard pass followed by a stack walk over the postfix tokens:
//! literals push an operand, operators pop two operands and allocate a task
//! whose id is pushed back as a back-reference. The last postfix operator
//! becomes the expression's final task.

use uuid::Uuid;

use crate::model::{expr_status, Expression, Operand, Operator, Task};
use crate::validate::{strip_whitespace, ExpressionError};

/// Planner output: the expression row plus its ordered task list, both
/// handed to the store for transactional insertion.
#[derive(Debug, Clone)]
pub struct Plan {
    pub expression: Expression,
    pub tasks: Vec<Task>,
}

enum StackEntry {
    Op(Operator),
    LParen,
}

/// Convert a whitespace-stripped infix expression to postfix tokens.
/// Parentheses group but emit nothing; literals stay multi-character.
pub fn infix_to_postfix(expression: &str) -> Vec<String> {
    let chars: Vec<char> = expression.chars().collect();
    let mut output: Vec<String> = Vec::new();
    let mut stack: Vec<StackEntry> = Vec::new();

    let mut i = 0;
    while i < chars.len() {
        let c = chars[i];
        if c.is_ascii_digit() || c == '.' {
            let start = i;
            while i < chars.len() && (chars[i].is_ascii_digit() || chars[i] == '.') {
                i += 1;
            }
            output.push(chars[start..i].iter().collect());
            continue;
        }

        if c == '(' {
            stack.push(StackEntry::LParen);
        } else if c == ')' {
            while let Some(entry) = stack.pop() {
                match entry {
                    StackEntry::Op(op) => output.push(op.as_str().to_string()),
                    StackEntry::LParen => break,
                }
            }
        } else if let Some(op) = Operator::from_char(c) {
            while let Some(StackEntry::Op(top)) = stack.last() {
                if top.precedence() >= op.precedence() {
                    output.push(top.as_str().to_string());
                    stack.pop();
                } else {
                    break;
                }
            }
            stack.push(StackEntry::Op(op));
        }
        i += 1;
    }

    while let Some(entry) = stack.pop() {
        if let StackEntry::Op(op) = entry {
            output.push(op.as_str().to_string());
        }
    }

    output
}

/// Lower a validated expression into a pending [`Expression`] row and its
/// task DAG. Returns `InvalidExpression` only if the input slipped past
/// validation (malformed literal or unbalanced postfix).
pub fn plan(user_id: Uuid, expression: &str) -> Result<Plan, ExpressionError> {
    let source = strip_whitespace(expression);
    let expression_id = Uuid::new_v4();

    let postfix = infix_to_postfix(&source);
    let mut stack: Vec<Operand> = Vec::new();
    let mut tasks: Vec<Task> = Vec::new();

    for (i, token) in postfix.iter().enumerate() {
        match Operator::from_str(token) {
            Some(operator) => {
                let arg2 = stack.pop().ok_or(ExpressionError::InvalidExpression)?;
                let arg1 = stack.pop().ok_or(ExpressionError::InvalidExpression)?;
                let task = Task {
                    id: Uuid::new_v4(),
                    expression_id,
                    arg1,
                    arg2,
                    operator,
                    final_task: i == postfix.len() - 1,
                };
                stack.push(Operand::back_ref(task.id));
                tasks.push(task);
            }
            None => {
                let value: f64 = token
                    .parse()
                    .map_err(|_| ExpressionError::InvalidExpression)?;
                stack.push(Operand::literal(value));
            }
        }
    }

    if stack.len() != 1 {
        return Err(ExpressionError::InvalidExpression);
    }

    Ok(Plan {
        expression: Expression {
            id: expression_id,
            user_id,
            expression: source,
            status: expr_status::PENDING.to_string(),
            result: None,
        },
        tasks,
    })
}
