//! Property-based tests for the validator and planner.
//!
//! Random well-formed expressions are generated as ASTs, rendered to
//! infix, and pushed through the real pipeline. The planner's DAG must
//! evaluate to the same value as direct recursive evaluation, and postfix
//! stack evaluation must agree with both.
//!
//! Run with: cargo test --test property_tests

use std::collections::HashMap;

use proptest::prelude::*;
use uuid::Uuid;

use abacus::model::Operator;
use abacus::planner;
use abacus::validate;

#[derive(Debug, Clone)]
enum Expr {
    Lit(u32),
    Bin(Box<Expr>, Operator, Box<Expr>),
}

impl Expr {
    fn render(&self) -> String {
        match self {
            Expr::Lit(n) => n.to_string(),
            Expr::Bin(l, op, r) => format!("({}{}{})", l.render(), op.as_str(), r.render()),
        }
    }

    fn eval(&self) -> f64 {
        match self {
            Expr::Lit(n) => f64::from(*n),
            Expr::Bin(l, op, r) => apply(*op, l.eval(), r.eval()),
        }
    }

    fn operator_count(&self) -> usize {
        match self {
            Expr::Lit(_) => 0,
            Expr::Bin(l, _, r) => 1 + l.operator_count() + r.operator_count(),
        }
    }
}

fn apply(op: Operator, a: f64, b: f64) -> f64 {
    match op {
        Operator::Add => a + b,
        Operator::Sub => a - b,
        Operator::Mul => a * b,
        Operator::Div => a / b,
    }
}

/// Expression trees with single-digit literals. Divisors are forced to be
/// nonzero literals so every generated expression passes validation and
/// evaluates to a finite value.
fn expr_strategy() -> impl Strategy<Value = Expr> {
    let leaf = (1u32..=9).prop_map(Expr::Lit);
    leaf.prop_recursive(4, 24, 2, |inner| {
        (inner.clone(), 0u8..4, inner, 1u32..=9).prop_map(|(l, op, r, divisor)| match op {
            0 => Expr::Bin(Box::new(l), Operator::Add, Box::new(r)),
            1 => Expr::Bin(Box::new(l), Operator::Sub, Box::new(r)),
            2 => Expr::Bin(Box::new(l), Operator::Mul, Box::new(r)),
            _ => Expr::Bin(Box::new(l), Operator::Div, Box::new(Expr::Lit(divisor))),
        })
    })
}

/// Evaluate postfix tokens with a value stack.
fn eval_postfix(tokens: &[String]) -> f64 {
    let mut stack: Vec<f64> = Vec::new();
    for token in tokens {
        if let Some(op) = Operator::from_str(token) {
            let b = stack.pop().unwrap();
            let a = stack.pop().unwrap();
            stack.push(apply(op, a, b));
        } else {
            stack.push(token.parse().unwrap());
        }
    }
    assert_eq!(stack.len(), 1);
    stack[0]
}

/// Execute a plan's tasks in creation order, resolving back-references
/// from already-computed values (postfix construction guarantees every
/// antecedent precedes its dependents).
fn eval_plan(plan: &planner::Plan) -> f64 {
    let mut values: HashMap<Uuid, f64> = HashMap::new();
    let mut final_value = None;
    for task in &plan.tasks {
        let a = task
            .arg1
            .task_id
            .map(|id| values[&id])
            .unwrap_or(task.arg1.value);
        let b = task
            .arg2
            .task_id
            .map(|id| values[&id])
            .unwrap_or(task.arg2.value);
        let v = apply(task.operator, a, b);
        values.insert(task.id, v);
        if task.final_task {
            final_value = Some(v);
        }
    }
    final_value.expect("plan has a final task")
}

fn close(a: f64, b: f64) -> bool {
    (a - b).abs() <= 1e-9 * a.abs().max(b.abs()).max(1.0)
}

proptest! {
    /// Every generated expression passes validation.
    #[test]
    fn generated_expressions_validate(expr in expr_strategy()) {
        let rendered = expr.render();
        if expr.operator_count() == 0 {
            prop_assert_eq!(
                validate::validate(&rendered),
                Err(validate::ExpressionError::MissingOperator)
            );
        } else {
            prop_assert_eq!(validate::validate(&rendered), Ok(()));
        }
    }

    /// Postfix stack evaluation agrees with direct recursive evaluation.
    #[test]
    fn postfix_evaluation_matches_recursive(expr in expr_strategy()) {
        let rendered = expr.render();
        let tokens = planner::infix_to_postfix(&rendered);
        prop_assert!(close(eval_postfix(&tokens), expr.eval()),
            "postfix {} != recursive {}", eval_postfix(&tokens), expr.eval());
    }

    /// A validated expression plans into operator-count tasks with exactly
    /// one final task, and executing the DAG yields the correct value.
    #[test]
    fn plan_dag_evaluates_correctly(expr in expr_strategy()) {
        prop_assume!(expr.operator_count() > 0);
        let rendered = expr.render();
        let plan = planner::plan(Uuid::new_v4(), &rendered).unwrap();

        prop_assert_eq!(plan.tasks.len(), expr.operator_count());
        prop_assert_eq!(plan.tasks.iter().filter(|t| t.final_task).count(), 1);
        prop_assert!(plan.tasks.last().unwrap().final_task);

        let dag_value = eval_plan(&plan);
        prop_assert!(close(dag_value, expr.eval()),
            "dag {} != recursive {} for {}", dag_value, expr.eval(), rendered);
    }

    /// Back-references always point at earlier tasks in the list.
    #[test]
    fn back_references_point_backwards(expr in expr_strategy()) {
        prop_assume!(expr.operator_count() > 0);
        let plan = planner::plan(Uuid::new_v4(), &expr.render()).unwrap();
        let mut seen: Vec<Uuid> = Vec::new();
        for task in &plan.tasks {
            for reference in [task.arg1.task_id, task.arg2.task_id].into_iter().flatten() {
                prop_assert!(seen.contains(&reference), "forward or dangling reference");
            }
            seen.push(task.id);
        }
    }
}
