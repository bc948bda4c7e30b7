//! Task store integration tests.
//!
//! All tests require TEST_DATABASE_URL to be set and should run
//! single-threaded to avoid table conflicts:
//!   TEST_DATABASE_URL=postgres://... cargo test --test db_integration -- --test-threads=1

mod common;

use std::time::Duration;

use uuid::Uuid;

use abacus::db::{Database, StoreError};
use abacus::model::{expr_status, task_status};
use abacus::planner;

/// Skip the test if TEST_DATABASE_URL is not set.
macro_rules! require_db {
    () => {
        if !common::has_test_db() {
            eprintln!("Skipping: TEST_DATABASE_URL not set");
            return;
        }
    };
}

async fn setup() -> Database {
    common::setup_test_db().await
}

fn one_ms(_: abacus::model::Operator) -> Duration {
    Duration::from_millis(1)
}

async fn create_plan(db: &Database, user: Uuid, expr: &str) -> planner::Plan {
    let plan = planner::plan(user, expr).unwrap();
    db.create_expression_with_tasks(&plan.expression, &plan.tasks)
        .await
        .unwrap();
    plan
}

async fn task_count(db: &Database, expression_id: Uuid) -> i64 {
    sqlx::query_scalar("SELECT COUNT(*) FROM tasks WHERE expression_id = $1")
        .bind(expression_id)
        .fetch_one(db.pool())
        .await
        .unwrap()
}

async fn expression_row(db: &Database, id: Uuid) -> (String, Option<f64>) {
    sqlx::query_as("SELECT status, result FROM expressions WHERE id = $1")
        .bind(id)
        .fetch_one(db.pool())
        .await
        .unwrap()
}

// --- Creation ---

#[tokio::test]
async fn create_expression_persists_all_tasks() {
    require_db!();
    let db = setup().await;
    let user = common::insert_user(&db, "alice").await;

    let plan = create_plan(&db, user, "(1+2)*(3+4)").await;
    assert_eq!(task_count(&db, plan.expression.id).await, 3);

    let finals: i64 =
        sqlx::query_scalar("SELECT COUNT(*) FROM tasks WHERE expression_id = $1 AND final_task")
            .bind(plan.expression.id)
            .fetch_one(db.pool())
            .await
            .unwrap();
    assert_eq!(finals, 1);

    let (status, result) = expression_row(&db, plan.expression.id).await;
    assert_eq!(status, expr_status::PENDING);
    assert_eq!(result, None);
}

#[tokio::test]
async fn create_expression_rejects_unknown_owner() {
    require_db!();
    let db = setup().await;

    let plan = planner::plan(Uuid::new_v4(), "2+2").unwrap();
    let err = db
        .create_expression_with_tasks(&plan.expression, &plan.tasks)
        .await
        .unwrap_err();
    assert!(matches!(err, StoreError::UnknownUser));
}

// --- Leasing ---

#[tokio::test]
async fn lease_on_empty_store_returns_none() {
    require_db!();
    let db = setup().await;
    assert!(db.lease_task(one_ms).await.unwrap().is_none());
}

#[tokio::test]
async fn lease_skips_tasks_with_unresolved_dependencies() {
    require_db!();
    let db = setup().await;
    let user = common::insert_user(&db, "alice").await;

    // "2+2*2" lowers to [2*2, 2+ref]; only the multiplication is eligible.
    let plan = create_plan(&db, user, "2+2*2").await;
    let mul_task = &plan.tasks[0];

    let leased = db.lease_task(one_ms).await.unwrap().unwrap();
    assert_eq!(leased.id, mul_task.id);
    assert_eq!(leased.operator, "*");
    assert!(!leased.final_task);

    // The remaining task still has a back-reference, so nothing is eligible.
    assert!(db.lease_task(one_ms).await.unwrap().is_none());
}

#[tokio::test]
async fn lease_transitions_expression_and_stamps_deadline() {
    require_db!();
    let db = setup().await;
    let user = common::insert_user(&db, "alice").await;
    let plan = create_plan(&db, user, "2+2").await;

    let before = chrono::Utc::now();
    let leased = db
        .lease_task(|_| Duration::from_secs(60))
        .await
        .unwrap()
        .unwrap();

    assert!(leased.operation_time > before + chrono::Duration::seconds(59));
    assert!(leased.operation_time < before + chrono::Duration::seconds(61));

    let (status, _) = expression_row(&db, plan.expression.id).await;
    assert_eq!(status, expr_status::IN_PROGRESS);

    let task_state: String = sqlx::query_scalar("SELECT status FROM tasks WHERE id = $1")
        .bind(leased.id)
        .fetch_one(db.pool())
        .await
        .unwrap();
    assert_eq!(task_state, task_status::IN_PROGRESS);
}

#[tokio::test]
async fn lease_is_fifo_across_expressions() {
    require_db!();
    let db = setup().await;
    let user = common::insert_user(&db, "alice").await;

    let first = create_plan(&db, user, "1+1").await;
    let second = create_plan(&db, user, "2+2").await;

    let a = db.lease_task(one_ms).await.unwrap().unwrap();
    let b = db.lease_task(one_ms).await.unwrap().unwrap();
    assert_eq!(a.expression_id, first.expression.id);
    assert_eq!(b.expression_id, second.expression.id);
}

#[tokio::test]
async fn concurrent_leases_never_hand_out_the_same_task() {
    require_db!();
    let db = setup().await;
    let user = common::insert_user(&db, "alice").await;

    for i in 0..5 {
        create_plan(&db, user, &format!("{i}+1")).await;
    }

    let mut handles = Vec::new();
    for _ in 0..10 {
        let db = db.clone();
        handles.push(tokio::spawn(async move {
            db.lease_task(|_| Duration::from_secs(60)).await.unwrap()
        }));
    }

    let mut leased_ids = Vec::new();
    for handle in handles {
        if let Some(task) = handle.await.unwrap() {
            leased_ids.push(task.id);
        }
    }

    assert_eq!(leased_ids.len(), 5, "all five tasks leased exactly once");
    leased_ids.sort();
    leased_ids.dedup();
    assert_eq!(leased_ids.len(), 5, "no task leased twice");
}

// --- Result merge ---

#[tokio::test]
async fn non_final_result_substitutes_into_dependents() {
    require_db!();
    let db = setup().await;
    let user = common::insert_user(&db, "alice").await;
    let plan = create_plan(&db, user, "2+2*2").await;

    let mul = db.lease_task(one_ms).await.unwrap().unwrap();
    db.submit_result(mul.id, mul.expression_id, 4.0, false)
        .await
        .unwrap();

    // The source row is gone and the dependent became eligible.
    assert_eq!(task_count(&db, plan.expression.id).await, 1);
    let add = db.lease_task(one_ms).await.unwrap().unwrap();
    assert_eq!(add.operator, "+");
    assert_eq!(add.arg1, 2.0);
    assert_eq!(add.arg2, 4.0);
    assert!(add.final_task);
}

#[tokio::test]
async fn both_arg_slots_of_one_task_can_reference_the_same_source() {
    require_db!();
    let db = setup().await;
    let user = common::insert_user(&db, "alice").await;

    // Force a task whose two operands reference the same prior task.
    let plan = planner::plan(user, "2+2").unwrap();
    let square = abacus::model::Task {
        id: Uuid::new_v4(),
        expression_id: plan.expression.id,
        arg1: abacus::model::Operand::back_ref(plan.tasks[0].id),
        arg2: abacus::model::Operand::back_ref(plan.tasks[0].id),
        operator: abacus::model::Operator::Mul,
        final_task: false,
    };
    let mut tasks = plan.tasks.clone();
    tasks[0].final_task = false;
    tasks.push(square);
    db.create_expression_with_tasks(&plan.expression, &tasks)
        .await
        .unwrap();

    let add = db.lease_task(one_ms).await.unwrap().unwrap();
    db.submit_result(add.id, add.expression_id, 4.0, false)
        .await
        .unwrap();

    let sq = db.lease_task(one_ms).await.unwrap().unwrap();
    assert_eq!(sq.arg1, 4.0);
    assert_eq!(sq.arg2, 4.0);
}

#[tokio::test]
async fn final_result_completes_expression_and_leaves_no_tasks() {
    require_db!();
    let db = setup().await;
    let user = common::insert_user(&db, "alice").await;
    let plan = create_plan(&db, user, "2+2").await;

    let task = db.lease_task(one_ms).await.unwrap().unwrap();
    assert!(task.final_task);
    db.submit_result(task.id, task.expression_id, 4.0, true)
        .await
        .unwrap();

    let (status, result) = expression_row(&db, plan.expression.id).await;
    assert_eq!(status, expr_status::DONE);
    assert_eq!(result, Some(4.0));
    assert_eq!(task_count(&db, plan.expression.id).await, 0);
}

#[tokio::test]
async fn full_expression_resolution_through_the_store() {
    require_db!();
    let db = setup().await;
    let user = common::insert_user(&db, "alice").await;
    let plan = create_plan(&db, user, "2+2*2").await;

    // Drain the queue the way agents would, without the transport.
    while let Some(task) = db.lease_task(one_ms).await.unwrap() {
        let result = match task.operator.as_str() {
            "+" => task.arg1 + task.arg2,
            "*" => task.arg1 * task.arg2,
            other => panic!("unexpected operator {other}"),
        };
        db.submit_result(task.id, task.expression_id, result, task.final_task)
            .await
            .unwrap();
    }

    let (status, result) = expression_row(&db, plan.expression.id).await;
    assert_eq!(status, expr_status::DONE);
    assert_eq!(result, Some(6.0));
}

#[tokio::test]
async fn submitting_unknown_final_task_fails() {
    require_db!();
    let db = setup().await;
    let err = db
        .submit_result(Uuid::new_v4(), Uuid::new_v4(), 1.0, true)
        .await
        .unwrap_err();
    assert!(matches!(err, StoreError::UnknownTask));
}

#[tokio::test]
async fn submitting_non_final_with_no_dependents_fails() {
    require_db!();
    let db = setup().await;
    let err = db
        .submit_result(Uuid::new_v4(), Uuid::new_v4(), 1.0, false)
        .await
        .unwrap_err();
    assert!(matches!(err, StoreError::UnknownTaskDependency));
}

// --- Expiry recovery ---

#[tokio::test]
async fn expired_leases_are_reset_to_pending() {
    require_db!();
    let db = setup().await;
    let user = common::insert_user(&db, "alice").await;
    create_plan(&db, user, "1+2").await;

    let leased = db
        .lease_task(|_| Duration::from_millis(1))
        .await
        .unwrap()
        .unwrap();
    tokio::time::sleep(Duration::from_millis(100)).await;

    let reset = db
        .reset_expired_tasks(Duration::from_millis(10))
        .await
        .unwrap();
    assert_eq!(reset, 1);

    // The task is leasable again; no data was lost.
    let again = db.lease_task(one_ms).await.unwrap().unwrap();
    assert_eq!(again.id, leased.id);
    assert_eq!(again.arg1, 1.0);
    assert_eq!(again.arg2, 2.0);
}

#[tokio::test]
async fn expiry_reset_is_idempotent() {
    require_db!();
    let db = setup().await;
    let user = common::insert_user(&db, "alice").await;
    create_plan(&db, user, "1+2").await;

    db.lease_task(|_| Duration::from_millis(1))
        .await
        .unwrap()
        .unwrap();
    tokio::time::sleep(Duration::from_millis(100)).await;

    let first = db
        .reset_expired_tasks(Duration::from_millis(10))
        .await
        .unwrap();
    let second = db
        .reset_expired_tasks(Duration::from_millis(10))
        .await
        .unwrap();
    assert_eq!(first, 1);
    assert_eq!(second, 0);
}

#[tokio::test]
async fn fresh_leases_are_not_reset() {
    require_db!();
    let db = setup().await;
    let user = common::insert_user(&db, "alice").await;
    create_plan(&db, user, "1+2").await;

    db.lease_task(|_| Duration::from_secs(3600))
        .await
        .unwrap()
        .unwrap();
    let reset = db.reset_expired_tasks(Duration::from_secs(60)).await.unwrap();
    assert_eq!(reset, 0);
}

// --- Users and expressions ---

#[tokio::test]
async fn duplicate_login_rejected() {
    require_db!();
    let db = setup().await;
    let hash = abacus::auth::hash_password("Password1!").unwrap();
    db.create_user("alice", &hash).await.unwrap();
    let err = db.create_user("alice", &hash).await.unwrap_err();
    assert!(matches!(err, StoreError::UserAlreadyExists));
}

#[tokio::test]
async fn auth_user_checks_credentials() {
    require_db!();
    let db = setup().await;
    let id = common::insert_user(&db, "alice").await;

    assert_eq!(db.auth_user("alice", "Password1!").await.unwrap(), id);
    assert!(matches!(
        db.auth_user("alice", "WrongPass1!").await.unwrap_err(),
        StoreError::InvalidPassword
    ));
    assert!(matches!(
        db.auth_user("bob", "Password1!").await.unwrap_err(),
        StoreError::UserNotFound
    ));
}

#[tokio::test]
async fn expressions_are_scoped_to_their_owner() {
    require_db!();
    let db = setup().await;
    let alice = common::insert_user(&db, "alice").await;
    let bob = common::insert_user(&db, "bob").await;

    create_plan(&db, alice, "1+1").await;
    create_plan(&db, alice, "2+2").await;
    create_plan(&db, bob, "3+3").await;

    assert_eq!(db.get_all_expressions(alice).await.unwrap().len(), 2);
    assert_eq!(db.get_all_expressions(bob).await.unwrap().len(), 1);
    assert!(matches!(
        db.get_all_expressions(Uuid::new_v4()).await.unwrap_err(),
        StoreError::UnknownUser
    ));
}
