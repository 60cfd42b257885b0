//! Tests for the qb module.

use crate::db::Db;
use crate::qb::{Order, WhereQb, delete, insert, select, update};
use crate::testing::{Reply, ScriptedPool, User, user_row};
use crate::value::Value;

#[test]
fn test_select_default_columns() {
    let qb = select::<User>();
    assert_eq!(qb.to_sql(), "SELECT id, name, age, joined FROM users");
}

#[test]
fn test_select_where_order_is_insertion_order() {
    let stmt = select::<User>().eq("a", 1).eq("b", 2).build().unwrap();
    assert_eq!(
        stmt.sql(),
        "SELECT id, name, age, joined FROM users WHERE a = $1 AND b = $2"
    );

    let reversed = select::<User>().eq("b", 2).eq("a", 1).build().unwrap();
    assert!(reversed.sql().ends_with("WHERE b = $1 AND a = $2"));
}

#[test]
fn test_select_full_shape() {
    let stmt = select::<User>()
        .from("archive.users")
        .select(&["id", "name", "age", "joined"])
        .gte("age", 18)
        .like("name", "a%")
        .in_list("id", [1, 2, 3])
        .order_by("age", Order::Desc)
        .limit(10)
        .offset(20)
        .build()
        .unwrap();
    assert_eq!(
        stmt.sql(),
        "SELECT id, name, age, joined FROM archive.users \
         WHERE age >= $1 AND name LIKE $2 AND id IN ($3, $4, $5) \
         ORDER BY age DESC LIMIT 10 OFFSET 20"
    );
    assert_eq!(stmt.params().len(), stmt.placeholder_count());
}

#[test]
fn test_order_by_is_single() {
    let sql = select::<User>()
        .order_by_asc("name")
        .order_by_desc("age")
        .to_sql();
    assert!(sql.ends_with("ORDER BY age DESC"));
    assert!(!sql.contains("name ASC"));
}

#[test]
fn test_where_op_uses_whitelist() {
    let stmt = select::<User>()
        .where_op("age", ">", 25)
        .where_in_op("id", "not in", [4, 5])
        .build()
        .unwrap();
    assert!(stmt.sql().ends_with("WHERE age > $1 AND id NOT IN ($2, $3)"));

    let err = select::<User>().where_op("age", "<>", 25).build().unwrap_err();
    assert!(err.is_validation());
    let err = select::<User>().where_op("id", "IN", 1).build().unwrap_err();
    assert!(err.is_validation());
}

#[test]
fn test_first_error_is_kept() {
    let err = select::<User>()
        .eq("bad column", 1)
        .where_op("age", "OR 1=1 --", 2)
        .build()
        .unwrap_err();
    assert!(err.to_string().contains("bad column"));
}

#[test]
fn test_value_injection_stays_in_params() {
    let evil = "'; DROP TABLE users; --";
    let stmt = update("users").set("name", evil).eq("name", evil).build().unwrap();
    assert_eq!(stmt.sql(), "UPDATE users SET name = $1 WHERE name = $2");
    assert!(!stmt.sql().contains("DROP"));
    assert_eq!(stmt.params()[1], Value::Text(evil.into()));
}

#[test]
fn test_count_sql_drops_order_and_limit() {
    let qb = select::<User>().gt("age", 25).order_by_asc("id").limit(5);
    let stmt = qb.build_count().unwrap();
    assert_eq!(stmt.sql(), "SELECT COUNT(*) FROM users WHERE age > $1");
    assert_eq!(stmt.params(), &[Value::Int(25)]);
}

#[test]
fn test_update_basic() {
    let stmt = update("users")
        .set("name", "bob")
        .set("age", 31)
        .eq("id", 1i64)
        .build()
        .unwrap();
    assert_eq!(stmt.sql(), "UPDATE users SET name = $1, age = $2 WHERE id = $3");
    assert_eq!(
        stmt.params(),
        &[Value::Text("bob".into()), Value::Int(31), Value::Int(1)]
    );
}

#[test]
fn test_update_set_many_keeps_order() {
    let sql = update("users")
        .set_many([("b", 1), ("a", 2), ("b", 3)])
        .to_sql();
    assert_eq!(sql, "UPDATE users SET b = $1, a = $2");
}

#[test]
fn test_update_requires_set() {
    let err = update("users").eq("id", 1).build().unwrap_err();
    assert!(err.is_validation());
}

#[test]
fn test_invalid_table_is_rejected() {
    assert!(update("users; DROP TABLE x").set("a", 1).build().is_err());
    assert!(delete("1users").eq("id", 1).build(false).is_err());
    assert!(insert("").columns(&["a"]).values([1]).build().is_err());
}

#[test]
fn test_delete_requires_where_or_confirmation() {
    let qb = delete("users");
    assert!(qb.build(false).unwrap_err().is_validation());
    assert_eq!(qb.build(true).unwrap().sql(), "DELETE FROM users");
}

#[test]
fn test_delete_with_limit() {
    let stmt = delete("users").lt("age", 18).limit(100).build(false).unwrap();
    assert_eq!(
        stmt.sql(),
        "DELETE FROM users WHERE ctid IN (SELECT ctid FROM users WHERE age < $1 LIMIT 100)"
    );
}

#[test]
fn test_insert_multi_row() {
    let stmt = insert("users")
        .columns(&["id", "name"])
        .values([Value::Int(1), Value::from("a")])
        .values([Value::Int(2), Value::from("b")])
        .build()
        .unwrap();
    assert_eq!(
        stmt.sql(),
        "INSERT INTO users (id, name) VALUES ($1, $2), ($3, $4)"
    );
    assert_eq!(stmt.placeholder_count(), 4);
}

#[test]
fn test_insert_row_arity_is_checked() {
    let err = insert("users")
        .columns(&["id", "name"])
        .values([1])
        .build()
        .unwrap_err();
    assert!(err.is_validation());
}

#[test]
fn test_insert_for_record() {
    let users = vec![
        User { id: 1, name: "ann".into(), age: Some(30), joined: None },
        User { id: 2, name: "bob".into(), age: None, joined: None },
    ];
    let stmt = crate::qb::InsertQb::for_record::<User>("users")
        .records(&users)
        .build()
        .unwrap();
    assert!(stmt.sql().starts_with("INSERT INTO users (id, name, age, joined) VALUES"));
    assert_eq!(stmt.params().len(), 8);
    assert_eq!(stmt.params()[6], Value::Null);
}

// ==================== Execution ====================

#[tokio::test]
async fn test_fetch_all_maps_rows() {
    let pool = ScriptedPool::new();
    pool.push(Reply::rows(vec![user_row(1, "ann", Some(30)), user_row(2, "bob", None)]));
    let db = Db::new(pool.clone());

    let users = select::<User>().gt("age", 25).fetch_all(&db).await.unwrap();
    assert_eq!(users.len(), 2);
    assert_eq!(users[1].name, "bob");
    assert_eq!(pool.outstanding(), 0);
}

#[tokio::test]
async fn test_validation_happens_before_io() {
    let pool = ScriptedPool::new();
    let db = Db::new(pool.clone());

    let err = select::<User>()
        .eq("id; DROP TABLE users;", 1)
        .fetch_all(&db)
        .await
        .unwrap_err();
    assert!(err.is_validation());
    let err = delete("users").execute(&db, false).await.unwrap_err();
    assert!(err.is_validation());
    let err = update("users").execute(&db).await.unwrap_err();
    assert!(err.is_validation());

    assert_eq!(pool.acquired(), 0);
}

#[tokio::test]
async fn test_first_adds_limit_one() {
    let pool = ScriptedPool::new();
    pool.push(Reply::rows(vec![user_row(7, "cy", None)]));
    let db = Db::new(pool.clone());

    let qb = select::<User>().eq("name", "cy");
    let user = qb.first(&db).await.unwrap();
    assert_eq!(user.map(|u| u.id), Some(7));
    assert!(pool.sql_log()[0].ends_with("WHERE name = $1 LIMIT 1"));
    // the builder itself is unchanged
    assert!(!qb.to_sql().contains("LIMIT"));

    assert!(qb.first(&db).await.unwrap().is_none());
}

#[tokio::test]
async fn test_count_runs_on_server() {
    let pool = ScriptedPool::new();
    pool.push(Reply::rows(vec![vec![Value::Int(3)]]));
    let db = Db::new(pool.clone());

    let n = select::<User>().gt("age", 25).count(&db).await.unwrap();
    assert_eq!(n, 3);
    assert_eq!(pool.sql_log(), vec!["SELECT COUNT(*) FROM users WHERE age > $1"]);
}

#[tokio::test]
async fn test_fetch_cached_reuses_result() {
    let pool = ScriptedPool::new();
    pool.push(Reply::rows(vec![user_row(1, "ann", Some(30))]));
    let db = Db::new(pool.clone());
    let qb = select::<User>().eq("id", 1);

    let a = qb.fetch_cached(&db).await.unwrap();
    let b = qb.fetch_cached(&db).await.unwrap();
    assert_eq!(a.len(), 1);
    assert!(std::sync::Arc::ptr_eq(&a, &b));
    assert_eq!(pool.acquired(), 1);

    // fetch_all never consults the cache
    qb.fetch_all(&db).await.unwrap();
    assert_eq!(pool.acquired(), 2);
}

#[tokio::test]
async fn test_update_without_where_is_allowed() {
    let pool = ScriptedPool::new();
    pool.push(Reply::Affected(12));
    let db = Db::new(pool.clone());

    let n = update("users").set("active", false).execute(&db).await.unwrap();
    assert_eq!(n, 12);
    assert_eq!(pool.sql_log(), vec!["UPDATE users SET active = $1"]);
}

#[tokio::test]
async fn test_delete_all_with_confirmation() {
    let pool = ScriptedPool::new();
    pool.push(Reply::Affected(5));
    let db = Db::new(pool.clone());

    let n = delete("users").execute(&db, true).await.unwrap();
    assert_eq!(n, 5);
    assert_eq!(pool.sql_log(), vec!["DELETE FROM users"]);
}

#[tokio::test]
async fn test_builders_are_reusable() {
    let pool = ScriptedPool::new();
    pool.push(Reply::Affected(2));
    pool.push(Reply::Affected(0));
    let db = Db::new(pool.clone());

    let qb = delete("users").eq("active", false);
    assert_eq!(qb.execute(&db, false).await.unwrap(), 2);
    assert_eq!(qb.execute(&db, false).await.unwrap(), 0);

    let log = pool.statements();
    assert_eq!(log.len(), 2);
    assert_eq!(log[0], log[1]);
}

#[tokio::test]
async fn test_backend_error_is_query_error() {
    let pool = ScriptedPool::new();
    pool.push(Reply::Error(
        "duplicate key value violates unique constraint \"users_pkey\"".into(),
    ));
    let db = Db::new(pool.clone());

    let err = insert("users")
        .columns(&["id"])
        .values([1])
        .execute(&db)
        .await
        .unwrap_err();
    assert!(err.is_query());
    assert!(err.to_string().contains("users_pkey"));
    assert_eq!(pool.outstanding(), 0);
}

#[tokio::test]
async fn test_pool_exhaustion_surfaces() {
    let db = Db::new(ScriptedPool::new().exhausted());
    let err = select::<User>().fetch_all(&db).await.unwrap_err();
    assert!(err.is_pool_exhausted());
    assert!(err.is_connection());
}
