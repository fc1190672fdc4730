//! End-to-end sandbox lifecycle against a real MySQL server.
//!
//! Needs a server reachable with the admin credentials from `MYSQL_HOST`,
//! `MYSQL_PORT`, `MYSQL_ROOT_USER` and `MYSQL_ROOT_PASSWORD` (default
//! `127.0.0.1:3306`, `root`/`root`):
//!
//!   cargo test -p db-sandbox --test sandbox_lifecycle -- --ignored

mod common;

use db_sandbox::{Sandbox, SandboxError, DATABASE_PREFIX};
use sea_orm::{ConnectionTrait, DbBackend, Statement};
use sqlx::Connection;

const TODOS_DDL: &str =
    "CREATE TABLE todos (id INT AUTO_INCREMENT PRIMARY KEY, item VARCHAR(255) NOT NULL)";

#[tokio::test]
#[ignore = "requires a running MySQL server"]
async fn todo_list_round_trip() {
    let db = Sandbox::builder()
        .modify_connect_options(|o| o.charset("utf8mb4"))
        .initial_query(TODOS_DDL)
        .setup()
        .await
        .expect("sandbox setup");

    assert!(db.database().starts_with(DATABASE_PREFIX));

    db.conn()
        .execute(Statement::from_sql_and_values(
            DbBackend::MySql,
            "INSERT INTO todos (item) VALUES (?)",
            ["Buy milk".into()],
        ))
        .await
        .expect("insert");

    assert_eq!(common::select_items(db.conn(), "todos").await, vec!["Buy milk"]);

    db.close().await.expect("teardown");
}

#[tokio::test]
#[ignore = "requires a running MySQL server"]
async fn concurrent_sandboxes_are_isolated() {
    let setup = || {
        Sandbox::builder()
            .initial_queries([TODOS_DDL.replace("todos", "items")])
            .setup()
    };
    let (a, b) = tokio::join!(setup(), setup());
    let (a, b) = (a.expect("sandbox a"), b.expect("sandbox b"));

    assert_ne!(a.database(), b.database());
    assert_ne!(a.user(), b.user());

    a.conn()
        .execute_unprepared("INSERT INTO items (item) VALUES ('from a')")
        .await
        .expect("insert a");
    b.conn()
        .execute_unprepared("INSERT INTO items (item) VALUES ('from b')")
        .await
        .expect("insert b");

    assert_eq!(common::select_items(a.conn(), "items").await, vec!["from a"]);
    assert_eq!(common::select_items(b.conn(), "items").await, vec!["from b"]);

    // the grant covers only the sandbox's own database
    let cross = a
        .conn()
        .execute_unprepared(&format!("SELECT item FROM `{}`.items", b.database()))
        .await;
    assert!(cross.is_err(), "sandbox a could read sandbox b's database");

    a.close().await.expect("teardown a");
    b.close().await.expect("teardown b");
}

#[tokio::test]
#[ignore = "requires a running MySQL server"]
async fn caller_database_name_is_overridden() {
    let db = Sandbox::builder()
        .modify_connect_options(|o| o.database("not_the_sandbox"))
        .setup()
        .await
        .expect("sandbox setup");

    let row = db
        .conn()
        .query_one(Statement::from_string(
            DbBackend::MySql,
            "SELECT DATABASE() AS db",
        ))
        .await
        .expect("select database")
        .expect("one row");
    let current: String = row.try_get("", "db").expect("db column");
    assert_eq!(current, db.database());

    db.close().await.expect("teardown");
}

#[tokio::test]
#[ignore = "requires a running MySQL server"]
async fn teardown_removes_database_and_user() {
    let db = Sandbox::builder().setup().await.expect("sandbox setup");
    let identity = db.identity().clone();
    let options = db.connect_options();

    let admin = common::admin_conn().await;
    assert!(common::database_exists(&admin, &identity.database).await);
    assert!(common::user_exists(&admin, &identity.user).await);

    db.close().await.expect("teardown");

    assert!(!common::database_exists(&admin, &identity.database).await);
    assert!(!common::user_exists(&admin, &identity.user).await);

    let err = sqlx::MySqlConnection::connect_with(&options)
        .await
        .expect_err("credentials must stop working after teardown");
    assert!(matches!(err, sqlx::Error::Database(_)), "{err}");
}

#[tokio::test]
#[ignore = "requires a running MySQL server"]
async fn preserved_sandbox_outlives_the_test() {
    let db = Sandbox::builder()
        .preserve()
        .initial_query(TODOS_DDL)
        .setup()
        .await
        .expect("sandbox setup");
    let identity = db.identity().clone();
    let options = db.connect_options();

    db.close().await.expect("preserved close");

    let mut conn = sqlx::MySqlConnection::connect_with(&options)
        .await
        .expect("preserved credentials still work");
    sqlx::query("INSERT INTO todos (item) VALUES ('still here')")
        .execute(&mut conn)
        .await
        .expect("preserved database is writable");
    conn.close().await.ok();

    // clean up by hand, as an operator would
    let admin = common::admin_conn().await;
    db_sandbox::infra::provision::teardown(&admin, &identity)
        .await
        .expect("manual cleanup");
}

#[tokio::test(flavor = "multi_thread")]
#[ignore = "requires a running MySQL server"]
async fn dropping_the_handle_tears_down() {
    let db = Sandbox::builder().setup().await.expect("sandbox setup");
    let identity = db.identity().clone();
    drop(db);

    let admin = common::admin_conn().await;
    assert!(!common::database_exists(&admin, &identity.database).await);
    assert!(!common::user_exists(&admin, &identity.user).await);
}

#[tokio::test]
#[ignore = "requires a running MySQL server"]
async fn failing_initial_statement_aborts_setup() {
    let err = Sandbox::builder()
        .initial_queries([TODOS_DDL, "THIS IS NOT SQL", "CREATE TABLE never (id INT)"])
        .setup()
        .await
        .expect_err("setup must fail");

    let (user, database) = match err {
        SandboxError::InitialStatement {
            index,
            statement,
            user,
            database,
            ..
        } => {
            assert_eq!(index, 1);
            assert_eq!(statement, "THIS IS NOT SQL");
            (user, database)
        }
        other => panic!("unexpected error: {other}"),
    };

    // setup tore the half-built sandbox down before returning
    let admin = common::admin_conn().await;
    assert!(!common::database_exists(&admin, &database).await);
    assert!(!common::user_exists(&admin, &user).await);
}

#[tokio::test]
#[ignore = "requires a running MySQL server"]
async fn second_teardown_of_same_identity_fails() {
    let db = Sandbox::builder().setup().await.expect("sandbox setup");
    let identity = db.identity().clone();
    db.close().await.expect("teardown");

    let admin = common::admin_conn().await;
    let err = db_sandbox::infra::provision::teardown(&admin, &identity)
        .await
        .expect_err("objects are already gone");
    // the server is reachable, so the failure lands on the first DROP
    assert!(
        matches!(
            err,
            SandboxError::Teardown {
                step: db_sandbox::TeardownStep::DropUser,
                ..
            }
        ),
        "{err}"
    );
}
