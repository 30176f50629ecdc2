//! Integration tests against a live PostgreSQL database
//!
//! Ignored by default. Run with
//! `DATABASE_URL=postgres://... cargo test --test postgres_test -- --ignored`.

use queryhaus::prelude::*;

#[entity]
#[table(name = "qh_customers")]
pub struct Customer {
    #[primary_key]
    pub id: i64,
    pub name: String,
    pub email: Option<String>,
    #[relation]
    pub orders: Vec<Order>,
}

#[entity]
#[table(name = "qh_orders")]
pub struct Order {
    #[primary_key]
    pub id: i64,
    pub customer_id: i64,
    pub status: String,
    pub placed_on: NaiveDate,
    pub total: f64,
}

async fn setup() -> QueryHaus {
    let database_url =
        std::env::var("DATABASE_URL").expect("DATABASE_URL must be set for integration tests");

    let pool = PgPool::connect(&database_url)
        .await
        .expect("Failed to connect to database");
    QueryHaus::from_pool(pool, QueryConfig::default())
}

async fn create_tables(pool: &PgPool) {
    for statement in [
        "DROP TABLE IF EXISTS qh_orders CASCADE",
        "DROP TABLE IF EXISTS qh_customers CASCADE",
        "CREATE TABLE qh_customers (id BIGINT PRIMARY KEY, name TEXT NOT NULL, email TEXT)",
        "CREATE TABLE qh_orders (
            id BIGINT PRIMARY KEY,
            customer_id BIGINT NOT NULL REFERENCES qh_customers(id),
            status TEXT NOT NULL,
            placed_on DATE NOT NULL,
            total DOUBLE PRECISION NOT NULL
        )",
        "INSERT INTO qh_customers VALUES (1, 'Ada', 'ada@example.com'), (2, 'Grace', NULL), (3, 'Linus', NULL)",
        "INSERT INTO qh_orders VALUES
            (10, 1, 'paid', '2024-03-01', 25.0),
            (11, 1, 'open', '2024-03-05', 10.0),
            (12, 1, 'paid', '2024-03-09', 5.5),
            (20, 2, 'paid', '2024-03-05', 40.0)",
    ] {
        sqlx::query(statement)
            .execute(pool)
            .await
            .expect("Failed to prepare tables");
    }
}

async fn drop_tables(pool: &PgPool) {
    let _ = sqlx::query("DROP TABLE IF EXISTS qh_orders CASCADE").execute(pool).await;
    let _ = sqlx::query("DROP TABLE IF EXISTS qh_customers CASCADE").execute(pool).await;
}

fn date(day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 3, day).unwrap()
}

#[tokio::test]
#[ignore = "requires DATABASE_URL"]
async fn test_health_check() {
    let queryhaus = setup().await;
    queryhaus.health_check().await.expect("health check failed");
}

#[tokio::test]
#[ignore = "requires DATABASE_URL"]
async fn test_queries_against_postgres() {
    let queryhaus = setup().await;
    create_tables(queryhaus.pool()).await;
    let executor = queryhaus.executor();

    // Joined graph, deduplicated per customer
    let customers = queryhaus
        .query::<Customer>()
        .left_join::<Order>(field::<Customer>("id"), field::<Order>("customer_id"))
        .unwrap()
        .order_by(field::<Customer>("id"), SortOrder::Asc)
        .unwrap()
        .to_list(executor)
        .await
        .unwrap();

    assert_eq!(customers.len(), 3);
    assert_eq!(customers[0].email.as_deref(), Some("ada@example.com"));
    assert_eq!(customers[0].orders.len(), 3);
    assert_eq!(customers[1].orders.len(), 1);
    assert!(customers[2].orders.is_empty());

    // Inclusive date range with bound parameters
    let in_range = queryhaus
        .query::<Order>()
        .filter(field::<Order>("placed_on").between(date(5), date(9)))
        .unwrap()
        .order_by(field::<Order>("id"), SortOrder::Asc)
        .unwrap()
        .to_list(executor)
        .await
        .unwrap();
    let ids: Vec<i64> = in_range.iter().map(|o| o.id).collect();
    assert_eq!(ids, vec![11, 12, 20]);

    let paid = queryhaus
        .query::<Order>()
        .filter(field::<Order>("status").eq("paid"))
        .unwrap()
        .count(executor)
        .await
        .unwrap();
    assert_eq!(paid, 3);

    let first = queryhaus
        .query::<Order>()
        .filter(field::<Order>("total").gt(30.0))
        .unwrap()
        .first(executor)
        .await
        .unwrap();
    assert_eq!(first.map(|o| o.id), Some(20));

    // Grouped query through the common table expression
    let groups = queryhaus
        .query::<Order>()
        .group_by([("status", field::<Order>("status"))])
        .unwrap()
        .aggregate("order_count", count())
        .unwrap()
        .to_groups(executor)
        .await
        .unwrap();

    let paid_key = GroupKey::new(vec![SqlValue::Text("paid".into()), SqlValue::Int(3)]);
    let open_key = GroupKey::new(vec![SqlValue::Text("open".into()), SqlValue::Int(1)]);
    assert_eq!(groups.len(), 2);
    assert_eq!(groups[&paid_key].len(), 3);
    assert_eq!(groups[&open_key][0].id, 11);

    drop_tables(queryhaus.pool()).await;
}
