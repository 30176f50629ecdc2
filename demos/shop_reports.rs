//! Shop reports demo
//!
//! Connects with the configuration from `queryhaus.toml` (or the file named
//! by `QUERYHAUS_CONFIG`), creates a tiny shop schema and runs a few
//! reports: a customer/order graph, a date-range filter, a projection and a
//! grouped revenue breakdown.

use queryhaus::prelude::*;

#[entity]
#[table(name = "demo_customers")]
pub struct Customer {
    #[primary_key]
    pub id: i64,
    pub name: String,
    pub email: Option<String>,
    #[relation]
    pub orders: Vec<Order>,
}

#[entity]
#[table(name = "demo_orders")]
pub struct Order {
    #[primary_key]
    pub id: i64,
    pub customer_id: i64,
    pub status: String,
    pub placed_on: NaiveDate,
    pub total: f64,
}

#[entity]
pub struct OrderSummary {
    pub order_id: i64,
    pub customer_name: String,
    pub total: f64,
}

async fn seed(pool: &PgPool) -> anyhow::Result<()> {
    for statement in [
        "DROP TABLE IF EXISTS demo_orders",
        "DROP TABLE IF EXISTS demo_customers",
        "CREATE TABLE demo_customers (id BIGINT PRIMARY KEY, name TEXT NOT NULL, email TEXT)",
        "CREATE TABLE demo_orders (
            id BIGINT PRIMARY KEY,
            customer_id BIGINT NOT NULL REFERENCES demo_customers(id),
            status TEXT NOT NULL,
            placed_on DATE NOT NULL,
            total DOUBLE PRECISION NOT NULL
        )",
        "INSERT INTO demo_customers VALUES (1, 'Ada', 'ada@example.com'), (2, 'Grace', NULL)",
        "INSERT INTO demo_orders VALUES
            (10, 1, 'paid', '2024-03-01', 120.0),
            (11, 1, 'open', '2024-03-04', 35.5),
            (12, 2, 'paid', '2024-03-07', 80.0),
            (13, 2, 'shipped', '2024-03-12', 42.0)",
    ] {
        sqlx::query(statement).execute(pool).await?;
    }
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    println!("🚀 QueryHaus shop reports\n");

    let config = AppConfig::load()?;
    let queryhaus = QueryHaus::from_app_config(&config).await?;
    queryhaus.health_check().await?;
    println!("✅ Connected to {}\n", config.database.database);

    seed(queryhaus.pool()).await?;
    let executor = queryhaus.executor();

    println!("📦 Customers and their orders");
    let customers = queryhaus
        .query::<Customer>()
        .left_join::<Order>(field::<Customer>("id"), field::<Order>("customer_id"))?
        .order_by(field::<Customer>("name"), SortOrder::Asc)?
        .to_list(executor)
        .await?;
    for customer in &customers {
        println!("  {} ({} orders)", customer.name, customer.orders.len());
        for order in &customer.orders {
            println!("    #{} {} {:.2}", order.id, order.status, order.total);
        }
    }

    println!("\n📅 Orders placed 2024-03-02 ..= 2024-03-10");
    let first_week = NaiveDate::from_ymd_opt(2024, 3, 2).unwrap_or_default();
    let second_week = NaiveDate::from_ymd_opt(2024, 3, 10).unwrap_or_default();
    let in_range = queryhaus
        .query::<Order>()
        .filter(field::<Order>("placed_on").between(first_week, second_week))?
        .to_list(executor)
        .await?;
    for order in &in_range {
        println!("  #{} on {}", order.id, order.placed_on);
    }

    println!("\n🧾 Order summaries");
    let summaries = queryhaus
        .query::<Order>()
        .inner_join::<Customer>(field::<Order>("customer_id"), field::<Customer>("id"))?
        .filter(field::<Order>("status").ne("open"))?
        .select::<OrderSummary>(construct::<OrderSummary>(vec![
            ("order_id", field::<Order>("id")),
            ("customer_name", field::<Customer>("name")),
            ("total", field::<Order>("total")),
        ]))?
        .to_list(executor)
        .await?;
    for summary in &summaries {
        println!("  #{} {} {:.2}", summary.order_id, summary.customer_name, summary.total);
    }

    println!("\n📊 Revenue by status");
    let groups = queryhaus
        .query::<Order>()
        .group_by([("status", field::<Order>("status"))])?
        .aggregate("revenue", sum(field::<Order>("total")))?
        .to_group_list(executor)
        .await?;
    for (key, orders) in &groups {
        println!("  {:?}: {} orders", key.values(), orders.len());
    }

    let paid = queryhaus
        .query::<Order>()
        .filter(field::<Order>("status").eq("paid"))?
        .count(executor)
        .await?;
    println!("\n💰 {} paid orders", paid);

    Ok(())
}
