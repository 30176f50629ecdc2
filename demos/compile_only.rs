//! Compile-only demo
//!
//! Builds a few queries over a small shop schema and prints the SQL and
//! parameters they compile to. No database connection is needed.

use queryhaus::prelude::*;

#[entity]
#[table(name = "customers")]
pub struct Customer {
    #[primary_key]
    pub id: i64,
    pub name: String,
    pub email: Option<String>,
    #[relation]
    pub orders: Vec<Order>,
}

#[entity]
#[table(name = "orders")]
pub struct Order {
    #[primary_key]
    pub id: i64,
    pub customer_id: i64,
    pub status: String,
    pub placed_on: NaiveDate,
    pub total: f64,
}

/// Projection target, never read from its own table
#[entity]
pub struct OrderSummary {
    pub order_id: i64,
    pub customer_name: String,
}

fn print_compiled(title: &str, compiled: &CompiledQuery) {
    println!("== {} ==", title);
    println!("{}", compiled.sql);
    for (name, value) in compiled.parameters.iter() {
        println!("  {} = {:?}", name, value);
    }
    println!();
}

fn release_date() -> SqlValue {
    SqlValue::Date(NaiveDate::from_ymd_opt(2024, 1, 1).unwrap_or_default())
}

fn main() -> Result<(), QueryError> {
    println!("🚀 QueryHaus compile-only demo\n");

    let recent_paid = Query::<Order>::new()
        .filter(
            field::<Order>("status")
                .eq("paid")
                .and(field::<Order>("placed_on").gte(static_value("release_date", release_date))),
        )?
        .order_by(field::<Order>("total"), SortOrder::Desc)?
        .limit(10)
        .compile()?;
    print_compiled("Recent paid orders", &recent_paid);

    let with_orders = Query::<Customer>::new()
        .left_join::<Order>(field::<Customer>("id"), field::<Order>("customer_id"))?
        .filter(field::<Customer>("email").like("%@example.com"))?
        .compile()?;
    print_compiled("Customers with their orders", &with_orders);

    let summaries = Query::<Order>::new()
        .inner_join::<Customer>(field::<Order>("customer_id"), field::<Customer>("id"))?
        .filter(field::<Order>("status").in_list(vec!["paid", "shipped"]))?
        .select::<OrderSummary>(construct::<OrderSummary>(vec![
            ("order_id", field::<Order>("id")),
            ("customer_name", field::<Customer>("name")),
        ]))?
        .compile()?;
    print_compiled("Order summaries", &summaries);

    let revenue_by_status = Query::<Order>::new()
        .filter(field::<Order>("total").gt(0.0))?
        .group_by([("status", field::<Order>("status"))])?
        .aggregate("order_count", count())?
        .aggregate("revenue", sum(field::<Order>("total")))?
        .having(sum(field::<Order>("total")).gt(100.0))?
        .compile()?;
    print_compiled("Revenue by status", &revenue_by_status);

    Ok(())
}
