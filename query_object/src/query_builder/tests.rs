//! Translator and SQL assembly tests

#[cfg(test)]
mod tests {
    use crate::alias::AliasRegistry;
    use crate::ast::*;
    use crate::errors::QueryError;
    use crate::query_builder::{ClauseKind, ClauseTranslator, JoinType, Query, SortOrder};
    use crate::row::ParameterBag;
    use crate::traits::entity::fixtures::*;
    use config::QueryConfig;
    use type_mapping::SqlValue;

    const ORDER_COLUMNS: &str = "Extend0.id AS Extend0_id, Extend0.customer_id AS Extend0_customer_id, \
Extend0.status AS Extend0_status, Extend0.total AS Extend0_total";

    /// Translate `expr` for `clause` against a fresh registry rooted at Order
    fn translate(expr: &Expr, clause: ClauseKind) -> Result<(String, ParameterBag), QueryError> {
        let config = QueryConfig::default();
        let mut aliases = AliasRegistry::rooted("Extend", &ORDER);
        let mut parameters = ParameterBag::new("@p");
        let sql = ClauseTranslator::new(&mut aliases, &mut parameters, &config, false).translate(expr, clause)?;
        Ok((sql, parameters))
    }

    fn assert_unsupported(result: Result<(String, ParameterBag), QueryError>) {
        match result {
            Err(QueryError::UnsupportedConstruct { .. }) => {}
            other => panic!("Expected UnsupportedConstruct, got {:?}", other),
        }
    }

    // ========================================
    // Predicates
    // ========================================

    #[test]
    fn test_literal_becomes_single_parameter() {
        let (sql, parameters) = translate(&field::<Order>("status").eq("paid"), ClauseKind::Where).unwrap();

        assert_eq!(sql, "Extend0.status = @p0");
        assert_eq!(parameters.len(), 1);
        assert_eq!(parameters.get("@p0"), Some(&SqlValue::Text("paid".into())));
    }

    #[test]
    fn test_injection_attempt_stays_in_parameter() {
        let payload = "'; DROP TABLE orders; --";
        let (sql, parameters) = translate(&field::<Order>("status").eq(payload), ClauseKind::Where).unwrap();

        assert!(!sql.contains("DROP"));
        assert_eq!(parameters.get("@p0"), Some(&SqlValue::Text(payload.into())));
    }

    #[test]
    fn test_logical_operands_are_parenthesized() {
        let a = || field::<Order>("id").eq(1i64);
        let b = || field::<Order>("customer_id").eq(2i64);
        let c = || field::<Order>("total").eq(3i64);

        let (grouped_or, _) = translate(&a().and(b().or(c())), ClauseKind::Where).unwrap();
        assert_eq!(
            grouped_or,
            "(Extend0.id = @p0) AND ((Extend0.customer_id = @p1) OR (Extend0.total = @p2))"
        );

        let (grouped_and, _) = translate(&a().and(b()).or(c()), ClauseKind::Where).unwrap();
        assert_eq!(
            grouped_and,
            "((Extend0.id = @p0) AND (Extend0.customer_id = @p1)) OR (Extend0.total = @p2)"
        );
        assert_ne!(grouped_or, grouped_and);
    }

    #[test]
    fn test_null_comparisons_use_is_null() {
        let (sql, parameters) = translate(&field::<Order>("status").eq(SqlValue::Null), ClauseKind::Where).unwrap();
        assert_eq!(sql, "Extend0.status IS NULL");
        assert!(parameters.is_empty());

        let (sql, _) = translate(&field::<Order>("status").ne(None::<String>), ClauseKind::Where).unwrap();
        assert_eq!(sql, "Extend0.status IS NOT NULL");
    }

    #[test]
    fn test_null_operands_render_as_keyword() {
        let (sql, parameters) = translate(&field::<Order>("total").gt(SqlValue::Null), ClauseKind::Where).unwrap();
        assert_eq!(sql, "Extend0.total > NULL");
        assert!(parameters.is_empty());

        let (sql, parameters) =
            translate(&field::<Order>("total").between(SqlValue::Null, 10i64), ClauseKind::Where).unwrap();
        assert_eq!(sql, "(Extend0.total BETWEEN NULL AND @p0)");
        assert_eq!(parameters.len(), 1);

        let (sql, parameters) =
            translate(&field::<Order>("id").in_list(vec![Some(1i64), None]), ClauseKind::Where).unwrap();
        assert_eq!(sql, "(Extend0.id IN (@p0, NULL))");
        assert_eq!(parameters.len(), 1);

        let folded = field::<Order>("total").lt(static_value("no_limit", || SqlValue::Null));
        let (sql, parameters) = translate(&folded, ClauseKind::Where).unwrap();
        assert_eq!(sql, "Extend0.total < NULL");
        assert!(parameters.is_empty());
    }

    #[test]
    fn test_arithmetic_and_bitwise_operators() {
        let (sql, parameters) = translate(&(field::<Order>("id") & 1i64).eq(1i64), ClauseKind::Where).unwrap();
        assert_eq!(sql, "(Extend0.id & @p0) = @p1");
        assert_eq!(parameters.len(), 2);

        let (sql, _) = translate(&(field::<Order>("total") * field::<Order>("id")).gte(100i64), ClauseKind::Where).unwrap();
        assert_eq!(sql, "(Extend0.total * Extend0.id) >= @p0");
    }

    #[test]
    fn test_foldable_subtree_binds_one_parameter() {
        let expr = field::<Order>("total").gt(static_value("min_total", || SqlValue::Int(100)) * 2i64);
        let (sql, parameters) = translate(&expr, ClauseKind::Where).unwrap();

        assert_eq!(sql, "Extend0.total > @p0");
        assert_eq!(parameters.len(), 1);
        assert_eq!(parameters.get("@p0"), Some(&SqlValue::Int(200)));
    }

    #[test]
    fn test_constant_member_access_is_folded() {
        let settings = lit(serde_json::json!({ "status": "paid" }));
        let (sql, parameters) = translate(&field::<Order>("status").eq(settings.member("status")), ClauseKind::Where).unwrap();

        assert_eq!(sql, "Extend0.status = @p0");
        assert_eq!(parameters.get("@p0"), Some(&SqlValue::Text("paid".into())));
    }

    // ========================================
    // Reserved helpers
    // ========================================

    #[test]
    fn test_range_and_membership_helpers() {
        let (sql, parameters) = translate(&field::<Order>("total").between(10i64, 20i64), ClauseKind::Where).unwrap();
        assert_eq!(sql, "(Extend0.total BETWEEN @p0 AND @p1)");
        assert_eq!(parameters.len(), 2);

        let (sql, parameters) = translate(&field::<Order>("id").in_list(vec![1i64, 2, 3]), ClauseKind::Where).unwrap();
        assert_eq!(sql, "(Extend0.id IN (@p0, @p1, @p2))");
        assert_eq!(parameters.len(), 3);

        let (sql, _) = translate(&field::<Order>("status").not_in(vec!["void"]), ClauseKind::Where).unwrap();
        assert_eq!(sql, "(Extend0.status NOT IN (@p0))");

        let (sql, _) = translate(&field::<Order>("status").like("pa%"), ClauseKind::Where).unwrap();
        assert_eq!(sql, "(Extend0.status LIKE @p0)");
    }

    #[test]
    fn test_empty_sets() {
        let (sql, parameters) = translate(&field::<Order>("id").in_list(Vec::<i64>::new()), ClauseKind::Where).unwrap();
        assert_eq!(sql, "1=0");
        assert!(parameters.is_empty());

        let (sql, parameters) = translate(&field::<Order>("id").not_in(Vec::<i64>::new()), ClauseKind::Where).unwrap();
        assert_eq!(sql, "1=1");
        assert!(parameters.is_empty());
    }

    #[test]
    fn test_helpers_outside_predicates_are_diagnosed() {
        let helper = field::<Order>("total").between(1i64, 2i64);
        assert_unsupported(translate(&helper, ClauseKind::OrderBy));
        assert_unsupported(translate(&helper, ClauseKind::GroupBy));
    }

    #[test]
    fn test_helper_arity_is_checked() {
        let malformed = Expr::Call {
            function: Function::Between,
            args: vec![field::<Order>("total"), lit(1i64)],
        };
        assert_unsupported(translate(&malformed, ClauseKind::Where));
    }

    #[test]
    fn test_set_must_be_constant() {
        let expr = field::<Order>("id").in_list(field::<Order>("customer_id"));
        assert_unsupported(translate(&expr, ClauseKind::Where));
    }

    // ========================================
    // Closed grammar
    // ========================================

    #[test]
    fn test_unknown_calls_and_shapes_are_rejected() {
        assert_unsupported(translate(&call("lower", vec![field::<Order>("status")]), ClauseKind::Where));
        assert_unsupported(translate(&param::<Order>(), ClauseKind::Where));
        assert_unsupported(translate(&lit(vec![1i64, 2]), ClauseKind::Where));
        assert_unsupported(translate(&count().gt(1i64), ClauseKind::Where));
    }

    #[test]
    fn test_unknown_field_is_reported() {
        match translate(&field::<Order>("missing").eq(1i64), ClauseKind::Where) {
            Err(QueryError::UnknownField { entity, field }) => {
                assert_eq!(entity, "Order");
                assert_eq!(field, "missing");
            }
            other => panic!("Expected UnknownField, got {:?}", other),
        }
    }

    #[test]
    fn test_aggregates_render_against_grouped_columns() {
        let (sql, _) = translate(&count(), ClauseKind::SelectAggregate).unwrap();
        assert_eq!(sql, "COUNT(*)");

        let (sql, _) = translate(&sum(field::<Order>("total")), ClauseKind::SelectAggregate).unwrap();
        assert_eq!(sql, "SUM(CTE.Extend0_total)");

        let (sql, _) = translate(&count_distinct(field::<Order>("customer_id")).gt(2i64), ClauseKind::Having).unwrap();
        assert_eq!(sql, "COUNT(DISTINCT CTE.Extend0_customer_id) > @p0");
    }

    #[test]
    fn test_construct_binds_source_columns() {
        let projection = construct::<OrderSummary>(vec![
            ("order_id", field::<Order>("id")),
            ("customer_name", field::<Customer>("name")),
        ]);
        let (sql, parameters) = translate(&projection, ClauseKind::Select).unwrap();

        assert_eq!(
            sql,
            "Extend0.id AS Extend1_order_id, Extend2.name AS Extend1_customer_name"
        );
        assert!(parameters.is_empty());
    }

    #[test]
    fn test_construct_rejects_computed_bindings() {
        let projection = construct::<OrderSummary>(vec![("order_id", field::<Order>("id") + 1i64)]);
        assert_unsupported(translate(&projection, ClauseKind::Select));
        assert_unsupported(translate(
            &construct::<OrderSummary>(vec![("order_id", field::<Order>("id"))]),
            ClauseKind::Where,
        ));
    }

    // ========================================
    // Assembly
    // ========================================

    #[test]
    fn test_flat_query_sql() {
        let compiled = Query::<Order>::new()
            .filter(field::<Order>("status").eq("paid"))
            .unwrap()
            .filter(field::<Order>("total").gt(10i64))
            .unwrap()
            .order_by(field::<Order>("total"), SortOrder::Desc)
            .unwrap()
            .limit(20)
            .offset(40)
            .compile()
            .unwrap();

        let expected = format!(
            "SELECT {}\nFROM orders Extend0\nWHERE (Extend0.status = @p0) AND (Extend0.total > @p1)\nORDER BY Extend0.total DESC\nLIMIT 20\nOFFSET 40",
            ORDER_COLUMNS
        );
        assert_eq!(compiled.sql, expected);
        assert_eq!(compiled.parameters.len(), 2);
    }

    #[test]
    fn test_join_sql() {
        let compiled = Query::<Customer>::new()
            .join::<Order>(JoinType::Left, field::<Customer>("id"), field::<Order>("customer_id"))
            .unwrap()
            .compile()
            .unwrap();

        assert_eq!(
            compiled.sql,
            "SELECT Extend0.id AS Extend0_id, Extend0.name AS Extend0_name, \
Extend1.id AS Extend1_id, Extend1.customer_id AS Extend1_customer_id, \
Extend1.status AS Extend1_status, Extend1.total AS Extend1_total\n\
FROM customers Extend0\n\
LEFT JOIN orders Extend1 ON Extend0.id = Extend1.customer_id"
        );
        assert!(compiled.parameters.is_empty());
    }

    #[test]
    fn test_grouped_query_uses_cte_rewrite() {
        let compiled = Query::<Order>::new()
            .filter(field::<Order>("total").gt(0i64))
            .unwrap()
            .group_by([("status", field::<Order>("status"))])
            .unwrap()
            .aggregate("order_count", count())
            .unwrap()
            .having(count().gt(1i64))
            .unwrap()
            .order_by(field::<Order>("status"), SortOrder::Asc)
            .unwrap()
            .limit(10)
            .compile()
            .unwrap();

        let expected = format!(
            "WITH CommonTableExpression AS (\nSELECT {}\nFROM orders Extend0\nWHERE Extend0.total > @p0\n)\n\
SELECT GP.*, CTE.*\n\
FROM CommonTableExpression CTE\n\
INNER JOIN (SELECT CTE.Extend0_status AS status, COUNT(*) AS order_count FROM CommonTableExpression CTE \
GROUP BY CTE.Extend0_status HAVING COUNT(*) > @p1) GP ON CTE.Extend0_status = GP.status\n\
ORDER BY CTE.Extend0_status ASC\n\
LIMIT 10",
            ORDER_COLUMNS
        );
        assert_eq!(compiled.sql, expected);

        let values: Vec<&SqlValue> = compiled.parameters.values().collect();
        assert_eq!(values, vec![&SqlValue::Int(0), &SqlValue::Int(1)]);
        assert_eq!(compiled.shape.grouping_keys.len(), 1);
        assert_eq!(compiled.shape.aggregation_keys[0].name, "order_count");
    }

    #[test]
    fn test_configured_names_are_used() {
        let config = QueryConfig {
            alias_prefix: "T".to_string(),
            parameter_prefix: ":p".to_string(),
            ..QueryConfig::default()
        };
        let compiled = Query::<Order>::with_config(config)
            .filter(field::<Order>("status").eq("paid"))
            .unwrap()
            .compile()
            .unwrap();

        assert!(compiled.sql.contains("FROM orders T0"));
        assert!(compiled.sql.ends_with("WHERE T0.status = :p0"));
        assert_eq!(compiled.parameters.get(":p0"), Some(&SqlValue::Text("paid".into())));
    }

    #[test]
    fn test_parameter_count_matches_placeholders() {
        let compiled = Query::<Order>::new()
            .filter(field::<Order>("id").in_list(vec![1i64, 2, 3]).or(field::<Order>("status").like("x%")))
            .unwrap()
            .compile()
            .unwrap();

        assert_eq!(compiled.sql.matches("@p").count(), compiled.parameters.len());
        for (name, _) in compiled.parameters.iter() {
            assert!(compiled.sql.contains(name));
        }
    }
}
