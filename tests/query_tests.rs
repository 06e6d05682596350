mod common;

#[cfg(test)]
mod tests {
    use chrono::{NaiveDate, TimeZone, Utc};
    use pretty_assertions::assert_eq;
    use rstest::rstest;
    use uuid::Uuid;

    use groq_expr::ast::{Expr, HostCall, Method, MethodCall};
    use groq_expr::types::TypeShape;
    use groq_expr::{EvalError, Query, QueryError, QueryOptions, QueryParser, Value};

    use crate::common::{Content, Gallery, Post};

    fn groq(query: Query) -> String {
        query.to_groq().unwrap()
    }

    // ========================================================================
    // Filters
    // ========================================================================

    #[test]
    fn test_type_constraint_only() {
        assert_eq!(groq(Query::of::<Post>()), r#"*[_type == "post"]"#);
    }

    #[test]
    fn test_where_on_field() {
        let query = Query::of::<Post>().filter(|p| p.field("title").eq("Hello"));
        assert_eq!(groq(query), r#"*[_type == "post"][title == "Hello"]"#);
    }

    #[test]
    fn test_successive_filters_are_joined() {
        let query = Query::of::<Post>()
            .filter(|p| p.field("title").eq("a"))
            .filter(|p| p.field("views").gt(10));
        assert_eq!(groq(query), r#"*[_type == "post"][title == "a" && views > 10]"#);
    }

    #[test]
    fn test_or_filter_is_grouped_when_joined() {
        let query = Query::of::<Post>()
            .filter(|p| p.field("views").gt(10).or(p.field("views").lt(2)))
            .filter(|p| p.field("title").ne("x"));
        assert_eq!(
            groq(query),
            r#"*[_type == "post"][(views > 10 || views < 2) && title != "x"]"#
        );
    }

    #[test]
    fn test_base_type_has_no_type_constraint() {
        let query = Query::of::<Content>().filter(|c| c.field("title").eq("x"));
        assert_eq!(groq(query), r#"*[title == "x"]"#);
    }

    #[test]
    fn test_untyped_source() {
        let query = Query::untyped().filter(|d| d.field("title").eq("x"));
        assert_eq!(groq(query), r#"*[title == "x"]"#);
    }

    #[test]
    fn test_of_type_on_untyped_source() {
        let query = Query::untyped().of_type::<Post>();
        assert_eq!(groq(query), r#"*[_type == "post"]"#);
    }

    // ========================================================================
    // Operators
    // ========================================================================

    #[rstest]
    #[case::equal(|v: &Expr| v.eq(5), "views == 5")]
    #[case::not_equal(|v: &Expr| v.ne(5), "views != 5")]
    #[case::less(|v: &Expr| v.lt(5), "views < 5")]
    #[case::less_or_equal(|v: &Expr| v.le(5), "views <= 5")]
    #[case::greater(|v: &Expr| v.gt(5), "views > 5")]
    #[case::greater_or_equal(|v: &Expr| v.ge(5), "views >= 5")]
    #[case::modulo(|v: &Expr| v.modulo(2).eq(0), "views % 2 == 0")]
    #[case::grouped_sum(|v: &Expr| v.plus(1).times(2).ge(10), "(views + 1) * 2 >= 10")]
    #[case::right_grouped_difference(
        |v: &Expr| Expr::constant(10).minus(v.minus(2)).gt(0),
        "10 - (views - 2) > 0"
    )]
    #[case::left_difference(|v: &Expr| v.minus(2).minus(1).gt(0), "views - 2 - 1 > 0")]
    #[case::negate(|v: &Expr| v.negate().lt(0), "-views < 0")]
    #[case::coalesce(|v: &Expr| v.or_default(0).gt(1), "coalesce(views, 0) > 1")]
    #[case::not(|v: &Expr| v.gt(1).not(), "!(views > 1)")]
    #[case::and_with_or(
        |v: &Expr| v.gt(1).and(v.lt(10).or(v.eq(20))),
        "views > 1 && (views < 10 || views == 20)"
    )]
    #[case::folded_constant(|v: &Expr| v.gt(Expr::constant(2).times(5)), "views > 10")]
    fn test_operator_rendering(#[case] build: fn(&Expr) -> Expr, #[case] expected: &str) {
        let query = Query::of::<Post>().filter(|p| build(&p.field("views")));
        assert_eq!(groq(query), format!(r#"*[_type == "post"][{}]"#, expected));
    }

    #[test]
    fn test_null_comparison_covers_missing_field() {
        let query = Query::of::<Post>().filter(|p| p.field("published_at").is_null());
        assert_eq!(
            groq(query),
            r#"*[_type == "post"][(!(defined(publishedAt)) || publishedAt == null)]"#
        );
    }

    #[test]
    fn test_not_null_comparison_requires_defined() {
        let query = Query::of::<Post>().filter(|p| p.field("published_at").is_not_null());
        assert_eq!(
            groq(query),
            r#"*[_type == "post"][(defined(publishedAt) && publishedAt != null)]"#
        );
    }

    #[test]
    fn test_nullable_value_is_transparent() {
        let since = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        let query = Query::of::<Post>().filter(|p| p.field("published_at").value().ge(since));
        assert_eq!(groq(query), r#"*[_type == "post"][publishedAt >= "2024-01-01"]"#);
    }

    #[test]
    fn test_date_time_constant() {
        let at = Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap();
        let query = Query::of::<Post>().filter(|p| p.field("published_at").value().lt(at));
        assert_eq!(
            groq(query),
            r#"*[_type == "post"][publishedAt < "2024-05-01T12:00:00.0000000+00:00"]"#
        );
    }

    // ========================================================================
    // String and collection predicates
    // ========================================================================

    #[test]
    fn test_starts_with() {
        let query = Query::of::<Post>().filter(|p| p.field("title").starts_with("How"));
        assert_eq!(groq(query), r#"*[_type == "post"][title match "How*"]"#);
    }

    #[test]
    fn test_string_contains() {
        let query = Query::of::<Post>().filter(|p| p.field("title").contains("rust"));
        assert_eq!(groq(query), r#"*[_type == "post"]["rust" in title]"#);
    }

    #[test]
    fn test_collection_contains() {
        let query = Query::of::<Post>().filter(|p| p.field("tags").contains("news"));
        assert_eq!(groq(query), r#"*[_type == "post"]["news" in tags]"#);
    }

    #[test]
    fn test_member_in_captured_list() {
        let query = Query::of::<Post>().filter(|p| p.field("slug").is_in(vec!["a", "b"]));
        assert_eq!(groq(query), r#"*[_type == "post"][slug in ["a", "b"]]"#);
    }

    #[test]
    fn test_member_in_empty_list_is_false() {
        let query =
            Query::of::<Post>().filter(|p| p.field("slug").is_in(Vec::<String>::new()));
        assert_eq!(groq(query), r#"*[_type == "post"][false]"#);
    }

    #[test]
    fn test_any_over_captured_list() {
        let query = Query::of::<Post>().filter(|p| {
            Expr::constant(vec!["x", "y"]).any_where(|id| id.eq(p.field("slug")))
        });
        assert_eq!(groq(query), r#"*[_type == "post"][slug in ["x", "y"]]"#);
    }

    #[test]
    fn test_nested_where_and_count() {
        let query = Query::of::<Post>()
            .filter(|p| p.field("tags").filter(|t| t.eq("news")).count().gt(1));
        assert_eq!(
            groq(query),
            r#"*[_type == "post"][count(tags[@ == "news"]) > 1]"#
        );
    }

    #[test]
    fn test_nested_any_over_references() {
        let query = Query::of::<Post>().filter(|p| {
            p.field("categories")
                .any_where(|c| c.value().field("title").eq("Rust"))
        });
        assert_eq!(
            groq(query),
            r#"*[_type == "post"][count(categories[@->title == "Rust"]) > 0]"#
        );
    }

    #[test]
    fn test_length_of_string_and_collection() {
        let query = Query::of::<Post>()
            .filter(|p| p.field("title").length().gt(10))
            .filter(|p| p.field("tags").length().gt(2));
        assert_eq!(
            groq(query),
            r#"*[_type == "post"][length(title) > 10 && count(tags) > 2]"#
        );
    }

    #[test]
    fn test_nested_max() {
        let query = Query::of::<Post>().filter(|p| p.field("scores").max_by(|s| s).gt(3));
        assert_eq!(groq(query), r#"*[_type == "post"][math::max(scores) > 3]"#);
    }

    #[test]
    fn test_is_null_or_empty() {
        let query = Query::of::<Post>().filter(|p| p.field("slug").is_null_or_empty());
        assert_eq!(
            groq(query),
            r#"*[_type == "post"][(slug == null || slug == "" || !(defined(slug)))]"#
        );
    }

    #[test]
    fn test_is_defined() {
        let query = Query::of::<Post>().filter(|p| p.field("slug").is_defined());
        assert_eq!(groq(query), r#"*[_type == "post"][defined(slug)]"#);
    }

    // ========================================================================
    // Document system fields
    // ========================================================================

    #[test]
    fn test_exclude_drafts() {
        let query = Query::of::<Post>().filter(|p| p.is_draft().not());
        assert_eq!(
            groq(query),
            r#"*[_type == "post"][!(_id in path("drafts.**"))]"#
        );
    }

    #[test]
    fn test_document_id_with_guid() {
        let query = Query::of::<Post>().filter(|p| p.document_id().eq(Uuid::nil()));
        assert_eq!(
            groq(query),
            r#"*[_type == "post"][_id == "00000000-0000-0000-0000-000000000000"]"#
        );
    }

    #[test]
    fn test_order_by_system_field() {
        let query = Query::of::<Post>().order_by_descending(|p| p.updated_at());
        assert_eq!(groq(query), r#"*[_type == "post"] | order(_updatedAt desc)"#);
    }

    // ========================================================================
    // References
    // ========================================================================

    #[test]
    fn test_dereferenced_field() {
        let query =
            Query::of::<Post>().filter(|p| p.field("author").value().field("name").eq("Ada"));
        assert_eq!(groq(query), r#"*[_type == "post"][author->name == "Ada"]"#);
    }

    #[test]
    fn test_coalesce_fallback_for_dereferenced_field() {
        let query = Query::of::<Post>()
            .with_options(QueryOptions::new().use_coalesce_fallback(true))
            .filter(|p| p.field("author").value().field("name").eq("Ada"));
        assert_eq!(
            groq(query),
            r#"*[_type == "post"][coalesce(author->name, author.name) == "Ada"]"#
        );
    }

    #[test]
    fn test_referenced_id_reads_the_reference() {
        let query =
            Query::of::<Post>().filter(|p| p.field("author").value().field("id").eq("p1"));
        assert_eq!(
            groq(query),
            r#"*[_type == "post"][coalesce(author._ref, author._key) == "p1"]"#
        );
    }

    // ========================================================================
    // Ordering and paging
    // ========================================================================

    #[test]
    fn test_order_then_by() {
        let query = Query::of::<Post>()
            .order_by(|p| p.field("title"))
            .then_by_descending(|p| p.field("views"));
        assert_eq!(
            groq(query),
            r#"*[_type == "post"] | order(title asc, views desc)"#
        );
    }

    #[test]
    fn test_order_by_restarts_ordering() {
        let query = Query::of::<Post>()
            .order_by(|p| p.field("title"))
            .order_by(|p| p.field("views"));
        assert_eq!(groq(query), r#"*[_type == "post"] | order(views asc)"#);
    }

    #[rstest]
    #[case::take(Query::of::<Post>().take(5), r#"*[_type == "post"][0..4]"#)]
    #[case::take_one(Query::of::<Post>().take(1), r#"*[_type == "post"][0]"#)]
    #[case::skip(Query::of::<Post>().skip(3), r#"*[_type == "post"][3..2147483647]"#)]
    #[case::skip_take(Query::of::<Post>().skip(10).take(5), r#"*[_type == "post"][10..14]"#)]
    #[case::take_skip(Query::of::<Post>().take(5).skip(2), r#"*[_type == "post"][2..4]"#)]
    #[case::take_take(Query::of::<Post>().take(5).take(10), r#"*[_type == "post"][0..4]"#)]
    #[case::skip_exhausts_take(Query::of::<Post>().take(5).skip(5), r#"*[_type == "post"][5...5]"#)]
    #[case::skip_past_take(Query::of::<Post>().take(2).skip(7), r#"*[_type == "post"][7...7]"#)]
    #[case::take_zero(Query::of::<Post>().take(0), r#"*[_type == "post"][0...0]"#)]
    fn test_paging(#[case] query: Query, #[case] expected: &str) {
        assert_eq!(groq(query), expected);
    }

    #[test]
    fn test_order_then_page() {
        let query = Query::of::<Post>().order_by(|p| p.field("title")).take(10);
        assert_eq!(groq(query), r#"*[_type == "post"] | order(title asc)[0..9]"#);
    }

    // ========================================================================
    // Aggregates and single results
    // ========================================================================

    #[test]
    fn test_count() {
        let query = Query::of::<Post>().filter(|p| p.field("title").eq("Hello")).count();
        assert_eq!(groq(query), r#"count(*[_type == "post"][title == "Hello"])"#);
    }

    #[test]
    fn test_count_with_predicate() {
        let query = Query::of::<Post>().count_where(|p| p.field("views").gt(100));
        assert_eq!(groq(query), r#"count(*[_type == "post"][views > 100])"#);
    }

    #[test]
    fn test_count_skips_projection() {
        assert_eq!(
            groq(Query::of::<Gallery>().long_count()),
            r#"count(*[_type == "gallery"])"#
        );
    }

    #[test]
    fn test_any() {
        assert_eq!(
            groq(Query::of::<Post>().any()),
            r#"count(*[_type == "post"]) > 0"#
        );
    }

    #[test]
    fn test_any_with_predicate() {
        let query = Query::of::<Post>().any_where(|p| p.field("tags").contains("news"));
        assert_eq!(
            groq(query),
            r#"count(*[_type == "post"]["news" in tags]) > 0"#
        );
    }

    #[test]
    fn test_first_with_predicate() {
        let query = Query::of::<Post>().first_where(|p| p.field("slug").eq("hello"));
        assert_eq!(groq(query), r#"*[_type == "post"][slug == "hello"][0]"#);
    }

    #[test]
    fn test_max_and_min() {
        let max = Query::of::<Post>().max(|p| p.field("views"));
        assert_eq!(groq(max), r#"*[_type == "post"].views | order(@ desc)[0]"#);

        let min = Query::of::<Post>().min(|p| p.field("views"));
        assert_eq!(groq(min), r#"*[_type == "post"].views | order(@ asc)[0]"#);
    }

    #[test]
    fn test_max_replaces_earlier_count() {
        let query = Query::of::<Post>().count().max(|p| p.field("views"));
        assert_eq!(groq(query), r#"*[_type == "post"].views | order(@ desc)[0]"#);
    }

    #[test]
    fn test_result_shape_flags() {
        let compiled = Query::of::<Post>().compile().unwrap();
        assert!(compiled.expects_array);

        let compiled = Query::of::<Post>().count().compile().unwrap();
        assert!(!compiled.expects_array);

        let compiled = Query::of::<Post>().single_or_default().compile().unwrap();
        assert!(!compiled.expects_array);
        assert_eq!(compiled.groq, r#"*[_type == "post"][0]"#);
    }

    // ========================================================================
    // Partial evaluation
    // ========================================================================

    #[test]
    fn test_host_call_is_folded() {
        let query = Query::of::<Post>().filter(|p| {
            let slug = HostCall::new("slugify", vec![Expr::constant("Hello World")], |args| {
                Ok(Value::from(args[0].as_string().to_lowercase().replace(' ', "-")))
            });
            p.field("slug").eq(Expr::Invoke(slug))
        });
        assert_eq!(groq(query), r#"*[_type == "post"][slug == "hello-world"]"#);
    }

    #[test]
    fn test_failed_fold_is_reported() {
        let compiled = Query::of::<Post>()
            .filter(|p| p.field("views").gt(Expr::constant(10).divided_by(0)))
            .compile()
            .unwrap();
        assert_eq!(compiled.groq, r#"*[_type == "post"][views > 10 / 0]"#);
        assert_eq!(compiled.diagnostics.partial_eval_fallbacks.len(), 1);
        assert_eq!(
            compiled.diagnostics.partial_eval_fallbacks[0].error,
            EvalError::DivisionByZero
        );
        assert!(compiled.diagnostics.include_expansion_failures.is_empty());
    }

    #[test]
    fn test_overflowing_fold_is_reported() {
        let compiled = Query::of::<Post>()
            .filter(|p| p.field("views").gt(Expr::constant(i64::MIN).divided_by(-1)))
            .compile()
            .unwrap();
        assert_eq!(compiled.diagnostics.partial_eval_fallbacks.len(), 1);
        assert!(matches!(
            compiled.diagnostics.partial_eval_fallbacks[0].error,
            EvalError::TypeError(_)
        ));
    }

    #[test]
    fn test_integer_division_folds_truncated() {
        let query = Query::of::<Post>()
            .filter(|p| p.field("views").gt(Expr::constant(7).divided_by(2)));
        assert_eq!(groq(query), r#"*[_type == "post"][views > 3]"#);
    }

    #[test]
    fn test_clean_build_has_no_diagnostics() {
        let compiled = Query::of::<Post>()
            .filter(|p| p.field("views").gt(1))
            .compile()
            .unwrap();
        assert!(compiled.diagnostics.is_clean());
    }

    // ========================================================================
    // Errors
    // ========================================================================

    #[test]
    fn test_unknown_method_is_rejected() {
        let call = MethodCall {
            method: "Frobnicate".to_string(),
            object: None,
            args: vec![Expr::Source(None)],
            type_arg: None,
        };
        let result = QueryParser::new(Expr::Call(call), None, QueryOptions::default())
            .build_query(true);
        assert!(matches!(result, Err(QueryError::UnsupportedMethod(name)) if name == "Frobnicate"));
    }

    #[test]
    fn test_host_call_on_item_is_unsupported() {
        let query = Query::of::<Post>().filter(|p| {
            let upper = HostCall::new("upper", vec![p.field("title")], |args| {
                Ok(Value::from(args[0].as_string().to_uppercase()))
            });
            Expr::Invoke(upper).eq("HELLO")
        });
        assert!(matches!(
            query.to_groq(),
            Err(QueryError::UnsupportedExpression(_))
        ));
    }

    #[test]
    fn test_predicate_method_in_chain_is_malformed() {
        let expr = Expr::Call(MethodCall::new(
            Method::IsDefined,
            vec![Expr::Source(None)],
        ));
        let result = QueryParser::new(expr, None, QueryOptions::default()).build_query(true);
        assert!(matches!(result, Err(QueryError::MalformedCall { .. })));
    }

    #[test]
    fn test_nested_include_is_malformed() {
        let query = Query::of::<Post>().filter(|p| {
            let include = MethodCall::new(
                Method::Include,
                vec![p.field("tags"), groq_expr::query::lambda(TypeShape::string(), |t| t)],
            );
            Expr::Call(include).count().gt(0)
        });
        assert!(matches!(
            query.to_groq(),
            Err(QueryError::MalformedCall { .. })
        ));
    }

    #[test]
    fn test_object_constant_has_no_literal() {
        let query = Query::of::<Post>()
            .filter(|p| p.field("slug").eq(Value::Object(Default::default())));
        assert!(matches!(
            query.to_groq(),
            Err(QueryError::UnsupportedExpression(_))
        ));
    }
}
