#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use proptest::prelude::*;
    use rstest::rstest;

    use groq_expr::bridge::{groq_to_json, json_to_groq, parse_projection, render_projection};
    use groq_expr::format::{QueryFormatter, format_query};
    use groq_expr::includes::{expand_includes, split_path};
    use groq_expr::BridgeError;

    fn includes(pairs: &[(&str, &str)]) -> Vec<(String, String)> {
        pairs
            .iter()
            .map(|(path, fragment)| (path.to_string(), fragment.to_string()))
            .collect()
    }

    // ========================================================================
    // Projection <-> JSON
    // ========================================================================

    #[rstest]
    #[case::spread("{...}")]
    #[case::dereference("{...,author->{name}}")]
    #[case::switch("{...,author{...,_type=='reference'=>@->{...}}}")]
    #[case::array_filter("{...,images[defined(@)]{...,asset->{...}}}")]
    #[case::conditional(r#"{...,body[defined(@)]{...,(_type == "video")=>{url}}}"#)]
    #[case::aliased(r#"{"authorName": author->name,title}"#)]
    #[case::string_with_structure(r#"{"label": coalesce(title, "a,b{c}")}"#)]
    fn test_projection_round_trips(#[case] projection: &str) {
        let map = parse_projection(projection).unwrap();
        assert_eq!(render_projection(&map).unwrap(), projection);
    }

    #[test]
    fn test_json_form_is_valid_json() {
        let json = groq_to_json("{...,author->{name},tags[@ == \"a\"]}");
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value.as_object().map(|map| map.len()), Some(3));
    }

    #[test]
    fn test_unbalanced_projection_is_an_error() {
        assert!(matches!(
            parse_projection("{a{b}"),
            Err(BridgeError::Json(_))
        ));
    }

    fn field_name() -> impl Strategy<Value = String> {
        "[a-z][a-zA-Z0-9]{0,6}"
    }

    fn projection() -> impl Strategy<Value = String> {
        let leaf = field_name();
        leaf.prop_recursive(3, 24, 4, |inner| {
            (
                field_name(),
                any::<bool>(),
                prop::collection::vec(inner, 1..4),
            )
                .prop_map(|(name, spread, fields)| {
                    let mut entries = Vec::new();
                    if spread {
                        entries.push("...".to_string());
                    }
                    entries.extend(fields);
                    format!("{}{{{}}}", name, entries.join(","))
                })
        })
    }

    proptest! {
        #[test]
        fn prop_json_conversion_round_trips(
            fields in prop::collection::vec(projection(), 1..5)
        ) {
            let text = format!("{{{}}}", fields.join(","));
            prop_assert_eq!(json_to_groq(&groq_to_json(&text)), text);
        }
    }

    // ========================================================================
    // Include expansion
    // ========================================================================

    #[test]
    fn test_split_path_keeps_filters_whole() {
        assert_eq!(
            split_path(r#"author.books[_type == "novel"].cover"#),
            vec![
                "author".to_string(),
                r#"books[_type == "novel"]"#.to_string(),
                "cover".to_string(),
            ]
        );
    }

    #[test]
    fn test_include_order_does_not_matter() {
        let parent = ("author", "author{...,_type=='reference'=>@->{...}}");
        let child = ("author.company", "company{...,_type=='reference'=>@->{...}}");

        let forward = expand_includes("{...}", &includes(&[parent, child])).unwrap();
        let backward = expand_includes("{...}", &includes(&[child, parent])).unwrap();
        assert_eq!(forward, backward);
    }

    #[test]
    fn test_include_merges_into_existing_object() {
        let expanded = expand_includes(
            "{...,hero{...,title}}",
            &includes(&[("hero.image", "image{url}")]),
        )
        .unwrap();
        assert_eq!(expanded, "{...,hero{...,title,image{url}}}");
    }

    #[test]
    fn test_include_replaces_bare_field_position() {
        let expanded = expand_includes(
            "{title,author,slug}",
            &includes(&[("author", "author{...,_type=='reference'=>@->{name}}")]),
        )
        .unwrap();
        assert_eq!(
            expanded,
            "{title,author{...,_type=='reference'=>@->{name}},slug}"
        );
    }

    // ========================================================================
    // Formatting
    // ========================================================================

    #[test]
    fn test_format_plain_filter_is_unchanged() {
        assert_eq!(
            format_query(r#"*[_type == "post"][title == "x"]"#),
            r#"*[_type == "post"][title == "x"]"#
        );
    }

    #[test]
    fn test_format_keeps_pipes_and_slices_inline() {
        assert_eq!(
            format_query(r#"*[_type == "post"]{title} | order(title asc)[0..9]"#),
            "*[_type == \"post\"]{\n  title\n} | order(title asc)[0..9]"
        );
    }

    #[test]
    fn test_formatter_default_matches_function() {
        let query = "*{...,a{b,c}}";
        assert_eq!(QueryFormatter::default().format(query), format_query(query));
    }

    proptest! {
        #[test]
        fn prop_format_preserves_string_literals(literal in "[a-z ,{}()]{0,12}") {
            let query = format!(r#"*[title == "{}"]"#, literal);
            prop_assert_eq!(format_query(&query), query);
        }
    }

    #[test]
    fn test_format_braces_inside_strings() {
        assert_eq!(
            format_query(r#"*[title == "{x}"]{title}"#),
            "*[title == \"{x}\"]{\n  title\n}"
        );
    }
}
