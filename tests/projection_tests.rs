mod common;

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use rstest::rstest;

    use groq_expr::ast::Expr;
    use groq_expr::types::TypeShape;
    use groq_expr::{Query, QueryOptions};

    use crate::common::{Content, GALLERY_PROJECTION, Gallery, Person, Post, Video};

    fn groq(query: Query) -> String {
        query.to_groq().unwrap()
    }

    // ========================================================================
    // Automatic projections
    // ========================================================================

    #[test]
    fn test_flat_document_needs_no_projection() {
        assert_eq!(groq(Query::of::<Person>()), r#"*[_type == "person"]"#);
    }

    #[test]
    fn test_image_members_dereference_their_asset() {
        assert_eq!(
            groq(Query::of::<Gallery>()),
            format!(r#"*[_type == "gallery"]{}"#, GALLERY_PROJECTION)
        );
    }

    #[rstest]
    #[case::of_type(Query::untyped().of_type::<Gallery>(), r#"*[_type == "gallery"]"#)]
    #[case::cast(Query::of::<Content>().cast::<Gallery>(), "*")]
    #[case::returning(
        Query::of::<Post>().returning(TypeShape::object::<Gallery>()),
        r#"*[_type == "post"]"#
    )]
    fn test_projection_follows_result_type(#[case] query: Query, #[case] prefix: &str) {
        assert_eq!(groq(query), format!("{}{}", prefix, GALLERY_PROJECTION));
    }

    #[test]
    fn test_projections_can_be_disabled() {
        let query = Query::of::<Gallery>()
            .with_options(QueryOptions::new().include_projections(false));
        assert_eq!(groq(query), r#"*[_type == "gallery"]"#);
    }

    #[test]
    fn test_zero_nesting_leaves_only_the_spread() {
        let query =
            Query::of::<Gallery>().with_options(QueryOptions::new().max_nesting_level(0));
        assert_eq!(groq(query), r#"*[_type == "gallery"]"#);
    }

    #[test]
    fn test_first_keeps_projection_before_slice() {
        assert_eq!(
            groq(Query::of::<Gallery>().first()),
            format!(r#"*[_type == "gallery"]{}[0]"#, GALLERY_PROJECTION)
        );
    }

    #[test]
    fn test_pretty_output() {
        let query = Query::of::<Gallery>().with_options(QueryOptions::new().pretty(true));
        let expected = r#"*[_type == "gallery"]{
  ...,
  cover{
    ...,
    asset->{ ... }
  },
  images[defined(@)]{
    ...,
    asset->{ ... }
  }
}"#;
        assert_eq!(groq(query), expected);
    }

    // ========================================================================
    // Select
    // ========================================================================

    #[test]
    fn test_select_member_flattens() {
        let compiled = Query::of::<Post>().select(|p| p.field("title")).compile().unwrap();
        assert_eq!(compiled.groq, r#"*[_type == "post"].title"#);
        assert_eq!(compiled.result_type, Some(TypeShape::string()));
    }

    #[test]
    fn test_select_many_traverses() {
        let query = Query::of::<Post>().select_many(|p| p.field("tags"));
        assert_eq!(groq(query), r#"*[_type == "post"].tags[]"#);
    }

    #[test]
    fn test_select_new_object() {
        let query = Query::of::<Post>().select(|p| {
            Expr::object([
                ("title", p.field("title")),
                ("author_name", p.field("author").value().field("name")),
                ("tag_count", p.field("tags").count()),
            ])
        });
        assert_eq!(
            groq(query),
            r#"*[_type == "post"]{title, "authorName": author->name, "tagCount": count(tags)}"#
        );
    }

    #[test]
    fn test_select_nested_take() {
        let query = Query::of::<Post>().select(|p| p.field("tags").take(2));
        assert_eq!(groq(query), r#"*[_type == "post"].tags[0...2]"#);
    }

    #[test]
    fn test_filter_after_select_applies_to_projection() {
        let query = Query::of::<Post>()
            .select(|p| p.field("title"))
            .filter(|t| t.starts_with("A"));
        assert_eq!(groq(query), r#"*[_type == "post"].title[@ match "A*"]"#);
    }

    // ========================================================================
    // Include
    // ========================================================================

    #[test]
    fn test_include_reference() {
        let query = Query::of::<Post>().include(|p| p.field("author"));
        assert_eq!(
            groq(query),
            r#"*[_type == "post"]{...,author{...,_type=='reference'=>@->{...}}}"#
        );
    }

    #[test]
    fn test_include_reference_collection() {
        let query = Query::of::<Post>().include(|p| p.field("categories"));
        assert_eq!(
            groq(query),
            r#"*[_type == "post"]{...,categories[defined(@)]{...,_type=='reference'=>@->{...}}}"#
        );
    }

    #[test]
    fn test_nested_include_lands_inside_dereference() {
        let query = Query::of::<Post>()
            .include(|p| p.field("author"))
            .include(|p| p.field("author").value().field("company"));
        assert_eq!(
            groq(query),
            concat!(
                r#"*[_type == "post"]"#,
                "{...,author{...,_type=='reference'=>@->",
                "{...,company{...,_type=='reference'=>@->{...}}}}}"
            )
        );
    }

    #[test]
    fn test_include_narrowed_by_type() {
        let query = Query::of::<Post>().include(|p| p.field("body").of_type::<Video>());
        assert_eq!(
            groq(query),
            concat!(
                r#"*[_type == "post"]"#,
                "{...,body[defined(@)]{...,_type=='reference'=>@->{...},",
                r#"(_type == "video")=>{...,poster{...,asset->{...}}}}}"#
            )
        );
    }

    #[test]
    fn test_include_from_other_field() {
        let groq = groq(Query::of::<Post>().include_from(|p| p.field("author"), "writer"));
        assert!(groq.contains(r#""author": writer"#), "{}", groq);
    }

    #[test]
    fn test_repeated_include_is_registered_once() {
        let once = groq(Query::of::<Post>().include(|p| p.field("author")));
        let twice = groq(
            Query::of::<Post>()
                .include(|p| p.field("author"))
                .include(|p| p.field("author")),
        );
        assert_eq!(once, twice);
    }

    #[test]
    fn test_include_with_filter_and_count() {
        let query = Query::of::<Post>()
            .include(|p| p.field("author"))
            .filter(|p| p.field("views").gt(1))
            .count();
        assert_eq!(groq(query), r#"count(*[_type == "post"][views > 1])"#);
    }
}
