#![allow(dead_code)]

use groq_expr::types::{Describe, TypeDescriptor, TypeShape};

pub struct Post;

impl Describe for Post {
    fn describe() -> TypeDescriptor {
        TypeDescriptor::document("Post")
            .field("title", TypeShape::string())
            .field("slug", TypeShape::string())
            .field("views", TypeShape::integer())
            .field("published_at", TypeShape::optional(TypeShape::datetime()))
            .field("author", TypeShape::reference::<Person>())
            .field("categories", TypeShape::references::<Category>())
            .field("tags", TypeShape::array(TypeShape::string()))
            .field("scores", TypeShape::array(TypeShape::integer()))
            .field("body", TypeShape::array(TypeShape::Any))
    }
}

pub struct Person;

impl Describe for Person {
    fn describe() -> TypeDescriptor {
        TypeDescriptor::document("Person")
            .field("name", TypeShape::string())
            .field("company", TypeShape::reference::<Company>())
    }
}

pub struct Company;

impl Describe for Company {
    fn describe() -> TypeDescriptor {
        TypeDescriptor::document("Company").field("name", TypeShape::string())
    }
}

pub struct Category;

impl Describe for Category {
    fn describe() -> TypeDescriptor {
        TypeDescriptor::document("Category").field("title", TypeShape::string())
    }
}

/// Image-like value: its `asset` member is a reference.
pub struct Image;

impl Describe for Image {
    fn describe() -> TypeDescriptor {
        TypeDescriptor::new("Image")
            .field("asset", TypeShape::reference::<Asset>())
            .field("alt", TypeShape::string())
    }
}

pub struct Asset;

impl Describe for Asset {
    fn describe() -> TypeDescriptor {
        TypeDescriptor::document("Asset")
            .wire_type("sanity.imageAsset")
            .field("url", TypeShape::string())
    }
}

pub struct Gallery;

impl Describe for Gallery {
    fn describe() -> TypeDescriptor {
        TypeDescriptor::document("Gallery")
            .field("title", TypeShape::string())
            .field("cover", TypeShape::object::<Image>())
            .field("images", TypeShape::array(TypeShape::object::<Image>()))
    }
}

/// Block type found in `Post::body`.
pub struct Video;

impl Describe for Video {
    fn describe() -> TypeDescriptor {
        TypeDescriptor::new("Video")
            .wire_type("video")
            .field("url", TypeShape::string())
            .field("poster", TypeShape::object::<Image>())
    }
}

/// Base type shared by every document; adds no `_type` filter.
pub struct Content;

impl Describe for Content {
    fn describe() -> TypeDescriptor {
        TypeDescriptor::document("Content")
            .base()
            .field("title", TypeShape::string())
    }
}

pub const GALLERY_PROJECTION: &str =
    "{...,cover{...,asset->{...}},images[defined(@)]{...,asset->{...}}}";
