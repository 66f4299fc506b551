/// HTTP handlers for blog-service
///
/// This module contains handlers for:
/// - Pages: feeds, post views and the post/comment/follow forms
/// - API: REST resources for posts, comments, groups and follow edges
///
/// The API scope is registered ahead of the pages, whose `/{username}/`
/// routes match any first path segment.
pub mod api;
pub mod forms;
pub mod pages;

use actix_web::web;

pub fn configure(cfg: &mut web::ServiceConfig) {
    api::configure(cfg);
    pages::configure(cfg);
}
