/// REST API handlers, mounted under `/api/v1/`
///
/// Reads are public. Writes need a bearer token and answer refusals with
/// status codes instead of redirects: 401 without credentials, 403 for a
/// non-author, 400 with field errors for invalid payloads.
pub mod comments;
pub mod follows;
pub mod groups;
pub mod posts;

use actix_web::web;
use serde::{Deserialize, Deserializer};

pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/api/v1")
            .service(
                web::resource("/posts/")
                    .route(web::get().to(posts::list_posts))
                    .route(web::post().to(posts::create_post)),
            )
            .service(
                web::resource("/posts/{post_id}/")
                    .route(web::get().to(posts::get_post))
                    .route(web::put().to(posts::replace_post))
                    .route(web::patch().to(posts::patch_post))
                    .route(web::delete().to(posts::delete_post)),
            )
            .service(
                web::resource("/posts/{post_id}/comments/")
                    .route(web::get().to(comments::list_comments))
                    .route(web::post().to(comments::create_comment)),
            )
            .service(
                web::resource("/posts/{post_id}/comments/{comment_id}/")
                    .route(web::get().to(comments::get_comment))
                    .route(web::put().to(comments::update_comment))
                    .route(web::patch().to(comments::update_comment))
                    .route(web::delete().to(comments::delete_comment)),
            )
            // Read-only: other methods answer 405
            .service(web::resource("/groups/").route(web::get().to(groups::list_groups)))
            .service(web::resource("/groups/{group_id}/").route(web::get().to(groups::get_group)))
            .service(
                web::resource("/follow/")
                    .route(web::get().to(follows::list_follows))
                    .route(web::post().to(follows::create_follow)),
            )
            .route(
                "/follow/{username}/",
                web::delete().to(follows::delete_follow),
            ),
    );
}

/// Distinguishes a field sent as `null` (`Some(None)`) from one left out
/// (`None`). Use with `#[serde(default)]`.
pub(crate) fn nullable<'de, D, T>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}
