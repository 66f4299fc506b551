/// Group handlers - read-only `/api/v1/groups/`
use crate::error::Result;
use crate::AppState;
use actix_web::{web, HttpResponse};

pub async fn list_groups(state: web::Data<AppState>) -> Result<HttpResponse> {
    let groups = state.groups.list_all().await?;
    Ok(HttpResponse::Ok().json(groups))
}

pub async fn get_group(
    state: web::Data<AppState>,
    group_id: web::Path<i64>,
) -> Result<HttpResponse> {
    let group = state.groups.get(*group_id).await?;
    Ok(HttpResponse::Ok().json(group))
}
