use axum::{
    extract::{rejection::JsonRejection, Path, State},
    http::StatusCode,
    Json,
};

use crate::{
    entities::{person, product, sector},
    errors::ServiceError,
    handlers::common::{created, success, CreatedResult},
    services::reference_data::{PersonInput, PersonView, ProductInput, SectorInput},
    ApiResult, AppState,
};

#[utoipa::path(get, path = "/api/v1/products", tag = "reference-data",
    responses((status = 200, description = "Products ordered by name")))]
pub async fn list_products(State(state): State<AppState>) -> ApiResult<Vec<product::Model>> {
    Ok(success(state.services.reference_data.list_products().await?))
}

#[utoipa::path(get, path = "/api/v1/products/{id}", tag = "reference-data",
    params(("id" = i32, Path, description = "Product ID")),
    responses(
        (status = 200, description = "Product"),
        (status = 404, description = "Product not found", body = crate::errors::ErrorResponse)
    ))]
pub async fn get_product(
    State(state): State<AppState>,
    Path(id): Path<i32>,
) -> ApiResult<product::Model> {
    Ok(success(state.services.reference_data.get_product(id).await?))
}

#[utoipa::path(post, path = "/api/v1/products", tag = "reference-data",
    request_body = ProductInput,
    responses(
        (status = 201, description = "Product created"),
        (status = 400, description = "Invalid request", body = crate::errors::ErrorResponse)
    ))]
pub async fn create_product(
    State(state): State<AppState>,
    payload: Result<Json<ProductInput>, JsonRejection>,
) -> CreatedResult<product::Model> {
    let Json(input) = payload?;
    Ok(created(
        state.services.reference_data.create_product(input).await?,
    ))
}

#[utoipa::path(put, path = "/api/v1/products/{id}", tag = "reference-data",
    params(("id" = i32, Path, description = "Product ID")),
    request_body = ProductInput,
    responses(
        (status = 200, description = "Product updated"),
        (status = 404, description = "Product not found", body = crate::errors::ErrorResponse)
    ))]
pub async fn update_product(
    State(state): State<AppState>,
    Path(id): Path<i32>,
    payload: Result<Json<ProductInput>, JsonRejection>,
) -> ApiResult<product::Model> {
    let Json(input) = payload?;
    Ok(success(
        state.services.reference_data.update_product(id, input).await?,
    ))
}

#[utoipa::path(delete, path = "/api/v1/products/{id}", tag = "reference-data",
    params(("id" = i32, Path, description = "Product ID")),
    responses(
        (status = 204, description = "Product deleted"),
        (status = 404, description = "Product not found", body = crate::errors::ErrorResponse),
        (status = 409, description = "Product has ledger rows", body = crate::errors::ErrorResponse)
    ))]
pub async fn delete_product(
    State(state): State<AppState>,
    Path(id): Path<i32>,
) -> Result<StatusCode, ServiceError> {
    state.services.reference_data.delete_product(id).await?;
    Ok(StatusCode::NO_CONTENT)
}

#[utoipa::path(get, path = "/api/v1/sectors", tag = "reference-data",
    responses((status = 200, description = "Sectors ordered by name")))]
pub async fn list_sectors(State(state): State<AppState>) -> ApiResult<Vec<sector::Model>> {
    Ok(success(state.services.reference_data.list_sectors().await?))
}

#[utoipa::path(post, path = "/api/v1/sectors", tag = "reference-data",
    request_body = SectorInput,
    responses((status = 201, description = "Sector created")))]
pub async fn create_sector(
    State(state): State<AppState>,
    payload: Result<Json<SectorInput>, JsonRejection>,
) -> CreatedResult<sector::Model> {
    let Json(input) = payload?;
    Ok(created(
        state.services.reference_data.create_sector(input).await?,
    ))
}

#[utoipa::path(put, path = "/api/v1/sectors/{id}", tag = "reference-data",
    params(("id" = i32, Path, description = "Sector ID")),
    request_body = SectorInput,
    responses((status = 200, description = "Sector updated")))]
pub async fn update_sector(
    State(state): State<AppState>,
    Path(id): Path<i32>,
    payload: Result<Json<SectorInput>, JsonRejection>,
) -> ApiResult<sector::Model> {
    let Json(input) = payload?;
    Ok(success(
        state.services.reference_data.update_sector(id, input).await?,
    ))
}

#[utoipa::path(delete, path = "/api/v1/sectors/{id}", tag = "reference-data",
    params(("id" = i32, Path, description = "Sector ID")),
    responses((status = 204, description = "Sector deleted")))]
pub async fn delete_sector(
    State(state): State<AppState>,
    Path(id): Path<i32>,
) -> Result<StatusCode, ServiceError> {
    state.services.reference_data.delete_sector(id).await?;
    Ok(StatusCode::NO_CONTENT)
}

#[utoipa::path(get, path = "/api/v1/people", tag = "reference-data",
    responses((status = 200, description = "People with their sector name")))]
pub async fn list_people(State(state): State<AppState>) -> ApiResult<Vec<PersonView>> {
    Ok(success(state.services.reference_data.list_people().await?))
}

#[utoipa::path(post, path = "/api/v1/people", tag = "reference-data",
    request_body = PersonInput,
    responses(
        (status = 201, description = "Person created"),
        (status = 404, description = "Sector not found", body = crate::errors::ErrorResponse)
    ))]
pub async fn create_person(
    State(state): State<AppState>,
    payload: Result<Json<PersonInput>, JsonRejection>,
) -> CreatedResult<person::Model> {
    let Json(input) = payload?;
    Ok(created(
        state.services.reference_data.create_person(input).await?,
    ))
}

#[utoipa::path(put, path = "/api/v1/people/{id}", tag = "reference-data",
    params(("id" = i32, Path, description = "Person ID")),
    request_body = PersonInput,
    responses((status = 200, description = "Person updated")))]
pub async fn update_person(
    State(state): State<AppState>,
    Path(id): Path<i32>,
    payload: Result<Json<PersonInput>, JsonRejection>,
) -> ApiResult<person::Model> {
    let Json(input) = payload?;
    Ok(success(
        state.services.reference_data.update_person(id, input).await?,
    ))
}

#[utoipa::path(delete, path = "/api/v1/people/{id}", tag = "reference-data",
    params(("id" = i32, Path, description = "Person ID")),
    responses(
        (status = 204, description = "Person deleted"),
        (status = 409, description = "Person is a requester on exit orders", body = crate::errors::ErrorResponse)
    ))]
pub async fn delete_person(
    State(state): State<AppState>,
    Path(id): Path<i32>,
) -> Result<StatusCode, ServiceError> {
    state.services.reference_data.delete_person(id).await?;
    Ok(StatusCode::NO_CONTENT)
}
