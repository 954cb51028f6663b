use axum::{extract::State, http::HeaderMap, http::StatusCode, Json};

use crate::{
    extract::{ApiJson, ApiPath, ApiQuery, OptionalJson},
    models::carpool::{
        CreateRideRequest, JoinRideRequest, Ride, RideListQuery, RidePassenger, UpdateRideRequest,
    },
    models::{ApiResponse, Pagination},
    services::carpool,
    util::require_bearer,
    ApiError, AppState,
};

#[utoipa::path(
    get,
    path = "/api/v1/rides",
    tag = "Carpool",
    params(RideListQuery),
    responses(
        (status = 200, description = "Rides ordered by departure", body = [Ride]),
        (status = 400, description = "Invalid filter", body = crate::error::ErrorResponse)
    )
)]
pub async fn list_rides(
    State(state): State<AppState>,
    ApiQuery(query): ApiQuery<RideListQuery>,
) -> Result<Json<ApiResponse<Vec<Ride>>>, ApiError> {
    let page = query.page();
    let (rides, total) = carpool::list_rides(state.db_pool(), &query.filter(), page).await?;
    Ok(ApiResponse::paginated(rides, Pagination::new(page, total)))
}

#[utoipa::path(
    post,
    path = "/api/v1/rides",
    tag = "Carpool",
    security(("bearerAuth" = [])),
    request_body = CreateRideRequest,
    responses(
        (status = 201, description = "Ride offered", body = Ride),
        (status = 400, description = "Invalid ride payload", body = crate::error::ErrorResponse),
        (status = 401, description = "Authentication required", body = crate::error::ErrorResponse)
    )
)]
pub async fn create_ride(
    State(state): State<AppState>,
    headers: HeaderMap,
    ApiJson(req): ApiJson<CreateRideRequest>,
) -> Result<(StatusCode, Json<ApiResponse<Ride>>), ApiError> {
    let token = require_bearer(&headers)?;
    let user = state.authenticate(&token).await?;

    let ride = carpool::create_ride(state.db_pool(), &user, req).await?;
    Ok(ApiResponse::created(ride))
}

#[utoipa::path(
    get,
    path = "/api/v1/rides/{id}",
    tag = "Carpool",
    params(("id" = i64, Path, description = "Ride id")),
    responses(
        (status = 200, description = "Ride detail", body = Ride),
        (status = 404, description = "Ride not found", body = crate::error::ErrorResponse)
    )
)]
pub async fn get_ride(
    State(state): State<AppState>,
    ApiPath(ride_id): ApiPath<i64>,
) -> Result<Json<ApiResponse<Ride>>, ApiError> {
    let ride = carpool::get_ride(state.db_pool(), ride_id).await?;
    Ok(ApiResponse::ok(ride))
}

#[utoipa::path(
    put,
    path = "/api/v1/rides/{id}",
    tag = "Carpool",
    security(("bearerAuth" = [])),
    params(("id" = i64, Path, description = "Ride id")),
    request_body = UpdateRideRequest,
    responses(
        (status = 200, description = "Ride updated", body = Ride),
        (status = 403, description = "Not the driver", body = crate::error::ErrorResponse),
        (status = 409, description = "Ride closed or seats already booked", body = crate::error::ErrorResponse)
    )
)]
pub async fn update_ride(
    State(state): State<AppState>,
    headers: HeaderMap,
    ApiPath(ride_id): ApiPath<i64>,
    ApiJson(req): ApiJson<UpdateRideRequest>,
) -> Result<Json<ApiResponse<Ride>>, ApiError> {
    let token = require_bearer(&headers)?;
    let user = state.authenticate(&token).await?;

    let ride = carpool::update_ride(state.db_pool(), &user, ride_id, req).await?;
    Ok(ApiResponse::ok(ride))
}

#[utoipa::path(
    post,
    path = "/api/v1/rides/{id}/cancel",
    tag = "Carpool",
    security(("bearerAuth" = [])),
    params(("id" = i64, Path, description = "Ride id")),
    responses(
        (status = 200, description = "Ride cancelled; passengers notified", body = Ride),
        (status = 403, description = "Not the driver", body = crate::error::ErrorResponse),
        (status = 409, description = "Ride already closed", body = crate::error::ErrorResponse)
    )
)]
pub async fn cancel_ride(
    State(state): State<AppState>,
    headers: HeaderMap,
    ApiPath(ride_id): ApiPath<i64>,
) -> Result<Json<ApiResponse<Ride>>, ApiError> {
    let token = require_bearer(&headers)?;
    let user = state.authenticate(&token).await?;

    let ride = carpool::cancel_ride(state.db_pool(), &user, ride_id).await?;
    Ok(ApiResponse::ok(ride))
}

#[utoipa::path(
    post,
    path = "/api/v1/rides/{id}/join",
    tag = "Carpool",
    security(("bearerAuth" = [])),
    params(("id" = i64, Path, description = "Ride id")),
    request_body(content = JoinRideRequest, description = "Optional; defaults to one seat"),
    responses(
        (status = 200, description = "Seat reserved", body = Ride),
        (status = 400, description = "Driver cannot join or invalid seat count", body = crate::error::ErrorResponse),
        (status = 409, description = "Ride full, closed, departed or already joined", body = crate::error::ErrorResponse)
    )
)]
pub async fn join_ride(
    State(state): State<AppState>,
    headers: HeaderMap,
    ApiPath(ride_id): ApiPath<i64>,
    OptionalJson(body): OptionalJson<JoinRideRequest>,
) -> Result<Json<ApiResponse<Ride>>, ApiError> {
    let token = require_bearer(&headers)?;
    let user = state.authenticate(&token).await?;

    let seats = body.and_then(|req| req.seats);
    let ride = carpool::join_ride(state.db_pool(), &user, ride_id, seats).await?;
    Ok(ApiResponse::ok(ride))
}

#[utoipa::path(
    post,
    path = "/api/v1/rides/{id}/leave",
    tag = "Carpool",
    security(("bearerAuth" = [])),
    params(("id" = i64, Path, description = "Ride id")),
    responses(
        (status = 200, description = "Seats released", body = Ride),
        (status = 404, description = "Ride not found or not a passenger", body = crate::error::ErrorResponse)
    )
)]
pub async fn leave_ride(
    State(state): State<AppState>,
    headers: HeaderMap,
    ApiPath(ride_id): ApiPath<i64>,
) -> Result<Json<ApiResponse<Ride>>, ApiError> {
    let token = require_bearer(&headers)?;
    let user = state.authenticate(&token).await?;

    let ride = carpool::leave_ride(state.db_pool(), &user, ride_id).await?;
    Ok(ApiResponse::ok(ride))
}

#[utoipa::path(
    get,
    path = "/api/v1/rides/{id}/passengers",
    tag = "Carpool",
    params(("id" = i64, Path, description = "Ride id")),
    responses(
        (status = 200, description = "Passengers in join order", body = [RidePassenger]),
        (status = 404, description = "Ride not found", body = crate::error::ErrorResponse)
    )
)]
pub async fn list_passengers(
    State(state): State<AppState>,
    ApiPath(ride_id): ApiPath<i64>,
) -> Result<Json<ApiResponse<Vec<RidePassenger>>>, ApiError> {
    let passengers = carpool::list_passengers(state.db_pool(), ride_id).await?;
    Ok(ApiResponse::ok(passengers))
}
