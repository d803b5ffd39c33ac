use axum::extract::{Path, Query, State};
use axum::routing::{get, patch};
use axum::{Json, Router};
use time::OffsetDateTime;
use uuid::Uuid;

use application::service::{
    CreateUserService, GetRecordService, GetUserService, UpdateUserService, UserStatusService,
};

use crate::controller::Controller;
use crate::error::ErrorStatus;
use crate::handler::AppModule;
use crate::request::{
    CreateUserRequest, GetAllUserRequest, GetUserRecordsRequest, GetUserRequest,
    SetUserStatusRequest, UpdateUserRequest, UserTransformer,
};
use crate::response::{CreatedUserPresenter, RecordPresenter, UserPresenter};

pub trait UserRouter {
    fn route_user(self) -> Self;
}

impl UserRouter for Router<AppModule> {
    fn route_user(self) -> Self {
        self.route(
            "/users",
            get(
                |State(module): State<AppModule>, Query(req): Query<GetAllUserRequest>| async move {
                    Controller::new(UserTransformer, UserPresenter)
                        .intake(req)
                        .handle(|dto| async move { module.pgpool().get_all_users(dto).await })
                        .await
                        .map_err(ErrorStatus::from)
                },
            )
            .post(
                |State(module): State<AppModule>, Json(req): Json<CreateUserRequest>| async move {
                    Controller::new(UserTransformer, CreatedUserPresenter)
                        .intake(req)
                        .handle(|dto| async move { module.pgpool().create_user(dto).await })
                        .await
                        .map_err(ErrorStatus::from)
                },
            ),
        )
        .route(
            "/users/:id",
            get(
                |State(module): State<AppModule>, Path(id): Path<Uuid>| async move {
                    Controller::new(UserTransformer, UserPresenter)
                        .intake(GetUserRequest::new(id))
                        .handle(|dto| async move { module.pgpool().get_user(dto).await })
                        .await
                        .map_err(ErrorStatus::from)
                },
            )
            .patch(
                |State(module): State<AppModule>,
                 Path(id): Path<Uuid>,
                 Json(req): Json<UpdateUserRequest>| async move {
                    Controller::new(UserTransformer, UserPresenter)
                        .intake((id, req))
                        .handle(|dto| async move { module.pgpool().update_user(dto).await })
                        .await
                        .map_err(ErrorStatus::from)
                },
            ),
        )
        .route(
            "/users/:id/status",
            patch(
                |State(module): State<AppModule>,
                 Path(id): Path<Uuid>,
                 Json(req): Json<SetUserStatusRequest>| async move {
                    Controller::new(UserTransformer, UserPresenter)
                        .intake((id, req))
                        .handle(|dto| async move { module.pgpool().set_user_status(dto).await })
                        .await
                        .map_err(ErrorStatus::from)
                },
            ),
        )
        .route(
            "/users/:id/records",
            get(
                |State(module): State<AppModule>, Path(id): Path<Uuid>| async move {
                    Controller::new(UserTransformer, RecordPresenter)
                        .intake(GetUserRecordsRequest::new(id))
                        .handle(|dto| async move {
                            module
                                .pgpool()
                                .get_records_by_user(dto, OffsetDateTime::now_utc())
                                .await
                        })
                        .await
                        .map_err(ErrorStatus::from)
                },
            ),
        )
    }
}
