use axum::extract::{Path, Query, State};
use axum::routing::{get, put};
use axum::{Json, Router};
use time::OffsetDateTime;
use uuid::Uuid;

use application::service::{BorrowService, GetRecordService, ReturnService, UpdateRecordService};

use crate::controller::Controller;
use crate::error::ErrorStatus;
use crate::handler::AppModule;
use crate::request::{
    BorrowBookRequest, GetAllRecordRequest, GetOverdueRequest, GetRecordRequest, RecordTransformer,
    ReturnBookRequest, UpdateRecordRequest,
};
use crate::response::{BorrowPresenter, RecordPresenter, ReturnPresenter};

pub trait RecordRouter {
    fn route_record(self) -> Self;
}

impl RecordRouter for Router<AppModule> {
    fn route_record(self) -> Self {
        self.route(
            "/records",
            get(
                |State(module): State<AppModule>, Query(req): Query<GetAllRecordRequest>| async move {
                    Controller::new(RecordTransformer, RecordPresenter)
                        .intake(req)
                        .handle(|dto| async move {
                            module
                                .pgpool()
                                .get_all_records(dto, OffsetDateTime::now_utc())
                                .await
                        })
                        .await
                        .map_err(ErrorStatus::from)
                },
            )
            .post(
                |State(module): State<AppModule>, Json(req): Json<BorrowBookRequest>| async move {
                    Controller::new(RecordTransformer, BorrowPresenter)
                        .intake(req)
                        .handle(|dto| async move {
                            module
                                .pgpool()
                                .borrow_book(dto, OffsetDateTime::now_utc())
                                .await
                        })
                        .await
                        .map_err(ErrorStatus::from)
                },
            ),
        )
        .route(
            "/records/overdue",
            get(
                |State(module): State<AppModule>, Query(req): Query<GetOverdueRequest>| async move {
                    Controller::new(RecordTransformer, RecordPresenter)
                        .intake(req)
                        .handle(|dto| async move {
                            module
                                .pgpool()
                                .get_overdue_records(dto, OffsetDateTime::now_utc())
                                .await
                        })
                        .await
                        .map_err(ErrorStatus::from)
                },
            ),
        )
        .route(
            "/records/:id",
            get(
                |State(module): State<AppModule>, Path(id): Path<Uuid>| async move {
                    Controller::new(RecordTransformer, RecordPresenter)
                        .intake(GetRecordRequest::new(id))
                        .handle(|dto| async move {
                            module
                                .pgpool()
                                .get_record(dto, OffsetDateTime::now_utc())
                                .await
                        })
                        .await
                        .map_err(ErrorStatus::from)
                },
            )
            .patch(
                |State(module): State<AppModule>,
                 Path(id): Path<Uuid>,
                 Json(req): Json<UpdateRecordRequest>| async move {
                    Controller::new(RecordTransformer, RecordPresenter)
                        .intake((id, req))
                        .handle(|dto| async move {
                            module
                                .pgpool()
                                .update_record(dto, OffsetDateTime::now_utc())
                                .await
                        })
                        .await
                        .map_err(ErrorStatus::from)
                },
            ),
        )
        .route(
            "/records/:id/return",
            put(
                |State(module): State<AppModule>, Path(id): Path<Uuid>| async move {
                    Controller::new(RecordTransformer, ReturnPresenter)
                        .intake(ReturnBookRequest::new(id))
                        .handle(|dto| async move {
                            module
                                .pgpool()
                                .return_book(dto, OffsetDateTime::now_utc())
                                .await
                        })
                        .await
                        .map_err(ErrorStatus::from)
                },
            ),
        )
    }
}
