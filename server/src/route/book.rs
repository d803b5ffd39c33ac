use axum::extract::{Path, Query, State};
use axum::routing::get;
use axum::{Json, Router};
use time::OffsetDateTime;
use uuid::Uuid;

use application::service::{
    CreateBookService, DeleteBookService, GetBookService, GetRecordService, UpdateBookService,
};

use crate::controller::Controller;
use crate::error::ErrorStatus;
use crate::handler::AppModule;
use crate::request::{
    BookTransformer, CreateBookRequest, DeleteBookRequest, GetAllBookRequest, GetBookRecordsRequest,
    GetBookRequest, RecordTransformer, UpdateBookRequest,
};
use crate::response::{BookPresenter, CreatedBookPresenter, RecordPresenter};

pub trait BookRouter {
    fn route_book(self) -> Self;
}

impl BookRouter for Router<AppModule> {
    fn route_book(self) -> Self {
        self.route(
            "/books",
            get(
                |State(module): State<AppModule>, Query(req): Query<GetAllBookRequest>| async move {
                    Controller::new(BookTransformer, BookPresenter)
                        .intake(req)
                        .handle(|dto| async move { module.pgpool().get_all_books(dto).await })
                        .await
                        .map_err(ErrorStatus::from)
                },
            )
            .post(
                |State(module): State<AppModule>, Json(req): Json<CreateBookRequest>| async move {
                    Controller::new(BookTransformer, CreatedBookPresenter)
                        .intake(req)
                        .handle(|dto| async move { module.pgpool().create_book(dto).await })
                        .await
                        .map_err(ErrorStatus::from)
                },
            ),
        )
        .route(
            "/books/:id",
            get(
                |State(module): State<AppModule>, Path(id): Path<Uuid>| async move {
                    Controller::new(BookTransformer, BookPresenter)
                        .intake(GetBookRequest::new(id))
                        .handle(|dto| async move { module.pgpool().get_book(dto).await })
                        .await
                        .map_err(ErrorStatus::from)
                },
            )
            .patch(
                |State(module): State<AppModule>,
                 Path(id): Path<Uuid>,
                 Json(req): Json<UpdateBookRequest>| async move {
                    Controller::new(BookTransformer, BookPresenter)
                        .intake((id, req))
                        .handle(|dto| async move { module.pgpool().update_book(dto).await })
                        .await
                        .map_err(ErrorStatus::from)
                },
            )
            .delete(
                |State(module): State<AppModule>, Path(id): Path<Uuid>| async move {
                    Controller::new(BookTransformer, BookPresenter)
                        .intake(DeleteBookRequest::new(id))
                        .handle(|dto| async move { module.pgpool().delete_book(dto).await })
                        .await
                        .map_err(ErrorStatus::from)
                },
            ),
        )
        .route(
            "/books/:id/records",
            get(
                |State(module): State<AppModule>, Path(id): Path<Uuid>| async move {
                    Controller::new(RecordTransformer, RecordPresenter)
                        .intake(GetBookRecordsRequest::new(id))
                        .handle(|dto| async move {
                            module
                                .pgpool()
                                .get_records_by_book(dto, OffsetDateTime::now_utc())
                                .await
                        })
                        .await
                        .map_err(ErrorStatus::from)
                },
            ),
        )
    }
}
