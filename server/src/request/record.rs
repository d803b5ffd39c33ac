use serde::Deserialize;
use uuid::Uuid;

use application::transfer::{
    BorrowBookDto, GetAllRecordDto, GetOverdueRecordDto, GetRecordDto, GetRecordsByBookDto,
    ReturnBookDto, UpdateRecordDto,
};
use kernel::prelude::entity::{RecordStatus, SelectLimit, SelectOffset};

use crate::controller::Intake;

#[derive(Debug, Deserialize)]
pub struct BorrowBookRequest {
    user_id: Uuid,
    book_id: Uuid,
}

#[derive(Debug)]
pub struct ReturnBookRequest {
    id: Uuid,
}

impl ReturnBookRequest {
    pub fn new(id: Uuid) -> Self {
        Self { id }
    }
}

#[derive(Debug, Deserialize)]
pub struct UpdateRecordRequest {
    status: Option<RecordStatus>,
    notes: Option<String>,
}

#[derive(Debug)]
pub struct GetRecordRequest {
    id: Uuid,
}

impl GetRecordRequest {
    pub fn new(id: Uuid) -> Self {
        Self { id }
    }
}

#[derive(Debug, Deserialize)]
pub struct GetAllRecordRequest {
    #[serde(default)]
    limit: SelectLimit,
    #[serde(default)]
    offset: SelectOffset,
}

#[derive(Debug, Deserialize)]
pub struct GetOverdueRequest {
    #[serde(default)]
    limit: SelectLimit,
    #[serde(default)]
    offset: SelectOffset,
}

#[derive(Debug)]
pub struct GetBookRecordsRequest {
    id: Uuid,
}

impl GetBookRecordsRequest {
    pub fn new(id: Uuid) -> Self {
        Self { id }
    }
}

pub struct RecordTransformer;

impl Intake<BorrowBookRequest> for RecordTransformer {
    type To = BorrowBookDto;
    fn emit(&self, input: BorrowBookRequest) -> Self::To {
        BorrowBookDto {
            user_id: input.user_id,
            book_id: input.book_id,
        }
    }
}

impl Intake<ReturnBookRequest> for RecordTransformer {
    type To = ReturnBookDto;
    fn emit(&self, input: ReturnBookRequest) -> Self::To {
        ReturnBookDto {
            record_id: input.id,
        }
    }
}

impl Intake<(Uuid, UpdateRecordRequest)> for RecordTransformer {
    type To = UpdateRecordDto;
    fn emit(&self, input: (Uuid, UpdateRecordRequest)) -> Self::To {
        let (id, input) = input;
        UpdateRecordDto {
            id,
            status: input.status,
            notes: input.notes,
        }
    }
}

impl Intake<GetRecordRequest> for RecordTransformer {
    type To = GetRecordDto;
    fn emit(&self, input: GetRecordRequest) -> Self::To {
        GetRecordDto { id: input.id }
    }
}

impl Intake<GetAllRecordRequest> for RecordTransformer {
    type To = GetAllRecordDto;
    fn emit(&self, input: GetAllRecordRequest) -> Self::To {
        GetAllRecordDto {
            limit: input.limit,
            offset: input.offset,
        }
    }
}

impl Intake<GetOverdueRequest> for RecordTransformer {
    type To = GetOverdueRecordDto;
    fn emit(&self, input: GetOverdueRequest) -> Self::To {
        GetOverdueRecordDto {
            limit: input.limit,
            offset: input.offset,
        }
    }
}

impl Intake<GetBookRecordsRequest> for RecordTransformer {
    type To = GetRecordsByBookDto;
    fn emit(&self, input: GetBookRecordsRequest) -> Self::To {
        GetRecordsByBookDto { book_id: input.id }
    }
}
