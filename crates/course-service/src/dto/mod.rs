//! DTO 模块
//!
//! 包含所有请求和响应的数据传输对象

mod date;
pub mod request;
pub mod response;

pub use date::{parse_date_field, parse_date_string, parse_optional_date};

pub use request::{
    BulkScheduleRequest, CallbackStatus, ChangeStreamStatusRequest, ChatHistoryQuery,
    CreateBlockRequest, CreateCourseRequest, CreateLessonRequest, CreateNotificationRequest,
    CreatePaymentRequest, CreatePromoCodeRequest, CreateStreamRequest, PaginationParams,
    PaymentCallbackRequest, ReorderRequest, ScheduleLessonRequest, SendChatMessageRequest,
    UpdateBlockRequest, UpdateCourseRequest, UpdateLessonRequest, UpdatePromoCodeRequest,
    UpdateStreamRequest, ValidatePromoCodeQuery,
};

pub use response::{
    ApiResponse, MeDto, PageResponse, PaymentCreatedDto,
    PromoCodeDto, PromoQuoteDto, StreamDetailDto, StudentBlockDto, StudentLessonDto,
};
