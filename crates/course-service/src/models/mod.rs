//! 领域实体模型

mod chat;
mod course;
mod enums;
mod notification;
mod payment;
mod promo_code;
mod stream;
mod user;

pub use chat::{ChatMessage, NewChatMessage};
pub use course::{
    BlockChanges, BlockOutline, Course, CourseBlock, CourseChanges, CourseOutline, Lesson,
    LessonChanges, NewBlock, NewCourse, NewLesson, is_permutation, sort_blocks, sort_lessons,
};
pub use enums::{
    CourseStatus, DiscountType, LessonType, NotificationStatus, NotificationType, PaymentStatus,
    StreamStatus,
};
pub use notification::{NewNotification, Notification, escape_html};
pub use payment::{NewPayment, Payment, PaymentTransition};
pub use promo_code::{NewPromoCode, PriceQuote, PromoCode, PromoCodeChanges, PromoUnavailable};
pub use stream::{
    Enrollment, LessonSchedule, NewStream, Stream, StreamChanges, lesson_open_at,
};
pub use user::TelegramUser;
