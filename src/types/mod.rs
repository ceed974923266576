//! Data types shared by the recorder, the storage layer and the report

mod chat;
mod period;

pub use chat::{ChatId, ChatRecord, NewEvent, SenderId};
pub use period::StatsPeriod;
