use crate::domain::post::DuePost;
use time::OffsetDateTime;

#[derive(Debug, sqlx::FromRow)]
pub struct DuePostRecord {
    pub(crate) id: i64,
    pub(crate) title: String,
    pub(crate) delivery_at: OffsetDateTime,
}

impl From<DuePostRecord> for DuePost {
    fn from(record: DuePostRecord) -> Self {
        Self { id: record.id, title: record.title, delivery_at: record.delivery_at }
    }
}
