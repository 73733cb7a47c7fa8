pub mod post;

pub use post::DuePostRecord;
