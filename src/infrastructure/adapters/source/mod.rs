//! Document Source Adapters

mod plain_text_source;

pub use plain_text_source::PlainTextSource;
