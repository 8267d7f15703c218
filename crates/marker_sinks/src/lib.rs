pub mod console;
pub mod csv;
pub mod error;
pub mod html;
pub mod json;
pub mod junit;
pub mod observability;
pub mod traits;

pub use console::ConsoleSink;
pub use csv::CsvSink;
pub use error::SinkError;
pub use html::HtmlSink;
pub use json::JsonSink;
pub use junit::JUnitSink;
pub use observability::ObservabilitySink;
pub use traits::Sink;
