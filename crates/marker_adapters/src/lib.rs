pub mod backend;
pub mod error;
pub mod http;
pub mod sse;
pub mod trace_reader;
pub mod traits;

pub use backend::{conventions, CostData, TraceRecord, TraceSpan, TracingBackend};
pub use error::AdapterError;
pub use http::HttpAdapter;
pub use sse::SseAdapter;
pub use trace_reader::TraceReadAdapter;
pub use traits::{
    Adapter, EnrichedOutput, GeneratedOutput, Generation, GenerationMetrics, ToolCall,
};
