pub mod alert_evaluator;
pub mod event_decoder;
pub mod report_parser;

pub use alert_evaluator::AlertEvaluator;
pub use event_decoder::{EventDecoder, MAX_ENVELOPE_BYTES, MAX_IMAGES_PER_EVENT};
pub use report_parser::{ReportParser, MAX_SCANNER_OUTPUT_BYTES};
