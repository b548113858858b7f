pub mod extract;
pub mod fetch;
pub mod selector;
pub mod shape;

pub use extract::{Extraction, ExtractionNote, ReportExtractor, MAX_RECURSION_DEPTH};
pub use fetch::{FetchError, FetchedFile, HttpOutputFileFetcher, OfflineFetcher, OutputFileFetcher};
pub use selector::{is_generated_turn, is_user_turn, select_best_message, GENERATED_ROLES, USER_ROLE};
pub use shape::{is_report_shaped, Report, ReportKind};
