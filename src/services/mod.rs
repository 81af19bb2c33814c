pub mod accounts;
pub mod admission;
pub mod history;
pub mod image_compressor;
pub mod metrics;
pub mod ocr_engine;
pub mod quota_ledger;
pub mod session_store;
pub mod settings;

pub use accounts::*;
pub use admission::*;
pub use history::*;
pub use image_compressor::*;
pub use metrics::*;
pub use ocr_engine::*;
pub use quota_ledger::*;
pub use session_store::*;
pub use settings::*;
