pub mod app;
pub mod application;
pub mod domain;
pub mod infrastructure;
pub mod interfaces;

pub use app::run;
pub use application::{map_rows, SheetImportUseCase, ValueConverter};
pub use domain::cell::RawCell;
pub use domain::error::{AppError, Result};
pub use domain::mapping::{FieldKind, FieldMapping, FieldMappingEntry};
pub use domain::record::{FieldValue, MappedRecord};
