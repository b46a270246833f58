pub mod use_cases;

pub use use_cases::record_mapper::map_rows;
pub use use_cases::sheet_import::SheetImportUseCase;
pub use use_cases::value_coercion::ValueConverter;
