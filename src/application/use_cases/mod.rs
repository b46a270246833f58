pub mod record_mapper;
pub mod sheet_import;
pub mod value_coercion;
