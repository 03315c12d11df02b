pub mod json;

pub use json::{load_workbook, save_workbook, saved_version, ReadWriteError};
