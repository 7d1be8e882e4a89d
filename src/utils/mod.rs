// Gateway module for utils - all external access goes through these re-exports

mod errors;
mod fn_utils;
mod logger;

pub use errors::ImportCostError;
pub use fn_utils::{Debounce, MemoOnce};
pub use logger::init_logger;
