//! Feature engineering: lag columns, forecast chaining and the assembly of
//! training and inference inputs.

pub mod assembly;
pub mod chain;
pub mod lag;
