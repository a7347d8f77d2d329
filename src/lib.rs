// 公共API暴露
mod cli;
pub mod config;
pub mod converter;
pub mod error;
pub mod generator;
pub mod mappings;
pub mod models;
pub mod parser;
pub mod syntax;
pub mod utils;
pub mod validator;
pub mod variables;
pub mod writeback;

pub use cli::{CliArgs, parse_args, parse_args_from};
pub use config::Settings;
pub use converter::{BatchSummary, ConversionJob, ConversionStatus, convert_all, convert_project};
pub use error::{ConvertError, ValidationError};
pub use generator::{GENERATED_MARKER, generate_cmake_lists};
pub use mappings::Mappings;
pub use parser::{parse_project_file, parse_vcproj_str, parse_vcxproj_str};
pub use writeback::{WriteOutcome, write_if_changed};
