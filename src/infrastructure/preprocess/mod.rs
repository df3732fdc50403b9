//! Query preprocessing implementations

mod greeting;
mod llm_preprocessor;

pub use greeting::LlmGreetingDetector;
pub use llm_preprocessor::LlmQueryPreprocessor;
