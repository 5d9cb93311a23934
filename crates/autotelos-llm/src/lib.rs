//! Autotelos LLM - Rate-limited generation client and response parsing

pub mod client;
pub mod limiter;
pub mod mock;
pub mod parse;
pub mod provider;
pub mod types;

pub use client::{GenerationClient, GenerationConfig};
pub use limiter::RateLimiter;
pub use mock::{RecordedCall, Reply, ScriptedGenerator};
pub use parse::{extract_payload, parse_json, strip_code_fences, ParseError, Payload, PayloadKind};
pub use provider::{GenerateOptions, Generator, LlmError, LlmResult};
pub use types::*;
