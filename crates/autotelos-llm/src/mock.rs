//! ScriptedGenerator: deterministic generation for tests and dry runs
//!
//! Each call pops the next scripted reply. When the script is exhausted the
//! responder (if any) decides, otherwise the call fails with `EmptyResponse`.

use crate::provider::{GenerateOptions, Generator, LlmError, LlmResult};
use std::collections::VecDeque;
use std::sync::Mutex;

/// A scripted reply.
#[derive(Clone, Debug)]
pub enum Reply {
    Text(String),
    /// Fails the call with `LlmError::Http { status: 500, .. }`.
    Fail(String),
}

type Responder = Box<dyn Fn(&str) -> LlmResult<String> + Send + Sync>;

/// A recorded call.
#[derive(Clone, Debug)]
pub struct RecordedCall {
    pub prompt: String,
    pub options: GenerateOptions,
}

pub struct ScriptedGenerator {
    replies: Mutex<VecDeque<Reply>>,
    responder: Option<Responder>,
    calls: Mutex<Vec<RecordedCall>>,
}

impl ScriptedGenerator {
    /// Replies consumed in order.
    pub fn sequence<I, S>(replies: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            replies: Mutex::new(replies.into_iter().map(|r| Reply::Text(r.into())).collect()),
            responder: None,
            calls: Mutex::new(Vec::new()),
        }
    }

    /// Mixed text and failure replies consumed in order.
    pub fn replies(replies: Vec<Reply>) -> Self {
        Self {
            replies: Mutex::new(replies.into()),
            responder: None,
            calls: Mutex::new(Vec::new()),
        }
    }

    /// Every call answered by a function of the prompt.
    pub fn responder<F>(f: F) -> Self
    where
        F: Fn(&str) -> LlmResult<String> + Send + Sync + 'static,
    {
        Self {
            replies: Mutex::new(VecDeque::new()),
            responder: Some(Box::new(f)),
            calls: Mutex::new(Vec::new()),
        }
    }

    /// Every call fails.
    pub fn failing(message: impl Into<String>) -> Self {
        let message = message.into();
        Self::responder(move |_| {
            Err(LlmError::Http {
                status: 500,
                body: message.clone(),
            })
        })
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().map(|c| c.len()).unwrap_or(0)
    }

    pub fn calls(&self) -> Vec<RecordedCall> {
        self.calls.lock().map(|c| c.clone()).unwrap_or_default()
    }
}

#[async_trait::async_trait]
impl Generator for ScriptedGenerator {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn generate(&self, prompt: &str, options: GenerateOptions) -> LlmResult<String> {
        if let Ok(mut calls) = self.calls.lock() {
            calls.push(RecordedCall {
                prompt: prompt.to_string(),
                options,
            });
        }

        let next = self.replies.lock().ok().and_then(|mut r| r.pop_front());
        match next {
            Some(Reply::Text(text)) => Ok(text),
            Some(Reply::Fail(body)) => Err(LlmError::Http { status: 500, body }),
            None => match &self.responder {
                Some(respond) => respond(prompt),
                None => Err(LlmError::EmptyResponse),
            },
        }
    }
}
