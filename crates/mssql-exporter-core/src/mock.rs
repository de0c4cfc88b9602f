//! Scripted row source for tests.
//!
//! Scripts are matched by a substring of the executed query text, so tests
//! stay insensitive to whitespace changes in the SQL catalogue. Each script
//! holds a queue of responses; the last one repeats once the queue drains.

use std::collections::VecDeque;
use std::sync::Mutex;
use std::time::Duration;

use futures::FutureExt;
use futures::future::BoxFuture;
use tokio::time::{Instant, timeout_at};

use crate::error::ScrapeError;
use crate::row::{Row, RowSource};

type ScriptedResult = Result<Vec<Row>, ScrapeError>;

struct Script {
    needle: &'static str,
    responses: VecDeque<ScriptedResult>,
}

/// Row source returning canned results.
#[derive(Default)]
pub struct MockSource {
    scripts: Mutex<Vec<Script>>,
    delay: Option<Duration>,
}

impl MockSource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queues `rows` for the next query containing `needle`.
    pub fn on(self, needle: &'static str, rows: Vec<Row>) -> Self {
        self.push(needle, Ok(rows));
        self
    }

    /// Queues a failure for the next query containing `needle`.
    pub fn on_err(self, needle: &'static str, err: ScrapeError) -> Self {
        self.push(needle, Err(err));
        self
    }

    /// Sleeps before answering, to exercise deadline handling.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    fn push(&self, needle: &'static str, result: ScriptedResult) {
        let mut scripts = self.scripts.lock().unwrap();
        if let Some(script) = scripts.iter_mut().find(|s| s.needle == needle) {
            script.responses.push_back(result);
        } else {
            scripts.push(Script {
                needle,
                responses: VecDeque::from([result]),
            });
        }
    }

    fn answer(&self, query: &str) -> ScriptedResult {
        let mut scripts = self.scripts.lock().unwrap();
        let Some(script) = scripts.iter_mut().find(|s| query.contains(s.needle)) else {
            return Err(ScrapeError::QueryFailed {
                query: query.to_string(),
                message: "no scripted response".to_string(),
            });
        };
        if script.responses.len() > 1 {
            script.responses.pop_front().unwrap()
        } else {
            script.responses.front().cloned().unwrap_or_else(|| {
                Err(ScrapeError::QueryFailed {
                    query: query.to_string(),
                    message: "script exhausted".to_string(),
                })
            })
        }
    }
}

impl RowSource for MockSource {
    fn execute<'a>(
        &'a self,
        deadline: Instant,
        query: &'a str,
    ) -> BoxFuture<'a, Result<Vec<Row>, ScrapeError>> {
        async move {
            if let Some(delay) = self.delay {
                if timeout_at(deadline, tokio::time::sleep(delay)).await.is_err() {
                    return Err(ScrapeError::Cancelled {
                        query: query.to_string(),
                    });
                }
            }
            self.answer(query)
        }
        .boxed()
    }
}
