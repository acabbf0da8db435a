//! Test doubles for engine consumers.
//!
//! Adapters test their navigation routines against a [`ScriptedTransport`]
//! instead of a live site, and the retry machinery is exercised with
//! [`ScriptedProducer`] runs. Both are deliberately deterministic: the
//! engine's correctness properties are about ordering and replay, so the
//! doubles replay the exact same data unless a test says otherwise.

use async_trait::async_trait;
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};

use crate::error::{SessionError, TransportError};
use crate::resume::Producer;
use crate::transport::{Request, Response, Transport};

// ============================================================================
// Scripted Transport
// ============================================================================

/// Factory for injected transport failures.
type FailureFactory = Box<dyn Fn() -> TransportError + Send + Sync>;

struct Route {
    url: String,
    form_contains: Option<(String, String)>,
    final_url: String,
    body: String,
}

/// A transport answering from a canned route table.
///
/// Routes are matched in registration order on the request URL and,
/// optionally, on one form parameter (stateful sites multiplex many
/// logical pages behind one POST endpoint). Unrouted requests answer
/// 404 with an empty body, which classifies as an unknown page.
#[derive(Default)]
pub struct ScriptedTransport {
    routes: Vec<Route>,
    failures: Mutex<HashMap<String, VecDeque<FailureFactory>>>,
    log: Mutex<Vec<Request>>,
}

impl ScriptedTransport {
    /// Creates a transport with no routes.
    pub fn new() -> Self {
        Self::default()
    }

    /// Routes `url` to a 200 response with `body`.
    #[must_use]
    pub fn on(self, url: impl Into<String>, body: impl Into<String>) -> Self {
        let url = url.into();
        let final_url = url.clone();
        self.route(url, None, final_url, body.into())
    }

    /// Routes `url` to a 200 response landing on `final_url` (redirect).
    #[must_use]
    pub fn on_to(
        self,
        url: impl Into<String>,
        final_url: impl Into<String>,
        body: impl Into<String>,
    ) -> Self {
        self.route(url.into(), None, final_url.into(), body.into())
    }

    /// Routes `url` to `body` only when the form contains `key=value`.
    #[must_use]
    pub fn on_form(
        self,
        url: impl Into<String>,
        key: impl Into<String>,
        value: impl Into<String>,
        body: impl Into<String>,
    ) -> Self {
        let url = url.into();
        let final_url = url.clone();
        self.route(url, Some((key.into(), value.into())), final_url, body.into())
    }

    /// Like [`Self::on_form`], with an explicit landing URL.
    #[must_use]
    pub fn on_form_to(
        self,
        url: impl Into<String>,
        key: impl Into<String>,
        value: impl Into<String>,
        final_url: impl Into<String>,
        body: impl Into<String>,
    ) -> Self {
        self.route(
            url.into(),
            Some((key.into(), value.into())),
            final_url.into(),
            body.into(),
        )
    }

    fn route(
        mut self,
        url: String,
        form_contains: Option<(String, String)>,
        final_url: String,
        body: String,
    ) -> Self {
        self.routes.push(Route {
            url,
            form_contains,
            final_url,
            body,
        });
        self
    }

    /// Makes the next request to `url` fail with the produced error.
    ///
    /// Repeated calls queue further one-shot failures for the same URL.
    #[must_use]
    pub fn fail_once(
        self,
        url: impl Into<String>,
        factory: impl Fn() -> TransportError + Send + Sync + 'static,
    ) -> Self {
        self.failures
            .lock()
            .expect("failure table poisoned")
            .entry(url.into())
            .or_default()
            .push_back(Box::new(factory));
        self
    }

    /// Returns the URLs requested so far, in order.
    pub fn requested_urls(&self) -> Vec<String> {
        self.log
            .lock()
            .expect("request log poisoned")
            .iter()
            .map(|r| r.url.clone())
            .collect()
    }
}

#[async_trait]
impl Transport for ScriptedTransport {
    async fn send(&self, req: &Request) -> Result<Response, TransportError> {
        self.log.lock().expect("request log poisoned").push(req.clone());

        if let Some(queue) = self
            .failures
            .lock()
            .expect("failure table poisoned")
            .get_mut(&req.url)
        {
            if let Some(factory) = queue.pop_front() {
                return Err(factory());
            }
        }

        let hit = self.routes.iter().find(|r| {
            r.url == req.url
                && r.form_contains.as_ref().is_none_or(|(k, v)| {
                    req.form.iter().any(|(fk, fv)| fk == k && fv == v)
                })
        });

        Ok(match hit {
            Some(r) => Response {
                url: r.final_url.clone(),
                status: 200,
                body: r.body.clone(),
            },
            None => Response {
                url: req.url.clone(),
                status: 404,
                body: String::new(),
            },
        })
    }
}

// ============================================================================
// Scripted Producer
// ============================================================================

/// One step of a scripted producer run.
pub enum Step<T> {
    /// Yield a record.
    Yield(T),
    /// Fail with the produced error.
    Fail(Box<dyn Fn() -> SessionError + Send + Sync>),
}

impl<T> Step<T> {
    /// Convenience constructor for a failure step.
    pub fn fail(factory: impl Fn() -> SessionError + Send + Sync + 'static) -> Self {
        Self::Fail(Box::new(factory))
    }
}

/// A producer that plays back a fixed script, then ends.
pub struct ScriptedProducer<T> {
    steps: VecDeque<Step<T>>,
}

impl<T> ScriptedProducer<T> {
    /// Creates a producer from a script.
    pub fn new(steps: Vec<Step<T>>) -> Self {
        Self {
            steps: steps.into(),
        }
    }
}

#[async_trait]
impl<T: Send> Producer<T> for ScriptedProducer<T> {
    async fn next(&mut self) -> Result<Option<T>, SessionError> {
        match self.steps.pop_front() {
            None => Ok(None),
            Some(Step::Yield(item)) => Ok(Some(item)),
            Some(Step::Fail(factory)) => Err(factory()),
        }
    }
}

/// Builds a producer factory that plays one script per attempt.
///
/// The first factory invocation consumes the first script, the second the
/// next, and so on; once exhausted, further invocations produce a run that
/// ends immediately. Tracks invocations for budget assertions.
pub struct ScriptedRuns<T> {
    runs: Arc<Mutex<VecDeque<Vec<Step<T>>>>>,
    invocations: Arc<Mutex<u32>>,
}

impl<T: Send + 'static> ScriptedRuns<T> {
    /// Creates a run sequence.
    pub fn new(runs: Vec<Vec<Step<T>>>) -> Self {
        Self {
            runs: Arc::new(Mutex::new(runs.into())),
            invocations: Arc::new(Mutex::new(0)),
        }
    }

    /// Returns how many times the factory has been invoked.
    pub fn invocations(&self) -> u32 {
        *self.invocations.lock().expect("counter poisoned")
    }

    /// Returns the factory closure to hand to the engine.
    pub fn factory(&self) -> impl FnMut() -> Box<dyn Producer<T> + Send> + Send + use<T> {
        let runs = Arc::clone(&self.runs);
        let invocations = Arc::clone(&self.invocations);
        move || {
            *invocations.lock().expect("counter poisoned") += 1;
            let steps = runs
                .lock()
                .expect("runs poisoned")
                .pop_front()
                .unwrap_or_default();
            Box::new(ScriptedProducer::new(steps))
        }
    }
}
