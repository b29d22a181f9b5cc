//! Fetch interception policy
//!
//! The policy is a pure function of what has been observed so far: it names
//! the next lookup to perform, or the verdict once it has seen enough. The
//! worker performs the lookups and feeds the results back.

use http::Method;
use lovevibes_fetch::{FetchRequest, FetchResponse, ResponseType};

use crate::cache::FetchPolicy;
use crate::config::OfflineConfig;
use crate::tasks::WaitUntil;

/// What the interceptor answers a request with
#[derive(Debug, Clone)]
pub enum Action {
    /// Response found in the current cache generation
    ServeCached(FetchResponse),
    /// Live network response, stored in the background when `cache_copy`
    ServeNetwork {
        response: FetchResponse,
        cache_copy: bool,
    },
    /// The cached default page
    ServeFallback(FetchResponse),
    /// Not intercepted; the request goes to the network untouched
    PassThrough,
    /// Intercepted but nothing to answer with
    NoOp,
}

impl Action {
    pub fn kind(&self) -> &'static str {
        match self {
            Action::ServeCached(_) => "cache_hit",
            Action::ServeNetwork { .. } => "network",
            Action::ServeFallback(_) => "fallback",
            Action::PassThrough => "pass_through",
            Action::NoOp => "no_response",
        }
    }
}

/// The answer to a fetch event plus the work it left running
pub struct FetchOutcome {
    pub action: Action,
    pub wait_until: WaitUntil,
}

/// Final decision, without the response payload
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    ServeCached,
    ServeNetwork { cache_copy: bool },
    ServeFallback,
    NoOp,
}

/// Next thing the interceptor needs
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    LookupCache,
    FetchNetwork,
    LookupFallback,
    Respond(Verdict),
}

/// Results gathered while handling one request
///
/// `None` means "not attempted yet".
#[derive(Debug, Default)]
pub struct Observations {
    pub cached: Option<Option<FetchResponse>>,
    pub network: Option<Result<FetchResponse, String>>,
    pub fallback: Option<Option<FetchResponse>>,
}

impl Observations {
    /// Turn a verdict into the action carrying the matching response
    ///
    /// Falls back to `NoOp` if the verdict names a response that was never
    /// observed.
    pub fn into_action(self, verdict: Verdict) -> Action {
        match verdict {
            Verdict::ServeCached => match self.cached.flatten() {
                Some(response) => Action::ServeCached(response),
                None => Action::NoOp,
            },
            Verdict::ServeNetwork { cache_copy } => match self.network {
                Some(Ok(response)) => Action::ServeNetwork {
                    response,
                    cache_copy,
                },
                _ => Action::NoOp,
            },
            Verdict::ServeFallback => match self.fallback.flatten() {
                Some(response) => Action::ServeFallback(response),
                None => Action::NoOp,
            },
            Verdict::NoOp => Action::NoOp,
        }
    }
}

/// Whether the interceptor handles this request at all
///
/// Only GET requests are intercepted, and never those to denylisted
/// third-party services.
pub fn should_intercept(request: &FetchRequest, config: &OfflineConfig) -> bool {
    request.method == Method::GET && !config.is_denied(&request.url)
}

/// Whether a network response may be stored in the cache
///
/// Only complete same-origin responses are kept.
pub fn is_cacheable(response: &FetchResponse) -> bool {
    response.status == 200 && response.response_type == ResponseType::Basic
}

/// Decide the next step for an intercepted request
pub fn next_step(policy: FetchPolicy, request: &FetchRequest, seen: &Observations) -> Step {
    match policy {
        FetchPolicy::CacheFirst => {
            match &seen.cached {
                None => return Step::LookupCache,
                Some(Some(_)) => return Step::Respond(Verdict::ServeCached),
                Some(None) => {}
            }
            match &seen.network {
                None => Step::FetchNetwork,
                Some(Ok(response)) => Step::Respond(Verdict::ServeNetwork {
                    cache_copy: is_cacheable(response),
                }),
                Some(Err(_)) if request.is_navigation() => fallback_step(seen),
                Some(Err(_)) => Step::Respond(Verdict::NoOp),
            }
        }
        FetchPolicy::NetworkFirst => {
            match &seen.network {
                None => return Step::FetchNetwork,
                Some(Ok(response)) => {
                    return Step::Respond(Verdict::ServeNetwork {
                        cache_copy: is_cacheable(response),
                    });
                }
                Some(Err(_)) => {}
            }
            match &seen.cached {
                None => Step::LookupCache,
                Some(Some(_)) => Step::Respond(Verdict::ServeCached),
                Some(None) if request.accepts_html() || request.is_navigation() => {
                    fallback_step(seen)
                }
                Some(None) => Step::Respond(Verdict::NoOp),
            }
        }
    }
}

fn fallback_step(seen: &Observations) -> Step {
    match &seen.fallback {
        None => Step::LookupFallback,
        Some(Some(_)) => Step::Respond(Verdict::ServeFallback),
        Some(None) => Step::Respond(Verdict::NoOp),
    }
}
