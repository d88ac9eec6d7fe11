use std::time::Duration;

use ahash::AHashMap;
use policy_schema::{PolicyCatalogError, PolicyState, Situation};
use policy_store::{serialize_query, CodecConfig};
use serde_json::Value;
use thiserror::Error;
use tracing::{debug, warn};

use crate::endpoint::Endpoint;

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("HTTP status {status} from {url}")]
    Status { status: u16, url: String },
    #[error("request to {url} failed: {message}")]
    Network { url: String, message: String },
}

#[derive(Debug, Error)]
pub enum ClientError {
    #[error(transparent)]
    Transport(#[from] TransportError),
    #[error("malformed parameters payload: {0}")]
    Catalog(#[from] PolicyCatalogError),
}

/// The HTTP seam. Production uses [`UreqTransport`]; tests swap in an
/// in-memory implementation.
pub trait Transport {
    fn get(&self, url: &str) -> Result<Value, TransportError>;
    fn post_json(&self, url: &str, body: &Value) -> Result<Value, TransportError>;
}

pub struct UreqTransport {
    agent: ureq::Agent,
}

impl UreqTransport {
    pub fn new() -> Self {
        Self {
            // Population simulations routinely take tens of seconds.
            agent: ureq::AgentBuilder::new()
                .timeout(Duration::from_secs(60))
                .build(),
        }
    }
}

impl Default for UreqTransport {
    fn default() -> Self {
        Self::new()
    }
}

fn ureq_error(url: &str, err: ureq::Error) -> TransportError {
    match err {
        ureq::Error::Status(status, _) => TransportError::Status {
            status,
            url: url.to_string(),
        },
        ureq::Error::Transport(transport) => TransportError::Network {
            url: url.to_string(),
            message: transport.to_string(),
        },
    }
}

impl Transport for UreqTransport {
    fn get(&self, url: &str) -> Result<Value, TransportError> {
        let response = self
            .agent
            .get(url)
            .call()
            .map_err(|err| ureq_error(url, err))?;
        response.into_json().map_err(|err| TransportError::Network {
            url: url.to_string(),
            message: err.to_string(),
        })
    }

    fn post_json(&self, url: &str, body: &Value) -> Result<Value, TransportError> {
        let response = self
            .agent
            .post(url)
            .send_json(body)
            .map_err(|err| ureq_error(url, err))?;
        response.into_json().map_err(|err| TransportError::Network {
            url: url.to_string(),
            message: err.to_string(),
        })
    }
}

/// Handle for one outstanding request, issued by [`SequenceGate::begin`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RequestTicket {
    endpoint: Endpoint,
    seq: u64,
}

impl RequestTicket {
    pub fn endpoint(&self) -> Endpoint {
        self.endpoint
    }

    pub fn seq(&self) -> u64 {
        self.seq
    }
}

/// Monotonic per-endpoint sequence numbers. A response is only applied if
/// its ticket is still the newest for that endpoint, so a superseded
/// in-flight request can never overwrite newer state with stale results.
#[derive(Debug, Default)]
pub struct SequenceGate {
    latest: AHashMap<Endpoint, u64>,
    counter: u64,
}

impl SequenceGate {
    pub fn begin(&mut self, endpoint: Endpoint) -> RequestTicket {
        self.counter += 1;
        self.latest.insert(endpoint, self.counter);
        RequestTicket {
            endpoint,
            seq: self.counter,
        }
    }

    pub fn admits(&self, ticket: &RequestTicket) -> bool {
        self.latest.get(&ticket.endpoint).copied() == Some(ticket.seq)
    }
}

/// Display contract for one endpoint's results: loading indicator while
/// `Waiting`, generic error pane on `Failed`, results pane on `Ready`.
/// A failure is terminal for that request; there is no retry.
#[derive(Debug, Clone, Default, PartialEq)]
pub enum FetchState {
    #[default]
    Idle,
    Waiting,
    Ready(Value),
    Failed(String),
}

impl FetchState {
    pub fn is_ready(&self) -> bool {
        matches!(self, FetchState::Ready(_))
    }

    pub fn is_failed(&self) -> bool {
        matches!(self, FetchState::Failed(_))
    }

    pub fn results(&self) -> Option<&Value> {
        match self {
            FetchState::Ready(results) => Some(results),
            _ => None,
        }
    }
}

/// Everything the application start needs from the API, fetched in the
/// same parameters -> entities -> variables order the page load uses.
#[derive(Debug, Clone)]
pub struct BootstrapData {
    pub policy: PolicyState,
    pub entities: Value,
    pub variables: Value,
}

/// Client for the compute-impact endpoints, keyed by the serialized policy
/// diff and guarded against stale responses.
pub struct ImpactClient<T> {
    api_url: String,
    codec: CodecConfig,
    transport: T,
    gate: SequenceGate,
}

impl<T: Transport> ImpactClient<T> {
    pub fn new(api_url: impl Into<String>, transport: T) -> Self {
        let mut api_url = api_url.into();
        while api_url.ends_with('/') {
            api_url.pop();
        }
        Self {
            api_url,
            codec: CodecConfig::default(),
            transport,
            gate: SequenceGate::default(),
        }
    }

    pub fn with_codec(mut self, codec: CodecConfig) -> Self {
        self.codec = codec;
        self
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn endpoint_url(&self, endpoint: Endpoint) -> String {
        format!("{}{}", self.api_url, endpoint.path())
    }

    /// Endpoint URL carrying the reform diff as its query string.
    pub fn reform_url(&self, endpoint: Endpoint, state: &PolicyState) -> String {
        let query = serialize_query(state, &self.codec);
        if query.is_empty() {
            self.endpoint_url(endpoint)
        } else {
            format!("{}?{}", self.endpoint_url(endpoint), query)
        }
    }

    pub fn begin(&mut self, endpoint: Endpoint) -> RequestTicket {
        self.gate.begin(endpoint)
    }

    /// Apply a finished request's result. Returns `None` when a newer
    /// request for the same endpoint has superseded this ticket; the stale
    /// response is dropped.
    pub fn settle(
        &mut self,
        ticket: &RequestTicket,
        result: Result<Value, TransportError>,
    ) -> Option<FetchState> {
        if !self.gate.admits(ticket) {
            debug!(endpoint = %ticket.endpoint(), seq = ticket.seq(), "dropping stale response");
            return None;
        }
        Some(match result {
            Ok(results) => FetchState::Ready(results),
            Err(err) => {
                warn!(endpoint = %ticket.endpoint(), error = %err, "impact request failed");
                FetchState::Failed(err.to_string())
            }
        })
    }

    /// Synchronous fetch of one reform-keyed endpoint.
    pub fn fetch_reform(&mut self, endpoint: Endpoint, state: &PolicyState) -> FetchState {
        let ticket = self.begin(endpoint);
        let url = self.reform_url(endpoint, state);
        let result = self.transport.get(&url);
        self.settle(&ticket, result).unwrap_or_default()
    }

    /// Post the household to the calculate endpoint.
    pub fn calculate(&mut self, situation: &Situation) -> FetchState {
        let ticket = self.begin(Endpoint::Calculate);
        let url = self.endpoint_url(Endpoint::Calculate);
        let result = self.transport.post_json(&url, &situation.to_json_body());
        self.settle(&ticket, result).unwrap_or_default()
    }

    pub fn fetch_defaults(&self) -> Result<BootstrapData, ClientError> {
        let parameters = self.transport.get(&self.endpoint_url(Endpoint::Parameters))?;
        let policy = PolicyState::from_api_value(parameters)?;
        let entities = self.transport.get(&self.endpoint_url(Endpoint::Entities))?;
        let variables = self.transport.get(&self.endpoint_url(Endpoint::Variables))?;
        Ok(BootstrapData {
            policy,
            entities,
            variables,
        })
    }
}
