//! Caller-side contract for the remote simulation API: the endpoint
//! catalogue, a swappable HTTP transport, and the fetch cycle with a
//! stale-response sequence gate.

mod client;
mod endpoint;

pub use client::{
    BootstrapData, ClientError, FetchState, ImpactClient, RequestTicket, SequenceGate, Transport,
    TransportError, UreqTransport,
};
pub use endpoint::Endpoint;
