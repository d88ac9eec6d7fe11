use std::env;
use std::process::ExitCode;

use tracing::info;

use policy_client::{Endpoint, FetchState, ImpactClient, UreqTransport};
use policy_schema::PolicyState;
use policy_store::{
    deserialize_query, serialize_query, validate, CodecConfig, DistinctThresholds, PolicyRule,
};

/// Decode a reform query string against the builtin parameter catalog,
/// report what it contains, and optionally submit it to a live API.
///
/// Usage: impact_probe "<query-string>" [api-url]
fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let mut args = env::args().skip(1);
    let query = args.next().unwrap_or_default();
    let api_url = args.next();

    let defaults = PolicyState::builtin();
    let codec = CodecConfig::default();
    let (state, report) = deserialize_query(&defaults, &query, &codec);
    for key in &report.unknown_keys {
        eprintln!("ignored unknown key: {key}");
    }
    for entry in &report.malformed {
        eprintln!("skipped malformed value: {}={}", entry.key, entry.payload);
    }

    let rules: Vec<Box<dyn PolicyRule>> = vec![Box::new(DistinctThresholds::new(
        "higher_threshold",
        "add_threshold",
    ))];
    let outcome = validate(&state, &rules);
    for parameter in outcome.state.active() {
        println!(
            "{}: {:?} (default {:?})",
            parameter.name, parameter.value, parameter.default_value
        );
        if let Some(error) = &parameter.error {
            println!("  ! {error}");
        }
    }
    println!("reform query: {}", serialize_query(&outcome.state, &codec));
    if !outcome.is_valid {
        eprintln!("policy is invalid; not submitting");
        return ExitCode::FAILURE;
    }

    let Some(api_url) = api_url else {
        return ExitCode::SUCCESS;
    };
    let mut client = ImpactClient::new(api_url, UreqTransport::new()).with_codec(codec);
    info!("requesting population impact");
    match client.fetch_reform(Endpoint::PopulationReform, &outcome.state) {
        FetchState::Ready(results) => {
            println!(
                "{}",
                serde_json::to_string_pretty(&results).unwrap_or_default()
            );
            ExitCode::SUCCESS
        }
        FetchState::Failed(message) => {
            eprintln!("something went wrong: {message}");
            ExitCode::FAILURE
        }
        FetchState::Idle | FetchState::Waiting => ExitCode::SUCCESS,
    }
}
