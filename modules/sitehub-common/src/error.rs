use thiserror::Error;

#[derive(Error, Debug)]
pub enum HubError {
    /// No registered tenant matches the presented credential.
    /// The only failure ever surfaced to a profile consumer.
    #[error("credential not found")]
    CredentialNotFound,

    /// A single sub-resource fetch failed. Recovered locally, logged only.
    #[error("upstream unavailable: {0}")]
    UpstreamUnavailable(String),

    /// Upstream answered with something that isn't an object document.
    /// Treated identically to UpstreamUnavailable.
    #[error("malformed upstream payload: {0}")]
    MalformedUpstreamPayload(String),

    /// Both the primary and supplemental aggregation sources came back empty.
    #[error("no data available from any aggregation source")]
    TotalAggregationFailure,

    #[error(transparent)]
    Anyhow(#[from] anyhow::Error),
}
