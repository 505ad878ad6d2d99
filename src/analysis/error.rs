/// Failures of the aggregation core. Both are raised before any aggregation runs: rule sets are
/// validated when built, limits when a range is summarized.
#[derive(Debug, thiserror::Error)]
pub enum AnalysisError {
    #[error("category rule #{index} has an invalid pattern `{pattern}`")]
    Configuration {
        index: usize,
        pattern: String,
        #[source]
        source: regex::Error,
    },
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
}
