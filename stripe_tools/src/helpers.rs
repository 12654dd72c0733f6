/// Expands key/value pairs into the bracketed form-encoding the processor expects, e.g.
/// `metadata[order_id]=42`.
pub fn metadata_params(prefix: &str, metadata: &[(&str, &str)]) -> Vec<(String, String)> {
    metadata.iter().map(|(k, v)| (format!("{prefix}[{k}]"), (*v).to_string())).collect()
}
