pub mod catalog;
pub mod interactions;
pub mod learners;
pub mod model_versions;
pub mod responses;

pub(crate) fn decode_json<T: serde::de::DeserializeOwned>(
    column: &str,
    raw: &str,
) -> Result<T, sqlx::Error> {
    serde_json::from_str(raw).map_err(|source| sqlx::Error::ColumnDecode {
        index: column.to_string(),
        source: Box::new(source),
    })
}

pub(crate) fn encode_json<T: serde::Serialize>(value: &T) -> Result<String, sqlx::Error> {
    serde_json::to_string(value).map_err(|e| sqlx::Error::Encode(Box::new(e)))
}
