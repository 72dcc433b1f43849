//! Data providers - built-in static provider and the field merge policy

use async_trait::async_trait;
use serde_json::Value;
use tracing::trace;

use contracts::{
    CodecError, Context, Data, DataProvider, DataProviderConfig, DistributorError, Submission,
};
use queue_data::data_from_plain;

/// Merge provided fields into `data`, honouring the provider's policy
///
/// - `mustExist`: only fields already present may be written
/// - `mustBeEmpty`: existing non-empty fields are left untouched
///
/// Returns the number of fields written.
pub fn merge_provided_fields(data: &mut Data, provided: Data, config: &DataProviderConfig) -> usize {
    let mut written = 0;
    for (field, value) in provided {
        let existing = data.get(&field);
        if config.must_exist && existing.is_none() {
            trace!(field = %field, "Provided field skipped, not present");
            continue;
        }
        if config.must_be_empty && existing.is_some_and(|current| !current.is_empty()) {
            trace!(field = %field, "Provided field skipped, not empty");
            continue;
        }
        data.insert(field, value);
        written += 1;
    }
    written
}

/// Provider adding fixed fields and context entries from its configuration
///
/// ```toml
/// [distributor.dataProviders.static]
/// enabled = true
/// fields = { source = "website" }
/// context = { campaign = "spring" }
/// ```
#[derive(Debug, Clone, Copy, Default)]
pub struct StaticDataProvider;

impl StaticDataProvider {
    pub const KEYWORD: &'static str = "static";

    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl DataProvider for StaticDataProvider {
    fn keyword(&self) -> &str {
        Self::KEYWORD
    }

    fn add_context(&self, context: &mut Context, config: &DataProviderConfig) {
        if let Some(Value::Object(entries)) = config.params.get("context") {
            for (key, value) in entries {
                context.set(key.clone(), value.clone());
            }
        }
    }

    async fn provide_fields(
        &self,
        _submission: &Submission,
        config: &DataProviderConfig,
    ) -> Result<Data, DistributorError> {
        match config.params.get("fields") {
            None | Some(Value::Null) => Ok(Data::new()),
            Some(fields) => data_from_plain(fields).map_err(|e: CodecError| {
                DistributorError::configuration(format!(
                    "invalid fields for data provider \"{}\": {e}",
                    Self::KEYWORD
                ))
            }),
        }
    }
}
