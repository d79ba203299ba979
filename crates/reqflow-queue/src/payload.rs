//! Provider data request construction.

use serde_json::{json, Value};

use crate::record::{RequestRecord, DEFAULT_REQUEST_PRIORITY};

/// Describes a data request before it is turned into a queue record.
#[derive(Debug, Clone)]
pub struct DataRequestSpec {
    pub request_name: String,
    pub title: String,
    pub identifier_type: String,
    pub identifiers: Vec<String>,
    pub fields: Vec<String>,
    pub output_format: String,
    pub priority: i64,
    pub max_retries: u32,
}

impl DataRequestSpec {
    /// Create a spec with CUSIP identifiers, CSV output and default priority.
    pub fn new(request_name: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            request_name: request_name.into(),
            title: title.into(),
            identifier_type: "CUSIP".to_string(),
            identifiers: Vec::new(),
            fields: Vec::new(),
            output_format: "text/csv".to_string(),
            priority: DEFAULT_REQUEST_PRIORITY,
            max_retries: 3,
        }
    }

    pub fn with_identifiers(
        mut self,
        identifier_type: impl Into<String>,
        identifiers: impl IntoIterator<Item = impl Into<String>>,
    ) -> Self {
        self.identifier_type = identifier_type.into();
        self.identifiers = identifiers.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_fields(mut self, fields: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.fields = fields.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_output_format(mut self, format: impl Into<String>) -> Self {
        self.output_format = format.into();
        self
    }

    pub fn with_priority(mut self, priority: i64) -> Self {
        self.priority = priority;
        self
    }

    pub fn with_max_retries(mut self, max: u32) -> Self {
        self.max_retries = max;
        self
    }

    /// Build the queue record, filling in the provider payload.
    pub fn into_record(self) -> RequestRecord {
        let mut record = RequestRecord::data_request(self.request_name.clone(), Value::Null)
            .with_priority(self.priority)
            .with_max_retries(self.max_retries);
        record.payload = self.payload(&record.identifier);
        record
    }

    fn payload(&self, identifier: &str) -> Value {
        let universe: Vec<Value> = self
            .identifiers
            .iter()
            .map(|value| {
                json!({
                    "@type": "Identifier",
                    "identifierType": self.identifier_type,
                    "identifierValue": value,
                })
            })
            .collect();
        let fields: Vec<Value> = self
            .fields
            .iter()
            .map(|field| json!({ "mnemonic": field }))
            .collect();

        json!({
            "@type": "DataRequest",
            "name": self.request_name,
            "identifier": identifier,
            "title": self.title,
            "universe": { "@type": "Universe", "contains": universe },
            "fieldList": { "@type": "DataFieldList", "contains": fields },
            "trigger": { "@type": "SubmitTrigger" },
            "formatting": { "@type": "MediaType", "outputMediaType": self.output_format },
        })
    }
}
