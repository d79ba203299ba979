//! Request builder collaborator for data-pull command tokens.

use std::collections::HashMap;

use tracing::debug;

use reqflow_config::RequestTemplate;
use reqflow_queue::{DataRequestSpec, RequestRecord};

/// Turns a data-pull command token into a data request.
pub trait RequestBuilder: Send + Sync {
    /// `None` when the token is unknown.
    fn build(&self, command: &str) -> Option<RequestRecord>;
}

/// Builder that knows no tokens.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopRequestBuilder;

impl RequestBuilder for NoopRequestBuilder {
    fn build(&self, _command: &str) -> Option<RequestRecord> {
        None
    }
}

/// Builds requests from configured templates.
#[derive(Debug, Clone)]
pub struct TemplateRequestBuilder {
    templates: HashMap<String, RequestTemplate>,
    max_retries: u32,
}

impl TemplateRequestBuilder {
    /// Templates are keyed by their command, case-insensitively.
    pub fn new(templates: impl IntoIterator<Item = RequestTemplate>, max_retries: u32) -> Self {
        let templates = templates
            .into_iter()
            .map(|t| (t.command.trim().to_uppercase(), t))
            .collect();
        Self {
            templates,
            max_retries,
        }
    }

    pub fn len(&self) -> usize {
        self.templates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.templates.is_empty()
    }
}

impl RequestBuilder for TemplateRequestBuilder {
    fn build(&self, command: &str) -> Option<RequestRecord> {
        let template = self.templates.get(&command.trim().to_uppercase())?;
        let record = DataRequestSpec::new(&template.request_name, &template.title)
            .with_identifiers(&template.identifier_type, &template.identifiers)
            .with_fields(&template.fields)
            .with_output_format(&template.output_format)
            .with_priority(template.priority)
            .with_max_retries(self.max_retries)
            .into_record();
        debug!("Built {} from template {}", record.identifier, command);
        Some(record)
    }
}
