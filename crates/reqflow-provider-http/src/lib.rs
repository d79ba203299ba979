//! reqwest implementation of the reqflow data provider.
//!
//! Talks to a catalog-scoped REST API:
//!
//! - `POST {base}/eap/catalogs/{catalog}/requests/` submits a request
//! - `GET {base}/eap/catalogs/{catalog}/content/responses/?requestIdentifier={id}` polls
//! - `GET {base}/eap/catalogs/{catalog}/content/responses/{key}` downloads

mod api;
mod provider;

pub use provider::HttpDataProvider;
