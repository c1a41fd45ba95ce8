//! Call chains: several calls issued as one, results threaded through.

use htrpc_transport::RpcError;
use serde_json::{Map, Value};
use tracing::debug;

use crate::client::Client;
use crate::service::MULTI_CALL;

/// One call in a [`Chain`]. `Value::Null` data means "use the previous
/// result".
#[derive(Debug, Clone, PartialEq)]
pub struct ChainLink {
    pub service: String,
    pub method: String,
    pub data: Value,
}

/// A call chain started by [`Client::chain`].
#[derive(Debug, Clone)]
pub struct Chain {
    client: Client,
    links: Vec<ChainLink>,
}

impl Chain {
    pub(crate) fn new(client: Client, service: &str, method: &str, data: Value) -> Self {
        Self {
            client,
            links: Vec::new(),
        }
        .chain(service, method, data)
    }

    pub fn chain(mut self, service: &str, method: &str, data: Value) -> Self {
        self.links.push(ChainLink {
            service: service.to_string(),
            method: method.to_string(),
            data,
        });
        self
    }

    pub fn links(&self) -> &[ChainLink] {
        &self.links
    }

    /// Run the chain and return the last result.
    ///
    /// Consecutive links on the same service form a group. A group of one
    /// link is a plain call; a larger group is sent as one `$htMultiCall`.
    /// A link without data receives the previous result, across groups
    /// too. The first failure ends the chain and is reported with the
    /// service and the method that was issued.
    pub async fn end(self) -> Result<Value, RpcError> {
        let mut last = Value::Null;
        for group in groups(&self.links) {
            let (method, data) = match group {
                [link] => (link.method.clone(), or_previous(&link.data, &last)),
                links => (MULTI_CALL.to_string(), multi_call_entries(links, &last)),
            };
            let service = group[0].service.as_str();
            debug!(service, method = %method, links = group.len(), "chain step");

            last = self
                .client
                .call(service, &method, data)
                .await
                .map_err(|error| RpcError::MultiCall {
                    error: Box::new(error),
                    method: method.clone(),
                    service: Some(service.to_string()),
                })?;
        }
        Ok(last)
    }
}

/// Split links into runs of consecutive links on the same service.
fn groups(links: &[ChainLink]) -> Vec<&[ChainLink]> {
    let mut groups = Vec::new();
    let mut start = 0;
    for index in 1..=links.len() {
        if index == links.len() || links[index].service != links[start].service {
            groups.push(&links[start..index]);
            start = index;
        }
    }
    groups
}

fn or_previous(data: &Value, previous: &Value) -> Value {
    if data.is_null() {
        previous.clone()
    } else {
        data.clone()
    }
}

fn multi_call_entries(links: &[ChainLink], previous: &Value) -> Value {
    let entries = links
        .iter()
        .enumerate()
        .map(|(index, link)| {
            let data = if index == 0 {
                or_previous(&link.data, previous)
            } else {
                link.data.clone()
            };
            let mut entry = Map::new();
            entry.insert("method".to_string(), Value::String(link.method.clone()));
            if !data.is_null() {
                entry.insert("data".to_string(), data);
            }
            Value::Object(entry)
        })
        .collect();
    Value::Array(entries)
}
