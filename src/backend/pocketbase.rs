use async_trait::async_trait;
use color_eyre::{eyre::eyre, Result};
use reqwest::{Method, RequestBuilder, Response};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock};
use tokio::sync::oneshot;
use tracing::debug;
use url::Url;

use super::api_types::{ApiAuthRequest, ApiAuthResponse, ApiErrorResponse, ApiListResponse};
use super::Transport;
use crate::config::BackendConfig;
use crate::sync::{FetchError, Identity};

/// Pending list requests by collection: request id and its cancel switch
type PendingLists = HashMap<String, (u64, oneshot::Sender<()>)>;

/// HTTP client for a PocketBase-style record store.
///
/// A new list request for a collection cancels the previous one that is
/// still pending for the same collection; the older request then fails with
/// [`FetchError::Cancelled`].
#[derive(Clone)]
pub struct PocketBaseClient {
  http: reqwest::Client,
  base: Url,
  page_size: u32,
  token: Arc<RwLock<Option<String>>>,
  pending: Arc<Mutex<PendingLists>>,
  next_request: Arc<AtomicU64>,
}

impl PocketBaseClient {
  pub fn new(config: &BackendConfig) -> Result<Self> {
    let mut base = Url::parse(&config.url)
      .map_err(|e| eyre!("Invalid backend url {}: {}", config.url, e))?;
    if !base.path().ends_with('/') {
      let path = format!("{}/", base.path());
      base.set_path(&path);
    }

    let http = reqwest::Client::builder()
      .build()
      .map_err(|e| eyre!("Failed to create HTTP client: {}", e))?;

    Ok(Self {
      http,
      base,
      page_size: config.page_size,
      token: Arc::new(RwLock::new(None)),
      pending: Arc::new(Mutex::new(HashMap::new())),
      next_request: Arc::new(AtomicU64::new(0)),
    })
  }

  fn endpoint(&self, collection: &str, path: &str) -> Result<Url, FetchError> {
    self
      .base
      .join(path)
      .map_err(|e| failed(collection, None, format!("invalid endpoint {}: {}", path, e)))
  }

  fn request(&self, method: Method, url: Url) -> RequestBuilder {
    let request = self.http.request(method, url);
    let token = self
      .token
      .read()
      .unwrap_or_else(PoisonError::into_inner)
      .clone();
    match token {
      Some(token) => request.bearer_auth(token),
      None => request,
    }
  }

  fn pending(&self) -> MutexGuard<'_, PendingLists> {
    self.pending.lock().unwrap_or_else(PoisonError::into_inner)
  }

  /// Register a list request for `collection`, cancelling the one before it.
  fn register(&self, collection: &str) -> (u64, oneshot::Receiver<()>) {
    let id = self.next_request.fetch_add(1, Ordering::SeqCst);
    let (tx, rx) = oneshot::channel();
    if let Some((previous, cancel)) = self.pending().insert(collection.to_string(), (id, tx)) {
      debug!(collection, request = previous, "cancelling duplicate list request");
      let _ = cancel.send(());
    }
    (id, rx)
  }

  fn release(&self, collection: &str, id: u64) {
    let mut pending = self.pending();
    if pending.get(collection).is_some_and(|(current, _)| *current == id) {
      pending.remove(collection);
    }
  }

  async fn list_pages(
    &self,
    collection: &str,
    filter: &str,
    sort: Option<&str>,
  ) -> Result<Vec<Value>, FetchError> {
    let url = self.endpoint(collection, &format!("api/collections/{}/records", collection))?;
    let mut records = Vec::new();
    let mut page = 1u32;

    loop {
      let mut query = vec![
        ("page", page.to_string()),
        ("perPage", self.page_size.to_string()),
      ];
      if !filter.is_empty() {
        query.push(("filter", filter.to_string()));
      }
      if let Some(sort) = sort {
        query.push(("sort", sort.to_string()));
      }

      let response = send(collection, self.request(Method::GET, url.clone()).query(&query)).await?;
      let body: ApiListResponse = json(collection, response).await?;
      let last = body.is_last();
      records.extend(body.items);

      if last {
        break;
      }
      page += 1;
    }

    debug!(collection, pages = page, count = records.len(), "listed records");
    Ok(records)
  }
}

#[async_trait]
impl Transport for PocketBaseClient {
  async fn authenticate(&self, email: &str, password: &str) -> Result<Identity, FetchError> {
    let url = self.endpoint("users", "api/collections/users/auth-with-password")?;
    let body = ApiAuthRequest {
      identity: email,
      password,
    };
    let response = send("users", self.request(Method::POST, url).json(&body)).await?;
    let auth: ApiAuthResponse = json("users", response).await?;

    *self.token.write().unwrap_or_else(PoisonError::into_inner) = Some(auth.token);
    Ok(Identity::new(auth.record.id))
  }

  async fn list(
    &self,
    collection: &str,
    filter: &str,
    sort: Option<&str>,
  ) -> Result<Vec<Value>, FetchError> {
    let (id, cancelled) = self.register(collection);
    let result = tokio::select! {
      result = self.list_pages(collection, filter, sort) => result,
      _ = cancelled => Err(FetchError::Cancelled {
        collection: collection.to_string(),
      }),
    };
    self.release(collection, id);
    result
  }

  async fn create(&self, collection: &str, record: Value) -> Result<Value, FetchError> {
    let url = self.endpoint(collection, &format!("api/collections/{}/records", collection))?;
    let response = send(collection, self.request(Method::POST, url).json(&record)).await?;
    json(collection, response).await
  }

  async fn update(&self, collection: &str, id: &str, record: Value) -> Result<Value, FetchError> {
    let url = self.endpoint(
      collection,
      &format!("api/collections/{}/records/{}", collection, id),
    )?;
    let response = send(collection, self.request(Method::PATCH, url).json(&record)).await?;
    json(collection, response).await
  }

  async fn delete(&self, collection: &str, id: &str) -> Result<(), FetchError> {
    let url = self.endpoint(
      collection,
      &format!("api/collections/{}/records/{}", collection, id),
    )?;
    send(collection, self.request(Method::DELETE, url)).await?;
    Ok(())
  }
}

fn failed(collection: &str, status: Option<u16>, message: impl Into<String>) -> FetchError {
  FetchError::Transport {
    collection: collection.to_string(),
    status,
    message: message.into(),
  }
}

/// Send a request and turn non-success statuses into transport errors.
async fn send(collection: &str, request: RequestBuilder) -> Result<Response, FetchError> {
  let response = request
    .send()
    .await
    .map_err(|e| failed(collection, e.status().map(|s| s.as_u16()), e.to_string()))?;

  let status = response.status();
  if status.is_success() {
    return Ok(response);
  }

  let body: ApiErrorResponse = response.json().await.unwrap_or_default();
  let message = if body.message.is_empty() {
    status.to_string()
  } else {
    body.message
  };
  Err(failed(collection, Some(status.as_u16()), message))
}

async fn json<T: serde::de::DeserializeOwned>(
  collection: &str,
  response: Response,
) -> Result<T, FetchError> {
  let status = response.status().as_u16();
  response
    .json()
    .await
    .map_err(|e| failed(collection, Some(status), format!("unreadable response: {}", e)))
}
