use std::{sync::Arc, time::Duration};

use dashmap::DashMap;
use futures::{StreamExt, future::BoxFuture, stream::BoxStream};
use reqwest::{Client, header::ACCEPT};
use serde::Deserialize;
use serde_json::{Map, Value};
use tokio::{
    sync::broadcast::{self, error::RecvError},
    task::JoinHandle,
    time::sleep,
};
use tracing::{debug, info, warn};

use crate::store::{
    FieldUpdates, MatchStore,
    error::StorageResult,
    remove_at_path, write_at_path,
};

use super::{
    config::RtdbConfig,
    error::{RtdbError, RtdbResult},
};

/// Snapshots buffered per subscriber before old ones are dropped.
const FEED_CAPACITY: usize = 64;
/// Initial delay before reconnecting a dropped event feed.
const RECONNECT_INITIAL: Duration = Duration::from_secs(1);
/// Upper bound for the reconnect backoff.
const RECONNECT_MAX: Duration = Duration::from_secs(10);

/// [`MatchStore`] backend speaking the REST + server-sent-events protocol of a
/// real-time database.
#[derive(Clone)]
pub struct RtdbStore {
    client: Client,
    base_url: Arc<str>,
    auth_token: Option<Arc<str>>,
    feeds: Arc<DashMap<String, Feed>>,
}

struct Feed {
    sender: broadcast::Sender<Value>,
    task: JoinHandle<()>,
}

impl Drop for Feed {
    fn drop(&mut self) {
        self.task.abort();
    }
}

impl RtdbStore {
    /// Establish a connection and verify the database root is reachable.
    pub async fn connect(config: RtdbConfig) -> RtdbResult<Self> {
        let client = Client::builder()
            .build()
            .map_err(|source| RtdbError::ClientBuilder { source })?;

        let store = Self {
            client,
            base_url: Arc::<str>::from(config.base_url.trim_end_matches('/')),
            auth_token: config.auth_token.map(Arc::<str>::from),
            feeds: Arc::new(DashMap::new()),
        };

        store.probe().await?;
        info!(base_url = %store.base_url, "connected to realtime database");
        Ok(store)
    }

    fn url(&self, path: &str) -> String {
        let mut url = format!("{}/{}.json", self.base_url, path.trim_matches('/'));
        if let Some(token) = &self.auth_token {
            url.push_str("?auth=");
            url.push_str(token);
        }
        url
    }

    async fn probe(&self) -> RtdbResult<()> {
        // Shallow read of the root: cheap regardless of database size.
        let mut url = format!("{}/.json?shallow=true", self.base_url);
        if let Some(token) = &self.auth_token {
            url.push_str("&auth=");
            url.push_str(token);
        }
        let path = "/".to_string();
        let response =
            self.client
                .get(url)
                .send()
                .await
                .map_err(|source| RtdbError::Request {
                    path: path.clone(),
                    source,
                })?;
        ensure_success(&path, response.status())
    }

    async fn put(&self, path: String, value: Value) -> RtdbResult<()> {
        let response = self
            .client
            .put(self.url(&path))
            .json(&value)
            .send()
            .await
            .map_err(|source| RtdbError::Request {
                path: path.clone(),
                source,
            })?;
        ensure_success(&path, response.status())
    }

    async fn patch(&self, path: String, updates: FieldUpdates) -> RtdbResult<()> {
        // Slash-separated keys make this a multi-location update: each entry
        // overwrites exactly its own subtree, nothing else.
        let body: Map<String, Value> = updates.into_iter().collect();
        let response = self
            .client
            .patch(self.url(&path))
            .json(&body)
            .send()
            .await
            .map_err(|source| RtdbError::Request {
                path: path.clone(),
                source,
            })?;
        ensure_success(&path, response.status())
    }

    async fn fetch(&self, path: String) -> RtdbResult<Option<Value>> {
        let response = self
            .client
            .get(self.url(&path))
            .send()
            .await
            .map_err(|source| RtdbError::Request {
                path: path.clone(),
                source,
            })?;
        ensure_success(&path, response.status())?;
        let value: Value = response
            .json()
            .await
            .map_err(|source| RtdbError::Decode { path, source })?;
        Ok(if value.is_null() { None } else { Some(value) })
    }

    fn feed_sender(&self, path: &str) -> broadcast::Sender<Value> {
        self.feeds
            .entry(path.to_string())
            .or_insert_with(|| {
                let (sender, _) = broadcast::channel(FEED_CAPACITY);
                let task = tokio::spawn(run_feed(
                    self.client.clone(),
                    self.url(path),
                    path.to_string(),
                    sender.clone(),
                ));
                Feed { sender, task }
            })
            .sender
            .clone()
    }
}

fn ensure_success(path: &str, status: reqwest::StatusCode) -> RtdbResult<()> {
    if status.is_success() {
        Ok(())
    } else {
        Err(RtdbError::Status {
            path: path.to_string(),
            status,
        })
    }
}

impl MatchStore for RtdbStore {
    fn create_document(&self, path: &str, value: Value) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        let path = path.to_string();
        Box::pin(async move { Ok(store.put(path, value).await?) })
    }

    fn get_document(&self, path: &str) -> BoxFuture<'static, StorageResult<Option<Value>>> {
        let store = self.clone();
        let path = path.to_string();
        Box::pin(async move { Ok(store.fetch(path).await?) })
    }

    fn update_fields(
        &self,
        path: &str,
        updates: FieldUpdates,
    ) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        let path = path.to_string();
        Box::pin(async move { Ok(store.patch(path, updates).await?) })
    }

    fn subscribe(
        &self,
        path: &str,
    ) -> BoxFuture<'static, StorageResult<BoxStream<'static, Value>>> {
        let store = self.clone();
        let path = path.to_string();
        Box::pin(async move {
            let mut receiver = store.feed_sender(&path).subscribe();
            let stream = async_stream::stream! {
                loop {
                    match receiver.recv().await {
                        Ok(snapshot) => yield snapshot,
                        Err(RecvError::Closed) => break,
                        Err(RecvError::Lagged(skipped)) => {
                            warn!(%path, skipped, "subscriber lagging behind event feed");
                            continue;
                        }
                    }
                }
            };
            Ok(stream.boxed())
        })
    }

    fn unsubscribe(&self, path: &str) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        let path = path.to_string();
        Box::pin(async move {
            // Removing the feed drops its sender and aborts the reader task.
            store.feeds.remove(&path);
            Ok(())
        })
    }
}

/// Payload of a `put`/`patch` event on the wire.
#[derive(Debug, Deserialize)]
struct StreamPayload {
    path: String,
    data: Value,
}

/// Keep one event-stream connection per subscribed path, mirroring the remote
/// subtree locally and broadcasting a full snapshot after every applied event.
/// Reconnects with exponential backoff when the connection drops.
async fn run_feed(client: Client, url: String, path: String, sender: broadcast::Sender<Value>) {
    let mut delay = RECONNECT_INITIAL;

    loop {
        match client
            .get(&url)
            .header(ACCEPT, "text/event-stream")
            .send()
            .await
        {
            Ok(response) if response.status().is_success() => {
                delay = RECONNECT_INITIAL;
                debug!(%path, "event feed connected");

                let mut mirror = Value::Null;
                let mut buffer = String::new();
                let mut body = response.bytes_stream();

                'read: while let Some(chunk) = body.next().await {
                    let bytes = match chunk {
                        Ok(bytes) => bytes,
                        Err(err) => {
                            warn!(%path, error = %err, "event feed interrupted");
                            break 'read;
                        }
                    };
                    buffer.push_str(&String::from_utf8_lossy(&bytes));

                    while let Some(end) = buffer.find("\n\n") {
                        let frame = buffer[..end].to_string();
                        buffer.drain(..end + 2);

                        match parse_frame(&frame) {
                            Some((event @ ("put" | "patch"), payload)) => {
                                apply_payload(&mut mirror, event, payload);
                                let _ = sender.send(mirror.clone());
                            }
                            Some(("keep-alive", _)) => {}
                            Some(("cancel" | "auth_revoked", _)) => {
                                warn!(%path, "event feed revoked by the database");
                                break 'read;
                            }
                            Some((other, _)) => debug!(%path, event = other, "ignoring feed event"),
                            None => {}
                        }
                    }
                }
            }
            Ok(response) => {
                warn!(%path, status = %response.status(), "event feed rejected");
            }
            Err(err) => {
                warn!(%path, error = %err, "event feed connection failed");
            }
        }

        sleep(delay).await;
        delay = (delay * 2).min(RECONNECT_MAX);
    }
}

/// Split one SSE frame into its event name and parsed payload. `put`/`patch`
/// frames without a decodable payload are dropped with a log line.
fn parse_frame(frame: &str) -> Option<(&str, StreamPayload)> {
    let mut event = None;
    let mut data = String::new();
    for line in frame.lines() {
        if let Some(rest) = line.strip_prefix("event:") {
            event = Some(rest.trim());
        } else if let Some(rest) = line.strip_prefix("data:") {
            if !data.is_empty() {
                data.push('\n');
            }
            data.push_str(rest.trim());
        }
    }

    let event = event?;
    if !matches!(event, "put" | "patch") {
        return Some((
            event,
            StreamPayload {
                path: "/".into(),
                data: Value::Null,
            },
        ));
    }

    match serde_json::from_str::<StreamPayload>(&data) {
        Ok(payload) => Some((event, payload)),
        Err(err) => {
            debug!(error = %err, "dropping undecodable feed frame");
            None
        }
    }
}

/// Fold one `put`/`patch` payload into the local mirror.
///
/// A `put` replaces the subtree at the event path (null removes it); a
/// `patch` carries a map of child paths relative to the event path, each
/// overwriting exactly its own subtree.
fn apply_payload(mirror: &mut Value, event: &str, payload: StreamPayload) {
    let at = payload.path.trim_matches('/');
    if event == "patch" {
        let Value::Object(entries) = payload.data else {
            return;
        };
        for (subpath, value) in entries {
            let full = if at.is_empty() {
                subpath
            } else {
                format!("{at}/{subpath}")
            };
            if value.is_null() {
                remove_at_path(mirror, &full);
            } else {
                write_at_path(mirror, &full, value);
            }
        }
        return;
    }

    match payload.data {
        Value::Null if at.is_empty() => *mirror = Value::Null,
        Value::Null => remove_at_path(mirror, at),
        data => write_at_path(mirror, at, data),
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn frames_parse_event_name_and_payload() {
        let frame = "event: put\ndata: {\"path\":\"/\",\"data\":{\"started\":false}}";
        let (event, payload) = parse_frame(frame).unwrap();
        assert_eq!(event, "put");
        assert_eq!(payload.path, "/");
        assert_eq!(payload.data, json!({"started": false}));
    }

    #[test]
    fn keep_alive_frames_are_recognized() {
        let (event, _) = parse_frame("event: keep-alive\ndata: null").unwrap();
        assert_eq!(event, "keep-alive");
    }

    #[test]
    fn put_replaces_the_addressed_subtree() {
        let mut mirror = json!({"team_a": {"players": {"ana": {"score": 0}}}});
        apply_payload(
            &mut mirror,
            "put",
            StreamPayload {
                path: "/team_a/players/ana/score".into(),
                data: json!(10),
            },
        );
        assert_eq!(mirror["team_a"]["players"]["ana"]["score"], json!(10));
    }

    #[test]
    fn root_put_replaces_the_whole_mirror() {
        let mut mirror = json!({"stale": true});
        apply_payload(
            &mut mirror,
            "put",
            StreamPayload {
                path: "/".into(),
                data: json!({"started": false}),
            },
        );
        assert_eq!(mirror, json!({"started": false}));
    }

    #[test]
    fn null_put_removes_the_subtree() {
        let mut mirror = json!({"pin": "1234", "started": false});
        apply_payload(
            &mut mirror,
            "put",
            StreamPayload {
                path: "/pin".into(),
                data: Value::Null,
            },
        );
        assert_eq!(mirror, json!({"started": false}));
    }

    #[test]
    fn root_patch_applies_each_entry_at_its_own_path() {
        let mut mirror = json!({"started": false, "team_a": {"players": {}}});
        apply_payload(
            &mut mirror,
            "patch",
            StreamPayload {
                path: "/".into(),
                data: json!({
                    "started": true,
                    "team_a/players/ana/score": 10,
                }),
            },
        );
        assert_eq!(mirror["started"], json!(true));
        assert_eq!(mirror["team_a"]["players"]["ana"]["score"], json!(10));
    }

    #[test]
    fn nested_patch_is_relative_to_the_event_path() {
        let mut mirror = json!({"team_a": {"players": {"ana": {"score": 0, "finished": false}}}});
        apply_payload(
            &mut mirror,
            "patch",
            StreamPayload {
                path: "/team_a/players/ana".into(),
                data: json!({"score": 10, "finished": true}),
            },
        );
        assert_eq!(
            mirror["team_a"]["players"]["ana"],
            json!({"score": 10, "finished": true})
        );
    }
}
