use super::models::EventPatch;
use super::Datastore;
use crate::components::calendar::models::Event;
use crate::config::Config;
use crate::error::{persistence_error, AppResult};
use async_trait::async_trait;
use chrono::NaiveDate;
use reqwest::{Client, RequestBuilder};
use serde::Serialize;
use std::sync::Arc;
use tokio::sync::{mpsc, RwLock};
use tracing::{error, info, warn};
use url::Url;

/// The datastore actor that owns the REST client and processes messages
pub struct SupabaseActor {
    config: Arc<RwLock<Config>>,
    client: Client,
    command_rx: mpsc::Receiver<DatastoreCommand>,
}

/// Commands that can be sent to the datastore actor
pub enum DatastoreCommand {
    Insert(Vec<Event>, mpsc::Sender<AppResult<()>>),
    Update(i64, EventPatch, mpsc::Sender<AppResult<()>>),
    Query(NaiveDate, mpsc::Sender<AppResult<Vec<Event>>>),
    Shutdown,
}

/// Handle for communicating with the datastore actor
#[derive(Clone)]
pub struct DatastoreHandle {
    command_tx: mpsc::Sender<DatastoreCommand>,
}

impl DatastoreHandle {
    /// Create a handle with no actor behind it, for initialization and tests
    pub fn empty() -> Self {
        let (command_tx, _) = mpsc::channel(32);
        Self { command_tx }
    }

    /// Shutdown the actor
    pub async fn shutdown(&self) -> AppResult<()> {
        let _ = self.command_tx.send(DatastoreCommand::Shutdown).await;
        Ok(())
    }
}

#[async_trait]
impl Datastore for DatastoreHandle {
    async fn insert(&self, events: &[Event]) -> AppResult<()> {
        let (response_tx, mut response_rx) = mpsc::channel(1);
        self.command_tx
            .send(DatastoreCommand::Insert(events.to_vec(), response_tx))
            .await
            .map_err(|e| persistence_error(&format!("Actor mailbox error: {}", e)))?;

        response_rx
            .recv()
            .await
            .ok_or_else(|| persistence_error("Response channel closed"))?
    }

    async fn update(&self, id: i64, patch: &EventPatch) -> AppResult<()> {
        let (response_tx, mut response_rx) = mpsc::channel(1);
        self.command_tx
            .send(DatastoreCommand::Update(id, patch.clone(), response_tx))
            .await
            .map_err(|e| persistence_error(&format!("Actor mailbox error: {}", e)))?;

        response_rx
            .recv()
            .await
            .ok_or_else(|| persistence_error("Response channel closed"))?
    }

    async fn query(&self, date: NaiveDate) -> AppResult<Vec<Event>> {
        let (response_tx, mut response_rx) = mpsc::channel(1);
        self.command_tx
            .send(DatastoreCommand::Query(date, response_tx))
            .await
            .map_err(|e| persistence_error(&format!("Actor mailbox error: {}", e)))?;

        response_rx
            .recv()
            .await
            .ok_or_else(|| persistence_error("Response channel closed"))?
    }
}

/// Log a failed write together with its payload so it can be replayed by hand
fn log_failed_payload<T: Serialize + ?Sized>(action: &str, payload: &T, err: &crate::error::Error) {
    error!("Failed to {} datastore: {}", action, err);
    match serde_json::to_string_pretty(payload) {
        Ok(json) => error!("Data attempted to {}: {}", action, json),
        Err(e) => error!("Data attempted to {} could not be serialized: {}", action, e),
    }
}

impl SupabaseActor {
    /// Create a new actor and return its handle
    pub fn new(config: Arc<RwLock<Config>>) -> (Self, DatastoreHandle) {
        let (command_tx, command_rx) = mpsc::channel(32);

        let actor = Self {
            config,
            client: Client::new(),
            command_rx,
        };

        let handle = DatastoreHandle { command_tx };

        (actor, handle)
    }

    /// Start the actor's processing loop
    pub async fn run(&mut self) {
        info!("Datastore actor started");

        while let Some(cmd) = self.command_rx.recv().await {
            match cmd {
                DatastoreCommand::Insert(events, response_tx) => {
                    let result = self.insert_events(&events).await;
                    if let Err(e) = &result {
                        log_failed_payload("insert into", &events, e);
                    }
                    let _ = response_tx.send(result).await;
                }
                DatastoreCommand::Update(id, patch, response_tx) => {
                    let result = self.update_event(id, &patch).await;
                    if let Err(e) = &result {
                        log_failed_payload("update", &patch, e);
                    }
                    let _ = response_tx.send(result).await;
                }
                DatastoreCommand::Query(date, response_tx) => {
                    let result = self.query_events(date).await;
                    let _ = response_tx.send(result).await;
                }
                DatastoreCommand::Shutdown => {
                    info!("Datastore actor shutting down");
                    break;
                }
            }
        }

        info!("Datastore actor shut down");
    }

    /// Table endpoint and credential from the current config
    async fn table_endpoint(&self) -> AppResult<(Url, String)> {
        let config = self.config.read().await;
        let url_str = format!("{}/rest/v1/{}", config.supabase_url, config.supabase_table);
        let url = Url::parse(&url_str)
            .map_err(|e| persistence_error(&format!("Failed to parse URL: {}", e)))?;
        Ok((url, config.supabase_key.clone()))
    }

    fn authorized(builder: RequestBuilder, key: &str) -> RequestBuilder {
        builder
            .header("apikey", key)
            .header("Authorization", format!("Bearer {}", key))
            .header("Prefer", "return=minimal")
    }

    /// Send a request and turn a non-success status into an error
    async fn send(builder: RequestBuilder, action: &str) -> AppResult<reqwest::Response> {
        let response = builder
            .send()
            .await
            .map_err(|e| persistence_error(&format!("Failed to {}: {}", action, e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let error_body = response
                .text()
                .await
                .unwrap_or_else(|_| "Could not read error response".to_string());
            return Err(persistence_error(&format!(
                "Failed to {}: HTTP {} - {}",
                action, status, error_body
            )));
        }

        Ok(response)
    }

    async fn insert_events(&self, events: &[Event]) -> AppResult<()> {
        if events.is_empty() {
            warn!("No data to insert into datastore");
            return Ok(());
        }

        let (url, key) = self.table_endpoint().await?;
        let request = Self::authorized(self.client.post(url), &key).json(events);
        Self::send(request, "insert events").await?;

        info!("{} rows successfully inserted", events.len());
        Ok(())
    }

    async fn update_event(&self, id: i64, patch: &EventPatch) -> AppResult<()> {
        if patch.is_empty() {
            warn!("No data to update for row {}", id);
            return Ok(());
        }

        let (mut url, key) = self.table_endpoint().await?;
        url.query_pairs_mut().append_pair("id", &format!("eq.{}", id));

        let request = Self::authorized(self.client.patch(url), &key).json(patch);
        Self::send(request, "update event").await?;

        info!("Row with id {} successfully updated", id);
        Ok(())
    }

    async fn query_events(&self, date: NaiveDate) -> AppResult<Vec<Event>> {
        let (mut url, key) = self.table_endpoint().await?;
        url.query_pairs_mut()
            .append_pair("date", &format!("eq.{}", date.format("%Y-%m-%d")));

        let request = Self::authorized(self.client.get(url), &key);
        let response = Self::send(request, "query events").await?;

        response
            .json::<Vec<Event>>()
            .await
            .map_err(|e| persistence_error(&format!("Failed to parse events response: {}", e)))
    }
}
