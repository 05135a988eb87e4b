use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use dashmap::DashMap;
use tonic::{Request, Response, Status};
use uuid::Uuid;

use hfsm_core::{DelayedEventHandle, Engine, EngineError, Event, Level, LogCursor, Priority as EnginePriority};

#[allow(clippy::enum_variant_names)]
pub mod proto {
    tonic::include_proto!("hfsm.v1");
}

use proto::hfsm_server::Hfsm;
use proto::*;

struct LoadedMachine {
    engine: Arc<Engine>,
    pump_task: tokio::task::AbortHandle,
}

/// One machine registry per server process, keyed by the id handed back
/// from `Load`. Each loaded machine owns a background task that drains
/// plugin completions into the engine on a short tick — the same polling
/// shape `subscribe_log` itself uses to tail the log stream.
pub struct HfsmService {
    machines: DashMap<String, LoadedMachine>,
}

impl HfsmService {
    pub fn new() -> Self {
        HfsmService {
            machines: DashMap::new(),
        }
    }
}

impl Default for HfsmService {
    fn default() -> Self {
        HfsmService::new()
    }
}

fn not_found(machine_id: &str) -> Status {
    Status::not_found(format!("no machine loaded with id '{machine_id}'"))
}

fn engine_err(e: EngineError) -> Status {
    Status::failed_precondition(e.to_string())
}

fn level_name(level: Level) -> &'static str {
    match level {
        Level::Debug => "debug",
        Level::Info => "info",
        Level::Warn => "warn",
        Level::Error => "error",
    }
}

#[tonic::async_trait]
impl Hfsm for HfsmService {
    async fn load(&self, request: Request<LoadRequest>) -> Result<Response<LoadResponse>, Status> {
        let req = request.into_inner();
        let format = Format::try_from(req.format).unwrap_or(Format::Unspecified);
        let machine = match format {
            Format::Json => hfsm_importer::load_json(&req.description),
            Format::Yaml => hfsm_importer::load_yaml(&req.description),
            Format::Xml => hfsm_importer::load_xml(&req.description),
            Format::Unspecified => return Err(Status::invalid_argument("format must be specified")),
        }
        .map_err(|e| Status::invalid_argument(e.to_string()))?;

        let engine = Engine::new(machine, hfsm_plugins::standard_registry());
        let machine_id = Uuid::new_v4().to_string();

        let pump_engine = engine.clone();
        let pump_task = tokio::spawn(async move {
            loop {
                tokio::time::sleep(Duration::from_millis(25)).await;
                pump_engine.pump();
            }
        })
        .abort_handle();

        self.machines.insert(machine_id.clone(), LoadedMachine { engine, pump_task });
        tracing::info!(%machine_id, "machine loaded");

        Ok(Response::new(LoadResponse { machine_id }))
    }

    async fn unload(&self, request: Request<UnloadRequest>) -> Result<Response<UnloadResponse>, Status> {
        let req = request.into_inner();
        let Some((_, loaded)) = self.machines.remove(&req.machine_id) else {
            return Err(not_found(&req.machine_id));
        };
        loaded.pump_task.abort();
        tracing::info!(machine_id = %req.machine_id, "machine unloaded");
        Ok(Response::new(UnloadResponse {}))
    }

    async fn start(&self, request: Request<StartRequest>) -> Result<Response<StartResponse>, Status> {
        let req = request.into_inner();
        let entry = self.machines.get(&req.machine_id).ok_or_else(|| not_found(&req.machine_id))?;
        entry.engine.start().map_err(engine_err)?;
        Ok(Response::new(StartResponse {}))
    }

    async fn stop(&self, request: Request<StopRequest>) -> Result<Response<StopResponse>, Status> {
        let req = request.into_inner();
        let entry = self.machines.get(&req.machine_id).ok_or_else(|| not_found(&req.machine_id))?;
        entry.engine.stop().map_err(engine_err)?;
        Ok(Response::new(StopResponse {}))
    }

    async fn post_event(&self, request: Request<PostEventRequest>) -> Result<Response<PostEventResponse>, Status> {
        let req = request.into_inner();
        let entry = self.machines.get(&req.machine_id).ok_or_else(|| not_found(&req.machine_id))?;

        let priority = if req.priority == Priority::High as i32 {
            EnginePriority::High
        } else {
            EnginePriority::Normal
        };
        let mut event = Event::new(req.event_name).with_priority(priority);
        if !req.message_json.is_empty() {
            let message = hfsm_value::json::from_json_str(&req.message_json)
                .map_err(|e| Status::invalid_argument(e.to_string()))?;
            event = event.with_message(message);
        }

        let delayed_handle = match req.delay_ms {
            Some(delay_ms) => {
                let handle = entry
                    .engine
                    .post_delayed(event, Duration::from_millis(delay_ms))
                    .map_err(engine_err)?;
                Some(handle.0)
            }
            None => {
                entry.engine.post_event(event).map_err(engine_err)?;
                None
            }
        };

        Ok(Response::new(PostEventResponse { delayed_handle }))
    }

    async fn cancel_delayed(&self, request: Request<CancelDelayedRequest>) -> Result<Response<CancelDelayedResponse>, Status> {
        let req = request.into_inner();
        let entry = self.machines.get(&req.machine_id).ok_or_else(|| not_found(&req.machine_id))?;
        entry.engine.cancel_delayed(DelayedEventHandle(req.delayed_handle));
        Ok(Response::new(CancelDelayedResponse {}))
    }

    type SubscribeLogStream = tokio_stream::wrappers::ReceiverStream<Result<LogRecordMsg, Status>>;

    async fn subscribe_log(&self, request: Request<SubscribeLogRequest>) -> Result<Response<Self::SubscribeLogStream>, Status> {
        let req = request.into_inner();
        let entry = self.machines.get(&req.machine_id).ok_or_else(|| not_found(&req.machine_id))?;
        let engine = entry.engine.clone();

        let (tx, rx) = tokio::sync::mpsc::channel(64);
        tokio::spawn(async move {
            let mut cursor = LogCursor(req.cursor);
            loop {
                let records = engine.read_log_blocking(cursor, Duration::from_secs(30)).await;
                for record in &records {
                    cursor = LogCursor(record.seq + 1);
                    let timestamp_unix_ms = record
                        .timestamp
                        .duration_since(UNIX_EPOCH)
                        .map(|d| d.as_millis() as i64)
                        .unwrap_or(0);
                    let msg = LogRecordMsg {
                        sequence: record.seq,
                        scope: record.scope.clone(),
                        level: level_name(record.level).to_string(),
                        message: record.message.clone(),
                        timestamp_unix_ms,
                    };
                    if tx.send(Ok(msg)).await.is_err() {
                        return;
                    }
                }
            }
        });

        Ok(Response::new(tokio_stream::wrappers::ReceiverStream::new(rx)))
    }
}
