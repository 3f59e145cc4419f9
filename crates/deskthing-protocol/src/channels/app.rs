//! App→Server requests.

use std::collections::BTreeMap;

use serde::Deserialize;
use serde_json::Value;
use url::Url;

use deskthing_core::apps::{AppDataInterface, AuthScopes, SavedData};
use deskthing_core::mappings::{Action, ActionPatch, EventMode, KeyPatch};
use deskthing_core::messages::{AgentMessage, AgentToken, NotificationMessage};
use deskthing_core::settings::{AppSettings, SettingOption, SettingValue};
use deskthing_core::tasks::{Step, StepPatch, Task, TaskPatch};
use deskthing_core::{Log, LogLevel, SongData};

use crate::envelope::{CLIENT_ID, Channel, RawEnvelope, RouteKey, Scope};
use crate::error::SchemaError;
use crate::schema::{
    DomainSpec, IdList, Message, Vocabulary, payload, require_client_id, undeclared,
};
use crate::upgrade::upgrade_app_request;

const LOG_LEVELS: &[&str] = &["message", "log", "warning", "error", "debugging", "fatal"];

/// Domains an app may send to the host.
pub const APP_VOCABULARY: &[DomainSpec] = &[
    DomainSpec::coarse("default"),
    DomainSpec::with_default("get", &["data", "appData", "input", "connections"], "data"),
    DomainSpec::closed("set", &["data", "appData"]),
    DomainSpec::closed("delete", &["data"]),
    DomainSpec::closed(
        "settings",
        &["init", "set", "get", "set-value", "set-options", "delete"],
    ),
    DomainSpec::open("open", false),
    DomainSpec::with_default("send", &["json", "binary"], "json"),
    DomainSpec::open("toApp", true),
    DomainSpec::with_default("log", LOG_LEVELS, "log"),
    DomainSpec::closed("key", &["add", "remove", "trigger"]),
    DomainSpec::closed("action", &["add", "remove", "update", "run", "init"]),
    DomainSpec::closed(
        "task",
        &[
            "init", "get", "update", "delete", "add", "complete", "restart", "start", "end",
        ],
    ),
    DomainSpec::closed("step", &["get", "update", "delete", "add", "complete", "restart"]),
    DomainSpec::open("song", false),
    DomainSpec::closed("message", &["send"]),
    DomainSpec::closed("agent", &["response", "token", "disconnect", "context"]),
];

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct IdPayload {
    pub id: String,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct SettingValueUpdate {
    pub key: String,
    pub value: SettingValue,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct SettingOptionsUpdate {
    pub key: String,
    pub value: Vec<SettingOption>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct KeyTrigger {
    pub id: String,
    pub mode: EventMode,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ActionIcon {
    pub id: String,
    pub icon: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ActionRun {
    pub id: String,
    #[serde(default)]
    pub source: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct TaskInit {
    pub tasks: BTreeMap<String, Task>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct SourceFilter {
    #[serde(default)]
    pub source: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskUpdate {
    pub task_id: String,
    pub task: TaskPatch,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct TaskAdd {
    pub task: Task,
}

/// Payload naming one task.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskRef {
    pub task_id: String,
    #[serde(default)]
    pub source: Option<String>,
}

/// Payload naming one step of a task.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StepRef {
    pub task_id: String,
    pub step_id: String,
    #[serde(default)]
    pub source: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StepUpdate {
    pub task_id: String,
    pub step_id: String,
    pub step: StepPatch,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StepAdd {
    pub task_id: String,
    pub step: Step,
}

/// Log payload: a bare message or a structured object.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum LogPayload {
    Text(String),
    Object(serde_json::Map<String, Value>),
}

#[derive(Debug, Clone, PartialEq)]
pub enum GetRequest {
    Data,
    AppData,
    Input(AuthScopes),
    Connections,
}

#[derive(Debug, Clone, PartialEq)]
pub enum SetRequest {
    Data(SavedData),
    AppData(Box<AppDataInterface>),
}

#[derive(Debug, Clone, PartialEq)]
pub enum SettingsRequest {
    Init(AppSettings),
    Set(AppSettings),
    Get,
    SetValue(SettingValueUpdate),
    SetOptions(SettingOptionsUpdate),
    Delete(Vec<String>),
}

#[derive(Debug, Clone, PartialEq)]
pub enum SendRequest {
    /// Forward an envelope to the app's own client view.
    Json(Box<RawEnvelope>),
    Binary(Vec<u8>),
}

#[derive(Debug, Clone, PartialEq)]
pub enum KeyRequest {
    Add(KeyPatch),
    Remove(IdPayload),
    Trigger(KeyTrigger),
}

#[derive(Debug, Clone, PartialEq)]
pub enum ActionRequest {
    Add(ActionPatch),
    Remove(IdPayload),
    Update(ActionIcon),
    Run(ActionRun),
    Init(Vec<Action>),
}

#[derive(Debug, Clone, PartialEq)]
pub enum TaskRequest {
    Init(TaskInit),
    Get(SourceFilter),
    Update(TaskUpdate),
    Delete(TaskRef),
    Add(TaskAdd),
    Complete(TaskRef),
    Restart(TaskRef),
    Start(TaskRef),
    End(TaskRef),
}

#[derive(Debug, Clone, PartialEq)]
pub enum StepRequest {
    Get(StepRef),
    Update(StepUpdate),
    Delete(StepRef),
    Add(StepAdd),
    Complete(StepRef),
    Restart(StepRef),
}

/// Voice agent traffic. Every variant except `Disconnect` is tied to one
/// client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AgentRequest {
    Response {
        client_id: String,
        message: AgentMessage,
    },
    Token {
        client_id: String,
        token: AgentToken,
    },
    Disconnect(Option<String>),
    /// Replaces the client's conversation context.
    Context {
        client_id: String,
        messages: Vec<AgentMessage>,
    },
}

/// A validated App→Server message.
#[derive(Debug, Clone, PartialEq)]
pub enum AppMessage {
    Default(Value),
    Get(GetRequest),
    Set(SetRequest),
    Delete(IdList),
    Settings(SettingsRequest),
    Open(Url),
    Send(SendRequest),
    ToApp { app: String, payload: Value },
    Log(Log),
    Key(KeyRequest),
    Action(ActionRequest),
    Task(TaskRequest),
    Step(StepRequest),
    Song(Box<SongData>),
    Message(NotificationMessage),
    Agent(AgentRequest),
}

impl Message for AppMessage {
    const CHANNEL: Channel = Channel::AppToServer;

    fn vocabulary(_scope: Scope) -> Vocabulary {
        Vocabulary::Closed(APP_VOCABULARY)
    }

    fn decode(route: &RouteKey, raw: &RawEnvelope) -> Result<Self, SchemaError> {
        let request = route.request.as_deref();
        let message = match route.domain.as_str() {
            "default" => Self::Default(payload(route, raw)?),
            "get" => Self::Get(match request {
                Some("data") => GetRequest::Data,
                Some("appData") => GetRequest::AppData,
                Some("input") => GetRequest::Input(payload(route, raw)?),
                Some("connections") => GetRequest::Connections,
                _ => return Err(undeclared(Self::CHANNEL, route)),
            }),
            "set" => Self::Set(match request {
                Some("data") => SetRequest::Data(payload(route, raw)?),
                Some("appData") => SetRequest::AppData(Box::new(payload(route, raw)?)),
                _ => return Err(undeclared(Self::CHANNEL, route)),
            }),
            "delete" => Self::Delete(payload(route, raw)?),
            "settings" => Self::Settings(decode_settings(route, raw)?),
            "open" => Self::Open(decode_url(route, raw)?),
            "send" => Self::Send(decode_send(route, raw)?),
            "toApp" => Self::ToApp {
                app: request.unwrap_or_default().to_string(),
                payload: payload(route, raw)?,
            },
            "log" => Self::Log(decode_log(route, raw)?),
            "key" => Self::Key(match request {
                Some("add") => KeyRequest::Add(payload(route, raw)?),
                Some("remove") => KeyRequest::Remove(payload(route, raw)?),
                Some("trigger") => KeyRequest::Trigger(payload(route, raw)?),
                _ => return Err(undeclared(Self::CHANNEL, route)),
            }),
            "action" => Self::Action(match request {
                Some("add") => ActionRequest::Add(payload(route, raw)?),
                Some("remove") => ActionRequest::Remove(payload(route, raw)?),
                Some("update") => ActionRequest::Update(payload(route, raw)?),
                Some("run") => ActionRequest::Run(payload(route, raw)?),
                Some("init") => ActionRequest::Init(payload(route, raw)?),
                _ => return Err(undeclared(Self::CHANNEL, route)),
            }),
            "task" => Self::Task(decode_task(route, raw)?),
            "step" => Self::Step(decode_step(route, raw)?),
            "song" => {
                let value = raw.payload.clone().unwrap_or(Value::Null);
                let song = SongData::decode(value)
                    .map_err(|e| SchemaError::shape(&route.domain, request, e))?;
                Self::Song(Box::new(song))
            }
            "message" => Self::Message(payload(route, raw)?),
            "agent" => Self::Agent(decode_agent(route, raw)?),
            _ => return Err(undeclared(Self::CHANNEL, route)),
        };
        Ok(message)
    }

    fn upgrade_legacy(raw: RawEnvelope) -> Result<RawEnvelope, SchemaError> {
        Ok(upgrade_app_request(raw))
    }
}

fn decode_settings(route: &RouteKey, raw: &RawEnvelope) -> Result<SettingsRequest, SchemaError> {
    let checked = |settings: AppSettings| {
        settings
            .validate()
            .map(|()| settings)
            .map_err(|e| SchemaError::shape(&route.domain, route.request.as_deref(), e))
    };
    Ok(match route.request.as_deref() {
        Some("init") => SettingsRequest::Init(checked(payload(route, raw)?)?),
        Some("set") => SettingsRequest::Set(checked(payload(route, raw)?)?),
        Some("get") => SettingsRequest::Get,
        Some("set-value") => SettingsRequest::SetValue(payload(route, raw)?),
        Some("set-options") => SettingsRequest::SetOptions(payload(route, raw)?),
        Some("delete") => SettingsRequest::Delete(payload::<IdList>(route, raw)?.0),
        _ => return Err(undeclared(AppMessage::CHANNEL, route)),
    })
}

fn decode_url(route: &RouteKey, raw: &RawEnvelope) -> Result<Url, SchemaError> {
    let target: String = payload(route, raw)?;
    Url::parse(&target).map_err(|e| SchemaError::shape(&route.domain, route.request.as_deref(), e))
}

fn decode_send(route: &RouteKey, raw: &RawEnvelope) -> Result<SendRequest, SchemaError> {
    match route.request.as_deref() {
        Some("json") => {
            let inner: RawEnvelope = payload(route, raw)?;
            if inner.app.as_deref() == Some(CLIENT_ID) {
                return Err(SchemaError::shape(
                    &route.domain,
                    route.request.as_deref(),
                    "apps cannot address the reserved client channel",
                ));
            }
            Ok(SendRequest::Json(Box::new(inner)))
        }
        Some("binary") => Ok(SendRequest::Binary(payload(route, raw)?)),
        _ => Err(undeclared(AppMessage::CHANNEL, route)),
    }
}

fn decode_log(route: &RouteKey, raw: &RawEnvelope) -> Result<Log, SchemaError> {
    let level: LogLevel = route
        .request
        .as_deref()
        .unwrap_or_default()
        .parse()
        .map_err(|_| undeclared(AppMessage::CHANNEL, route))?;

    let mut log = match payload::<LogPayload>(route, raw)? {
        LogPayload::Text(message) => Log::new(level, message),
        LogPayload::Object(object) => {
            let message = object
                .get("message")
                .and_then(Value::as_str)
                .map(str::to_string)
                .unwrap_or_else(|| Value::Object(object.clone()).to_string());
            let mut log = Log::new(level, message);
            log.data = Some(vec![Value::Object(object)]);
            log
        }
    };
    if let Some(source) = &raw.source {
        log = log.with_source(source.clone());
    }
    Ok(log.with_domain(deskthing_core::LogDomain::App))
}

fn decode_task(route: &RouteKey, raw: &RawEnvelope) -> Result<TaskRequest, SchemaError> {
    Ok(match route.request.as_deref() {
        Some("init") => TaskRequest::Init(payload(route, raw)?),
        Some("get") => TaskRequest::Get(payload::<Option<SourceFilter>>(route, raw)?.unwrap_or_default()),
        Some("update") => TaskRequest::Update(payload(route, raw)?),
        Some("delete") => TaskRequest::Delete(payload(route, raw)?),
        Some("add") => {
            let add: TaskAdd = payload(route, raw)?;
            if let Some(step) = add.task.invalid_step() {
                return Err(SchemaError::shape(
                    &route.domain,
                    route.request.as_deref(),
                    format!("step '{}' is malformed", step.id),
                ));
            }
            TaskRequest::Add(add)
        }
        Some("complete") => TaskRequest::Complete(payload(route, raw)?),
        Some("restart") => TaskRequest::Restart(payload(route, raw)?),
        Some("start") => TaskRequest::Start(payload(route, raw)?),
        Some("end") => TaskRequest::End(payload(route, raw)?),
        _ => return Err(undeclared(AppMessage::CHANNEL, route)),
    })
}

fn decode_step(route: &RouteKey, raw: &RawEnvelope) -> Result<StepRequest, SchemaError> {
    Ok(match route.request.as_deref() {
        Some("get") => StepRequest::Get(payload(route, raw)?),
        Some("update") => StepRequest::Update(payload(route, raw)?),
        Some("delete") => StepRequest::Delete(payload(route, raw)?),
        Some("add") => StepRequest::Add(payload(route, raw)?),
        Some("complete") => StepRequest::Complete(payload(route, raw)?),
        Some("restart") => StepRequest::Restart(payload(route, raw)?),
        _ => return Err(undeclared(AppMessage::CHANNEL, route)),
    })
}

fn decode_agent(route: &RouteKey, raw: &RawEnvelope) -> Result<AgentRequest, SchemaError> {
    Ok(match route.request.as_deref() {
        Some("response") => {
            let client_id = require_client_id(route, raw)?.to_string();
            AgentRequest::Response {
                client_id,
                message: payload(route, raw)?,
            }
        }
        Some("token") => {
            let client_id = require_client_id(route, raw)?.to_string();
            AgentRequest::Token {
                client_id,
                token: payload(route, raw)?,
            }
        }
        Some("disconnect") => AgentRequest::Disconnect(payload(route, raw)?),
        Some("context") => {
            let messages: Vec<AgentMessage> =
                payload::<Option<Vec<AgentMessage>>>(route, raw)?.unwrap_or_default();
            if let Some(message) = messages.iter().find(|m| m.client_id.is_none()) {
                return Err(SchemaError::shape(
                    &route.domain,
                    Some("context"),
                    format!("context message {} has no clientId", message.id),
                ));
            }
            let client_id = raw
                .client_id
                .clone()
                .or_else(|| messages.first().and_then(|m| m.client_id.clone()))
                .ok_or_else(|| SchemaError::MissingCorrelationId {
                    domain: route.domain.clone(),
                    request: "context".into(),
                })?;
            AgentRequest::Context {
                client_id,
                messages,
            }
        }
        _ => return Err(undeclared(AppMessage::CHANNEL, route)),
    })
}
