//! Server→App events.

use std::collections::BTreeMap;

use deskthing_core::apps::{AppDataInterface, SavedData};
use deskthing_core::clients::Client;
use deskthing_core::mappings::ActionTarget;
use deskthing_core::settings::AppSettings;
use deskthing_core::tasks::{Step, Task};

use super::music::{MUSIC_VOCABULARY, MusicEvent};
use crate::envelope::{Channel, RawEnvelope, RouteKey, Scope};
use crate::error::SchemaError;
use crate::schema::{DomainSpec, Message, Vocabulary, payload, undeclared};
use crate::upgrade::upgrade_app_event;

/// Events the host delivers to an app.
pub const EVENT_VOCABULARY: &[DomainSpec] = &[
    DomainSpec::closed("tasks", &["update", "step", "task"]),
    DomainSpec::closed(
        "client_status",
        &["connected", "connections", "disconnected", "opened", "closed"],
    ),
    DomainSpec::open("settings", false),
    DomainSpec::open("action", true),
    DomainSpec::open("message", true),
    DomainSpec::open("data", false),
    DomainSpec::open("appdata", false),
    DomainSpec::open("callback-data", false),
    DomainSpec::open("start", false),
    DomainSpec::open("stop", false),
    DomainSpec::open("purge", false),
    DomainSpec::open("input", true),
];

#[derive(Debug, Clone, PartialEq)]
pub enum TaskEvent {
    /// Every task of the app, keyed by task id.
    Update(BTreeMap<String, Task>),
    /// A single step changed; its task is named by `parent_id`.
    Step(Box<Step>),
    Task(Box<Task>),
}

/// Connection lifecycle of clients attached to the host.
#[derive(Debug, Clone, PartialEq)]
pub enum ClientStatus {
    Connected(Box<Client>),
    Connections(Vec<Client>),
    Disconnected(String),
    Opened(Box<Client>),
    Closed(Box<Client>),
}

/// A validated Server→App event.
#[derive(Debug, Clone, PartialEq)]
pub enum AppEvent {
    Tasks(TaskEvent),
    ClientStatus(ClientStatus),
    Settings(AppSettings),
    Action(ActionTarget),
    Message(String),
    Data(SavedData),
    AppData(Box<AppDataInterface>),
    CallbackData(String),
    Start(Option<String>),
    Stop(Option<String>),
    Purge(Option<String>),
    /// Answers an input request, keyed by the requested field.
    Input(BTreeMap<String, String>),
    Music(MusicEvent),
}

impl Message for AppEvent {
    const CHANNEL: Channel = Channel::ServerToApp;

    fn vocabulary(scope: Scope) -> Vocabulary {
        match scope {
            Scope::Music => Vocabulary::Closed(MUSIC_VOCABULARY),
            _ => Vocabulary::Closed(EVENT_VOCABULARY),
        }
    }

    fn decode(route: &RouteKey, raw: &RawEnvelope) -> Result<Self, SchemaError> {
        if route.scope == Scope::Music {
            return MusicEvent::decode(Self::CHANNEL, route, raw).map(Self::Music);
        }

        let request = route.request.as_deref();
        Ok(match route.domain.as_str() {
            "tasks" => Self::Tasks(match request {
                Some("update") => TaskEvent::Update(payload(route, raw)?),
                Some("step") => TaskEvent::Step(payload(route, raw)?),
                Some("task") => TaskEvent::Task(payload(route, raw)?),
                _ => return Err(undeclared(Self::CHANNEL, route)),
            }),
            "client_status" => Self::ClientStatus(match request {
                Some("connected") => ClientStatus::Connected(payload(route, raw)?),
                Some("connections") => ClientStatus::Connections(payload(route, raw)?),
                Some("disconnected") => ClientStatus::Disconnected(payload(route, raw)?),
                Some("opened") => ClientStatus::Opened(payload(route, raw)?),
                Some("closed") => ClientStatus::Closed(payload(route, raw)?),
                _ => return Err(undeclared(Self::CHANNEL, route)),
            }),
            "settings" => {
                let settings: AppSettings = payload(route, raw)?;
                settings
                    .validate()
                    .map_err(|e| SchemaError::shape(&route.domain, request, e))?;
                Self::Settings(settings)
            }
            "action" => Self::Action(payload(route, raw)?),
            "message" => Self::Message(payload(route, raw)?),
            "data" => Self::Data(payload::<Option<SavedData>>(route, raw)?.unwrap_or_default()),
            "appdata" => Self::AppData(payload(route, raw)?),
            "callback-data" => Self::CallbackData(payload(route, raw)?),
            "start" => Self::Start(payload(route, raw)?),
            "stop" => Self::Stop(payload(route, raw)?),
            "purge" => Self::Purge(payload(route, raw)?),
            "input" => Self::Input(payload(route, raw)?),
            _ => return Err(undeclared(Self::CHANNEL, route)),
        })
    }

    fn upgrade_legacy(raw: RawEnvelope) -> Result<RawEnvelope, SchemaError> {
        Ok(upgrade_app_event(raw))
    }
}
