//! Typed message unions, one per channel.

mod app;
mod client;
mod device;
mod events;
mod music;

pub use app::{
    APP_VOCABULARY, ActionIcon, ActionRequest, ActionRun, AgentRequest, AppMessage, GetRequest,
    IdPayload, KeyRequest, KeyTrigger, LogPayload, SendRequest, SetRequest, SettingOptionsUpdate,
    SettingValueUpdate, SettingsRequest, SourceFilter, StepAdd, StepRef, StepRequest, StepUpdate,
    TaskAdd, TaskInit, TaskRef, TaskRequest, TaskUpdate,
};
pub use client::{
    APP_VIEW_VOCABULARY, AppViewRequest, CLIENT_SCOPE_VOCABULARY, ClientGet, ClientMessage,
    ClientRequest, PrefIndex, SERVER_SCOPE_VOCABULARY, ServerRequest, SettingUpdate, ViewChange,
};
pub use device::{AppSettingsPush, DEVICE_VOCABULARY, DeviceMessage, IconUpdate, TimeValue};
pub use events::{AppEvent, ClientStatus, EVENT_VOCABULARY, TaskEvent};
pub use music::{LikeTarget, MUSIC_VOCABULARY, MusicEvent, PlayTarget};
