//! Core records: tasks, settings, mappings, music, clients, apps, logs, tracing

pub mod apps;
pub mod clients;
pub mod logging;
pub mod mappings;
pub mod messages;
pub mod music;
pub mod settings;
pub mod tasks;
pub mod tracing;

pub use apps::{App, AppDataInterface, AppManifest, AuthScopes, PlatformType, SavedData, TagType};
pub use clients::{
    Client, ClientConfigurations, ClientDeviceType, ClientManifest, ClientMetaData,
    ClientPreferences, TimePayload,
};
pub use logging::{Log, LogDomain, LogLevel};
pub use mappings::{
    Action, ActionCallback, ActionPatch, ActionReference, ActionTarget, ButtonMapping,
    ButtonMappingStructure, EventMode, Key, KeyPatch, KeyReference, MappingProfile,
};
pub use messages::{AgentMessage, AgentToken, NotificationMessage};
pub use music::{AudioRequest, RepeatState, SongAbility, SongData, SongError, ThemeColor};
pub use settings::{AppSettings, Setting, SettingError, SettingKind, SettingResult, SettingValue};
pub use tasks::{Step, StepKind, StepPatch, Task, TaskPatch};
pub use tracing::{build_subscriber, init_tracing, TracingConfig, TracingError, TracingOutputFormat};
