//! Tasks: named units of user-facing work made of independently completable
//! steps.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use url::Url;

use crate::mappings::ActionTarget;
use crate::settings::{Setting, SettingReference};

/// Debug hint attached to a step.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DebugStep {
    pub id: String,
    pub label: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub instructions: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub action_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub shortcut_loc: Option<String>,
}

/// Points at another task; the source defaults to the owning app.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskReference {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
}

/// Either a full setting or a reference to an existing one.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SettingTarget {
    Setting(Box<Setting>),
    Reference(SettingReference),
}

/// What completing a step involves, tagged by `type`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum StepKind {
    /// Plain checkpoint.
    Step,
    /// Run an action.
    Action { action: ActionTarget },
    /// Navigate somewhere in the host UI.
    Shortcut { destination: String },
    /// Provide a setting value.
    Setting { setting: SettingTarget },
    /// Complete another task first.
    Task {
        #[serde(
            rename = "taskReference",
            default,
            skip_serializing_if = "Option::is_none"
        )]
        task_reference: Option<TaskReference>,
    },
    /// Something the user does outside the host.
    External {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        url: Option<String>,
    },
}

impl StepKind {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Step => "step",
            Self::Action { .. } => "action",
            Self::Shortcut { .. } => "shortcut",
            Self::Setting { .. } => "setting",
            Self::Task { .. } => "task",
            Self::External { .. } => "external",
        }
    }
}

/// A single step of a task.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Step {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub debug: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub strict: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub instructions: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub debugging: Option<BTreeMap<String, DebugStep>>,
    #[serde(flatten)]
    pub kind: StepKind,
}

impl Step {
    /// Creates an incomplete step.
    pub fn new(id: impl Into<String>, kind: StepKind) -> Self {
        Self {
            id: id.into(),
            parent_id: None,
            debug: None,
            strict: None,
            source: None,
            label: None,
            instructions: None,
            completed: None,
            debugging: None,
            kind,
        }
    }

    pub fn is_completed(&self) -> bool {
        self.completed.unwrap_or(false)
    }

    /// The parsed URL of an external step, if it has a valid absolute one.
    pub fn external_url(&self) -> Option<Url> {
        match &self.kind {
            StepKind::External { url: Some(url) } => Url::parse(url).ok(),
            _ => None,
        }
    }

    /// Checks that an external step's URL, when given, is absolute.
    pub fn has_valid_target(&self) -> bool {
        match &self.kind {
            StepKind::External { url: Some(url) } => Url::parse(url).is_ok(),
            _ => true,
        }
    }

    /// Applies a partial update.
    pub fn apply(&mut self, patch: StepPatch) {
        if let Some(parent_id) = patch.parent_id {
            self.parent_id = Some(parent_id);
        }
        if let Some(label) = patch.label {
            self.label = Some(label);
        }
        if let Some(instructions) = patch.instructions {
            self.instructions = Some(instructions);
        }
        if let Some(completed) = patch.completed {
            self.completed = Some(completed);
        }
        if let Some(debug) = patch.debug {
            self.debug = Some(debug);
        }
        if let Some(strict) = patch.strict {
            self.strict = Some(strict);
        }
        if let Some(kind) = patch.kind {
            self.kind = kind;
        }
    }
}

/// Partial step as sent by `step/update`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StepPatch {
    #[serde(default)]
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub instructions: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub debug: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub strict: Option<bool>,
    #[serde(flatten)]
    pub kind: Option<StepKind>,
}

/// A task owned by an app.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    pub id: String,
    #[serde(default)]
    pub source: String,
    #[serde(default)]
    pub version: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub available: Option<bool>,
    #[serde(default)]
    pub completed: bool,
    #[serde(default)]
    pub label: String,
    #[serde(default)]
    pub started: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current_step: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default)]
    pub steps: BTreeMap<String, Step>,
}

impl Task {
    /// Creates an empty, unstarted task.
    pub fn new(id: impl Into<String>, label: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            source: String::new(),
            version: String::new(),
            available: None,
            completed: false,
            label: label.into(),
            started: false,
            current_step: None,
            description: None,
            steps: BTreeMap::new(),
        }
    }

    /// Builder: add a step keyed by its id.
    pub fn with_step(mut self, step: Step) -> Self {
        self.steps.insert(step.id.clone(), step);
        self
    }

    /// True when every step is complete.
    pub fn is_resolved(&self) -> bool {
        self.steps.values().all(Step::is_completed)
    }

    /// First incomplete step, in id order.
    pub fn next_step(&self) -> Option<&Step> {
        self.steps.values().find(|step| !step.is_completed())
    }

    /// Marks the task as started and points at its first open step.
    pub fn start(&mut self) {
        self.started = true;
        self.current_step = self.next_step().map(|step| step.id.clone());
    }

    /// Marks one step complete and advances the cursor.
    ///
    /// Returns `false` if the task has no such step.
    pub fn complete_step(&mut self, step_id: &str) -> bool {
        let Some(step) = self.steps.get_mut(step_id) else {
            return false;
        };
        step.completed = Some(true);
        self.current_step = self.next_step().map(|step| step.id.clone());
        self.completed = self.is_resolved();
        true
    }

    /// Clears all progress.
    pub fn restart(&mut self) {
        for step in self.steps.values_mut() {
            step.completed = Some(false);
        }
        self.completed = false;
        self.started = false;
        self.current_step = None;
    }

    /// Applies a partial update.
    pub fn apply(&mut self, patch: TaskPatch) {
        if let Some(version) = patch.version {
            self.version = version;
        }
        if let Some(available) = patch.available {
            self.available = Some(available);
        }
        if let Some(completed) = patch.completed {
            self.completed = completed;
        }
        if let Some(label) = patch.label {
            self.label = label;
        }
        if let Some(started) = patch.started {
            self.started = started;
        }
        if let Some(current_step) = patch.current_step {
            self.current_step = Some(current_step);
        }
        if let Some(description) = patch.description {
            self.description = Some(description);
        }
        if let Some(steps) = patch.steps {
            self.steps.extend(steps);
        }
    }

    /// Checks structural constraints that serde cannot express.
    pub fn invalid_step(&self) -> Option<&Step> {
        self.steps
            .iter()
            .find(|(key, step)| *key != &step.id || !step.has_valid_target())
            .map(|(_, step)| step)
    }
}

/// Partial task as sent by `task/update`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskPatch {
    #[serde(default)]
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub available: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub started: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current_step: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub steps: Option<BTreeMap<String, Step>>,
}

/// Tasks of one app, keyed by task id.
pub type TaskList = BTreeMap<String, Task>;

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn two_step_task() -> Task {
        Task::new("setup", "Set up")
            .with_step(Step::new("a", StepKind::Step))
            .with_step(Step::new(
                "b",
                StepKind::Shortcut {
                    destination: "/settings".into(),
                },
            ))
    }

    #[test]
    fn minimal_task_decodes() {
        let task: Task = serde_json::from_value(json!({"id": "t1", "steps": {}})).unwrap();
        assert_eq!(task.id, "t1");
        assert!(!task.started);
        assert!(task.is_resolved());
    }

    #[test]
    fn steps_decode_by_type_tag() {
        let step: Step = serde_json::from_value(json!({
            "id": "s1",
            "type": "action",
            "parentId": "t1",
            "action": {"id": "play", "source": "spotify"}
        }))
        .unwrap();
        assert_eq!(step.kind.name(), "action");
        assert_eq!(step.parent_id.as_deref(), Some("t1"));

        let setting_step: Step = serde_json::from_value(json!({
            "id": "s2",
            "type": "setting",
            "setting": {"id": "theme"}
        }))
        .unwrap();
        assert!(matches!(
            setting_step.kind,
            StepKind::Setting {
                setting: SettingTarget::Reference(_)
            }
        ));

        assert!(serde_json::from_value::<Step>(json!({"id": "s3", "type": "dance"})).is_err());
    }

    #[test]
    fn completing_steps_resolves_task() {
        let mut task = two_step_task();
        task.start();
        assert!(task.started);
        assert_eq!(task.current_step.as_deref(), Some("a"));

        assert!(task.complete_step("a"));
        assert_eq!(task.next_step().map(|s| s.id.as_str()), Some("b"));
        assert!(!task.completed);

        assert!(task.complete_step("b"));
        assert!(task.completed);
        assert!(task.current_step.is_none());
        assert!(!task.complete_step("missing"));
    }

    #[test]
    fn restart_clears_progress() {
        let mut task = two_step_task();
        task.start();
        task.complete_step("a");
        task.restart();
        assert!(!task.started);
        assert!(!task.is_resolved());
        assert_eq!(task.next_step().map(|s| s.id.as_str()), Some("a"));
    }

    #[test]
    fn patch_updates_only_given_fields() {
        let mut task = two_step_task();
        task.apply(TaskPatch {
            id: "setup".into(),
            label: Some("Configure".into()),
            ..Default::default()
        });
        assert_eq!(task.label, "Configure");
        assert_eq!(task.steps.len(), 2);

        let step = task.steps.get_mut("a").unwrap();
        step.apply(StepPatch {
            id: "a".into(),
            instructions: Some("Click it".into()),
            ..Default::default()
        });
        assert_eq!(step.instructions.as_deref(), Some("Click it"));
        assert_eq!(step.kind, StepKind::Step);
    }

    #[test]
    fn external_urls_must_be_absolute() {
        let task = Task::new("t", "T").with_step(Step::new(
            "ext",
            StepKind::External {
                url: Some("not a url".into()),
            },
        ));
        assert_eq!(task.invalid_step().map(|s| s.id.as_str()), Some("ext"));

        let ok = Step::new(
            "ext",
            StepKind::External {
                url: Some("https://deskthing.app/docs".into()),
            },
        );
        assert_eq!(
            ok.external_url().map(|u| u.host_str().map(String::from)),
            Some(Some("deskthing.app".into()))
        );
    }
}
