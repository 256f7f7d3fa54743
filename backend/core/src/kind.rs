//! Kinds and their closed operation sets.
//!
//! Every action kind has its own operation enum. The [`Operation`] trait ties an
//! enum to its [`Kind`], to the plugin tables it is declared in, and to the
//! lifecycle the invoker follows when the operation is called.

use std::fmt;
use std::hash::Hash;

use serde::{Deserialize, Serialize};

use crate::event::ActionState;
use crate::plugin::{ActionTypeDefinition, ActionTypeExtension, ActionTypeTables, ExtensionTables};

/// A category of operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Kind {
    Build,
    Deploy,
    Run,
    Test,
    Provider,
}

impl Kind {
    /// Lowercase name, as used in error messages and event names.
    pub fn as_str(&self) -> &'static str {
        match self {
            Kind::Build => "build",
            Kind::Deploy => "deploy",
            Kind::Run => "run",
            Kind::Test => "test",
            Kind::Provider => "provider",
        }
    }

    /// Name of the lifecycle event emitted for actions of this kind, e.g. `buildStatus`.
    pub fn status_event_name(&self) -> String {
        format!("{}Status", self.as_str())
    }
}

impl fmt::Display for Kind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Kind::Build => "Build",
            Kind::Deploy => "Deploy",
            Kind::Run => "Run",
            Kind::Test => "Test",
            Kind::Provider => "Provider",
        };
        f.write_str(s)
    }
}

/// Which of an action type's output schemas applies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputsMode {
    Static,
    Runtime,
}

impl fmt::Display for OutputsMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OutputsMode::Static => f.write_str("static"),
            OutputsMode::Runtime => f.write_str("runtime"),
        }
    }
}

/// A lifecycle state paired with its kind-specific status detail.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StatusTransition {
    pub state: ActionState,
    pub detail: &'static str,
}

const fn transition(state: ActionState, detail: &'static str) -> StatusTransition {
    StatusTransition { state, detail }
}

/// How the terminal status of an operation is derived from the handler result.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TerminalRule {
    Always(StatusTransition),
    /// Chosen from the `state` field of the result.
    ByResultState {
        ready: StatusTransition,
        failed: Option<StatusTransition>,
        otherwise: StatusTransition,
    },
}

impl TerminalRule {
    pub fn resolve(&self, result: &serde_json::Value) -> StatusTransition {
        match self {
            TerminalRule::Always(t) => *t,
            TerminalRule::ByResultState { ready, failed, otherwise } => {
                match result.get("state").and_then(|s| s.as_str()) {
                    Some("ready") => *ready,
                    Some("failed") => failed.unwrap_or(*otherwise),
                    _ => *otherwise,
                }
            }
        }
    }
}

/// Event behaviour of a result-bearing operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Lifecycle {
    pub starting: StatusTransition,
    /// Mutating operations get a fresh correlation id per call.
    pub mutating: bool,
    pub terminal: TerminalRule,
}

/// Which outputs of a result are validated, and when.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OutputsCheck {
    pub mode: OutputsMode,
    /// Only validate when the result reports `state: "ready"`.
    pub only_when_ready: bool,
}

/// A closed set of operations belonging to one kind.
pub trait Operation:
    Copy + Eq + Hash + fmt::Debug + fmt::Display + Send + Sync + 'static
{
    const KIND: Kind;

    fn all() -> &'static [Self];

    /// Canonical camelCase name, e.g. `getStatus`.
    fn name(self) -> &'static str;

    fn from_name(name: &str) -> Option<Self> {
        Self::all().iter().copied().find(|op| op.name() == name)
    }

    /// `None` for operations that emit no lifecycle events.
    fn lifecycle(self) -> Option<Lifecycle> {
        None
    }

    fn outputs_check(self) -> Option<OutputsCheck> {
        None
    }

    fn created(tables: &ActionTypeTables) -> &[ActionTypeDefinition<Self>];
    fn created_mut(tables: &mut ActionTypeTables) -> &mut Vec<ActionTypeDefinition<Self>>;
    fn extended(tables: &ExtensionTables) -> &[ActionTypeExtension<Self>];
    fn extended_mut(tables: &mut ExtensionTables) -> &mut Vec<ActionTypeExtension<Self>>;
}

const STATIC_OUTPUTS: OutputsCheck = OutputsCheck { mode: OutputsMode::Static, only_when_ready: false };
const RUNTIME_OUTPUTS: OutputsCheck = OutputsCheck { mode: OutputsMode::Runtime, only_when_ready: false };
const READY_RUNTIME_OUTPUTS: OutputsCheck = OutputsCheck { mode: OutputsMode::Runtime, only_when_ready: true };

fn execution(detail: &'static str, done: StatusTransition) -> Lifecycle {
    Lifecycle {
        starting: transition(ActionState::Processing, detail),
        mutating: true,
        terminal: TerminalRule::Always(done),
    }
}

fn status_query(detail: &'static str, ready: StatusTransition, otherwise: StatusTransition) -> Lifecycle {
    Lifecycle {
        starting: transition(ActionState::GettingStatus, detail),
        mutating: false,
        terminal: TerminalRule::ByResultState { ready, failed: None, otherwise },
    }
}

// ---------------------------------------------------------------------------
// Build
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum BuildOperation {
    Configure,
    Validate,
    GetOutputs,
    Build,
    GetStatus,
    Publish,
}

impl Operation for BuildOperation {
    const KIND: Kind = Kind::Build;

    fn all() -> &'static [Self] {
        &[
            Self::Configure,
            Self::Validate,
            Self::GetOutputs,
            Self::Build,
            Self::GetStatus,
            Self::Publish,
        ]
    }

    fn name(self) -> &'static str {
        match self {
            Self::Configure => "configure",
            Self::Validate => "validate",
            Self::GetOutputs => "getOutputs",
            Self::Build => "build",
            Self::GetStatus => "getStatus",
            Self::Publish => "publish",
        }
    }

    fn lifecycle(self) -> Option<Lifecycle> {
        match self {
            Self::Build => Some(execution("building", transition(ActionState::Ready, "built"))),
            Self::GetStatus => Some(status_query(
                "fetching",
                transition(ActionState::Cached, "fetched"),
                transition(ActionState::NotReady, "outdated"),
            )),
            _ => None,
        }
    }

    fn outputs_check(self) -> Option<OutputsCheck> {
        match self {
            Self::GetOutputs => Some(STATIC_OUTPUTS),
            Self::Build => Some(RUNTIME_OUTPUTS),
            Self::GetStatus => Some(READY_RUNTIME_OUTPUTS),
            _ => None,
        }
    }

    fn created(tables: &ActionTypeTables) -> &[ActionTypeDefinition<Self>] {
        &tables.build
    }

    fn created_mut(tables: &mut ActionTypeTables) -> &mut Vec<ActionTypeDefinition<Self>> {
        &mut tables.build
    }

    fn extended(tables: &ExtensionTables) -> &[ActionTypeExtension<Self>] {
        &tables.build
    }

    fn extended_mut(tables: &mut ExtensionTables) -> &mut Vec<ActionTypeExtension<Self>> {
        &mut tables.build
    }
}

// ---------------------------------------------------------------------------
// Deploy
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum DeployOperation {
    Configure,
    Validate,
    GetOutputs,
    Deploy,
    GetStatus,
    Delete,
    Exec,
    GetLogs,
    GetPortForward,
    StopPortForward,
}

impl Operation for DeployOperation {
    const KIND: Kind = Kind::Deploy;

    fn all() -> &'static [Self] {
        &[
            Self::Configure,
            Self::Validate,
            Self::GetOutputs,
            Self::Deploy,
            Self::GetStatus,
            Self::Delete,
            Self::Exec,
            Self::GetLogs,
            Self::GetPortForward,
            Self::StopPortForward,
        ]
    }

    fn name(self) -> &'static str {
        match self {
            Self::Configure => "configure",
            Self::Validate => "validate",
            Self::GetOutputs => "getOutputs",
            Self::Deploy => "deploy",
            Self::GetStatus => "getStatus",
            Self::Delete => "delete",
            Self::Exec => "exec",
            Self::GetLogs => "getLogs",
            Self::GetPortForward => "getPortForward",
            Self::StopPortForward => "stopPortForward",
        }
    }

    fn lifecycle(self) -> Option<Lifecycle> {
        match self {
            Self::Deploy => Some(execution("deploying", transition(ActionState::Ready, "ready"))),
            Self::GetStatus => Some(status_query(
                "unknown",
                transition(ActionState::Cached, "ready"),
                transition(ActionState::NotReady, "outdated"),
            )),
            Self::Delete => Some(Lifecycle {
                starting: transition(ActionState::Processing, "deleting"),
                mutating: false,
                terminal: TerminalRule::Always(transition(ActionState::NotReady, "missing")),
            }),
            _ => None,
        }
    }

    fn outputs_check(self) -> Option<OutputsCheck> {
        match self {
            Self::GetOutputs => Some(STATIC_OUTPUTS),
            Self::Deploy => Some(RUNTIME_OUTPUTS),
            Self::GetStatus => Some(READY_RUNTIME_OUTPUTS),
            _ => None,
        }
    }

    fn created(tables: &ActionTypeTables) -> &[ActionTypeDefinition<Self>] {
        &tables.deploy
    }

    fn created_mut(tables: &mut ActionTypeTables) -> &mut Vec<ActionTypeDefinition<Self>> {
        &mut tables.deploy
    }

    fn extended(tables: &ExtensionTables) -> &[ActionTypeExtension<Self>] {
        &tables.deploy
    }

    fn extended_mut(tables: &mut ExtensionTables) -> &mut Vec<ActionTypeExtension<Self>> {
        &mut tables.deploy
    }
}

// ---------------------------------------------------------------------------
// Run and Test
// ---------------------------------------------------------------------------

fn run_lifecycle() -> Lifecycle {
    Lifecycle {
        starting: transition(ActionState::Processing, "running"),
        mutating: true,
        terminal: TerminalRule::ByResultState {
            ready: transition(ActionState::Ready, "succeeded"),
            failed: Some(transition(ActionState::Failed, "failed")),
            otherwise: transition(ActionState::Ready, "succeeded"),
        },
    }
}

fn get_result_lifecycle() -> Lifecycle {
    status_query(
        "unknown",
        transition(ActionState::Cached, "succeeded"),
        transition(ActionState::NotReady, "unknown"),
    )
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum RunOperation {
    Configure,
    Validate,
    GetOutputs,
    Run,
    GetResult,
}

impl Operation for RunOperation {
    const KIND: Kind = Kind::Run;

    fn all() -> &'static [Self] {
        &[Self::Configure, Self::Validate, Self::GetOutputs, Self::Run, Self::GetResult]
    }

    fn name(self) -> &'static str {
        match self {
            Self::Configure => "configure",
            Self::Validate => "validate",
            Self::GetOutputs => "getOutputs",
            Self::Run => "run",
            Self::GetResult => "getResult",
        }
    }

    fn lifecycle(self) -> Option<Lifecycle> {
        match self {
            Self::Run => Some(run_lifecycle()),
            Self::GetResult => Some(get_result_lifecycle()),
            _ => None,
        }
    }

    fn outputs_check(self) -> Option<OutputsCheck> {
        match self {
            Self::GetOutputs => Some(STATIC_OUTPUTS),
            Self::Run => Some(RUNTIME_OUTPUTS),
            Self::GetResult => Some(READY_RUNTIME_OUTPUTS),
            _ => None,
        }
    }

    fn created(tables: &ActionTypeTables) -> &[ActionTypeDefinition<Self>] {
        &tables.run
    }

    fn created_mut(tables: &mut ActionTypeTables) -> &mut Vec<ActionTypeDefinition<Self>> {
        &mut tables.run
    }

    fn extended(tables: &ExtensionTables) -> &[ActionTypeExtension<Self>] {
        &tables.run
    }

    fn extended_mut(tables: &mut ExtensionTables) -> &mut Vec<ActionTypeExtension<Self>> {
        &mut tables.run
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum TestOperation {
    Configure,
    Validate,
    GetOutputs,
    Run,
    GetResult,
}

impl Operation for TestOperation {
    const KIND: Kind = Kind::Test;

    fn all() -> &'static [Self] {
        &[Self::Configure, Self::Validate, Self::GetOutputs, Self::Run, Self::GetResult]
    }

    fn name(self) -> &'static str {
        match self {
            Self::Configure => "configure",
            Self::Validate => "validate",
            Self::GetOutputs => "getOutputs",
            Self::Run => "run",
            Self::GetResult => "getResult",
        }
    }

    fn lifecycle(self) -> Option<Lifecycle> {
        match self {
            Self::Run => Some(run_lifecycle()),
            Self::GetResult => Some(get_result_lifecycle()),
            _ => None,
        }
    }

    fn outputs_check(self) -> Option<OutputsCheck> {
        match self {
            Self::GetOutputs => Some(STATIC_OUTPUTS),
            Self::Run => Some(RUNTIME_OUTPUTS),
            Self::GetResult => Some(READY_RUNTIME_OUTPUTS),
            _ => None,
        }
    }

    fn created(tables: &ActionTypeTables) -> &[ActionTypeDefinition<Self>] {
        &tables.test
    }

    fn created_mut(tables: &mut ActionTypeTables) -> &mut Vec<ActionTypeDefinition<Self>> {
        &mut tables.test
    }

    fn extended(tables: &ExtensionTables) -> &[ActionTypeExtension<Self>] {
        &tables.test
    }

    fn extended_mut(tables: &mut ExtensionTables) -> &mut Vec<ActionTypeExtension<Self>> {
        &mut tables.test
    }
}

// ---------------------------------------------------------------------------
// Provider
// ---------------------------------------------------------------------------

/// Plugin-level operations. These are keyed by plugin, not by action type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ProviderOperation {
    ConfigureProvider,
    GetEnvironmentStatus,
    PrepareEnvironment,
    CleanupEnvironment,
}

impl ProviderOperation {
    pub fn all() -> &'static [Self] {
        &[
            Self::ConfigureProvider,
            Self::GetEnvironmentStatus,
            Self::PrepareEnvironment,
            Self::CleanupEnvironment,
        ]
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::ConfigureProvider => "configureProvider",
            Self::GetEnvironmentStatus => "getEnvironmentStatus",
            Self::PrepareEnvironment => "prepareEnvironment",
            Self::CleanupEnvironment => "cleanupEnvironment",
        }
    }
}

macro_rules! display_by_name {
    ($($ty:ty),*) => {
        $(
            impl fmt::Display for $ty {
                fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                    f.write_str(self.name())
                }
            }
        )*
    };
}

display_by_name!(BuildOperation, DeployOperation, RunOperation, TestOperation, ProviderOperation);
