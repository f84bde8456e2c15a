//! Common test utilities: an in-memory machine and recording backends
#![allow(dead_code)]

use async_trait::async_trait;
use parking_lot::{Mutex, RwLock};
use settings_engine::config::Config;
use settings_engine::contract::*;
use settings_engine::domain::{
    ApplyService, Backends, CompatibilityFilter, ConfirmHandler, DiscoveryService, EventPublisher,
    ImportContext, PowerConfigBackend, ProcessRestarter, RegistryImporter, RegistryStore,
    ScheduledTaskBackend, ScriptRunner, SessionProvider, SettingEvent, SettingsCatalog,
    UserSession, WaveBridge,
};
use settings_engine::infra::StaticSettingsCatalog;
use settings_engine::{EnginePorts, SettingsEngineModule};
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("debug")),
        )
        .with_test_writer()
        .try_init();
}

pub fn print_test_header(test_name: &str, purpose: &[&str]) {
    println!("\n🧪 TEST: {}", test_name);
    if let Some(first) = purpose.first() {
        println!("📋 PURPOSE: {}", first);
    }
    for line in purpose.iter().skip(1) {
        println!("   {}", line);
    }
}

// ===== Setting builders =====

/// Registry operation whose value name is the setting id
pub fn registry_op(value_name: &str) -> SettingOperation {
    SettingOperation::Registry(RegistryOperation {
        key_path: "HKCU\\Software\\Test".to_string(),
        value_name: value_name.to_string(),
        value_kind: RegistryValueKind::Dword,
        enabled_value: Some(RegistryValue::Integer(1)),
        disabled_value: Some(RegistryValue::Integer(0)),
    })
}

/// Toggle setting backed by one registry value named after it
pub fn toggle(id: &str, group: &str) -> SettingDefinition {
    let mut setting = SettingDefinition::new(id, group, InputKind::Toggle);
    setting.operations = vec![registry_op(id)];
    setting
}

/// Selection setting backed by one registry value named after it.
///
/// Option 0 disables the value; option `i` writes `i`.
pub fn selection(id: &str, group: &str, names: &[&str]) -> SettingDefinition {
    let mut setting = SettingDefinition::new(id, group, InputKind::Selection);
    setting.operations = vec![registry_op(id)];
    setting.selection = Some(SelectionOptions {
        options: names
            .iter()
            .enumerate()
            .map(|(index, name)| SelectionOption {
                display_name: name.to_string(),
                values: ValueMap::from([(
                    id.to_string(),
                    (index > 0).then_some(RegistryValue::Integer(index as i64)),
                )]),
            })
            .collect(),
    });
    setting
}

pub fn dependency(
    owner: &str,
    required: &str,
    kind: DependencyKind,
    required_value: Option<&str>,
) -> SettingDependency {
    SettingDependency {
        dependent_id: owner.to_string(),
        required_id: required.to_string(),
        kind,
        required_value: required_value.map(str::to_string),
    }
}

// ===== In-memory machine =====

/// One recorded registry write
#[derive(Debug, Clone, PartialEq)]
pub struct RegistryWrite {
    pub value_name: String,
    pub enable: bool,
    pub value: Option<RegistryValue>,
}

/// Registry store and discovery service over the same in-memory state.
///
/// A write to value `x` sets the state of setting `x`; settings never written
/// are reported disabled.
#[derive(Default)]
pub struct InMemoryMachine {
    enabled: RwLock<HashMap<String, bool>>,
    indices: RwLock<HashMap<String, i64>>,
    writes: Mutex<Vec<RegistryWrite>>,
    journal: Mutex<Vec<String>>,
    failing: RwLock<HashSet<String>>,
    delays: RwLock<HashMap<String, Duration>>,
    unreadable: RwLock<HashSet<String>>,
    queries: Mutex<usize>,
}

impl InMemoryMachine {
    pub fn set_enabled(&self, id: &str, enabled: bool) {
        self.enabled.write().insert(id.to_string(), enabled);
    }

    pub fn set_index(&self, id: &str, index: i64) {
        self.enabled.write().insert(id.to_string(), index != 0);
        self.indices.write().insert(id.to_string(), index);
    }

    pub fn is_enabled(&self, id: &str) -> bool {
        self.enabled.read().get(id).copied().unwrap_or(false)
    }

    pub fn index_of(&self, id: &str) -> Option<i64> {
        self.indices.read().get(id).copied()
    }

    /// Writes to this value fail
    pub fn fail_writes(&self, value_name: &str) {
        self.failing.write().insert(value_name.to_string());
    }

    /// Writes to this value take `delay`
    pub fn delay_writes(&self, value_name: &str, delay: Duration) {
        self.delays.write().insert(value_name.to_string(), delay);
    }

    /// Discovery reports a failed state for this setting
    pub fn make_unreadable(&self, id: &str) {
        self.unreadable.write().insert(id.to_string());
    }

    pub fn writes(&self) -> Vec<RegistryWrite> {
        self.writes.lock().clone()
    }

    pub fn writes_to(&self, value_name: &str) -> Vec<RegistryWrite> {
        self.writes
            .lock()
            .iter()
            .filter(|w| w.value_name == value_name)
            .cloned()
            .collect()
    }

    /// `start:<name>` / `end:<name>` entries in the order writes began and finished
    pub fn journal(&self) -> Vec<String> {
        self.journal.lock().clone()
    }

    pub fn position(&self, entry: &str) -> Option<usize> {
        self.journal.lock().iter().position(|e| e == entry)
    }

    pub fn query_count(&self) -> usize {
        *self.queries.lock()
    }
}

#[async_trait]
impl RegistryStore for InMemoryMachine {
    async fn apply(
        &self,
        operation: &RegistryOperation,
        enable: bool,
        value: Option<&RegistryValue>,
    ) -> anyhow::Result<()> {
        let name = operation.value_name.clone();
        self.journal.lock().push(format!("start:{}", name));
        self.writes.lock().push(RegistryWrite {
            value_name: name.clone(),
            enable,
            value: value.cloned(),
        });

        let delay = self.delays.read().get(&name).copied();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        if self.failing.read().contains(&name) {
            self.journal.lock().push(format!("end:{}", name));
            anyhow::bail!("access denied writing {}", name);
        }

        self.enabled.write().insert(name.clone(), enable);
        match value {
            Some(RegistryValue::Integer(v)) => {
                self.indices.write().insert(name.clone(), *v);
            }
            _ if !enable => {
                self.indices.write().insert(name.clone(), 0);
            }
            _ => {}
        }
        self.journal.lock().push(format!("end:{}", name));
        Ok(())
    }
}

#[async_trait]
impl DiscoveryService for InMemoryMachine {
    async fn get_states(
        &self,
        definitions: &[SettingDefinition],
    ) -> anyhow::Result<HashMap<String, SettingState>> {
        *self.queries.lock() += 1;
        let enabled = self.enabled.read();
        let indices = self.indices.read();
        let unreadable = self.unreadable.read();
        Ok(definitions
            .iter()
            .map(|d| {
                let state = if unreadable.contains(&d.id) {
                    SettingState::failed("cannot read state")
                } else {
                    let state = SettingState::enabled(enabled.get(&d.id).copied().unwrap_or(false));
                    match indices.get(&d.id) {
                        Some(index) => state.with_value(SettingValue::Integer(*index)),
                        None => state,
                    }
                };
                (d.id.clone(), state)
            })
            .collect())
    }
}

// ===== Recording backends =====

#[derive(Default)]
pub struct RecordingTasks {
    pub calls: Mutex<Vec<(String, bool)>>,
}

#[async_trait]
impl ScheduledTaskBackend for RecordingTasks {
    async fn set_enabled(&self, task_path: &str, enable: bool) -> anyhow::Result<()> {
        self.calls.lock().push((task_path.to_string(), enable));
        Ok(())
    }
}

#[derive(Default)]
pub struct RecordingScripts {
    pub runs: Mutex<Vec<(String, String)>>,
    pub failing: RwLock<HashSet<String>>,
}

#[async_trait]
impl ScriptRunner for RecordingScripts {
    async fn run(&self, name: &str, script: &str) -> anyhow::Result<()> {
        self.runs.lock().push((name.to_string(), script.to_string()));
        if self.failing.read().contains(name) {
            anyhow::bail!("script {} exited with code 1", name);
        }
        Ok(())
    }
}

#[derive(Default)]
pub struct RecordingPower {
    pub writes: Mutex<Vec<(String, i64)>>,
}

#[async_trait]
impl PowerConfigBackend for RecordingPower {
    async fn apply(&self, operation: &PowerConfigOperation, value: i64) -> anyhow::Result<()> {
        self.writes.lock().push((operation.setting_guid.clone(), value));
        Ok(())
    }
}

/// One recorded import
#[derive(Debug, Clone)]
pub struct ImportCall {
    pub path: PathBuf,
    pub existed: bool,
    pub content: Vec<u8>,
    pub context: ImportContext,
}

#[derive(Default)]
pub struct RecordingImporter {
    pub calls: Mutex<Vec<ImportCall>>,
    pub fail: RwLock<bool>,
}

#[async_trait]
impl RegistryImporter for RecordingImporter {
    async fn import(&self, path: &Path, context: &ImportContext) -> anyhow::Result<()> {
        self.calls.lock().push(ImportCall {
            path: path.to_path_buf(),
            existed: path.exists(),
            content: std::fs::read(path).unwrap_or_default(),
            context: context.clone(),
        });
        if *self.fail.read() {
            anyhow::bail!("import rejected");
        }
        Ok(())
    }
}

pub struct FixedSessions(pub Option<UserSession>);

#[async_trait]
impl SessionProvider for FixedSessions {
    async fn interactive_user_session(&self) -> anyhow::Result<Option<UserSession>> {
        Ok(self.0.clone())
    }
}

#[derive(Default)]
pub struct RecordingRestarter {
    pub restarts: Mutex<Vec<RestartTarget>>,
    pub fail: RwLock<bool>,
}

#[async_trait]
impl ProcessRestarter for RecordingRestarter {
    async fn restart_process(&self, name: &str) -> anyhow::Result<()> {
        self.restarts.lock().push(RestartTarget::Process(name.to_string()));
        if *self.fail.read() {
            anyhow::bail!("cannot restart {}", name);
        }
        Ok(())
    }

    async fn restart_service(&self, name: &str) -> anyhow::Result<()> {
        self.restarts.lock().push(RestartTarget::Service(name.to_string()));
        if *self.fail.read() {
            anyhow::bail!("cannot restart {}", name);
        }
        Ok(())
    }
}

/// Forwards published events to a channel
pub struct ChannelPublisher {
    sender: mpsc::UnboundedSender<SettingEvent>,
}

impl ChannelPublisher {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<SettingEvent>) {
        let (sender, receiver) = mpsc::unbounded_channel();
        (Self { sender }, receiver)
    }
}

#[async_trait]
impl EventPublisher for ChannelPublisher {
    async fn publish(&self, event: SettingEvent) -> anyhow::Result<()> {
        self.sender.send(event)?;
        Ok(())
    }
}

/// Drops the listed settings
#[derive(Default)]
pub struct ExcludingCompatibility {
    pub excluded: RwLock<HashSet<String>>,
}

#[async_trait]
impl CompatibilityFilter for ExcludingCompatibility {
    async fn filter(&self, definitions: Vec<SettingDefinition>) -> anyhow::Result<Vec<SettingDefinition>> {
        let excluded = self.excluded.read();
        Ok(definitions
            .into_iter()
            .filter(|d| !excluded.contains(&d.id))
            .collect())
    }
}

/// Answers confirmations from a table; unlisted settings are confirmed
#[derive(Default)]
pub struct ScriptedConfirm {
    pub answers: RwLock<HashMap<String, Confirmation>>,
    pub asked: Mutex<Vec<(String, Option<SettingValue>)>>,
}

#[async_trait]
impl ConfirmHandler for ScriptedConfirm {
    async fn confirm(
        &self,
        setting_id: &str,
        pending_value: Option<&SettingValue>,
        _definition: &SettingDefinition,
    ) -> anyhow::Result<Confirmation> {
        self.asked
            .lock()
            .push((setting_id.to_string(), pending_value.cloned()));
        Ok(self
            .answers
            .read()
            .get(setting_id)
            .copied()
            .unwrap_or_else(Confirmation::confirmed))
    }
}

/// Records every request and forwards it
pub struct RecordingApplier {
    inner: Arc<dyn SettingApplier>,
    pub requests: Mutex<Vec<ApplyRequest>>,
}

impl RecordingApplier {
    pub fn new(inner: Arc<dyn SettingApplier>) -> Self {
        Self {
            inner,
            requests: Mutex::new(Vec::new()),
        }
    }
}

#[async_trait]
impl SettingApplier for RecordingApplier {
    async fn apply_setting(
        &self,
        request: ApplyRequest,
        cancel: &tokio_util::sync::CancellationToken,
    ) -> Result<OperationResult, EngineError> {
        self.requests.lock().push(request.clone());
        self.inner.apply_setting(request, cancel).await
    }
}

// ===== Engine fixture =====

/// Fully wired engine over the in-memory machine and recording backends
pub struct TestEngine {
    pub machine: Arc<InMemoryMachine>,
    pub tasks: Arc<RecordingTasks>,
    pub scripts: Arc<RecordingScripts>,
    pub power: Arc<RecordingPower>,
    pub importer: Arc<RecordingImporter>,
    pub restarter: Arc<RecordingRestarter>,
    pub compatibility: Arc<ExcludingCompatibility>,
    pub catalog: Arc<StaticSettingsCatalog>,
    pub events: Mutex<mpsc::UnboundedReceiver<SettingEvent>>,
    pub module: SettingsEngineModule,
}

impl TestEngine {
    pub fn new(definitions: Vec<SettingDefinition>) -> Self {
        Self::with_config(definitions, Config::default())
    }

    pub fn with_config(definitions: Vec<SettingDefinition>, config: Config) -> Self {
        init_tracing();

        let machine = Arc::new(InMemoryMachine::default());
        let tasks = Arc::new(RecordingTasks::default());
        let scripts = Arc::new(RecordingScripts::default());
        let power = Arc::new(RecordingPower::default());
        let importer = Arc::new(RecordingImporter::default());
        let restarter = Arc::new(RecordingRestarter::default());
        let compatibility = Arc::new(ExcludingCompatibility::default());
        let catalog = Arc::new(StaticSettingsCatalog::new(definitions).unwrap());
        let (publisher, events) = ChannelPublisher::new();

        let backends = test_backends(
            &machine,
            &tasks,
            &scripts,
            &power,
            &importer,
            &restarter,
            Arc::new(FixedSessions(None)),
        );
        let catalog_port: Arc<dyn SettingsCatalog> = catalog.clone();
        let ports = EnginePorts::new(machine.clone(), backends)
            .with_catalog(catalog_port)
            .with_compatibility(compatibility.clone())
            .with_event_publisher(Arc::new(publisher));

        let module = SettingsEngineModule::default();
        module.init(config, ports).unwrap();

        Self {
            machine,
            tasks,
            scripts,
            power,
            importer,
            restarter,
            compatibility,
            catalog,
            events: Mutex::new(events),
            module,
        }
    }

    pub fn service(&self) -> Arc<ApplyService> {
        self.module.service().unwrap()
    }

    pub fn bridge(&self) -> Arc<WaveBridge> {
        self.module.wave_bridge().unwrap()
    }

    /// Published events received so far
    pub fn drain_events(&self) -> Vec<SettingEvent> {
        let mut receiver = self.events.lock();
        let mut events = Vec::new();
        while let Ok(event) = receiver.try_recv() {
            events.push(event);
        }
        events
    }
}

pub fn test_backends(
    machine: &Arc<InMemoryMachine>,
    tasks: &Arc<RecordingTasks>,
    scripts: &Arc<RecordingScripts>,
    power: &Arc<RecordingPower>,
    importer: &Arc<RecordingImporter>,
    restarter: &Arc<RecordingRestarter>,
    sessions: Arc<dyn SessionProvider>,
) -> Backends {
    Backends {
        registry: machine.clone(),
        tasks: tasks.clone(),
        scripts: scripts.clone(),
        power: power.clone(),
        importer: importer.clone(),
        sessions,
        restarter: restarter.clone(),
    }
}
