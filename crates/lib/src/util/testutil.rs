//! Test doubles for the platform facades and the operator UI.
//!
//! [`FakePlatform`] is an in-memory cloud controller that records every call,
//! can fail a named call on demand, and replays scripted package and instance
//! states. Guids are derived from names (`foo` -> `foo-guid`) so tests can
//! script an app before the push creates it.

use std::collections::{HashMap, VecDeque};
use std::fs::File;
use std::path::Path;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use futures::{StreamExt, stream};

use crate::api::{
  ApiError, App, AppParams, AppState, CloudController, Domain, FileResource, INVALID_RELATION, InstanceSnapshot,
  InstanceState, LogEvent, LogStream, LogSubscription, PackageState, Route, SERVICE_BINDING_APP_SERVICE_TAKEN,
  ServiceInstance, Stack,
};
use crate::ui::Ui;

pub fn http_domain(name: &str) -> Domain {
  Domain {
    guid: format!("{}-guid", name),
    name: name.to_string(),
    router_group_type: None,
    shared: false,
  }
}

pub fn tcp_domain(name: &str) -> Domain {
  Domain {
    router_group_type: Some("tcp".to_string()),
    ..http_domain(name)
  }
}

/// One snapshot per state, indexed in order.
pub fn snapshots(states: &[InstanceState]) -> Vec<InstanceSnapshot> {
  states
    .iter()
    .enumerate()
    .map(|(index, state)| InstanceSnapshot {
      index: index as u32,
      state: *state,
      details: None,
    })
    .collect()
}

/// An upload as received by [`FakePlatform`].
#[derive(Debug, Clone)]
pub struct RecordedUpload {
  pub app_guid: String,
  /// File entry names of the zip, or `None` when no zip was sent.
  pub zip_entries: Option<Vec<String>>,
  pub manifest: Vec<FileResource>,
}

#[derive(Default)]
struct State {
  next_id: u32,
  calls: HashMap<String, usize>,
  failures: HashMap<String, usize>,
  apps: Vec<App>,
  created: Vec<AppParams>,
  updates: Vec<(String, AppParams)>,
  package_scripts: HashMap<String, VecDeque<PackageState>>,
  failure_reasons: HashMap<String, String>,
  instance_scripts: HashMap<String, VecDeque<Vec<InstanceSnapshot>>>,
  known_files: Vec<FileResource>,
  uploads: Vec<RecordedUpload>,
  routes: Vec<Route>,
  private_domains: Vec<Domain>,
  shared_domains: Vec<Domain>,
  stacks: Vec<Stack>,
  services: Vec<ServiceInstance>,
  service_bindings: Vec<(String, String)>,
}

impl State {
  fn app_mut(&mut self, guid: &str) -> Result<&mut App, ApiError> {
    self
      .apps
      .iter_mut()
      .find(|a| a.guid == guid)
      .ok_or_else(|| ApiError::not_found("app", guid))
  }

  fn next_id(&mut self) -> u32 {
    self.next_id += 1;
    self.next_id
  }
}

/// Replay a script, repeating its last entry once exhausted.
fn next_scripted<T: Clone>(script: Option<&mut VecDeque<T>>) -> Option<T> {
  let script = script?;
  if script.len() > 1 {
    script.pop_front()
  } else {
    script.front().cloned()
  }
}

fn http_error(status: u16, code: u64, error_code: &str, description: &str) -> ApiError {
  ApiError::Http {
    status,
    code,
    error_code: error_code.to_string(),
    description: description.to_string(),
  }
}

#[derive(Default)]
pub struct FakePlatform {
  state: Mutex<State>,
}

impl FakePlatform {
  pub fn new() -> Self {
    Self::default()
  }

  fn lock(&self) -> std::sync::MutexGuard<'_, State> {
    self.state.lock().unwrap()
  }

  /// Count a call, failing it if a failure was queued with [`fail_next`](Self::fail_next).
  fn record(&self, name: &str) -> Result<(), ApiError> {
    let mut state = self.lock();
    *state.calls.entry(name.to_string()).or_default() += 1;
    if let Some(pending) = state.failures.get_mut(name) {
      if *pending > 0 {
        *pending -= 1;
        return Err(http_error(500, 10001, "CF-InjectedFailure", &format!("{} failed", name)));
      }
    }
    Ok(())
  }

  pub fn calls(&self, name: &str) -> usize {
    self.lock().calls.get(name).copied().unwrap_or(0)
  }

  /// Make the next call to `name` fail with a server error.
  pub fn fail_next(&self, name: &str) {
    *self.lock().failures.entry(name.to_string()).or_default() += 1;
  }

  pub fn add_app(&self, name: &str) -> App {
    let app = App {
      guid: format!("{}-guid", name),
      name: name.to_string(),
      space_guid: "space-guid".to_string(),
      instances: 1,
      ..App::default()
    };
    self.lock().apps.push(app.clone());
    app
  }

  pub fn app(&self, guid: &str) -> App {
    self.lock().app_mut(guid).unwrap().clone()
  }

  /// Modify an app directly, without recording an update.
  pub fn update_app_now(&self, guid: &str, f: impl FnOnce(&mut App)) -> App {
    let mut state = self.lock();
    let app = state.app_mut(guid).unwrap();
    f(app);
    app.clone()
  }

  pub fn created_apps(&self) -> Vec<AppParams> {
    self.lock().created.clone()
  }

  pub fn updates(&self) -> Vec<(String, AppParams)> {
    self.lock().updates.clone()
  }

  /// Package states returned by successive `get_app` calls for `guid`.
  pub fn script_package_states(&self, guid: &str, states: &[PackageState]) {
    self
      .lock()
      .package_scripts
      .insert(guid.to_string(), states.iter().copied().collect());
  }

  pub fn set_staging_failed_reason(&self, guid: &str, reason: &str) {
    self.lock().failure_reasons.insert(guid.to_string(), reason.to_string());
  }

  /// Snapshot lists returned by successive `instances` calls for `guid`.
  pub fn script_instances(&self, guid: &str, polls: Vec<Vec<InstanceSnapshot>>) {
    self.lock().instance_scripts.insert(guid.to_string(), polls.into());
  }

  pub fn set_detected_start_command(&self, guid: &str, command: &str) {
    self.update_app_now(guid, |a| a.detected_start_command = Some(command.to_string()));
  }

  pub fn store_files(&self, files: impl IntoIterator<Item = FileResource>) {
    self.lock().known_files.extend(files);
  }

  pub fn last_upload(&self) -> Option<RecordedUpload> {
    self.lock().uploads.last().cloned()
  }

  pub fn add_route(&self, host: &str, domain: &Domain, path: &str) -> Route {
    let mut state = self.lock();
    let route = Route {
      guid: format!("route-{}", state.next_id()),
      host: host.to_string(),
      domain: domain.clone(),
      path: path.to_string(),
      port: None,
      app_guids: Vec::new(),
    };
    state.routes.push(route.clone());
    route
  }

  /// Bind a route directly, keeping `app` in sync.
  pub fn bind_now(&self, route: &Route, app: &mut App) {
    let mut state = self.lock();
    let Some(stored) = state.routes.iter_mut().find(|r| r.guid == route.guid) else {
      panic!("unknown route {}", route.guid);
    };
    stored.app_guids.push(app.guid.clone());
    let stored = stored.clone();
    state.app_mut(&app.guid).unwrap().routes.push(stored.clone());
    app.routes.push(stored);
  }

  pub fn add_private_domain(&self, domain: Domain) {
    self.lock().private_domains.push(domain);
  }

  pub fn add_shared_domain(&self, domain: Domain) {
    self.lock().shared_domains.push(Domain { shared: true, ..domain });
  }

  pub fn add_stack(&self, name: &str) -> Stack {
    let stack = Stack {
      guid: format!("{}-guid", name),
      name: name.to_string(),
    };
    self.lock().stacks.push(stack.clone());
    stack
  }

  pub fn add_service(&self, name: &str) -> ServiceInstance {
    let instance = ServiceInstance {
      guid: format!("{}-guid", name),
      name: name.to_string(),
    };
    self.lock().services.push(instance.clone());
    instance
  }

  pub fn bind_service_now(&self, app_guid: &str, service_guid: &str) {
    self
      .lock()
      .service_bindings
      .push((app_guid.to_string(), service_guid.to_string()));
  }

  /// Service instance guids bound to `app_guid`.
  pub fn service_bindings(&self, app_guid: &str) -> Vec<String> {
    self
      .lock()
      .service_bindings
      .iter()
      .filter(|(app, _)| app == app_guid)
      .map(|(_, service)| service.clone())
      .collect()
  }
}

fn zip_file_names(path: &Path) -> Vec<String> {
  let mut archive = zip::ZipArchive::new(File::open(path).unwrap()).unwrap();
  (0..archive.len())
    .map(|i| archive.by_index(i).unwrap().name().to_string())
    .filter(|name| !name.ends_with('/'))
    .collect()
}

#[async_trait]
impl CloudController for FakePlatform {
  async fn match_known_files(&self, files: &[FileResource]) -> Result<Vec<FileResource>, ApiError> {
    self.record("match_known_files")?;
    let state = self.lock();
    Ok(
      files
        .iter()
        .filter(|f| state.known_files.iter().any(|k| k.same_file(f)))
        .cloned()
        .collect(),
    )
  }

  async fn upload_bits(&self, app_guid: &str, zip: Option<&Path>, resources: &[FileResource]) -> Result<(), ApiError> {
    self.record("upload_bits")?;
    let upload = RecordedUpload {
      app_guid: app_guid.to_string(),
      zip_entries: zip.map(zip_file_names),
      manifest: resources.to_vec(),
    };
    self.lock().uploads.push(upload);
    Ok(())
  }

  async fn find_app(&self, _space_guid: &str, name: &str) -> Result<App, ApiError> {
    self.record("find_app")?;
    self
      .lock()
      .apps
      .iter()
      .find(|a| a.name == name)
      .cloned()
      .ok_or_else(|| ApiError::not_found("app", name))
  }

  async fn get_app(&self, app_guid: &str) -> Result<App, ApiError> {
    self.record("get_app")?;
    let mut state = self.lock();
    let next = next_scripted(state.package_scripts.get_mut(app_guid));
    let reason = state.failure_reasons.get(app_guid).cloned();

    let app = state.app_mut(app_guid)?;
    if let Some(package_state) = next {
      app.package_state = package_state;
    }
    if app.package_state == PackageState::Failed {
      app.staging_failed_reason = reason;
    }
    Ok(app.clone())
  }

  async fn create_app(&self, params: &AppParams) -> Result<App, ApiError> {
    self.record("create_app")?;
    let name = params.name.clone().unwrap_or_default();
    let app = App {
      guid: format!("{}-guid", name),
      name,
      space_guid: params.space_guid.clone().unwrap_or_default(),
      instances: params.instances.unwrap_or(1),
      command: params.command.clone(),
      environment_json: params.environment_json.clone().unwrap_or_default(),
      ..App::default()
    };
    let mut state = self.lock();
    state.created.push(params.clone());
    state.apps.push(app.clone());
    Ok(app)
  }

  async fn update_app(&self, app_guid: &str, params: &AppParams) -> Result<App, ApiError> {
    self.record("update_app")?;
    let mut state = self.lock();
    state.updates.push((app_guid.to_string(), params.clone()));

    let app = state.app_mut(app_guid)?;
    if let Some(app_state) = params.state {
      app.state = app_state;
    }
    if let Some(command) = &params.command {
      app.command = Some(command.clone());
    }
    if let Some(instances) = params.instances {
      app.instances = instances;
    }
    if let Some(env) = &params.environment_json {
      app.environment_json = env.clone();
    }
    if app.state == AppState::Started {
      app.running_instances = app.instances;
    }
    Ok(app.clone())
  }

  async fn find_stack(&self, name: &str) -> Result<Stack, ApiError> {
    self.record("find_stack")?;
    self
      .lock()
      .stacks
      .iter()
      .find(|s| s.name == name)
      .cloned()
      .ok_or_else(|| ApiError::not_found("stack", name))
  }

  async fn private_domains(&self, _org_guid: &str) -> Result<Vec<Domain>, ApiError> {
    self.record("private_domains")?;
    Ok(self.lock().private_domains.clone())
  }

  async fn shared_domains(&self) -> Result<Vec<Domain>, ApiError> {
    self.record("shared_domains")?;
    Ok(self.lock().shared_domains.clone())
  }

  async fn find_route(&self, host: &str, domain: &Domain, path: &str) -> Result<Route, ApiError> {
    self.record("find_route")?;
    self
      .lock()
      .routes
      .iter()
      .find(|r| r.host == host && r.domain.guid == domain.guid && r.path == path)
      .cloned()
      .ok_or_else(|| ApiError::not_found("route", domain.url_for(host, path, None)))
  }

  async fn create_route(&self, host: &str, domain: &Domain, path: &str, random_port: bool) -> Result<Route, ApiError> {
    self.record("create_route")?;
    let mut state = self.lock();
    let id = state.next_id();
    let route = if random_port {
      Route {
        guid: format!("route-{}", id),
        domain: domain.clone(),
        port: Some(61000 + id as u16),
        ..Route::default()
      }
    } else {
      Route {
        guid: format!("route-{}", id),
        host: host.to_string(),
        domain: domain.clone(),
        path: path.to_string(),
        ..Route::default()
      }
    };
    state.routes.push(route.clone());
    Ok(route)
  }

  async fn bind_route(&self, route_guid: &str, app_guid: &str) -> Result<(), ApiError> {
    self.record("bind_route")?;
    let mut state = self.lock();
    let route = state
      .routes
      .iter_mut()
      .find(|r| r.guid == route_guid)
      .ok_or_else(|| ApiError::not_found("route", route_guid))?;

    if route.app_guids.iter().any(|a| a == app_guid) {
      return Ok(());
    }
    if !route.app_guids.is_empty() {
      return Err(http_error(
        400,
        INVALID_RELATION,
        "CF-InvalidRelation",
        "The requested route relation is invalid",
      ));
    }

    route.app_guids.push(app_guid.to_string());
    let route = route.clone();
    state.app_mut(app_guid)?.routes.push(route);
    Ok(())
  }

  async fn unbind_route(&self, route_guid: &str, app_guid: &str) -> Result<(), ApiError> {
    self.record("unbind_route")?;
    let mut state = self.lock();
    if let Some(route) = state.routes.iter_mut().find(|r| r.guid == route_guid) {
      route.app_guids.retain(|a| a != app_guid);
    }
    state.app_mut(app_guid)?.routes.retain(|r| r.guid != route_guid);
    Ok(())
  }

  async fn find_service_instance(&self, _space_guid: &str, name: &str) -> Result<ServiceInstance, ApiError> {
    self.record("find_service_instance")?;
    self
      .lock()
      .services
      .iter()
      .find(|s| s.name == name)
      .cloned()
      .ok_or_else(|| ApiError::not_found("service instance", name))
  }

  async fn bind_service(&self, app_guid: &str, service_instance_guid: &str) -> Result<(), ApiError> {
    self.record("bind_service")?;
    let binding = (app_guid.to_string(), service_instance_guid.to_string());
    let mut state = self.lock();
    if state.service_bindings.contains(&binding) {
      return Err(http_error(
        400,
        SERVICE_BINDING_APP_SERVICE_TAKEN,
        "CF-ServiceBindingAppServiceTaken",
        "The app is already bound to the service",
      ));
    }
    state.service_bindings.push(binding);
    Ok(())
  }

  async fn instances(&self, app_guid: &str) -> Result<Vec<InstanceSnapshot>, ApiError> {
    self.record("instances")?;
    Ok(next_scripted(self.lock().instance_scripts.get_mut(app_guid)).unwrap_or_default())
  }
}

enum LogBehavior {
  Connected(Vec<LogEvent>),
  Endless(LogEvent),
  NeverConnects,
  Failing,
}

/// Log stream double. A connected stream yields its events and then stays open.
pub struct FakeLogStream {
  behavior: LogBehavior,
  subscriptions: AtomicUsize,
}

impl FakeLogStream {
  fn with(behavior: LogBehavior) -> Self {
    Self {
      behavior,
      subscriptions: AtomicUsize::new(0),
    }
  }

  pub fn connected(events: Vec<LogEvent>) -> Self {
    Self::with(LogBehavior::Connected(events))
  }

  /// A stream that always has another event ready.
  pub fn endless(event: LogEvent) -> Self {
    Self::with(LogBehavior::Endless(event))
  }

  pub fn never_connects() -> Self {
    Self::with(LogBehavior::NeverConnects)
  }

  pub fn failing() -> Self {
    Self::with(LogBehavior::Failing)
  }

  pub fn subscriptions(&self) -> usize {
    self.subscriptions.load(Ordering::SeqCst)
  }
}

#[async_trait]
impl LogStream for FakeLogStream {
  async fn subscribe(&self, _app_guid: &str) -> Result<LogSubscription, ApiError> {
    self.subscriptions.fetch_add(1, Ordering::SeqCst);
    match &self.behavior {
      LogBehavior::Connected(events) => Ok(
        stream::iter(events.clone().into_iter().map(Ok))
          .chain(stream::pending())
          .boxed(),
      ),
      LogBehavior::Endless(event) => {
        let event = event.clone();
        Ok(stream::repeat_with(move || Ok(event.clone())).boxed())
      }
      LogBehavior::NeverConnects => futures::future::pending().await,
      LogBehavior::Failing => Err(http_error(502, 0, "", "log server unavailable")),
    }
  }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Line {
  Say(String),
  Warn(String),
}

/// In-memory [`Ui`] that keeps every line in order.
#[derive(Default)]
pub struct RecordingUi {
  lines: Mutex<Vec<Line>>,
}

impl RecordingUi {
  /// Every line, said or warned, in order.
  pub fn lines(&self) -> Vec<String> {
    self
      .lines
      .lock()
      .unwrap()
      .iter()
      .map(|line| match line {
        Line::Say(s) | Line::Warn(s) => s.clone(),
      })
      .collect()
  }

  pub fn contains(&self, needle: &str) -> bool {
    self.lines().iter().any(|l| l.contains(needle))
  }

  pub fn warned(&self, needle: &str) -> bool {
    self
      .lines
      .lock()
      .unwrap()
      .iter()
      .any(|line| matches!(line, Line::Warn(s) if s.contains(needle)))
  }
}

impl Ui for RecordingUi {
  fn say(&self, message: &str) {
    self.lines.lock().unwrap().push(Line::Say(message.to_string()));
  }

  fn warn(&self, message: &str) {
    self.lines.lock().unwrap().push(Line::Warn(message.to_string()));
  }
}
