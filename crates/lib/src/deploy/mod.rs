//! Deployment orchestration for one or more apps.
//!
//! For each [`AppDeploymentRequest`] the [`Deployer`] creates or updates the
//! app, reconciles its routes, uploads its bits, binds its services and
//! restarts it. The first fatal error stops the push.

pub mod request;
pub mod words;

use std::sync::Arc;

use tracing::{debug, info};

use crate::api::{
  ApiError, App, AppParams, AppState, CloudController, LogStream, SERVICE_BINDING_APP_SERVICE_TAKEN,
};
use crate::bits::{BitsUploader, UploadError, resolve_app_dir};
use crate::config::PushConfig;
use crate::error::PushError;
use crate::platform::Os;
use crate::routes::{RouteReconciler, host_name_for};
use crate::start::AppStarter;
use crate::ui::Ui;

pub use request::{AppDeploymentRequest, AppSettings, PartialApp, PushFlags, ValidationError, app_set};

pub struct Deployer {
  cc: Arc<dyn CloudController>,
  ui: Arc<dyn Ui>,
  config: Arc<PushConfig>,
  routes: RouteReconciler,
  bits: BitsUploader,
  starter: AppStarter,
}

impl Deployer {
  pub fn new(
    cc: Arc<dyn CloudController>,
    logs: Arc<dyn LogStream>,
    ui: Arc<dyn Ui>,
    config: Arc<PushConfig>,
  ) -> Self {
    Self::with_os(cc, logs, ui, config, Os::current())
  }

  /// Like [`Deployer::new`], with the host OS used for file-mode handling.
  pub fn with_os(
    cc: Arc<dyn CloudController>,
    logs: Arc<dyn LogStream>,
    ui: Arc<dyn Ui>,
    config: Arc<PushConfig>,
    os: Os,
  ) -> Self {
    Self {
      routes: RouteReconciler::new(cc.clone(), ui.clone(), config.org.guid.clone()),
      bits: BitsUploader::new(cc.clone(), ui.clone(), os),
      starter: AppStarter::new(cc.clone(), logs, ui.clone(), config.clone()),
      cc,
      ui,
      config,
    }
  }

  pub fn starter(&self) -> &AppStarter {
    &self.starter
  }

  /// Push every app in order.
  pub async fn push_all(&self, requests: &[AppDeploymentRequest]) -> Result<(), PushError> {
    for request in requests {
      self.push(request).await?;
    }
    Ok(())
  }

  /// Push one app and return its final state.
  pub async fn push(&self, request: &AppDeploymentRequest) -> Result<App, PushError> {
    info!(app = %request.name, path = %request.path.display(), "pushing app");

    let mut params = request.app_params();
    params.stack_guid = self.resolve_stack(request).await?;

    let mut app = self.create_or_update(request, params).await?;

    self.update_routes(&mut app, request).await?;

    if request.settings.docker_image.is_none() {
      self.upload(&app, request).await?;
    }

    self.bind_services(&app, &request.settings.services).await?;

    self.restart(app, request).await
  }

  async fn resolve_stack(&self, request: &AppDeploymentRequest) -> Result<Option<String>, PushError> {
    let Some(name) = &request.settings.stack else {
      return Ok(None);
    };

    self.ui.say(&format!("Using stack {}...", name));
    let stack = self.cc.find_stack(name).await?;
    self.ui.ok();
    Ok(Some(stack.guid))
  }

  async fn create_or_update(&self, request: &AppDeploymentRequest, mut params: AppParams) -> Result<App, PushError> {
    let app = match self.cc.find_app(&self.config.space.guid, &request.name).await {
      Ok(existing) => {
        self.say_targeted("Updating", &existing.name);

        // Variables set out-of-band survive a push that sets others.
        if let Some(env) = params.environment_json.as_mut() {
          for (key, value) in &existing.environment_json {
            env.entry(key.clone()).or_insert_with(|| value.clone());
          }
        }

        self.cc.update_app(&existing.guid, &params).await?
      }
      Err(e) if e.is_not_found() => {
        self.say_targeted("Creating", &request.name);
        params.space_guid = Some(self.config.space.guid.clone());
        self.cc.create_app(&params).await?
      }
      Err(e) => return Err(e.into()),
    };

    debug!(app = %app.name, guid = %app.guid, routes = app.routes.len(), "app ready");
    self.ui.ok();
    self.ui.say("");
    Ok(app)
  }

  async fn update_routes(&self, app: &mut App, request: &AppDeploymentRequest) -> Result<(), PushError> {
    let settings = &request.settings;

    if settings.no_route {
      if app.routes.is_empty() {
        self
          .ui
          .say(&format!("App {} is a worker, skipping route creation", app.name));
        return Ok(());
      }
      return self.routes.unbind_all(app).await;
    }

    if !request.route_defined() && !app.routes.is_empty() {
      debug!(app = %app.name, "keeping existing routes");
      return Ok(());
    }

    for spec in request.route_specs() {
      let domain = self.routes.find_domain(spec.domain.as_deref()).await?;
      let use_random_port = spec.use_random_port || domain.is_tcp();

      let hostname = if settings.no_hostname {
        String::new()
      } else {
        match spec.host {
          Some(host) => host,
          None if use_random_port => String::new(),
          None if settings.random_route => format!("{}-{}", host_name_for(&app.name), words::babble()),
          None => host_name_for(&app.name),
        }
      };

      let route = self
        .routes
        .find_or_create_route(&hostname, &domain, spec.path.as_deref().unwrap_or(""), use_random_port)
        .await?;
      self.routes.bind_route(app, &route).await?;
    }
    Ok(())
  }

  async fn upload(&self, app: &App, request: &AppDeploymentRequest) -> Result<(), PushError> {
    let app_dir = resolve_app_dir(&request.path)?;
    debug!(app = %app.name, dir = %app_dir.display(), extracted = app_dir.is_extracted(), "resolved app dir");

    self.ui.say(&format!("Uploading {}...", app.name));
    self
      .bits
      .upload(&app.guid, app_dir.path(), &request.path)
      .await
      .map_err(|e| match e {
        UploadError::Bits(e) => PushError::Bits(e),
        UploadError::Api(e) => PushError::Upload(e),
      })?;
    self.ui.ok();
    Ok(())
  }

  async fn bind_services(&self, app: &App, services: &[String]) -> Result<(), PushError> {
    for name in services {
      let instance = match self.cc.find_service_instance(&self.config.space.guid, name).await {
        Ok(instance) => instance,
        Err(e) if e.is_not_found() => {
          return Err(PushError::NotFound(format!(
            "Could not find service {} to bind to {}",
            name, app.name
          )));
        }
        Err(e) => return Err(e.into()),
      };

      self.ui.say(&format!(
        "Binding service {} to app {} in org {} / space {} as {}...",
        instance.name, app.name, self.config.org.name, self.config.space.name, self.config.username
      ));

      match self.cc.bind_service(&app.guid, &instance.guid).await {
        Ok(()) => {}
        Err(ApiError::Http { code, .. }) if code == SERVICE_BINDING_APP_SERVICE_TAKEN => {
          debug!(app = %app.name, service = %name, "service already bound");
        }
        Err(source) => {
          return Err(PushError::ServiceBindFailed {
            service: name.clone(),
            source,
          });
        }
      }
      self.ui.ok();
    }
    Ok(())
  }

  async fn restart(&self, mut app: App, request: &AppDeploymentRequest) -> Result<App, PushError> {
    if app.state == AppState::Started {
      self.ui.say("");
      app = self.starter.stop(&app).await?;
    }

    self.ui.say("");

    if request.settings.no_start {
      return Ok(app);
    }

    self.starter.start(&app, request.startup_timeout()).await
  }

  fn say_targeted(&self, verb: &str, app_name: &str) {
    self.ui.say(&format!(
      "{} app {} in org {} / space {} as {}...",
      verb, app_name, self.config.org.name, self.config.space.name, self.config.username
    ));
  }
}
