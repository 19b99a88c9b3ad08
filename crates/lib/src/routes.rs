//! Route reconciliation: find-or-create, idempotent bind, unbind-all.

use std::sync::Arc;

use tracing::{debug, warn};

use crate::api::{App, CloudController, Domain, INVALID_RELATION, Route};
use crate::error::PushError;
use crate::ui::Ui;

/// Desired route shape before resolution.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RouteSpec {
  pub host: Option<String>,
  pub domain: Option<String>,
  pub path: Option<String>,
  pub use_random_port: bool,
}

/// Derive a hostname from an app name.
///
/// Lowercases, turns runs of whitespace and underscores into `-`, and drops
/// anything outside `[a-z0-9-]`.
pub fn host_name_for(name: &str) -> String {
  let mut host = String::with_capacity(name.len());
  let mut in_separator = false;

  for c in name.to_lowercase().chars() {
    if c.is_whitespace() || c == '_' {
      if !in_separator {
        host.push('-');
        in_separator = true;
      }
      continue;
    }
    in_separator = false;
    if c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-' {
      host.push(c);
    }
  }

  host
}

pub struct RouteReconciler {
  cc: Arc<dyn CloudController>,
  ui: Arc<dyn Ui>,
  org_guid: String,
}

impl RouteReconciler {
  pub fn new(cc: Arc<dyn CloudController>, ui: Arc<dyn Ui>, org_guid: impl Into<String>) -> Self {
    Self {
      cc,
      ui,
      org_guid: org_guid.into(),
    }
  }

  /// Resolve a domain by name, or the default domain when `name` is `None`.
  ///
  /// Named lookups search the org's private domains before shared ones. The
  /// default is the first shared domain, else the org's first private domain.
  pub async fn find_domain(&self, name: Option<&str>) -> Result<Domain, PushError> {
    let private = self.cc.private_domains(&self.org_guid).await?;
    let shared = self.cc.shared_domains().await?;

    match name {
      Some(name) => private
        .into_iter()
        .chain(shared)
        .find(|d| d.name.eq_ignore_ascii_case(name))
        .ok_or_else(|| PushError::NotFound(format!("Domain {} not found", name))),
      None => shared
        .into_iter()
        .next()
        .or_else(|| private.into_iter().next())
        .ok_or_else(|| PushError::NotFound("Could not find a default domain".to_string())),
    }
  }

  /// Reuse the route with this natural key, or create it.
  ///
  /// With `use_random_port` a missing route is created on `domain` with a
  /// platform-assigned port and no host.
  pub async fn find_or_create_route(
    &self,
    host: &str,
    domain: &Domain,
    path: &str,
    use_random_port: bool,
  ) -> Result<Route, PushError> {
    match self.cc.find_route(host, domain, path).await {
      Ok(route) => {
        self.ui.say(&format!("Using route {}", route.url()));
        Ok(route)
      }
      Err(e) if e.is_not_found() => {
        let route = if use_random_port {
          self.ui.say(&format!("Creating random route for {}...", domain.name));
          self.cc.create_route("", domain, "", true).await?
        } else {
          self
            .ui
            .say(&format!("Creating route {}...", domain.url_for(host, path, None)));
          self.cc.create_route(host, domain, path, false).await?
        };
        debug!(route = %route.guid, url = %route.url(), "created route");
        self.ui.ok();
        self.ui.say("");
        Ok(route)
      }
      Err(e) => Err(e.into()),
    }
  }

  /// Bind `route` to `app` unless it is already bound.
  ///
  /// On success the route is recorded on `app`, so binding the same pair again
  /// issues no request.
  pub async fn bind_route(&self, app: &mut App, route: &Route) -> Result<(), PushError> {
    if app.has_route(route) {
      debug!(app = %app.name, route = %route.url(), "route already bound");
      return Ok(());
    }

    self
      .ui
      .say(&format!("Binding {} to {}...", route.url(), app.name));

    match self.cc.bind_route(&route.guid, &app.guid).await {
      Ok(()) => {
        app.routes.push(route.clone());
        self.ui.ok();
        self.ui.say("");
        Ok(())
      }
      Err(e) if e.code() == Some(INVALID_RELATION) => Err(PushError::RouteInUse { url: route.url() }),
      Err(e) => Err(e.into()),
    }
  }

  /// Unbind every route currently bound to `app`.
  ///
  /// Every route is attempted. Routes that fail to unbind stay on `app` and
  /// are reported together as [`PushError::UnbindFailed`].
  pub async fn unbind_all(&self, app: &mut App) -> Result<(), PushError> {
    let mut failures = Vec::new();
    let mut remaining = Vec::new();

    for route in std::mem::take(&mut app.routes) {
      self.ui.say(&format!("Removing route {}...", route.url()));
      if let Err(e) = self.cc.unbind_route(&route.guid, &app.guid).await {
        warn!(app = %app.name, route = %route.url(), error = %e, "failed to unbind route");
        failures.push((route.url(), e));
        remaining.push(route);
      }
    }

    app.routes = remaining;

    if failures.is_empty() {
      Ok(())
    } else {
      Err(PushError::UnbindFailed {
        app: app.name.clone(),
        failures,
      })
    }
  }
}
