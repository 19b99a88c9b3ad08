//! reqwest implementation of [`CloudController`] over the v2 REST paths.

use std::collections::BTreeMap;
use std::path::Path;

use async_trait::async_trait;
use reqwest::header::AUTHORIZATION;
use reqwest::multipart::{Form, Part};
use reqwest::{Method, RequestBuilder};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::types::{App, AppParams, Domain, FileResource, InstanceSnapshot, InstanceState, Route, ServiceInstance, Stack};
use super::{ApiError, CloudController, authorization_header};
use crate::config::PushConfig;

/// List envelope returned by collection endpoints.
#[derive(Debug, Deserialize)]
struct ResourceList<T> {
  resources: Vec<T>,
}

/// Error body returned with non-2xx responses.
#[derive(Debug, Default, Deserialize)]
struct ErrorBody {
  #[serde(default)]
  code: u64,
  #[serde(default)]
  description: String,
  #[serde(default)]
  error_code: String,
}

#[derive(Debug, Deserialize)]
struct InstanceEntry {
  state: InstanceState,
  #[serde(default)]
  details: Option<String>,
}

#[derive(Debug, Serialize)]
struct CreateRoute<'a> {
  host: &'a str,
  domain_guid: &'a str,
  space_guid: &'a str,
  #[serde(skip_serializing_if = "str::is_empty")]
  path: &'a str,
}

#[derive(Debug, Serialize)]
struct CreateServiceBinding<'a> {
  app_guid: &'a str,
  service_instance_guid: &'a str,
}

/// HTTP client for the cloud controller API.
#[derive(Debug, Clone)]
pub struct HttpClient {
  http: reqwest::Client,
  base_url: String,
  authorization: String,
  space_guid: String,
}

impl HttpClient {
  pub fn new(config: &PushConfig) -> Result<Self, ApiError> {
    let http = reqwest::Client::builder()
      .danger_accept_invalid_certs(config.skip_ssl_validation)
      .build()
      .map_err(|e| ApiError::Transport {
        url: config.api_endpoint.clone(),
        source: e,
      })?;

    Ok(Self {
      http,
      base_url: config.api_endpoint.clone(),
      authorization: authorization_header(&config.access_token),
      space_guid: config.space.guid.clone(),
    })
  }

  fn request(&self, method: Method, path: &str) -> (RequestBuilder, String) {
    let url = format!("{}{}", self.base_url, path);
    debug!(%method, %url, "api request");
    let builder = self
      .http
      .request(method, &url)
      .header(AUTHORIZATION, &self.authorization);
    (builder, url)
  }

  async fn send(&self, builder: RequestBuilder, url: &str) -> Result<reqwest::Response, ApiError> {
    let response = builder.send().await.map_err(|e| ApiError::Transport {
      url: url.to_string(),
      source: e,
    })?;

    let status = response.status();
    if status.is_success() {
      return Ok(response);
    }

    let text = response.text().await.unwrap_or_default();
    let body: ErrorBody = serde_json::from_str(&text).unwrap_or_else(|_| ErrorBody {
      description: text,
      ..ErrorBody::default()
    });

    Err(ApiError::Http {
      status: status.as_u16(),
      code: body.code,
      error_code: body.error_code,
      description: body.description,
    })
  }

  async fn send_json<T: DeserializeOwned>(&self, builder: RequestBuilder, url: &str) -> Result<T, ApiError> {
    let response = self.send(builder, url).await?;
    let bytes = response.bytes().await.map_err(|e| ApiError::Transport {
      url: url.to_string(),
      source: e,
    })?;
    serde_json::from_slice(&bytes).map_err(|e| ApiError::Decode {
      url: url.to_string(),
      source: e,
    })
  }

  async fn get_list<T: DeserializeOwned>(&self, path: &str, filters: &[String]) -> Result<Vec<T>, ApiError> {
    let (builder, url) = self.request(Method::GET, path);
    let query: Vec<(&str, &str)> = filters.iter().map(|f| ("q", f.as_str())).collect();
    let list: ResourceList<T> = self.send_json(builder.query(&query), &url).await?;
    Ok(list.resources)
  }
}

#[async_trait]
impl CloudController for HttpClient {
  async fn match_known_files(&self, files: &[FileResource]) -> Result<Vec<FileResource>, ApiError> {
    let (builder, url) = self.request(Method::PUT, "/v2/resource_match");
    self.send_json(builder.json(files), &url).await
  }

  async fn upload_bits(&self, app_guid: &str, zip: Option<&Path>, resources: &[FileResource]) -> Result<(), ApiError> {
    let (builder, url) = self.request(Method::PUT, &format!("/v2/apps/{}/bits", app_guid));
    let manifest = serde_json::to_string(resources).map_err(|e| ApiError::Request {
      url: url.clone(),
      message: format!("encoding resources: {}", e),
    })?;
    let mut form = Form::new().text("resources", manifest);

    if let Some(zip) = zip {
      let data = tokio::fs::read(zip).await.map_err(|e| ApiError::Io {
        path: zip.display().to_string(),
        source: e,
      })?;
      debug!(app = %app_guid, bytes = data.len(), "attaching application zip");
      let part = Part::bytes(data)
        .file_name("application.zip")
        .mime_str("application/zip")
        .map_err(|e| ApiError::Request {
          url: url.clone(),
          message: format!("attaching {}: {}", zip.display(), e),
        })?;
      form = form.part("application", part);
    }

    self.send(builder.multipart(form), &url).await?;
    Ok(())
  }

  async fn find_app(&self, space_guid: &str, name: &str) -> Result<App, ApiError> {
    let apps: Vec<App> = self
      .get_list(&format!("/v2/spaces/{}/apps", space_guid), &[format!("name:{}", name)])
      .await?;
    apps
      .into_iter()
      .next()
      .ok_or_else(|| ApiError::not_found("app", name))
  }

  async fn get_app(&self, app_guid: &str) -> Result<App, ApiError> {
    let (builder, url) = self.request(Method::GET, &format!("/v2/apps/{}", app_guid));
    self.send_json(builder, &url).await
  }

  async fn create_app(&self, params: &AppParams) -> Result<App, ApiError> {
    let (builder, url) = self.request(Method::POST, "/v2/apps");
    self.send_json(builder.json(params), &url).await
  }

  async fn update_app(&self, app_guid: &str, params: &AppParams) -> Result<App, ApiError> {
    let (builder, url) = self.request(Method::PUT, &format!("/v2/apps/{}", app_guid));
    self.send_json(builder.json(params), &url).await
  }

  async fn find_stack(&self, name: &str) -> Result<Stack, ApiError> {
    let stacks: Vec<Stack> = self.get_list("/v2/stacks", &[format!("name:{}", name)]).await?;
    stacks
      .into_iter()
      .next()
      .ok_or_else(|| ApiError::not_found("stack", name))
  }

  async fn private_domains(&self, org_guid: &str) -> Result<Vec<Domain>, ApiError> {
    self
      .get_list(&format!("/v2/organizations/{}/private_domains", org_guid), &[])
      .await
  }

  async fn shared_domains(&self) -> Result<Vec<Domain>, ApiError> {
    let domains: Vec<Domain> = self.get_list("/v2/shared_domains", &[]).await?;
    Ok(domains.into_iter().map(|d| Domain { shared: true, ..d }).collect())
  }

  async fn find_route(&self, host: &str, domain: &Domain, path: &str) -> Result<Route, ApiError> {
    let filters = [
      format!("host:{}", host),
      format!("domain_guid:{}", domain.guid),
      format!("path:{}", path),
    ];

    let routes: Vec<Route> = self.get_list("/v2/routes", &filters).await?;
    routes
      .into_iter()
      .next()
      .ok_or_else(|| ApiError::not_found("route", domain.url_for(host, path, None)))
  }

  async fn create_route(&self, host: &str, domain: &Domain, path: &str, random_port: bool) -> Result<Route, ApiError> {
    let body = CreateRoute {
      host: if random_port { "" } else { host },
      domain_guid: &domain.guid,
      space_guid: &self.space_guid,
      path,
    };
    let (mut builder, url) = self.request(Method::POST, "/v2/routes");
    if random_port {
      builder = builder.query(&[("generate_port", "true")]);
    }
    self.send_json(builder.json(&body), &url).await
  }

  async fn bind_route(&self, route_guid: &str, app_guid: &str) -> Result<(), ApiError> {
    let (builder, url) = self.request(Method::PUT, &format!("/v2/routes/{}/apps/{}", route_guid, app_guid));
    self.send(builder, &url).await?;
    Ok(())
  }

  async fn unbind_route(&self, route_guid: &str, app_guid: &str) -> Result<(), ApiError> {
    let (builder, url) = self.request(Method::DELETE, &format!("/v2/routes/{}/apps/{}", route_guid, app_guid));
    self.send(builder, &url).await?;
    Ok(())
  }

  async fn find_service_instance(&self, space_guid: &str, name: &str) -> Result<ServiceInstance, ApiError> {
    let instances: Vec<ServiceInstance> = self
      .get_list(
        &format!("/v2/spaces/{}/service_instances", space_guid),
        &[format!("name:{}", name)],
      )
      .await?;
    instances
      .into_iter()
      .next()
      .ok_or_else(|| ApiError::not_found("service instance", name))
  }

  async fn bind_service(&self, app_guid: &str, service_instance_guid: &str) -> Result<(), ApiError> {
    let body = CreateServiceBinding {
      app_guid,
      service_instance_guid,
    };
    let (builder, url) = self.request(Method::POST, "/v2/service_bindings");
    self.send(builder.json(&body), &url).await?;
    Ok(())
  }

  async fn instances(&self, app_guid: &str) -> Result<Vec<InstanceSnapshot>, ApiError> {
    let (builder, url) = self.request(Method::GET, &format!("/v2/apps/{}/instances", app_guid));
    let entries: BTreeMap<String, InstanceEntry> = self.send_json(builder, &url).await?;

    let mut snapshots: Vec<InstanceSnapshot> = entries
      .into_iter()
      .filter_map(|(index, entry)| {
        index.parse().ok().map(|index| InstanceSnapshot {
          index,
          state: entry.state,
          details: entry.details.filter(|d| !d.is_empty()),
        })
      })
      .collect();
    snapshots.sort_by_key(|s| s.index);
    Ok(snapshots)
  }
}
