//! End-to-end grant engine tests
//!
//! Exercises the public API the way a hosting application would:
//! - Clients loaded from YAML and validated against a collaborator registry
//! - Provider memoization per grant service
//! - Grant exchanges through a fake token endpoint
//! - Token persistence and last-write-wins overwrite

use std::io::Write;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use parking_lot::Mutex;
use pretty_assertions::assert_eq;

use oauth2_grant::Error;
use oauth2_grant::Result;
use oauth2_grant::client::ClientRegistry;
use oauth2_grant::collaborator::{CollaboratorRegistry, HttpResponse, TokenHttpClient};
use oauth2_grant::config::Config;
use oauth2_grant::grant::{GrantService, access_token_key};
use oauth2_grant::redirect::{CurrentRouteRedirect, InboundRequest};
use oauth2_grant::service::TokenService;
use oauth2_grant::token::{AccessToken, FileTokenStore, MemoryTokenStore, TokenStore};

/// Token endpoint stand-in: answers every POST with a fresh numbered token
#[derive(Default)]
struct FakeTokenEndpoint {
    issued: AtomicUsize,
    forms: Mutex<Vec<String>>,
}

#[async_trait]
impl TokenHttpClient for FakeTokenEndpoint {
    async fn post_form(&self, url: &str, form: &[(String, String)]) -> Result<HttpResponse> {
        assert_eq!(url, "https://auth/t");
        self.forms
            .lock()
            .push(serde_urlencoded::to_string(form).unwrap());
        let n = self.issued.fetch_add(1, Ordering::SeqCst) + 1;
        Ok(HttpResponse {
            status: 200,
            body: format!(r#"{{"access_token":"token-{n}","expires_in":3600,"refresh_token":"r-{n}"}}"#)
                .into_bytes(),
        })
    }

    async fn get_authorized(&self, _url: &str, _authorization: &str) -> Result<HttpResponse> {
        Ok(HttpResponse {
            status: 200,
            body: br#"{"name":"svc1"}"#.to_vec(),
        })
    }
}

const CONFIG: &str = r#"
token_storage:
  backend: memory
clients:
  svc1:
    client_secret: s
    authorization_url: https://auth/a
    token_url: https://auth/t
    resource_owner_url: https://auth/me
    scopes: [read, write]
    scope_separator: " "
    grant_type: client_credentials
    collaborators:
      http_client: fake
  plain:
    authorization_url: https://auth/a
    token_url: https://auth/t
  broken:
    authorization_url: https://auth/a
    token_url: https://auth/t
    collaborators:
      token_parser: failing
"#;

struct Harness {
    clients: Arc<ClientRegistry>,
    endpoint: Arc<FakeTokenEndpoint>,
}

impl Harness {
    fn new() -> Self {
        let mut file = tempfile::Builder::new().suffix(".yaml").tempfile().unwrap();
        file.write_all(CONFIG.as_bytes()).unwrap();
        let config = Config::load(Some(file.path())).unwrap();

        let endpoint = Arc::new(FakeTokenEndpoint::default());
        let mut registry = CollaboratorRegistry::with_defaults();
        let shared = Arc::clone(&endpoint);
        registry.register_http_client("fake", move || Ok(SharedEndpoint(Arc::clone(&shared))));
        registry.register_token_parser("failing", || -> Result<oauth2_grant::provider::JsonTokenParser> {
            Err(Error::Config("parser key not configured".to_string()))
        });

        Self {
            clients: Arc::new(config.client_registry(&registry).unwrap()),
            endpoint,
        }
    }

    fn service(&self, store: Arc<dyn TokenStore>) -> GrantService {
        let redirect = CurrentRouteRedirect::new(Arc::new(
            InboundRequest::parse("https://app.example.com/oauth/callback?code=x").unwrap(),
        ));
        GrantService::new(self.clients.clone(), store, Arc::new(redirect))
    }
}

struct SharedEndpoint(Arc<FakeTokenEndpoint>);

#[async_trait]
impl TokenHttpClient for SharedEndpoint {
    async fn post_form(&self, url: &str, form: &[(String, String)]) -> Result<HttpResponse> {
        self.0.post_form(url, form).await
    }

    async fn get_authorized(&self, url: &str, authorization: &str) -> Result<HttpResponse> {
        self.0.get_authorized(url, authorization).await
    }
}

#[test]
fn provider_is_identical_within_one_service() {
    let harness = Harness::new();
    let mut service = harness.service(Arc::new(MemoryTokenStore::new()));

    let first = service.get_provider("svc1").unwrap();
    let second = service.get_provider("svc1").unwrap();
    assert!(Arc::ptr_eq(&first, &second));

    // A new service (new request) builds its own provider
    let mut other = harness.service(Arc::new(MemoryTokenStore::new()));
    assert!(!Arc::ptr_eq(&first, &other.get_provider("svc1").unwrap()));
}

#[test]
fn unknown_client_is_invalid_and_not_cached() {
    let harness = Harness::new();
    let mut service = harness.service(Arc::new(MemoryTokenStore::new()));

    let err = service.get_provider("ghost").unwrap_err();
    assert!(matches!(err, Error::InvalidClient(ref id) if id == "ghost"));
    assert!(!service.providers().contains("ghost"));
    assert!(service.providers().is_empty());
}

#[test]
fn empty_collaborator_map_builds_plain_provider() {
    let harness = Harness::new();
    let mut service = harness.service(Arc::new(MemoryTokenStore::new()));

    let provider = service.get_provider("plain").unwrap();
    assert!(provider.collaborators().is_empty());
    assert_eq!(provider.scope_string(), "");
}

#[test]
fn failing_collaborator_is_fatal_and_not_cached() {
    let harness = Harness::new();
    let mut service = harness.service(Arc::new(MemoryTokenStore::new()));

    let err = service.get_provider("broken").unwrap_err();
    assert!(matches!(err, Error::CollaboratorConstruction { ref role, .. } if role == "token_parser"));
    assert!(!service.providers().contains("broken"));

    // Still failing on retry: nothing half-built was cached
    assert!(service.get_provider("broken").is_err());
}

#[test]
fn svc1_provider_formats_scopes() {
    let harness = Harness::new();
    let mut service = harness.service(Arc::new(MemoryTokenStore::new()));

    let provider = service.get_provider("svc1").unwrap();
    assert_eq!(provider.scope_string(), "read write");
    assert_eq!(provider.client_id(), "svc1");
    assert_eq!(provider.redirect_uri(), "https://app.example.com/oauth/callback");
}

#[test]
fn redirect_uri_is_the_same_for_every_client() {
    let harness = Harness::new();
    let mut service = harness.service(Arc::new(MemoryTokenStore::new()));

    let a = service.get_provider("svc1").unwrap();
    let b = service.get_provider("plain").unwrap();
    assert_eq!(a.redirect_uri(), b.redirect_uri());
    assert!(a.redirect_uri().starts_with("https://"));
}

#[test]
fn store_is_last_write_wins() {
    let harness = Harness::new();
    let store = Arc::new(MemoryTokenStore::new());
    let service = harness.service(store.clone());

    service.store_access_token("svc1", &AccessToken::new("t1")).unwrap();
    service.store_access_token("svc1", &AccessToken::new("t2")).unwrap();

    let stored = store.get("oauth2_client_access_token-svc1").unwrap().unwrap();
    assert_eq!(stored.access_token, "t2");
    assert_eq!(store.len(), 1);
}

#[tokio::test]
async fn client_credentials_then_refresh_with_file_store() {
    let harness = Harness::new();
    let dir = tempfile::tempdir().unwrap();
    let store: Arc<dyn TokenStore> = Arc::new(FileTokenStore::new(dir.path().to_path_buf()).unwrap());

    let mut service = harness.service(store.clone());
    let token = service.client_credentials("svc1").await.unwrap();
    assert_eq!(token.access_token, "token-1");

    let form = harness.endpoint.forms.lock()[0].clone();
    assert!(form.contains("grant_type=client_credentials"));
    assert!(form.contains("scope=read+write"));
    assert!(form.contains("redirect_uri=https%3A%2F%2Fapp.example.com%2Foauth%2Fcallback"));

    // Next request, fresh service, same store
    let mut next = harness.service(store.clone());
    let refreshed = next.refresh_access_token("svc1").await.unwrap();
    assert_eq!(refreshed.access_token, "token-2");

    let persisted = store.get(&access_token_key("svc1")).unwrap().unwrap();
    assert_eq!(persisted.refresh_token.as_deref(), Some("r-2"));
}

#[tokio::test]
async fn token_service_reuses_stored_token() {
    let harness = Harness::new();
    let store: Arc<dyn TokenStore> = Arc::new(MemoryTokenStore::new());

    let first = TokenService::new(harness.service(store.clone()))
        .access_token("svc1")
        .await
        .unwrap();
    let second = TokenService::new(harness.service(store.clone()))
        .access_token("svc1")
        .await
        .unwrap();

    assert_eq!(first.access_token, second.access_token);
    assert_eq!(harness.endpoint.issued.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn resource_owner_details_through_provider() {
    let harness = Harness::new();
    let mut service = harness.service(Arc::new(MemoryTokenStore::new()));

    let token = service.client_credentials("svc1").await.unwrap();
    let details = service
        .get_provider("svc1")
        .unwrap()
        .resource_owner_details(&token)
        .await
        .unwrap();
    assert_eq!(details["name"], "svc1");
}
