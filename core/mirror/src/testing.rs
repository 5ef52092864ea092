//! Shared fixture for mirror tests.

use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use researchhub_common::{Email, Error, Provider, Result, SecretToken, UserId};
use researchhub_credentials::{
    Credential, CredentialResolver, CredentialStore, MemoryCredentialStore, RefreshedToken,
    TokenRefresher,
};
use researchhub_membership::{
    AllowAnyEmail, ExternalFolderLink, GlobalRole, MemoryMembershipStore, MemoryUserDirectory,
    MembershipService, MembershipStore, Project, TracingNotifier, User, Visibility,
};
use researchhub_storage::{FolderHandle, MemoryProvider, ProviderRegistry};

use crate::config::MirrorConfig;

pub enum Refresh {
    Succeed(&'static str),
    Fail,
}

pub struct FakeRefresher {
    behavior: Refresh,
    pub calls: AtomicUsize,
}

#[async_trait]
impl TokenRefresher for FakeRefresher {
    async fn refresh(&self, _: Provider, _: &SecretToken) -> Result<RefreshedToken> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match self.behavior {
            Refresh::Succeed(token) => Ok(RefreshedToken {
                access_token: SecretToken::new(token),
                refresh_token: None,
            }),
            Refresh::Fail => Err(Error::Authentication("invalid_grant".to_string())),
        }
    }
}

pub fn uid(s: &str) -> UserId {
    UserId::new(s).unwrap()
}

pub struct Harness {
    pub store: Arc<MemoryMembershipStore>,
    pub directory: Arc<MemoryUserDirectory>,
    pub credentials: Arc<MemoryCredentialStore>,
    pub refresher: Arc<FakeRefresher>,
    pub resolver: CredentialResolver,
    pub drive: Arc<MemoryProvider>,
    pub dropbox: Arc<MemoryProvider>,
    pub registry: ProviderRegistry,
    pub config: MirrorConfig,
    pub project: Project,
}

impl Harness {
    /// Owner `bob` with project "Coral reefs"; users `alice` and `carol`.
    pub async fn new(refresh: Refresh) -> Self {
        let store = Arc::new(MemoryMembershipStore::new());
        let directory = Arc::new(MemoryUserDirectory::new());
        for id in ["bob", "alice", "carol"] {
            directory
                .add(User {
                    id: uid(id),
                    email: Email::parse(&format!("{}@uni.edu", id)).unwrap(),
                    role: GlobalRole::User,
                })
                .await
                .unwrap();
        }

        let credentials = Arc::new(MemoryCredentialStore::new());
        let refresher = Arc::new(FakeRefresher {
            behavior: refresh,
            calls: AtomicUsize::new(0),
        });
        let resolver = CredentialResolver::new(
            credentials.clone(),
            refresher.clone(),
            Duration::from_millis(200),
        );

        let drive = Arc::new(MemoryProvider::new(Provider::GoogleDrive));
        let dropbox = Arc::new(MemoryProvider::new(Provider::Dropbox));
        let mut registry = ProviderRegistry::new();
        registry.register(drive.clone()).unwrap();
        registry.register(dropbox.clone()).unwrap();

        let project = Project::new(
            researchhub_common::ProjectId::new("p1").unwrap(),
            uid("bob"),
            "Coral reefs",
            Visibility::Public,
        );
        store.create_project(&project).await.unwrap();

        Self {
            store,
            directory,
            credentials,
            refresher,
            resolver,
            drive,
            dropbox,
            registry,
            config: MirrorConfig::new().with_call_timeout(Duration::from_millis(200)),
            project,
        }
    }

    /// Give `bob` a credential for `provider`.
    pub async fn connect(&self, provider: Provider, refresh: Option<&str>) {
        self.credentials
            .set(
                &uid("bob"),
                provider,
                Credential::new(
                    SecretToken::new(format!("stale-{}", provider)),
                    refresh.map(SecretToken::new),
                ),
            )
            .await
            .unwrap();
    }

    /// Seed a folder on `provider` and link it to the project.
    pub async fn link(&self, provider: Provider) -> FolderHandle {
        let adapter = match provider {
            Provider::GoogleDrive => &self.drive,
            Provider::Dropbox => &self.dropbox,
        };
        let handle = adapter.seed_folder(&self.project.title);
        self.store
            .attach_folder_link(&ExternalFolderLink::new(
                self.project.id.clone(),
                provider,
                handle.clone(),
            ))
            .await
            .unwrap();
        handle
    }

    pub fn service(&self) -> MembershipService {
        MembershipService::new(
            self.store.clone(),
            self.directory.clone(),
            Arc::new(TracingNotifier),
            Arc::new(AllowAnyEmail),
        )
    }
}
