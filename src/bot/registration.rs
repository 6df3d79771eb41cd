use std::sync::Arc;

use uuid::Uuid;

use super::{
    api::{NewUser, PanelApi, RemoteId, RemoteUser},
    locks::KeyLocks,
    processor::ProcessError,
    redis::DBError,
    store::{Store, Write},
};

/* Registration gateway.
 * Translates chat identities into accounts on the remote panel.
 * The panel is the authority on accounts; locally only the identity -> remote id
 * link is cached, written once when registration succeeds.
 * Lookups always go through the cached remote id, never the display name,
 * since usernames on the chat platform can change.
 */

const PASSWORD_LENGTH: usize = 12;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    pub id: String,
    pub username: Option<String>,
}

impl Identity {
    // Username on the platform, or a stable fallback for users without one
    pub fn display_name(&self) -> String {
        match &self.username {
            Some(username) => username.clone(),
            None => format!("user{}", self.id),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Credentials {
    pub username: String,
    pub email: String,
    pub password: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Registered {
    pub remote_id: RemoteId,
    pub credentials: Credentials,
}

fn generate_password() -> String {
    Uuid::new_v4().simple().to_string()[..PASSWORD_LENGTH].to_string()
}

pub struct Gateway {
    store: Arc<dyn Store>,
    panel: Arc<dyn PanelApi>,
    locks: KeyLocks,
    email_domain: String,
}

impl Gateway {
    pub fn new(store: Arc<dyn Store>, panel: Arc<dyn PanelApi>, email_domain: &str) -> Gateway {
        Gateway {
            store,
            panel,
            locks: KeyLocks::new(),
            email_domain: email_domain.to_string(),
        }
    }

    pub fn cached_remote_id(&self, identity_id: &str) -> Result<Option<RemoteId>, DBError> {
        Ok(self
            .store
            .get_account(identity_id)?
            .map(|raw| RemoteId::parse(&raw)))
    }

    pub fn is_registered(&self, identity_id: &str) -> Result<bool, DBError> {
        Ok(self.cached_remote_id(identity_id)?.is_some())
    }

    /* Creates the panel account for an identity.
     * The returned credentials are meant for the user's private channel only.
     */
    pub async fn register_account(&self, identity: &Identity) -> Result<Registered, ProcessError> {
        let _guard = self.locks.lock(&identity.id).await;

        if self.is_registered(&identity.id)? {
            return Err(ProcessError::AlreadyRegistered);
        }

        let credentials = Credentials {
            username: identity.display_name(),
            email: format!("{}_telegram@{}", identity.id, self.email_domain),
            password: generate_password(),
        };
        let new_user = NewUser {
            username: credentials.username.clone(),
            email: credentials.email.clone(),
            password: credentials.password.clone(),
        };

        let remote_id = self
            .panel
            .create_user(&new_user)
            .await?
            .ok_or(ProcessError::AlreadyRegistered)?;

        let link = Write::Account {
            identity: identity.id.clone(),
            remote_id: remote_id.to_string(),
        };
        if let Err(err) = self.store.apply(&[link]) {
            log::error!(
                "Register - Panel account {} created for user {} but the link was not saved: {}",
                remote_id,
                identity.id,
                err
            );
            return Err(err.into());
        }

        Ok(Registered {
            remote_id,
            credentials,
        })
    }

    // Finds the panel account linked to an identity. None if unregistered or gone remotely.
    pub async fn lookup_account(
        &self,
        identity: &Identity,
    ) -> Result<Option<RemoteUser>, ProcessError> {
        let remote_id = match self.cached_remote_id(&identity.id)? {
            Some(remote_id) => remote_id,
            None => return Ok(None),
        };

        let users = self.panel.list_users().await?;
        Ok(users.into_iter().find(|user| user.id == remote_id))
    }
}


#[cfg(test)]
mod tests {
    use super::{fake::FakePanel, *};
    use crate::bot::store::memory::MemoryStore;

    fn alice() -> Identity {
        Identity {
            id: "42".to_string(),
            username: Some("alice".to_string()),
        }
    }

    fn make_gateway(panel: FakePanel) -> (Arc<MemoryStore>, Arc<FakePanel>, Gateway) {
        let store = Arc::new(MemoryStore::new());
        let panel = Arc::new(panel);
        let gateway = Gateway::new(store.clone(), panel.clone(), "example.com");
        (store, panel, gateway)
    }

    #[test]
    fn test_display_name_fallback() {
        let anonymous = Identity {
            id: "7".to_string(),
            username: None,
        };
        assert_eq!(anonymous.display_name(), "user7");
        assert_eq!(alice().display_name(), "alice");
    }

    #[tokio::test]
    async fn test_register_caches_remote_id() {
        let (_, _, gateway) = make_gateway(FakePanel::default());

        let registered = gateway.register_account(&alice()).await.unwrap();
        assert_eq!(registered.remote_id, RemoteId::Number(100));
        assert_eq!(registered.credentials.username, "alice");
        assert_eq!(registered.credentials.email, "42_telegram@example.com");
        assert_eq!(registered.credentials.password.len(), PASSWORD_LENGTH);
        assert_eq!(
            gateway.cached_remote_id("42").unwrap(),
            Some(RemoteId::Number(100))
        );
    }

    #[tokio::test]
    async fn test_register_twice_is_refused_locally() {
        let (_, panel, gateway) = make_gateway(FakePanel::default());

        gateway.register_account(&alice()).await.unwrap();
        assert!(matches!(
            gateway.register_account(&alice()).await,
            Err(ProcessError::AlreadyRegistered)
        ));
        assert_eq!(panel.calls(), vec!["create_user"]);
    }

    #[tokio::test]
    async fn test_register_refused_by_panel() {
        let (_, _, gateway) = make_gateway(FakePanel {
            refuse_new_users: true,
            ..FakePanel::default()
        });

        assert!(matches!(
            gateway.register_account(&alice()).await,
            Err(ProcessError::AlreadyRegistered)
        ));
        assert!(!gateway.is_registered("42").unwrap());
    }

    #[tokio::test]
    async fn test_register_remote_failure() {
        let (_, _, gateway) = make_gateway(FakePanel {
            unreachable: true,
            ..FakePanel::default()
        });

        assert!(matches!(
            gateway.register_account(&alice()).await,
            Err(ProcessError::RemoteError(_))
        ));
        assert!(!gateway.is_registered("42").unwrap());
    }

    #[tokio::test]
    async fn test_lookup_matches_by_remote_id() {
        let (_, panel, gateway) = make_gateway(FakePanel::default());
        gateway.register_account(&alice()).await.unwrap();

        // Renamed on the panel, still found by id
        panel.users.lock().unwrap()[0].username = Some("alice_renamed".to_string());
        let renamed = Identity {
            id: "42".to_string(),
            username: Some("someone_else".to_string()),
        };

        let found = gateway.lookup_account(&renamed).await.unwrap().unwrap();
        assert_eq!(found.id, RemoteId::Number(100));
    }

    #[tokio::test]
    async fn test_lookup_unregistered_skips_panel() {
        let (_, panel, gateway) = make_gateway(FakePanel::default());

        assert_eq!(gateway.lookup_account(&alice()).await.unwrap(), None);
        assert!(panel.calls().is_empty());
    }

    #[tokio::test]
    async fn test_lookup_account_removed_remotely() {
        let (_, panel, gateway) = make_gateway(FakePanel::default());
        gateway.register_account(&alice()).await.unwrap();
        panel.users.lock().unwrap().clear();

        assert_eq!(gateway.lookup_account(&alice()).await.unwrap(), None);
    }
}
