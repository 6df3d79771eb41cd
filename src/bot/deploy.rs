use std::{sync::Arc, time::Duration};

use tokio::sync::OwnedMutexGuard;
use uuid::Uuid;

use super::{
    api::{DeployRequest, PanelApi},
    ledger::Ledger,
    processor::ProcessError,
    registration::{Gateway, Identity},
};

/* Deployment orchestrator.
 * Walks one deploy command through its stages:
 * Idle -> Validating -> AccountResolved -> NodeSelected -> Provisioning -> Settled | Failed
 * The ledger is debited only after the panel confirms the server, and only then.
 * Nothing local is mutated on any failure before that point.
 * The account's ledger lock is held from Validating through Settled, so no other
 * balance change can land between the balance check and the debit, and a second
 * deploy sees the first one's debit.
 */

const SETTLE_ATTEMPTS: u32 = 3;
const SETTLE_BACKOFF: Duration = Duration::from_millis(250);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeployStage {
    Idle,
    Validating,
    AccountResolved,
    NodeSelected,
    Provisioning,
    Settled,
    Failed,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeploySettings {
    pub cost: i64,
    pub memory_gb: u32,
    pub cores: u32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ServerDescriptor {
    pub login_url: String,
    pub node_name: String,
    pub node_image: Option<String>,
    pub memory_gb: u32,
    pub cores: u32,
    pub ssh: Option<String>,
    // None when the debit could not be applied after the server was provisioned
    pub balance: Option<i64>,
}

struct StageTracker<'a> {
    account_id: &'a str,
    stage: DeployStage,
}

impl<'a> StageTracker<'a> {
    fn new(account_id: &'a str) -> StageTracker<'a> {
        StageTracker {
            account_id,
            stage: DeployStage::Idle,
        }
    }

    fn advance(&mut self, next: DeployStage) {
        log::debug!(
            "Deploy - User {} {:?} -> {:?}",
            self.account_id,
            self.stage,
            next
        );
        self.stage = next;
    }
}

pub struct Orchestrator {
    ledger: Arc<Ledger>,
    gateway: Arc<Gateway>,
    panel: Arc<dyn PanelApi>,
    settings: DeploySettings,
    settle_backoff: Duration,
}

impl Orchestrator {
    pub fn new(
        ledger: Arc<Ledger>,
        gateway: Arc<Gateway>,
        panel: Arc<dyn PanelApi>,
        settings: DeploySettings,
    ) -> Orchestrator {
        Orchestrator {
            ledger,
            gateway,
            panel,
            settings,
            settle_backoff: SETTLE_BACKOFF,
        }
    }

    #[cfg(test)]
    pub fn with_settle_backoff(mut self, backoff: Duration) -> Orchestrator {
        self.settle_backoff = backoff;
        self
    }

    pub fn settings(&self) -> &DeploySettings {
        &self.settings
    }

    // Fails if the account cannot afford a deployment. Returns the current balance.
    pub fn check_balance(&self, account_id: &str) -> Result<i64, ProcessError> {
        let balance = self.ledger.get_balance(account_id)?;
        if balance < self.settings.cost {
            return Err(ProcessError::InsufficientBalance {
                balance,
                required: self.settings.cost,
            });
        }
        Ok(balance)
    }

    pub async fn deploy(&self, identity: &Identity) -> Result<ServerDescriptor, ProcessError> {
        let held = self.ledger.lock(&identity.id).await;
        let mut tracker = StageTracker::new(&identity.id);

        let result = self.run(identity, &held, &mut tracker).await;
        if result.is_err() {
            tracker.advance(DeployStage::Failed);
        }
        result
    }

    async fn run(
        &self,
        identity: &Identity,
        held: &OwnedMutexGuard<()>,
        tracker: &mut StageTracker<'_>,
    ) -> Result<ServerDescriptor, ProcessError> {
        tracker.advance(DeployStage::Validating);
        self.check_balance(&identity.id)?;

        let account = self
            .gateway
            .lookup_account(identity)
            .await?
            .ok_or(ProcessError::NotRegistered)?;
        tracker.advance(DeployStage::AccountResolved);

        // No load balancing here, the panel is trusted to list usable nodes first
        let node = self
            .panel
            .list_nodes()
            .await?
            .into_iter()
            .next()
            .ok_or(ProcessError::NoNodesAvailable)?;
        tracker.advance(DeployStage::NodeSelected);

        let request = DeployRequest {
            name: identity.display_name(),
            gb: self.settings.memory_gb,
            cores: self.settings.cores,
            user_id: account.id,
            node_id: node.id.clone(),
        };
        tracker.advance(DeployStage::Provisioning);
        let provisioned = self.panel.deploy_server(&request).await?;
        if !provisioned.success {
            return Err(ProcessError::ProvisioningFailed);
        }

        let settlement_id = Uuid::new_v4().to_string();
        let balance = self.settle(held, &identity.id, &settlement_id).await;
        tracker.advance(DeployStage::Settled);

        Ok(ServerDescriptor {
            login_url: self.panel.base_url().to_string(),
            node_name: node.name,
            node_image: node.image,
            memory_gb: self.settings.memory_gb,
            cores: self.settings.cores,
            ssh: provisioned.ssh,
            balance,
        })
    }

    /* Debits the deployment cost once the server exists.
     * Retried with backoff; the settlement id keeps retries from debiting twice.
     * If every attempt fails the server stays up and the miss is logged for reconciliation.
     */
    async fn settle(
        &self,
        held: &OwnedMutexGuard<()>,
        account_id: &str,
        settlement_id: &str,
    ) -> Option<i64> {
        for attempt in 1..=SETTLE_ATTEMPTS {
            match self
                .ledger
                .settle(held, account_id, self.settings.cost, settlement_id)
            {
                Ok(balance) => return Some(balance),
                Err(err) => {
                    log::warn!(
                        "Deploy - Debit attempt {} for user {} failed: {}",
                        attempt,
                        account_id,
                        err
                    );
                    if attempt < SETTLE_ATTEMPTS {
                        tokio::time::sleep(self.settle_backoff * attempt).await;
                    }
                }
            }
        }

        log::error!(
            "Deploy - Server provisioned for user {} but {} coins were not debited (settlement {})",
            account_id,
            self.settings.cost,
            settlement_id
        );
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bot::{
        api::RemoteId,
        processor::{coinflip, CoinSide},
        registration::fake::FakePanel,
        store::memory::MemoryStore,
    };

    const COST: i64 = 500;

    struct Fixture {
        store: Arc<MemoryStore>,
        ledger: Arc<Ledger>,
        gateway: Arc<Gateway>,
        panel: Arc<FakePanel>,
        orchestrator: Orchestrator,
    }

    fn alice() -> Identity {
        Identity {
            id: "42".to_string(),
            username: Some("alice".to_string()),
        }
    }

    fn make_fixture(panel: FakePanel) -> Fixture {
        let store = Arc::new(MemoryStore::new());
        let ledger = Arc::new(Ledger::new(store.clone()));
        let panel = Arc::new(panel);
        let gateway = Arc::new(Gateway::new(store.clone(), panel.clone(), "example.com"));
        let orchestrator = Orchestrator::new(
            ledger.clone(),
            gateway.clone(),
            panel.clone(),
            DeploySettings {
                cost: COST,
                memory_gb: 4,
                cores: 2,
            },
        )
        .with_settle_backoff(Duration::ZERO);

        Fixture {
            store,
            ledger,
            gateway,
            panel,
            orchestrator,
        }
    }

    async fn registered_with(fixture: &Fixture, balance: i64) {
        fixture.gateway.register_account(&alice()).await.unwrap();
        fixture.ledger.set_balance("42", balance).await.unwrap();
        fixture.panel.calls.lock().unwrap().clear();
    }

    #[tokio::test]
    async fn test_insufficient_balance_makes_no_calls() {
        let fixture = make_fixture(FakePanel::default());
        registered_with(&fixture, COST - 1).await;

        assert!(matches!(
            fixture.orchestrator.deploy(&alice()).await,
            Err(ProcessError::InsufficientBalance {
                balance: 499,
                required: COST
            })
        ));
        assert!(fixture.panel.calls().is_empty());
        assert_eq!(fixture.ledger.get_balance("42").unwrap(), COST - 1);
    }

    #[tokio::test]
    async fn test_successful_deploy_debits_cost_once() {
        let fixture = make_fixture(FakePanel::default());
        registered_with(&fixture, 650).await;

        let server = fixture.orchestrator.deploy(&alice()).await.unwrap();
        assert_eq!(server.balance, Some(150));
        assert_eq!(server.node_name, "node-1");
        assert_eq!(server.login_url, "https://panel.test");
        assert_eq!(server.ssh.as_deref(), Some("ssh root@10.0.0.1 -p 2222"));
        assert_eq!(fixture.ledger.get_balance("42").unwrap(), 150);

        assert_eq!(
            fixture.panel.calls(),
            vec!["list_users", "list_nodes", "deploy_server"]
        );
        let request = fixture.panel.deploys.lock().unwrap()[0].clone();
        assert_eq!(
            request,
            DeployRequest {
                name: "alice".to_string(),
                gb: 4,
                cores: 2,
                user_id: RemoteId::Number(100),
                node_id: RemoteId::Number(1),
            }
        );
    }

    #[tokio::test]
    async fn test_unregistered_fails_before_provisioning() {
        let fixture = make_fixture(FakePanel::default());
        fixture.ledger.set_balance("42", 1000).await.unwrap();

        assert!(matches!(
            fixture.orchestrator.deploy(&alice()).await,
            Err(ProcessError::NotRegistered)
        ));
        assert!(fixture.panel.calls().is_empty());
        assert_eq!(fixture.ledger.get_balance("42").unwrap(), 1000);
    }

    #[tokio::test]
    async fn test_no_nodes_available() {
        let fixture = make_fixture(FakePanel::default());
        registered_with(&fixture, 1000).await;
        fixture.panel.nodes.lock().unwrap().clear();

        assert!(matches!(
            fixture.orchestrator.deploy(&alice()).await,
            Err(ProcessError::NoNodesAvailable)
        ));
        assert!(!fixture.panel.calls().contains(&"deploy_server".to_string()));
        assert_eq!(fixture.ledger.get_balance("42").unwrap(), 1000);
    }

    #[tokio::test]
    async fn test_unconfirmed_deploy_is_not_debited() {
        let fixture = make_fixture(FakePanel::default());
        registered_with(&fixture, 1000).await;
        *fixture.panel.deploy_result.lock().unwrap() = Ok(crate::bot::api::Provisioned {
            success: false,
            ssh: None,
        });

        assert!(matches!(
            fixture.orchestrator.deploy(&alice()).await,
            Err(ProcessError::ProvisioningFailed)
        ));
        assert_eq!(fixture.ledger.get_balance("42").unwrap(), 1000);
    }

    #[tokio::test]
    async fn test_remote_error_is_not_debited() {
        let fixture = make_fixture(FakePanel::default());
        registered_with(&fixture, 1000).await;
        *fixture.panel.deploy_result.lock().unwrap() = Err("timeout".to_string());

        assert!(matches!(
            fixture.orchestrator.deploy(&alice()).await,
            Err(ProcessError::RemoteError(_))
        ));
        assert_eq!(fixture.ledger.get_balance("42").unwrap(), 1000);
    }

    #[tokio::test]
    async fn test_debit_retried_after_storage_failure() {
        let fixture = make_fixture(FakePanel::default());
        registered_with(&fixture, 1000).await;
        fixture.store.fail_next_commits(2);

        let server = fixture.orchestrator.deploy(&alice()).await.unwrap();
        assert_eq!(server.balance, Some(500));
        assert_eq!(fixture.ledger.get_balance("42").unwrap(), 500);
    }

    #[tokio::test]
    async fn test_debit_not_doubled_after_lost_ack() {
        let fixture = make_fixture(FakePanel::default());
        registered_with(&fixture, 1000).await;
        fixture.store.lose_next_acks(1);

        let server = fixture.orchestrator.deploy(&alice()).await.unwrap();
        assert_eq!(server.balance, Some(500));
        assert_eq!(fixture.ledger.get_balance("42").unwrap(), 500);
    }

    #[tokio::test]
    async fn test_unsettled_deploy_still_reports_server() {
        let fixture = make_fixture(FakePanel::default());
        registered_with(&fixture, 1000).await;
        fixture.store.fail_next_commits(SETTLE_ATTEMPTS);

        let server = fixture.orchestrator.deploy(&alice()).await.unwrap();
        assert_eq!(server.balance, None);
        assert_eq!(fixture.ledger.get_balance("42").unwrap(), 1000);
    }

    #[tokio::test]
    async fn test_concurrent_deploys_charge_each_server() {
        let fixture = Arc::new(make_fixture(FakePanel::default()));
        registered_with(&fixture, COST).await;

        let first = {
            let fixture = fixture.clone();
            tokio::spawn(async move { fixture.orchestrator.deploy(&alice()).await })
        };
        let second = {
            let fixture = fixture.clone();
            tokio::spawn(async move { fixture.orchestrator.deploy(&alice()).await })
        };

        let results = [first.await.unwrap(), second.await.unwrap()];
        assert_eq!(results.iter().filter(|result| result.is_ok()).count(), 1);
        assert!(results.iter().any(|result| matches!(
            result,
            Err(ProcessError::InsufficientBalance { balance: 0, .. })
        )));
        assert_eq!(fixture.panel.deploys.lock().unwrap().len(), 1);
        assert_eq!(fixture.ledger.get_balance("42").unwrap(), 0);
    }

    #[tokio::test]
    async fn test_wager_during_provisioning_cannot_dodge_the_debit() {
        let fixture = Arc::new(make_fixture(FakePanel {
            deploy_delay: Some(Duration::from_millis(100)),
            ..FakePanel::default()
        }));
        registered_with(&fixture, COST).await;

        let deploy = {
            let fixture = fixture.clone();
            tokio::spawn(async move { fixture.orchestrator.deploy(&alice()).await })
        };
        tokio::time::sleep(Duration::from_millis(20)).await;

        // Waits for the deploy to settle, then finds nothing left to bet
        let flip = coinflip(
            &fixture.ledger,
            "42",
            CoinSide::Heads,
            COST,
            CoinSide::Tails,
        )
        .await;

        let server = deploy.await.unwrap().unwrap();
        assert_eq!(server.balance, Some(0));
        assert!(matches!(
            flip,
            Err(ProcessError::InsufficientBalance {
                balance: 0,
                required: COST
            })
        ));
        assert_eq!(fixture.ledger.get_balance("42").unwrap(), 0);
    }

    #[tokio::test]
    async fn test_admin_removal_during_provisioning_waits_for_debit() {
        let fixture = Arc::new(make_fixture(FakePanel {
            deploy_delay: Some(Duration::from_millis(100)),
            ..FakePanel::default()
        }));
        registered_with(&fixture, 800).await;

        let deploy = {
            let fixture = fixture.clone();
            tokio::spawn(async move { fixture.orchestrator.deploy(&alice()).await })
        };
        tokio::time::sleep(Duration::from_millis(20)).await;

        let after_removal = fixture.ledger.remove_balance("42", 700).await.unwrap();
        let server = deploy.await.unwrap().unwrap();

        assert_eq!(server.balance, Some(300));
        assert_eq!(after_removal, 0);
        assert_eq!(fixture.ledger.get_balance("42").unwrap(), 0);
    }
}
