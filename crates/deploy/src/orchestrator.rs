//! Batch pipeline: declare every class, then deploy every instance.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::{
    ContractArtifact, DeploymentSpec, WaiterConfig,
    declare::{ClassDescriptor, DeclareError, Declarer},
    deploy::{InstanceDeployer, InstanceDescriptor},
    network::ChainWriter,
};

#[derive(Debug, thiserror::Error)]
pub enum OrchestratorError {
    #[error("failed to declare class '{tag}'")]
    Declare {
        tag: String,
        #[source]
        source: DeclareError,
    },

    #[error("deployment '{tag}' refers to class '{class}' which was not declared")]
    UnknownClass { tag: String, class: String },
}

/// Results of a full run, keyed by tag.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeploymentReport {
    pub classes: BTreeMap<String, ClassDescriptor>,
    pub instances: BTreeMap<String, InstanceDescriptor>,
}

impl DeploymentReport {
    /// Tags whose address was derived locally instead of confirmed on chain.
    pub fn recovered(&self) -> impl Iterator<Item = &str> {
        self.instances
            .values()
            .filter(|instance| instance.is_recovered())
            .map(|instance| instance.tag.as_str())
    }
}

/// Drives declarations and deployments for one signing account.
///
/// Work is strictly sequential: one transaction in flight at a time, in tag order.
pub struct Sai<'a, A: ?Sized> {
    account: &'a A,
    waiter: WaiterConfig,
}

impl<'a, A> Sai<'a, A>
where
    A: ChainWriter + ?Sized,
{
    pub fn new(account: &'a A, waiter: WaiterConfig) -> Self {
        Self { account, waiter }
    }

    /// Declare every artifact. The first failure aborts the batch.
    pub async fn declare_all(
        &self,
        artifacts: &BTreeMap<String, ContractArtifact>,
    ) -> Result<BTreeMap<String, ClassDescriptor>, OrchestratorError> {
        let declarer = Declarer::new(self.account, self.waiter.clone());
        let mut classes = BTreeMap::new();

        for (tag, artifact) in artifacts {
            tracing::info!(tag = %tag, "Declaring class");
            let descriptor = declarer
                .declare(artifact)
                .await
                .map_err(|source| OrchestratorError::Declare {
                    tag: tag.clone(),
                    source,
                })?;
            classes.insert(tag.clone(), descriptor);
        }

        Ok(classes)
    }

    /// Deploy every spec against the declared classes. Failed deployments are
    /// recovered, so only a spec naming an unknown class stops the batch.
    pub async fn deploy_all(
        &self,
        classes: &BTreeMap<String, ClassDescriptor>,
        specs: &[DeploymentSpec],
    ) -> Result<BTreeMap<String, InstanceDescriptor>, OrchestratorError> {
        let deployer = InstanceDeployer::new(self.account, self.waiter.clone());
        let mut instances = BTreeMap::new();

        for spec in specs {
            let class = classes
                .get(spec.class_tag())
                .ok_or_else(|| OrchestratorError::UnknownClass {
                    tag: spec.tag.clone(),
                    class: spec.class_tag().to_string(),
                })?;

            tracing::info!(tag = %spec.tag, class = %spec.class_tag(), "Deploying contract");
            let instance = deployer.deploy(class.class_hash, spec).await;
            instances.insert(spec.tag.clone(), instance);
        }

        Ok(instances)
    }

    pub async fn run(
        &self,
        artifacts: &BTreeMap<String, ContractArtifact>,
        specs: &[DeploymentSpec],
    ) -> Result<DeploymentReport, OrchestratorError> {
        let classes = self.declare_all(artifacts).await?;
        let instances = self.deploy_all(&classes, specs).await?;

        let report = DeploymentReport { classes, instances };
        tracing::info!(
            classes = report.classes.len(),
            instances = report.instances.len(),
            recovered = report.recovered().count(),
            "Run complete"
        );
        Ok(report)
    }
}
