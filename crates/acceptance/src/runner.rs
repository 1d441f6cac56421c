//! Test case runner
//!
//! Each test case gets its own working directory. Config steps are applied
//! in order and checked; import steps import the named resource into a
//! fresh directory and compare it with the applied state. The case is
//! always destroyed at the end, and `check_destroy` sees the last state.

use std::collections::BTreeMap;

use tracing::{error, info, warn};

use azurerm_provider::ArmClient;

use crate::checks::{resource, StateCheck};
use crate::config::AccConfig;
use crate::error::{AccError, AccResult};
use crate::state::State;
use crate::terraform::Terraform;

/// Environment variable that enables acceptance tests
pub const TF_ACC: &str = "TF_ACC";

pub type PreCheckFn = fn(&AccConfig) -> AccResult<()>;

/// One step of a test case
pub struct TestStep {
    pub config: Option<String>,
    pub check: Option<Box<dyn StateCheck>>,
    pub resource_name: Option<String>,
    pub import_state: bool,
    pub import_state_verify: bool,
    pub import_state_verify_ignore: Vec<String>,
}

impl TestStep {
    /// Apply `config` and run `check` against the result
    pub fn config(config: impl Into<String>) -> Self {
        Self {
            config: Some(config.into()),
            check: None,
            resource_name: None,
            import_state: false,
            import_state_verify: false,
            import_state_verify_ignore: vec![],
        }
    }

    /// Import `resource_name` using the previous step's configuration
    pub fn import(resource_name: impl Into<String>) -> Self {
        Self {
            config: None,
            check: None,
            resource_name: Some(resource_name.into()),
            import_state: true,
            import_state_verify: false,
            import_state_verify_ignore: vec![],
        }
    }

    pub fn check(mut self, check: impl StateCheck + 'static) -> Self {
        self.check = Some(Box::new(check));
        self
    }

    /// Compare the imported attributes with the applied ones
    pub fn verify(mut self) -> Self {
        self.import_state_verify = true;
        self
    }

    pub fn verify_ignore(mut self, prefixes: &[&str]) -> Self {
        self.import_state_verify_ignore = prefixes.iter().map(|p| p.to_string()).collect();
        self
    }
}

/// A full acceptance test
pub struct TestCase {
    pub pre_check: Option<PreCheckFn>,
    pub check_destroy: Option<Box<dyn StateCheck>>,
    pub steps: Vec<TestStep>,
}

impl TestCase {
    pub fn new(steps: Vec<TestStep>) -> Self {
        Self {
            pre_check: Some(AccConfig::pre_check),
            check_destroy: None,
            steps,
        }
    }

    pub fn check_destroy(mut self, check: impl StateCheck + 'static) -> Self {
        self.check_destroy = Some(Box::new(check));
        self
    }
}

/// Whether `TF_ACC` is set to anything non-empty
pub fn acceptance_enabled<F>(lookup: F) -> bool
where
    F: Fn(&str) -> Option<String>,
{
    lookup(TF_ACC).is_some_and(|v| !v.is_empty())
}

/// Run a test case; cargo runs test functions in parallel, so this is all
/// that is needed for parallel acceptance tests.
///
/// Returns `Ok` without doing anything unless `TF_ACC` is set.
pub async fn parallel_test(case: TestCase) -> AccResult<()> {
    if !acceptance_enabled(|key| std::env::var(key).ok()) {
        warn!("Acceptance tests skipped unless env '{}' set", TF_ACC);
        return Ok(());
    }

    let config = AccConfig::from_env()?;
    if let Some(pre_check) = case.pre_check {
        pre_check(&config)?;
    }

    let client = ArmClient::new(config.client_config())?;
    run(case, &config, &client).await
}

async fn run(case: TestCase, config: &AccConfig, client: &ArmClient) -> AccResult<()> {
    if case.steps.is_empty() {
        return Err(AccError::InvalidTestCase("a test case needs at least one step".to_string()));
    }

    let dir = tempfile::tempdir()?;
    let tf = Terraform::new(&config.terraform_path, dir.path());
    let mut progress = StepRun::default();

    let total = case.steps.len();
    let mut result = Ok(());
    for (i, step) in case.steps.iter().enumerate() {
        let label = format!("{}/{}", i + 1, total);
        info!("Running step {}", label);

        if let Err(e) = progress.step(step, &tf, config, client, &label).await {
            error!("Step {} failed: {}", label, e);
            result = Err(AccError::StepFailed {
                step: label,
                reason: e.to_string(),
            });
            break;
        }
    }

    if progress.applied {
        if let Err(e) = tf.destroy().await {
            error!("Destroy failed, resources may have leaked: {}", e);
            return result.and(Err(e));
        }
        if let Some(check) = &case.check_destroy {
            if let Err(e) = check.check(&progress.state, client).await {
                return result.and(Err(AccError::CheckFailed(format!("Check failed: {}", e))));
            }
        }
    }

    result
}

/// What earlier steps left behind
#[derive(Default)]
struct StepRun {
    applied: bool,
    config: Option<String>,
    state: State,
}

impl StepRun {
    async fn step(
        &mut self,
        step: &TestStep,
        tf: &Terraform,
        config: &AccConfig,
        client: &ArmClient,
        label: &str,
    ) -> AccResult<()> {
        if step.import_state {
            return self.import_step(step, config).await;
        }

        let hcl = step
            .config
            .as_ref()
            .ok_or_else(|| AccError::InvalidTestCase(format!("step {} has no config", label)))?;

        tf.write_config(hcl)?;
        tf.init().await?;
        self.applied = true;
        tf.apply().await?;

        self.config = Some(hcl.clone());
        self.state = tf.show().await?;

        if let Some(check) = &step.check {
            check.check(&self.state, client).await?;
        }

        if !tf.plan_is_empty().await? {
            return Err(AccError::PlanNotEmpty(label.to_string()));
        }
        Ok(())
    }

    async fn import_step(&self, step: &TestStep, config: &AccConfig) -> AccResult<()> {
        let address = step
            .resource_name
            .as_deref()
            .ok_or_else(|| AccError::InvalidTestCase("import step needs a resource name".to_string()))?;
        let hcl = self
            .config
            .as_ref()
            .ok_or_else(|| AccError::InvalidTestCase("import step needs a previous config step".to_string()))?;

        let expected = resource(&self.state, address)?;

        // imported into a separate state so the applied one is untouched
        let dir = tempfile::tempdir()?;
        let tf = Terraform::new(&config.terraform_path, dir.path());
        tf.write_config(hcl)?;
        tf.init().await?;
        tf.import(address, &expected.primary.id).await?;

        let imported = tf.show().await?;
        let actual = resource(&imported, address)?;

        if step.import_state_verify {
            verify_import(
                address,
                &expected.primary.attributes,
                &actual.primary.attributes,
                &step.import_state_verify_ignore,
            )?;
        }
        Ok(())
    }
}

/// Compare applied and imported attributes, skipping ignored prefixes
pub fn verify_import(
    address: &str,
    expected: &BTreeMap<String, String>,
    actual: &BTreeMap<String, String>,
    ignore: &[String],
) -> AccResult<()> {
    let keep = |key: &&String| !key.starts_with("timeouts") && !ignore.iter().any(|p| key.starts_with(p.as_str()));

    let expected: BTreeMap<_, _> = expected.iter().filter(|(k, _)| keep(k)).collect();
    let actual: BTreeMap<_, _> = actual.iter().filter(|(k, _)| keep(k)).collect();

    if expected == actual {
        return Ok(());
    }

    let mut details = Vec::new();
    for key in expected.keys().chain(actual.keys()).collect::<std::collections::BTreeSet<_>>() {
        let (e, a) = (expected.get(key), actual.get(key));
        if e != a {
            details.push(format!("  {}: applied {:?}, imported {:?}", key, e, a));
        }
    }

    Err(AccError::ImportVerify {
        resource: address.to_string(),
        details: details.join("\n"),
    })
}
