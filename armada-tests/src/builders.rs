//! Builders for test objects

use serde_json::{json, Value};

use armada_dispatch::AutomationRequest;

/// Builds raw automation requests the way callers submit them: as loose
/// PascalCase JSON, so tests exercise the wire deserialization too.
#[derive(Default)]
pub struct AutomationRequestBuilder {
    summary: Vec<Value>,
    backup: Vec<Value>,
    restore: Vec<Value>,
    upgrade: Vec<Value>,
    targets: Vec<Value>,
    max_concurrency: Option<String>,
}

impl AutomationRequestBuilder {
    pub fn new() -> Self {
        AutomationRequestBuilder::default()
    }

    pub fn summary_cluster(mut self, account: &str, region: &str, cluster: &str) -> Self {
        self.summary.push(identity(account, region, cluster));
        self
    }

    pub fn backup_cluster(mut self, account: &str, region: &str, cluster: &str) -> Self {
        self.backup.push(identity(account, region, cluster));
        self
    }

    pub fn restore_cluster(
        mut self,
        account: &str,
        region: &str,
        cluster: &str,
        backup_name: &str,
    ) -> Self {
        let mut item = identity(account, region, cluster);
        item["RestoreOptions"] = json!({ "BackupName": backup_name });
        self.restore.push(item);
        self
    }

    pub fn upgrade_cluster(
        mut self,
        account: &str,
        region: &str,
        cluster: &str,
        desired_version: &str,
    ) -> Self {
        let mut item = identity(account, region, cluster);
        item["UpgradeOptions"] = json!({ "DesiredEKSVersion": desired_version });
        self.upgrade.push(item);
        self
    }

    pub fn explicit_target(mut self, account: &str, region: &str) -> Self {
        self.targets.push(json!({
            "AccountId": account,
            "Region": region,
        }));
        self
    }

    pub fn max_concurrency(mut self, value: &str) -> Self {
        self.max_concurrency = Some(value.to_string());
        self
    }

    pub fn build(self) -> AutomationRequest {
        let mut body = json!({
            "Clusters": {
                "Summary": self.summary,
                "Backup": self.backup,
                "Restore": self.restore,
                "Upgrade": self.upgrade,
            },
            "Targets": self.targets,
        });
        if let Some(value) = self.max_concurrency {
            body["MaxConcurrency"] = json!(value);
        }
        serde_json::from_value(body).expect("builder produces a valid request")
    }
}

fn identity(account: &str, region: &str, cluster: &str) -> Value {
    json!({
        "AccountId": account,
        "Region": region,
        "ClusterName": cluster,
    })
}
