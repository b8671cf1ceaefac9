//! Mock implementations for external services

use std::sync::Mutex;

use async_trait::async_trait;

use armada_directory::directory::{Page, ScanCursor};
use armada_directory::{TenantDirectory, TenantRecord};
use armada_dispatch::dispatcher::{
    AutomationDispatcher, ExecutionDetail, ExecutionStatus, StartAutomation,
};

/// In-memory tenant directory; `put` upserts like the real one, `scan`
/// serves everything in a single page.
#[derive(Default)]
pub struct MockDirectory {
    records: Mutex<Vec<TenantRecord>>,
}

impl MockDirectory {
    pub fn with_tenants(records: Vec<TenantRecord>) -> Self {
        MockDirectory {
            records: Mutex::new(records),
        }
    }

    pub fn records(&self) -> Vec<TenantRecord> {
        self.records.lock().unwrap().clone()
    }
}

#[async_trait]
impl TenantDirectory for MockDirectory {
    async fn scan(&self, _cursor: Option<ScanCursor>) -> armada_directory::Result<Page> {
        Ok(Page {
            records: self.records(),
            next_cursor: None,
        })
    }

    async fn put(&self, record: TenantRecord) -> armada_directory::Result<()> {
        let mut records = self.records.lock().unwrap();
        match records
            .iter_mut()
            .find(|r| r.account_id == record.account_id && r.region == record.region)
        {
            Some(existing) => *existing = record,
            None => records.push(record),
        }
        Ok(())
    }
}

/// Dispatcher that records every started automation and serves a scripted
/// status sequence.
pub struct MockDispatcher {
    started: Mutex<Vec<StartAutomation>>,
    statuses: Mutex<Vec<ExecutionStatus>>,
    stopped: Mutex<Vec<String>>,
    next_id: Mutex<u64>,
}

impl Default for MockDispatcher {
    fn default() -> Self {
        MockDispatcher {
            started: Mutex::new(Vec::new()),
            statuses: Mutex::new(vec![ExecutionStatus::Success]),
            stopped: Mutex::new(Vec::new()),
            next_id: Mutex::new(1),
        }
    }
}

impl MockDispatcher {
    /// Statuses served, in order; the last one repeats.
    pub fn with_statuses(statuses: Vec<ExecutionStatus>) -> Self {
        MockDispatcher {
            statuses: Mutex::new(statuses),
            ..MockDispatcher::default()
        }
    }

    pub fn started(&self) -> Vec<StartAutomation> {
        self.started.lock().unwrap().clone()
    }

    pub fn stopped(&self) -> Vec<String> {
        self.stopped.lock().unwrap().clone()
    }
}

#[async_trait]
impl AutomationDispatcher for MockDispatcher {
    async fn start(&self, request: StartAutomation) -> armada_dispatch::Result<String> {
        self.started.lock().unwrap().push(request);
        let mut next_id = self.next_id.lock().unwrap();
        let id = format!("exec-{next_id}");
        *next_id += 1;
        Ok(id)
    }

    async fn describe(
        &self,
        execution_id: &str,
    ) -> armada_dispatch::Result<ExecutionDetail> {
        let mut statuses = self.statuses.lock().unwrap();
        let status = if statuses.len() > 1 {
            statuses.remove(0)
        } else {
            statuses[0]
        };
        Ok(ExecutionDetail::of_status(execution_id, status))
    }

    async fn stop(&self, execution_id: &str) -> armada_dispatch::Result<()> {
        self.stopped.lock().unwrap().push(execution_id.to_string());
        Ok(())
    }
}
