//! StateStore: redb-backed state persistence for the enactor.
//!
//! Provides typed operations over infrastructure records, observed
//! instances, the failed-node archive, and scaling request queues. All
//! values are JSON-serialized into redb's `&[u8]` value columns. The store
//! supports both on-disk and in-memory backends (the latter for testing).

use std::collections::HashSet;
use std::path::Path;
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use redb::{Database, ReadableDatabase, ReadableTable, TableDefinition};
use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::debug;

use enactor_core::{DynamicState, Instance, NodeId, Topology};

use crate::error::{StateError, StateResult};
use crate::tables::*;
use crate::types::*;

/// `map_err!(Read)` builds a closure turning a redb error into `StateError::Read`.
macro_rules! map_err {
    ($variant:ident) => {
        |e| StateError::$variant(e.to_string())
    };
}

type Table = TableDefinition<'static, &'static str, &'static [u8]>;

/// Shared handle to the enactor's redb database. Clones share one
/// `Database`; redb serializes write transactions.
#[derive(Clone)]
pub struct StateStore {
    db: Arc<Database>,
}

impl StateStore {
    /// Open the database file at `path`, creating it and the enactor
    /// tables when absent.
    pub fn open(path: &Path) -> StateResult<Self> {
        let db = Database::create(path).map_err(map_err!(Open))?;
        let store = Self { db: Arc::new(db) };
        store.ensure_tables()?;
        debug!(?path, "state store opened");
        Ok(store)
    }

    /// Store backed by memory only; nothing survives the handle.
    pub fn open_in_memory() -> StateResult<Self> {
        let backend = redb::backends::InMemoryBackend::new();
        let db = Database::builder()
            .create_with_backend(backend)
            .map_err(map_err!(Open))?;
        let store = Self { db: Arc::new(db) };
        store.ensure_tables()?;
        debug!("in-memory state store opened");
        Ok(store)
    }

    fn ensure_tables(&self) -> StateResult<()> {
        let txn = self.db.begin_write().map_err(map_err!(Transaction))?;
        // Opening a table in a write transaction creates it if absent.
        txn.open_table(INFRASTRUCTURES).map_err(map_err!(Table))?;
        txn.open_table(INSTANCES).map_err(map_err!(Table))?;
        txn.open_table(FAILED_NODES).map_err(map_err!(Table))?;
        txn.open_table(SCALING).map_err(map_err!(Table))?;
        txn.commit().map_err(map_err!(Transaction))?;
        Ok(())
    }

    // ── Generic record helpers ─────────────────────────────────────

    fn put_record<T: Serialize>(&self, def: Table, key: &str, record: &T) -> StateResult<()> {
        let value = serde_json::to_vec(record).map_err(map_err!(Serialize))?;
        let txn = self.db.begin_write().map_err(map_err!(Transaction))?;
        {
            let mut table = txn.open_table(def).map_err(map_err!(Table))?;
            table
                .insert(key, value.as_slice())
                .map_err(map_err!(Write))?;
        }
        txn.commit().map_err(map_err!(Transaction))?;
        Ok(())
    }

    fn get_record<T: DeserializeOwned>(&self, def: Table, key: &str) -> StateResult<Option<T>> {
        let txn = self.db.begin_read().map_err(map_err!(Transaction))?;
        let table = txn.open_table(def).map_err(map_err!(Table))?;
        match table.get(key).map_err(map_err!(Read))? {
            Some(guard) => {
                let record: T =
                    serde_json::from_slice(guard.value()).map_err(map_err!(Deserialize))?;
                Ok(Some(record))
            }
            None => Ok(None),
        }
    }

    fn scan_prefix<T: DeserializeOwned>(&self, def: Table, prefix: &str) -> StateResult<Vec<T>> {
        let txn = self.db.begin_read().map_err(map_err!(Transaction))?;
        let table = txn.open_table(def).map_err(map_err!(Table))?;
        let mut results = Vec::new();
        for entry in table.iter().map_err(map_err!(Read))? {
            let (key, value) = entry.map_err(map_err!(Read))?;
            if key.value().starts_with(prefix) {
                let record: T =
                    serde_json::from_slice(value.value()).map_err(map_err!(Deserialize))?;
                results.push(record);
            }
        }
        Ok(results)
    }

    fn delete_record(&self, def: Table, key: &str) -> StateResult<bool> {
        let txn = self.db.begin_write().map_err(map_err!(Transaction))?;
        let existed;
        {
            let mut table = txn.open_table(def).map_err(map_err!(Table))?;
            existed = table.remove(key).map_err(map_err!(Write))?.is_some();
        }
        txn.commit().map_err(map_err!(Transaction))?;
        Ok(existed)
    }

    // ── Infrastructures ────────────────────────────────────────────

    /// Register a topology, or replace the topology of a known
    /// infrastructure. The started flag survives replacement.
    pub fn put_infrastructure(&self, topology: &Topology) -> StateResult<()> {
        let now = epoch_secs();
        let record = match self.get_infrastructure(&topology.infra_id)? {
            Some(mut existing) => {
                existing.topology = topology.clone();
                existing.updated_at = now;
                existing
            }
            None => InfraRecord {
                topology: topology.clone(),
                started: false,
                created_at: now,
                updated_at: now,
            },
        };
        self.put_record(INFRASTRUCTURES, &topology.infra_id, &record)?;
        debug!(infra_id = %topology.infra_id, "infrastructure stored");
        Ok(())
    }

    pub fn get_infrastructure(&self, infra_id: &str) -> StateResult<Option<InfraRecord>> {
        self.get_record(INFRASTRUCTURES, infra_id)
    }

    /// The desired topology of an infrastructure.
    pub fn get_topology(&self, infra_id: &str) -> StateResult<Option<Topology>> {
        Ok(self.get_infrastructure(infra_id)?.map(|r| r.topology))
    }

    pub fn list_infrastructures(&self) -> StateResult<Vec<InfraRecord>> {
        self.scan_prefix(INFRASTRUCTURES, "")
    }

    /// Delete an infrastructure record. Returns true if it existed.
    pub fn delete_infrastructure(&self, infra_id: &str) -> StateResult<bool> {
        let existed = self.delete_record(INFRASTRUCTURES, infra_id)?;
        debug!(%infra_id, existed, "infrastructure deleted");
        Ok(existed)
    }

    /// Whether the infrastructure container exists. Unknown
    /// infrastructures are not started.
    pub fn is_infrastructure_started(&self, infra_id: &str) -> StateResult<bool> {
        Ok(self
            .get_infrastructure(infra_id)?
            .is_some_and(|r| r.started))
    }

    pub fn set_infrastructure_started(&self, infra_id: &str, started: bool) -> StateResult<()> {
        let mut record = self
            .get_infrastructure(infra_id)?
            .ok_or_else(|| StateError::UnknownInfrastructure(infra_id.to_string()))?;
        record.started = started;
        record.updated_at = epoch_secs();
        self.put_record(INFRASTRUCTURES, infra_id, &record)?;
        debug!(%infra_id, started, "infrastructure started flag updated");
        Ok(())
    }

    // ── Instances ──────────────────────────────────────────────────

    /// Insert or update an observed instance.
    pub fn register_instance(&self, instance: &Instance) -> StateResult<()> {
        self.put_record(INSTANCES, &instance.table_key(), instance)?;
        debug!(
            infra_id = %instance.infra_id,
            node_type = %instance.node_type,
            node_id = %instance.node_id,
            state = %instance.state,
            "instance registered"
        );
        Ok(())
    }

    pub fn get_instance(
        &self,
        infra_id: &str,
        node_type: &str,
        node_id: &str,
    ) -> StateResult<Option<Instance>> {
        self.get_record(INSTANCES, &format!("{infra_id}:{node_type}:{node_id}"))
    }

    /// Snapshot of every observed instance of an infrastructure.
    pub fn get_raw_state(&self, infra_id: &str) -> StateResult<DynamicState> {
        let instances: Vec<Instance> = self.scan_prefix(INSTANCES, &format!("{infra_id}:"))?;
        Ok(instances.into_iter().collect())
    }

    /// Delete one instance. Returns true if it existed.
    pub fn remove_instance(&self, instance: &Instance) -> StateResult<bool> {
        self.delete_record(INSTANCES, &instance.table_key())
    }

    /// Remove instances by node id from an infrastructure's dynamic
    /// state. Returns the number removed.
    pub fn remove_nodes(&self, infra_id: &str, node_ids: &[NodeId]) -> StateResult<u32> {
        if node_ids.is_empty() {
            return Ok(0);
        }
        let wanted: HashSet<&str> = node_ids.iter().map(String::as_str).collect();
        let prefix = format!("{infra_id}:");

        let txn = self.db.begin_write().map_err(map_err!(Transaction))?;
        let count;
        {
            let mut table = txn.open_table(INSTANCES).map_err(map_err!(Table))?;
            let mut keys = Vec::new();
            for entry in table.iter().map_err(map_err!(Read))? {
                let (key, _) = entry.map_err(map_err!(Read))?;
                let key = key.value();
                let Some(rest) = key.strip_prefix(&prefix) else {
                    continue;
                };
                // rest = {node_type}:{node_id}
                if let Some((_, node_id)) = rest.split_once(':')
                    && wanted.contains(node_id)
                {
                    keys.push(key.to_string());
                }
            }
            count = keys.len() as u32;
            for key in &keys {
                table.remove(key.as_str()).map_err(map_err!(Write))?;
            }
        }
        txn.commit().map_err(map_err!(Transaction))?;
        debug!(%infra_id, removed = count, "instances removed");
        Ok(count)
    }

    // ── Failure archive ────────────────────────────────────────────

    /// Archive failed instances for post-mortem inspection.
    pub fn store_failed_nodes(&self, infra_id: &str, instances: &[Instance]) -> StateResult<()> {
        if instances.is_empty() {
            return Ok(());
        }
        let now = epoch_secs();
        let txn = self.db.begin_write().map_err(map_err!(Transaction))?;
        {
            let mut table = txn.open_table(FAILED_NODES).map_err(map_err!(Table))?;
            for instance in instances {
                let failed = FailedNode {
                    instance: instance.clone(),
                    archived_at: now,
                };
                let value = serde_json::to_vec(&failed).map_err(map_err!(Serialize))?;
                table
                    .insert(failed.table_key().as_str(), value.as_slice())
                    .map_err(map_err!(Write))?;
            }
        }
        txn.commit().map_err(map_err!(Transaction))?;
        debug!(%infra_id, count = instances.len(), "failed nodes archived");
        Ok(())
    }

    pub fn list_failed_nodes(&self, infra_id: &str) -> StateResult<Vec<FailedNode>> {
        self.scan_prefix(FAILED_NODES, &format!("{infra_id}:"))
    }

    // ── Scaling queues ─────────────────────────────────────────────

    /// Read the scaling queue of a node type. Missing queues are empty.
    pub fn get_scaling_queue(&self, infra_id: &str, node_type: &str) -> StateResult<ScalingQueue> {
        Ok(self
            .get_record(SCALING, &ScalingQueue::table_key(infra_id, node_type))?
            .unwrap_or_default())
    }

    /// Atomically read, modify and write back one scaling queue.
    ///
    /// The whole sequence runs in a single write transaction. A queue left
    /// empty by `f` is removed from the table.
    pub fn update_scaling_queue<R>(
        &self,
        infra_id: &str,
        node_type: &str,
        f: impl FnOnce(&mut ScalingQueue) -> R,
    ) -> StateResult<R> {
        let key = ScalingQueue::table_key(infra_id, node_type);
        let txn = self.db.begin_write().map_err(map_err!(Transaction))?;
        let result;
        {
            let mut table = txn.open_table(SCALING).map_err(map_err!(Table))?;
            let mut queue: ScalingQueue = match table.get(key.as_str()).map_err(map_err!(Read))? {
                Some(guard) => {
                    serde_json::from_slice(guard.value()).map_err(map_err!(Deserialize))?
                }
                None => ScalingQueue::default(),
            };

            result = f(&mut queue);

            if queue.is_empty() {
                table.remove(key.as_str()).map_err(map_err!(Write))?;
            } else {
                let value = serde_json::to_vec(&queue).map_err(map_err!(Serialize))?;
                table
                    .insert(key.as_str(), value.as_slice())
                    .map_err(map_err!(Write))?;
            }
        }
        txn.commit().map_err(map_err!(Transaction))?;
        Ok(result)
    }

    /// Store `bytes` verbatim as a node type's scaling queue, bypassing
    /// serialization. Lets tests plant records that fail to decode.
    #[cfg(any(test, feature = "test-util"))]
    pub fn put_raw_scaling_queue(
        &self,
        infra_id: &str,
        node_type: &str,
        bytes: &[u8],
    ) -> StateResult<()> {
        let key = ScalingQueue::table_key(infra_id, node_type);
        let txn = self.db.begin_write().map_err(map_err!(Transaction))?;
        {
            let mut table = txn.open_table(SCALING).map_err(map_err!(Table))?;
            table.insert(key.as_str(), bytes).map_err(map_err!(Write))?;
        }
        txn.commit().map_err(map_err!(Transaction))?;
        Ok(())
    }

    pub fn get_target_count(&self, infra_id: &str, node_type: &str) -> StateResult<Option<u32>> {
        Ok(self.get_scaling_queue(infra_id, node_type)?.target_count)
    }

    pub fn set_target_count(&self, infra_id: &str, node_type: &str, count: u32) -> StateResult<()> {
        self.update_scaling_queue(infra_id, node_type, |q| q.target_count = Some(count))?;
        debug!(%infra_id, %node_type, count, "target count stored");
        Ok(())
    }

    pub fn get_scaling_createnode(
        &self,
        infra_id: &str,
        node_type: &str,
    ) -> StateResult<Vec<CreateRequest>> {
        Ok(self.get_scaling_queue(infra_id, node_type)?.create_requests)
    }

    /// Queue a create request for `count` instances. Returns its id.
    pub fn set_scaling_createnode(
        &self,
        infra_id: &str,
        node_type: &str,
        count: u32,
    ) -> StateResult<RequestId> {
        let request = CreateRequest {
            id: new_request_id(),
            count,
            created_at: epoch_secs(),
        };
        let id = request.id.clone();
        self.update_scaling_queue(infra_id, node_type, |q| q.create_requests.push(request))?;
        debug!(%infra_id, %node_type, count, request_id = %id, "create request queued");
        Ok(id)
    }

    /// Delete one create request. Returns true if it existed.
    pub fn del_scaling_createnode(
        &self,
        infra_id: &str,
        node_type: &str,
        request_id: &str,
    ) -> StateResult<bool> {
        self.update_scaling_queue(infra_id, node_type, |q| {
            let before = q.create_requests.len();
            q.create_requests.retain(|r| r.id != request_id);
            q.create_requests.len() != before
        })
    }

    pub fn get_scaling_destroynode(
        &self,
        infra_id: &str,
        node_type: &str,
    ) -> StateResult<Vec<DropRequest>> {
        Ok(self.get_scaling_queue(infra_id, node_type)?.drop_requests)
    }

    /// Queue a drop request. Returns its id.
    pub fn set_scaling_destroynode(
        &self,
        infra_id: &str,
        node_type: &str,
        selector: VictimSelector,
    ) -> StateResult<RequestId> {
        let request = DropRequest {
            id: new_request_id(),
            selector,
            applied: false,
            created_at: epoch_secs(),
        };
        let id = request.id.clone();
        debug!(%infra_id, %node_type, selector = ?request.selector, request_id = %id, "drop request queued");
        self.update_scaling_queue(infra_id, node_type, |q| q.drop_requests.push(request))?;
        Ok(id)
    }

    /// Delete one drop request. Returns true if it existed.
    pub fn del_scaling_destroynode(
        &self,
        infra_id: &str,
        node_type: &str,
        request_id: &str,
    ) -> StateResult<bool> {
        self.update_scaling_queue(infra_id, node_type, |q| {
            let before = q.drop_requests.len();
            q.drop_requests.retain(|r| r.id != request_id);
            q.drop_requests.len() != before
        })
    }
}

fn new_request_id() -> RequestId {
    uuid::Uuid::new_v4().to_string()
}

/// Current Unix epoch in seconds.
pub fn epoch_secs() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}

#[cfg(test)]
mod tests {
    use super::*;
    use enactor_core::{NetworkAddress, NodeState, NodeType};

    fn test_topology(infra_id: &str) -> Topology {
        Topology::from_nodes(
            infra_id,
            "demo",
            vec![
                NodeType::new("db", 1, 1),
                NodeType::new("app", 2, 4).with_dependencies(&["db"]),
            ],
        )
        .unwrap()
    }

    fn test_instance(infra_id: &str, node_type: &str, id: &str) -> Instance {
        Instance {
            node_id: id.to_string(),
            node_type: node_type.to_string(),
            infra_id: infra_id.to_string(),
            state: NodeState::Ready,
            address: NetworkAddress::Single(format!("10.0.0.{}", id.len())),
            started_at: 1000,
        }
    }

    // ── Infrastructure records ─────────────────────────────────────

    #[test]
    fn infrastructure_put_and_get() {
        let store = StateStore::open_in_memory().unwrap();
        let topo = test_topology("infra-1");

        store.put_infrastructure(&topo).unwrap();
        let record = store.get_infrastructure("infra-1").unwrap().unwrap();

        assert_eq!(record.topology, topo);
        assert!(!record.started);
        assert_eq!(record.infra_id(), "infra-1");
        assert_eq!(store.get_topology("infra-1").unwrap(), Some(topo));
    }

    #[test]
    fn unknown_infrastructure_is_not_started() {
        let store = StateStore::open_in_memory().unwrap();
        assert!(!store.is_infrastructure_started("nope").unwrap());
        assert!(store.get_topology("nope").unwrap().is_none());
        assert!(matches!(
            store.set_infrastructure_started("nope", true),
            Err(StateError::UnknownInfrastructure(id)) if id == "nope"
        ));
    }

    #[test]
    fn started_flag_survives_topology_update() {
        let store = StateStore::open_in_memory().unwrap();
        let mut topo = test_topology("infra-1");
        store.put_infrastructure(&topo).unwrap();
        store.set_infrastructure_started("infra-1", true).unwrap();

        topo.name = "renamed".to_string();
        store.put_infrastructure(&topo).unwrap();

        let record = store.get_infrastructure("infra-1").unwrap().unwrap();
        assert!(record.started);
        assert_eq!(record.topology.name, "renamed");
    }

    #[test]
    fn infrastructure_list_and_delete() {
        let store = StateStore::open_in_memory().unwrap();
        store.put_infrastructure(&test_topology("infra-1")).unwrap();
        store.put_infrastructure(&test_topology("infra-2")).unwrap();
        assert_eq!(store.list_infrastructures().unwrap().len(), 2);

        assert!(store.delete_infrastructure("infra-1").unwrap());
        assert!(!store.delete_infrastructure("infra-1").unwrap());
        assert_eq!(store.list_infrastructures().unwrap().len(), 1);
    }

    // ── Instances ──────────────────────────────────────────────────

    #[test]
    fn raw_state_groups_by_node_type() {
        let store = StateStore::open_in_memory().unwrap();
        store.register_instance(&test_instance("infra-1", "app", "a1")).unwrap();
        store.register_instance(&test_instance("infra-1", "app", "a2")).unwrap();
        store.register_instance(&test_instance("infra-1", "db", "d1")).unwrap();
        store.register_instance(&test_instance("infra-2", "app", "x1")).unwrap();

        let state = store.get_raw_state("infra-1").unwrap();
        assert_eq!(state.count("app"), 2);
        assert_eq!(state.count("db"), 1);
        assert_eq!(state.total(), 3);

        let other = store.get_raw_state("infra-2").unwrap();
        assert_eq!(other.total(), 1);
    }

    #[test]
    fn instance_get_and_remove() {
        let store = StateStore::open_in_memory().unwrap();
        let inst = test_instance("infra-1", "app", "a1");
        store.register_instance(&inst).unwrap();

        assert_eq!(store.get_instance("infra-1", "app", "a1").unwrap(), Some(inst.clone()));
        assert!(store.remove_instance(&inst).unwrap());
        assert!(!store.remove_instance(&inst).unwrap());
        assert!(store.get_instance("infra-1", "app", "a1").unwrap().is_none());
    }

    #[test]
    fn remove_nodes_by_id() {
        let store = StateStore::open_in_memory().unwrap();
        store.register_instance(&test_instance("infra-1", "app", "a1")).unwrap();
        store.register_instance(&test_instance("infra-1", "app", "a2")).unwrap();
        store.register_instance(&test_instance("infra-1", "db", "d1")).unwrap();
        // Same node id in another infrastructure stays untouched.
        store.register_instance(&test_instance("infra-2", "app", "a1")).unwrap();

        let removed = store
            .remove_nodes("infra-1", &["a1".to_string(), "d1".to_string(), "zz".to_string()])
            .unwrap();
        assert_eq!(removed, 2);

        let state = store.get_raw_state("infra-1").unwrap();
        assert_eq!(state.total(), 1);
        assert!(state.contains("app", "a2"));
        assert_eq!(store.get_raw_state("infra-2").unwrap().total(), 1);

        assert_eq!(store.remove_nodes("infra-1", &[]).unwrap(), 0);
    }

    // ── Failure archive ────────────────────────────────────────────

    #[test]
    fn failed_nodes_archive() {
        let store = StateStore::open_in_memory().unwrap();
        let mut failed = test_instance("infra-1", "app", "a1");
        failed.state = NodeState::Fail;

        store.store_failed_nodes("infra-1", &[failed.clone()]).unwrap();
        store.store_failed_nodes("infra-1", &[]).unwrap();

        let archived = store.list_failed_nodes("infra-1").unwrap();
        assert_eq!(archived.len(), 1);
        assert_eq!(archived[0].instance, failed);
        assert!(store.list_failed_nodes("infra-2").unwrap().is_empty());
    }

    // ── Scaling queues ─────────────────────────────────────────────

    #[test]
    fn missing_queue_is_empty() {
        let store = StateStore::open_in_memory().unwrap();
        assert!(store.get_scaling_queue("infra-1", "app").unwrap().is_empty());
        assert_eq!(store.get_target_count("infra-1", "app").unwrap(), None);
    }

    #[test]
    fn target_count_roundtrip() {
        let store = StateStore::open_in_memory().unwrap();
        store.set_target_count("infra-1", "app", 3).unwrap();
        assert_eq!(store.get_target_count("infra-1", "app").unwrap(), Some(3));
        // Keyed per node type.
        assert_eq!(store.get_target_count("infra-1", "db").unwrap(), None);
    }

    #[test]
    fn create_requests_queue_in_order() {
        let store = StateStore::open_in_memory().unwrap();
        let first = store.set_scaling_createnode("infra-1", "app", 1).unwrap();
        let second = store.set_scaling_createnode("infra-1", "app", 2).unwrap();

        let requests = store.get_scaling_createnode("infra-1", "app").unwrap();
        assert_eq!(requests.len(), 2);
        assert_eq!(requests[0].id, first);
        assert_eq!(requests[1].id, second);
        assert_eq!(requests[1].count, 2);

        assert!(store.del_scaling_createnode("infra-1", "app", &first).unwrap());
        assert!(!store.del_scaling_createnode("infra-1", "app", &first).unwrap());
        assert_eq!(store.get_scaling_createnode("infra-1", "app").unwrap().len(), 1);
    }

    #[test]
    fn drop_requests_queue_and_delete() {
        let store = StateStore::open_in_memory().unwrap();
        let id = store
            .set_scaling_destroynode("infra-1", "app", VictimSelector::NodeId("a1".into()))
            .unwrap();
        store
            .set_scaling_destroynode("infra-1", "app", VictimSelector::Any)
            .unwrap();

        let requests = store.get_scaling_destroynode("infra-1", "app").unwrap();
        assert_eq!(requests.len(), 2);
        assert!(!requests[0].applied);
        assert_eq!(requests[0].selector, VictimSelector::NodeId("a1".into()));

        assert!(store.del_scaling_destroynode("infra-1", "app", &id).unwrap());
        assert_eq!(store.get_scaling_destroynode("infra-1", "app").unwrap().len(), 1);
    }

    #[test]
    fn undecodable_queue_is_deserialize_error() {
        let store = StateStore::open_in_memory().unwrap();
        store.put_raw_scaling_queue("infra-1", "app", b"not json").unwrap();

        assert!(matches!(
            store.get_scaling_queue("infra-1", "app"),
            Err(StateError::Deserialize(_))
        ));
        assert!(matches!(
            store.update_scaling_queue("infra-1", "app", |q| q.target_count = Some(1)),
            Err(StateError::Deserialize(_))
        ));
        // Other node types are unaffected.
        assert!(store.get_scaling_queue("infra-1", "db").unwrap().is_empty());
    }

    #[test]
    fn update_scaling_queue_returns_closure_result() {
        let store = StateStore::open_in_memory().unwrap();
        store.set_scaling_createnode("infra-1", "app", 2).unwrap();

        let consumed = store
            .update_scaling_queue("infra-1", "app", |q| {
                let n = q.pending_create_count();
                q.create_requests.clear();
                n
            })
            .unwrap();
        assert_eq!(consumed, 2);
        // Queue left empty is removed.
        assert!(store.get_scaling_queue("infra-1", "app").unwrap().is_empty());
    }

    #[test]
    fn concurrent_producers_do_not_lose_requests() {
        let store = StateStore::open_in_memory().unwrap();
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let store = store.clone();
                std::thread::spawn(move || {
                    for _ in 0..5 {
                        store.set_scaling_createnode("infra-1", "app", 1).unwrap();
                    }
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }
        assert_eq!(store.get_scaling_createnode("infra-1", "app").unwrap().len(), 40);
    }

    // ── Persistence (on-disk) ──────────────────────────────────────

    #[test]
    fn persistence_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let db_path = dir.path().join("test.redb");

        {
            let store = StateStore::open(&db_path).unwrap();
            store.put_infrastructure(&test_topology("infra-1")).unwrap();
            store.set_target_count("infra-1", "app", 3).unwrap();
        }

        // Reopen the same database file.
        let store = StateStore::open(&db_path).unwrap();
        assert!(store.get_topology("infra-1").unwrap().is_some());
        assert_eq!(store.get_target_count("infra-1", "app").unwrap(), Some(3));
    }
}
