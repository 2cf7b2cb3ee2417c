// crates/correlator-store-sqlite/src/ingest.rs
// ============================================================================
// Module: Transactional Event Ingestion
// Description: Single-event ingest transaction and correlation view refresh.
// Purpose: Implement the lineage store write path: idempotency gate, run
//          upsert, dataset/edge/test inserts, and view rebuilds.
// Dependencies: correlator-core, rusqlite
// ============================================================================

//! ## Overview
//! One event is one transaction: the idempotency fingerprint is claimed
//! first, the run row is upserted under the monotonic state policy, datasets
//! and edges are inserted idempotently, and extracted test results land with
//! conflict-ignoring inserts. Any failure rolls the whole transaction back.
//! View refresh rebuilds the three correlation tables in dependency order,
//! each in its own transaction.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::time::Instant;

use rusqlite::OptionalExtension;

use correlator_core::EdgeType;
use correlator_core::IngestError;
use correlator_core::IngestReceipt;
use correlator_core::LineageStore;
use correlator_core::PreparedEvent;
use correlator_core::RunState;
use correlator_core::StoreError;
use correlator_core::ViewRefresh;
use correlator_core::ViewRefreshReport;
use rusqlite::Transaction;
use rusqlite::params;
use time::OffsetDateTime;

use crate::store::SqliteLineageStore;
use crate::store::SqliteStoreError;
use crate::store::to_ns;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Window covered by the recent incident summary.
const SUMMARY_WINDOW: time::Duration = time::Duration::days(7);

// ============================================================================
// SECTION: Store Implementation
// ============================================================================

impl LineageStore for SqliteLineageStore {
    fn ingest_event(&self, event: &PreparedEvent) -> Result<IngestReceipt, IngestError> {
        let mut guard = self.write_connection()?;
        let tx = guard
            .transaction()
            .map_err(|err| IngestError::from(SqliteStoreError::from_sqlite(&err)))?;

        if !claim_fingerprint(&tx, event)? {
            // Fingerprint already present: absorb without writes.
            drop(tx);
            return Ok(IngestReceipt {
                duplicate: true,
            });
        }
        upsert_run(&tx, event)?;
        upsert_datasets(&tx, event)?;
        insert_edges(&tx, event)?;
        insert_test_results(&tx, event)?;

        tx.commit().map_err(|err| IngestError::from(SqliteStoreError::from_sqlite(&err)))?;
        Ok(IngestReceipt {
            duplicate: false,
        })
    }

    fn refresh_views(&self) -> Result<ViewRefreshReport, StoreError> {
        let mut report = ViewRefreshReport::default();
        // Dependency order: the summary reads the incident view; the impact
        // closure is independent.
        refresh_incident_correlation_view(self, &mut report)?;
        refresh_recent_incidents_summary(self, &mut report)?;
        refresh_lineage_impact_analysis(self, &mut report)?;
        Ok(report)
    }

    fn prune_idempotency_keys(&self, older_than: OffsetDateTime) -> Result<u64, StoreError> {
        let cutoff = to_ns(older_than).map_err(StoreError::from)?;
        let guard = self.write_connection().map_err(StoreError::from)?;
        let removed = guard
            .execute(
                "DELETE FROM lineage_event_idempotency WHERE recorded_at_ns < ?1",
                params![cutoff],
            )
            .map_err(|err| StoreError::from(SqliteStoreError::from_sqlite(&err)))?;
        Ok(removed as u64)
    }
}

// ============================================================================
// SECTION: Ingest Steps
// ============================================================================

/// Claims the event fingerprint; returns false on an idempotency hit.
fn claim_fingerprint(tx: &Transaction<'_>, event: &PreparedEvent) -> Result<bool, IngestError> {
    let event_time_ns = to_ns(event.event_time).map_err(IngestError::from)?;
    let recorded_at_ns = to_ns(OffsetDateTime::now_utc()).map_err(IngestError::from)?;
    let inserted = tx
        .execute(
            "INSERT OR IGNORE INTO lineage_event_idempotency
                 (fingerprint, producer_name, job_run_id, event_time_ns, recorded_at_ns)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                event.fingerprint,
                event.producer_name,
                event.job_run_id.as_str(),
                event_time_ns,
                recorded_at_ns
            ],
        )
        .map_err(|err| IngestError::from(SqliteStoreError::from_sqlite(&err)))?;
    Ok(inserted > 0)
}

/// Upserts the run row under the monotonic state transition policy.
fn upsert_run(tx: &Transaction<'_>, event: &PreparedEvent) -> Result<(), IngestError> {
    let event_time_ns = to_ns(event.event_time).map_err(IngestError::from)?;
    let incoming_state = event.event_type.run_state();

    let stored: Option<(Option<String>, i64, i64)> = tx
        .query_row(
            "SELECT current_state, event_time_ns, started_at_ns
             FROM job_runs WHERE job_run_id = ?1",
            params![event.job_run_id.as_str()],
            |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)),
        )
        .optional()
        .map_err(|err| IngestError::from(SqliteStoreError::from_sqlite(&err)))?;

    match stored {
        None => {
            let completed_at_ns = incoming_state
                .filter(|state| state.is_terminal())
                .map(|_| event_time_ns);
            tx.execute(
                "INSERT INTO job_runs
                     (job_run_id, raw_run_id, job_name, job_namespace, current_state,
                      event_type, event_time_ns, started_at_ns, completed_at_ns,
                      producer_name, producer_version, parent_run_id)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)",
                params![
                    event.job_run_id.as_str(),
                    event.raw_run_id.as_str(),
                    event.job_name,
                    event.job_namespace,
                    incoming_state.map(RunState::as_str),
                    event.event_type.as_str(),
                    event_time_ns,
                    event_time_ns,
                    completed_at_ns,
                    event.producer_name,
                    event.producer_version,
                    event.parent_run_id.as_ref().map(|id| id.as_str()),
                ],
            )
            .map_err(|err| IngestError::from(SqliteStoreError::from_sqlite(&err)))?;
        }
        Some((stored_state_text, stored_event_time_ns, stored_started_at_ns)) => {
            if event_time_ns < stored_started_at_ns {
                tx.execute(
                    "UPDATE job_runs SET started_at_ns = ?2 WHERE job_run_id = ?1",
                    params![event.job_run_id.as_str(), event_time_ns],
                )
                .map_err(|err| IngestError::from(SqliteStoreError::from_sqlite(&err)))?;
            }
            if let Some(incoming) = incoming_state {
                let stored_state = stored_state_text.as_deref().and_then(RunState::parse);
                let stored_pair = match stored_state {
                    Some(state) => {
                        let stored_time = crate::store::from_ns(stored_event_time_ns)
                            .map_err(IngestError::from)?;
                        Some((state, stored_time))
                    }
                    None => None,
                };
                if RunState::should_apply(stored_pair, incoming, event.event_time) {
                    tx.execute(
                        "UPDATE job_runs SET
                             current_state = ?2,
                             event_type = ?3,
                             event_time_ns = ?4,
                             completed_at_ns = CASE WHEN ?5 THEN ?4 ELSE completed_at_ns END
                         WHERE job_run_id = ?1",
                        params![
                            event.job_run_id.as_str(),
                            incoming.as_str(),
                            event.event_type.as_str(),
                            event_time_ns,
                            incoming.is_terminal(),
                        ],
                    )
                    .map_err(|err| IngestError::from(SqliteStoreError::from_sqlite(&err)))?;
                }
            }
            if let Some(parent) = &event.parent_run_id {
                tx.execute(
                    "UPDATE job_runs SET parent_run_id = COALESCE(parent_run_id, ?2)
                     WHERE job_run_id = ?1",
                    params![event.job_run_id.as_str(), parent.as_str()],
                )
                .map_err(|err| IngestError::from(SqliteStoreError::from_sqlite(&err)))?;
            }
        }
    }
    Ok(())
}

/// Upserts dataset rows for every referenced URN.
fn upsert_datasets(tx: &Transaction<'_>, event: &PreparedEvent) -> Result<(), IngestError> {
    let mut statement = tx
        .prepare_cached(
            "INSERT INTO datasets (dataset_urn, name, namespace)
             VALUES (?1, ?2, ?3)
             ON CONFLICT (dataset_urn) DO UPDATE SET
                 name = excluded.name,
                 namespace = excluded.namespace",
        )
        .map_err(|err| IngestError::from(SqliteStoreError::from_sqlite(&err)))?;
    for dataset in event.inputs.iter().chain(event.outputs.iter()) {
        statement
            .execute(params![dataset.urn.as_str(), dataset.name, dataset.namespace])
            .map_err(|err| IngestError::from(SqliteStoreError::from_sqlite(&err)))?;
    }
    Ok(())
}

/// Inserts lineage edges; duplicate triples are ignored.
fn insert_edges(tx: &Transaction<'_>, event: &PreparedEvent) -> Result<(), IngestError> {
    let mut statement = tx
        .prepare_cached(
            "INSERT OR IGNORE INTO lineage_edges (job_run_id, dataset_urn, edge_type)
             VALUES (?1, ?2, ?3)",
        )
        .map_err(|err| IngestError::from(SqliteStoreError::from_sqlite(&err)))?;
    for (datasets, edge_type) in
        [(&event.inputs, EdgeType::Input), (&event.outputs, EdgeType::Output)]
    {
        for dataset in datasets {
            statement
                .execute(params![
                    event.job_run_id.as_str(),
                    dataset.urn.as_str(),
                    edge_type.as_str()
                ])
                .map_err(|err| IngestError::from(SqliteStoreError::from_sqlite(&err)))?;
        }
    }
    Ok(())
}

/// Inserts extracted test results against the uniqueness tuple.
fn insert_test_results(tx: &Transaction<'_>, event: &PreparedEvent) -> Result<(), IngestError> {
    if event.test_results.is_empty() {
        return Ok(());
    }
    let mut statement = tx
        .prepare_cached(
            "INSERT INTO test_results
                 (test_name, test_type, dataset_urn, job_run_id, status, message,
                  executed_at_ns, duration_ms, producer_name)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
             ON CONFLICT (job_run_id, test_name, dataset_urn, executed_at_ns) DO NOTHING",
        )
        .map_err(|err| IngestError::from(SqliteStoreError::from_sqlite(&err)))?;
    for test in &event.test_results {
        let executed_at_ns = to_ns(test.executed_at).map_err(IngestError::from)?;
        statement
            .execute(params![
                test.test_name,
                test.test_type,
                test.dataset_urn.as_str(),
                event.job_run_id.as_str(),
                test.status.as_str(),
                test.message,
                executed_at_ns,
                test.duration_ms,
                event.producer_name,
            ])
            .map_err(|err| IngestError::from(SqliteStoreError::from_sqlite(&err)))?;
    }
    Ok(())
}

// ============================================================================
// SECTION: View Refresh
// ============================================================================

/// Rebuilds one view table inside a transaction and records its duration.
fn rebuild_view(
    store: &SqliteLineageStore,
    report: &mut ViewRefreshReport,
    view: &str,
    delete_sql: &str,
    insert_sql: &str,
    insert_params: &[&dyn rusqlite::ToSql],
) -> Result<(), StoreError> {
    let started = Instant::now();
    let mut guard = store.write_connection().map_err(StoreError::from)?;
    let tx = guard
        .transaction()
        .map_err(|err| StoreError::from(SqliteStoreError::from_sqlite(&err)))?;
    tx.execute(delete_sql, params![])
        .map_err(|err| StoreError::from(SqliteStoreError::from_sqlite(&err)))?;
    tx.execute(insert_sql, insert_params)
        .map_err(|err| StoreError::from(SqliteStoreError::from_sqlite(&err)))?;
    tx.commit().map_err(|err| StoreError::from(SqliteStoreError::from_sqlite(&err)))?;
    let duration_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);
    tracing::debug!(view, duration_ms, "correlation view refreshed");
    report.refreshed.push(ViewRefresh {
        view: view.to_string(),
        duration_ms,
    });
    Ok(())
}

/// Rebuilds the incident correlation view: one row per failed or errored
/// test joined to the most recent producing run.
fn refresh_incident_correlation_view(
    store: &SqliteLineageStore,
    report: &mut ViewRefreshReport,
) -> Result<(), StoreError> {
    rebuild_view(
        store,
        report,
        "incident_correlation_view",
        "DELETE FROM incident_correlation_view",
        "INSERT INTO incident_correlation_view
         SELECT t.id,
                t.test_name,
                t.test_type,
                t.status,
                t.message,
                t.executed_at_ns,
                t.dataset_urn,
                COALESCE(d.name, t.dataset_urn),
                COALESCE(d.namespace, ''),
                t.producer_name,
                p.job_run_id,
                p.job_name,
                p.job_namespace,
                p.current_state,
                p.completed_at_ns,
                p.producer_name,
                p.parent_run_id
         FROM test_results t
         LEFT JOIN datasets d ON d.dataset_urn = t.dataset_urn
         LEFT JOIN (
             SELECT e.dataset_urn,
                    r.job_run_id,
                    r.job_name,
                    r.job_namespace,
                    r.current_state,
                    r.completed_at_ns,
                    r.producer_name,
                    r.parent_run_id,
                    ROW_NUMBER() OVER (
                        PARTITION BY e.dataset_urn
                        ORDER BY r.event_time_ns DESC, r.job_run_id
                    ) AS recency
             FROM lineage_edges e
             JOIN job_runs r ON r.job_run_id = e.job_run_id
             WHERE e.edge_type = 'output'
         ) p ON p.dataset_urn = t.dataset_urn AND p.recency = 1
         WHERE t.status IN ('failed', 'error')",
        &[],
    )
}

/// Rebuilds the seven-day incident summary from the incident view.
fn refresh_recent_incidents_summary(
    store: &SqliteLineageStore,
    report: &mut ViewRefreshReport,
) -> Result<(), StoreError> {
    let cutoff =
        to_ns(OffsetDateTime::now_utc() - SUMMARY_WINDOW).map_err(StoreError::from)?;
    rebuild_view(
        store,
        report,
        "recent_incidents_summary",
        "DELETE FROM recent_incidents_summary",
        "INSERT INTO recent_incidents_summary
         SELECT job_run_id,
                job_name,
                job_namespace,
                job_producer,
                SUM(CASE WHEN status = 'failed' THEN 1 ELSE 0 END),
                SUM(CASE WHEN status = 'error' THEN 1 ELSE 0 END),
                COUNT(DISTINCT dataset_urn),
                MAX(executed_at_ns)
         FROM incident_correlation_view
         WHERE job_run_id IS NOT NULL AND executed_at_ns >= ?1
         GROUP BY job_run_id, job_name, job_namespace, job_producer",
        &[&cutoff],
    )
}

/// Rebuilds the downstream impact closure, bounded inside the recursion.
fn refresh_lineage_impact_analysis(
    store: &SqliteLineageStore,
    report: &mut ViewRefreshReport,
) -> Result<(), StoreError> {
    rebuild_view(
        store,
        report,
        "lineage_impact_analysis",
        "DELETE FROM lineage_impact_analysis",
        "WITH RECURSIVE impact (job_run_id, dataset_urn, depth) AS (
             SELECT e.job_run_id, e.dataset_urn, 0
             FROM lineage_edges e
             WHERE e.edge_type = 'output'
             UNION
             SELECT i.job_run_id, produced.dataset_urn, i.depth + 1
             FROM impact i
             JOIN lineage_edges consumed
                 ON consumed.dataset_urn = i.dataset_urn AND consumed.edge_type = 'input'
             JOIN lineage_edges produced
                 ON produced.job_run_id = consumed.job_run_id AND produced.edge_type = 'output'
             WHERE i.depth < 10
         )
         INSERT INTO lineage_impact_analysis
         SELECT i.job_run_id,
                i.dataset_urn,
                COALESCE(d.name, i.dataset_urn),
                MIN(i.depth)
         FROM impact i
         LEFT JOIN datasets d ON d.dataset_urn = i.dataset_urn
         GROUP BY i.job_run_id, i.dataset_urn",
        &[],
    )
}
