// crates/correlator-store-sqlite/src/query.rs
// ============================================================================
// Module: Correlation Reader Queries
// Description: Read-only correlation queries over committed store state.
// Purpose: Implement incident listing, lineage traversal, and health
//          analysis against the derived read model.
// Dependencies: correlator-core, rusqlite
// ============================================================================

//! ## Overview
//! Reader queries are pure functions of committed rows. Incident lists come
//! from the incident correlation view with the full filtered count obtained
//! through a window function in the same statement. Traversals are recursive
//! CTEs whose ten-hop ceiling lives inside the recursive term, not in the
//! caller.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;

use correlator_core::CorrelationHealth;
use correlator_core::CorrelationReader;
use correlator_core::CorrelationStatus;
use correlator_core::DatasetUrn;
use correlator_core::DownstreamRow;
use correlator_core::EventType;
use correlator_core::ImpactRow;
use correlator_core::IncidentDetail;
use correlator_core::IncidentFilter;
use correlator_core::IncidentPage;
use correlator_core::IncidentRow;
use correlator_core::JobRunId;
use correlator_core::OrphanDataset;
use correlator_core::Page;
use correlator_core::RawRunId;
use correlator_core::RecentIncidentRow;
use correlator_core::RunDetail;
use correlator_core::RunRecord;
use correlator_core::RunState;
use correlator_core::StoreError;
use correlator_core::TestStatus;
use correlator_core::TestedDataset;
use correlator_core::UpstreamRow;
use correlator_core::analyze_correlation;
use correlator_core::find_orphans;
use rusqlite::Connection;
use rusqlite::OptionalExtension;
use rusqlite::Row;
use rusqlite::params;
use rusqlite::params_from_iter;

use crate::store::SqliteLineageStore;
use crate::store::SqliteStoreError;
use crate::store::from_ns;
use crate::store::to_ns;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Hard ceiling on recursive traversal depth.
const MAX_TRAVERSAL_DEPTH: i64 = 10;

/// Columns shared by incident list and detail queries.
const INCIDENT_COLUMNS: &str = "test_result_id, test_name, test_type, status, message, \
     executed_at_ns, dataset_urn, dataset_name, dataset_namespace, test_producer, \
     job_run_id, job_name, job_namespace, job_state, job_completed_at_ns, job_producer";

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Maps a `rusqlite` error into the reader error taxonomy.
fn db_err(error: &rusqlite::Error) -> StoreError {
    StoreError::from(SqliteStoreError::from_sqlite(error))
}

/// Clamps a caller-supplied depth to the traversal ceiling.
///
/// `0` (and any negative value) means unlimited within the ceiling for
/// recursive traversals; positive values cap below it.
const fn effective_depth_cap(max_depth: i64) -> i64 {
    if max_depth > 0 && max_depth < MAX_TRAVERSAL_DEPTH {
        max_depth
    } else {
        MAX_TRAVERSAL_DEPTH
    }
}

/// Reads one incident row from the shared column list.
fn incident_from_row(row: &Row<'_>) -> Result<IncidentRow, rusqlite::Error> {
    let status_text: String = row.get(3)?;
    let executed_at_ns: i64 = row.get(5)?;
    let job_state_text: Option<String> = row.get(13)?;
    let job_completed_at_ns: Option<i64> = row.get(14)?;
    let job_run_id: Option<String> = row.get(10)?;
    Ok(IncidentRow {
        test_result_id: row.get(0)?,
        test_name: row.get(1)?,
        test_type: row.get(2)?,
        status: TestStatus::parse(&status_text).unwrap_or(TestStatus::Error),
        message: row.get(4)?,
        executed_at: from_ns(executed_at_ns).map_err(|_| rusqlite::Error::InvalidQuery)?,
        dataset_urn: DatasetUrn::new(row.get::<_, String>(6)?),
        dataset_name: row.get(7)?,
        dataset_namespace: row.get(8)?,
        test_producer: row.get(9)?,
        job_run_id: job_run_id.map(JobRunId::new),
        job_name: row.get(11)?,
        job_namespace: row.get(12)?,
        job_state: job_state_text.as_deref().and_then(RunState::parse),
        job_completed_at: match job_completed_at_ns {
            Some(ns) => Some(from_ns(ns).map_err(|_| rusqlite::Error::InvalidQuery)?),
            None => None,
        },
        job_producer: row.get(15)?,
    })
}

/// Loads one run row by canonical identity.
fn load_run(
    connection: &Connection,
    job_run_id: &str,
) -> Result<Option<RunRecord>, StoreError> {
    connection
        .query_row(
            "SELECT job_run_id, raw_run_id, job_name, job_namespace, current_state,
                    event_type, event_time_ns, started_at_ns, completed_at_ns,
                    producer_name, producer_version, parent_run_id
             FROM job_runs WHERE job_run_id = ?1",
            params![job_run_id],
            run_from_row,
        )
        .optional()
        .map_err(|err| db_err(&err))
}

/// Reads one run record from its full column list.
fn run_from_row(row: &Row<'_>) -> Result<RunRecord, rusqlite::Error> {
    let current_state: Option<String> = row.get(4)?;
    let event_type: String = row.get(5)?;
    let event_time_ns: i64 = row.get(6)?;
    let started_at_ns: i64 = row.get(7)?;
    let completed_at_ns: Option<i64> = row.get(8)?;
    let parent_run_id: Option<String> = row.get(11)?;
    Ok(RunRecord {
        job_run_id: JobRunId::new(row.get::<_, String>(0)?),
        raw_run_id: RawRunId::new(row.get::<_, String>(1)?),
        job_name: row.get(2)?,
        job_namespace: row.get(3)?,
        current_state: current_state.as_deref().and_then(RunState::parse),
        event_type: EventType::parse(&event_type).unwrap_or(EventType::Other),
        event_time: from_ns(event_time_ns).map_err(|_| rusqlite::Error::InvalidQuery)?,
        started_at: from_ns(started_at_ns).map_err(|_| rusqlite::Error::InvalidQuery)?,
        completed_at: match completed_at_ns {
            Some(ns) => Some(from_ns(ns).map_err(|_| rusqlite::Error::InvalidQuery)?),
            None => None,
        },
        producer_name: row.get(9)?,
        producer_version: row.get(10)?,
        parent_run_id: parent_run_id.map(JobRunId::new),
    })
}

/// Producing-run subquery selecting the most recent writer per dataset.
const PRODUCER_PICK: &str = "SELECT e.dataset_urn AS dataset_urn,
            r.producer_name AS producer_name,
            ROW_NUMBER() OVER (
                PARTITION BY e.dataset_urn
                ORDER BY r.event_time_ns DESC, r.job_run_id
            ) AS recency
     FROM lineage_edges e
     JOIN job_runs r ON r.job_run_id = e.job_run_id
     WHERE e.edge_type = 'output'";

// ============================================================================
// SECTION: Reader Implementation
// ============================================================================

impl CorrelationReader for SqliteLineageStore {
    fn incidents(&self, filter: &IncidentFilter, page: Page) -> Result<IncidentPage, StoreError> {
        let executed_after = match filter.executed_after {
            Some(time) => Some(to_ns(time).map_err(StoreError::from)?),
            None => None,
        };
        let executed_before = match filter.executed_before {
            Some(time) => Some(to_ns(time).map_err(StoreError::from)?),
            None => None,
        };
        let connection = self.read_connection().map_err(StoreError::from)?;
        let sql = format!(
            "SELECT {INCIDENT_COLUMNS}, COUNT(*) OVER () AS total
             FROM incident_correlation_view
             WHERE (?1 IS NULL OR job_state = ?1)
               AND (?2 IS NULL OR job_producer = ?2)
               AND (?3 IS NULL OR dataset_urn = ?3)
               AND (?4 IS NULL OR job_run_id = ?4)
               AND (?5 IS NULL OR job_run_id LIKE ?5 || ':%')
               AND (?6 IS NULL OR executed_at_ns >= ?6)
               AND (?7 IS NULL OR executed_at_ns <= ?7)
             ORDER BY executed_at_ns DESC, test_result_id DESC
             LIMIT ?8 OFFSET ?9"
        );
        let mut statement = connection.prepare_cached(&sql).map_err(|err| db_err(&err))?;
        let mut rows = statement
            .query(params![
                filter.job_status.map(RunState::as_str),
                filter.producer_name.as_deref(),
                filter.dataset_urn.as_deref(),
                filter.job_run_id.as_deref(),
                filter.tool.as_deref(),
                executed_after,
                executed_before,
                i64::from(page.limit),
                i64::from(page.offset),
            ])
            .map_err(|err| db_err(&err))?;
        let mut incidents = Vec::new();
        let mut total: u64 = 0;
        while let Some(row) = rows.next().map_err(|err| db_err(&err))? {
            let window_total: i64 = row.get(16).map_err(|err| db_err(&err))?;
            total = u64::try_from(window_total).unwrap_or(0);
            incidents.push(incident_from_row(row).map_err(|err| db_err(&err))?);
        }
        Ok(IncidentPage {
            incidents,
            total,
        })
    }

    fn incident_by_id(&self, test_result_id: i64) -> Result<Option<IncidentDetail>, StoreError> {
        let connection = self.read_connection().map_err(StoreError::from)?;
        let sql = format!(
            "SELECT {INCIDENT_COLUMNS}, parent_run_id
             FROM incident_correlation_view WHERE test_result_id = ?1"
        );
        let found = connection
            .query_row(&sql, params![test_result_id], |row| {
                let incident = incident_from_row(row)?;
                let parent_run_id: Option<String> = row.get(16)?;
                Ok((incident, parent_run_id))
            })
            .optional()
            .map_err(|err| db_err(&err))?;
        let Some((incident, parent_run_id)) = found else {
            return Ok(None);
        };
        let correlation_status = if incident.job_run_id.is_some() {
            CorrelationStatus::Correlated
        } else {
            let produced: Option<i64> = connection
                .query_row(
                    "SELECT 1 FROM lineage_edges
                     WHERE dataset_urn = ?1 AND edge_type = 'output' LIMIT 1",
                    params![incident.dataset_urn.as_str()],
                    |row| row.get(0),
                )
                .optional()
                .map_err(|err| db_err(&err))?;
            if produced.is_some() {
                CorrelationStatus::Unknown
            } else {
                CorrelationStatus::Orphan
            }
        };
        let parent = match parent_run_id {
            Some(parent_id) => load_run(&connection, &parent_id)?,
            None => None,
        };
        Ok(Some(IncidentDetail {
            incident,
            correlation_status,
            parent,
        }))
    }

    fn lineage_impact(
        &self,
        job_run_id: &JobRunId,
        max_depth: i64,
    ) -> Result<Vec<ImpactRow>, StoreError> {
        // Materialized semantics: -1 restricts to direct outputs, 0 means
        // unlimited within the ceiling, positive values cap the depth.
        let depth_cap = if max_depth < 0 { 0 } else { effective_depth_cap(max_depth) };
        let connection = self.read_connection().map_err(StoreError::from)?;
        let mut statement = connection
            .prepare_cached(
                "SELECT dataset_urn, dataset_name, depth
                 FROM lineage_impact_analysis
                 WHERE job_run_id = ?1 AND depth <= ?2
                 ORDER BY depth, dataset_urn",
            )
            .map_err(|err| db_err(&err))?;
        let rows = statement
            .query_map(params![job_run_id.as_str(), depth_cap], |row| {
                Ok(ImpactRow {
                    job_run_id: job_run_id.clone(),
                    dataset_urn: DatasetUrn::new(row.get::<_, String>(0)?),
                    dataset_name: row.get(1)?,
                    depth: row.get(2)?,
                })
            })
            .map_err(|err| db_err(&err))?;
        rows.collect::<Result<Vec<_>, _>>().map_err(|err| db_err(&err))
    }

    fn downstream_with_parents(
        &self,
        job_run_id: &JobRunId,
        max_depth: i64,
    ) -> Result<Vec<DownstreamRow>, StoreError> {
        let depth_cap = effective_depth_cap(max_depth);
        let connection = self.read_connection().map_err(StoreError::from)?;
        let sql = format!(
            "WITH RECURSIVE downstream (dataset_urn, depth, parent_urn) AS (
                 SELECT produced.dataset_urn, 1, start_edge.dataset_urn
                 FROM lineage_edges start_edge
                 JOIN lineage_edges consumed
                     ON consumed.dataset_urn = start_edge.dataset_urn
                    AND consumed.edge_type = 'input'
                 JOIN lineage_edges produced
                     ON produced.job_run_id = consumed.job_run_id
                    AND produced.edge_type = 'output'
                 WHERE start_edge.job_run_id = ?1 AND start_edge.edge_type = 'output'
                 UNION
                 SELECT produced.dataset_urn, d.depth + 1, d.dataset_urn
                 FROM downstream d
                 JOIN lineage_edges consumed
                     ON consumed.dataset_urn = d.dataset_urn AND consumed.edge_type = 'input'
                 JOIN lineage_edges produced
                     ON produced.job_run_id = consumed.job_run_id
                    AND produced.edge_type = 'output'
                 WHERE d.depth < ?2
             )
             SELECT d.dataset_urn,
                    COALESCE(ds.name, d.dataset_urn),
                    MIN(d.depth) AS depth,
                    d.parent_urn,
                    p.producer_name
             FROM downstream d
             LEFT JOIN datasets ds ON ds.dataset_urn = d.dataset_urn
             LEFT JOIN ({PRODUCER_PICK}) p
                 ON p.dataset_urn = d.dataset_urn AND p.recency = 1
             GROUP BY d.dataset_urn, d.parent_urn
             ORDER BY depth, d.dataset_urn"
        );
        let mut statement = connection.prepare_cached(&sql).map_err(|err| db_err(&err))?;
        let rows = statement
            .query_map(params![job_run_id.as_str(), depth_cap], |row| {
                Ok(DownstreamRow {
                    dataset_urn: DatasetUrn::new(row.get::<_, String>(0)?),
                    name: row.get(1)?,
                    depth: row.get(2)?,
                    parent_urn: DatasetUrn::new(row.get::<_, String>(3)?),
                    producer: row.get(4)?,
                })
            })
            .map_err(|err| db_err(&err))?;
        rows.collect::<Result<Vec<_>, _>>().map_err(|err| db_err(&err))
    }

    fn upstream_with_children(
        &self,
        dataset_urn: &DatasetUrn,
        job_run_id: &JobRunId,
        max_depth: i64,
    ) -> Result<Vec<UpstreamRow>, StoreError> {
        let depth_cap = effective_depth_cap(max_depth);
        let connection = self.read_connection().map_err(StoreError::from)?;
        let sql = format!(
            "WITH RECURSIVE upstream (dataset_urn, depth, child_urn) AS (
                 SELECT consumed.dataset_urn, 1, ?2
                 FROM lineage_edges consumed
                 WHERE consumed.job_run_id = ?1 AND consumed.edge_type = 'input'
                 UNION
                 SELECT feeder.dataset_urn, u.depth + 1, u.dataset_urn
                 FROM upstream u
                 JOIN lineage_edges produced
                     ON produced.dataset_urn = u.dataset_urn AND produced.edge_type = 'output'
                 JOIN lineage_edges feeder
                     ON feeder.job_run_id = produced.job_run_id AND feeder.edge_type = 'input'
                 WHERE u.depth < ?3
             )
             SELECT u.dataset_urn,
                    COALESCE(ds.name, u.dataset_urn),
                    MIN(u.depth) AS depth,
                    u.child_urn,
                    p.producer_name
             FROM upstream u
             LEFT JOIN datasets ds ON ds.dataset_urn = u.dataset_urn
             LEFT JOIN ({PRODUCER_PICK}) p
                 ON p.dataset_urn = u.dataset_urn AND p.recency = 1
             GROUP BY u.dataset_urn, u.child_urn
             ORDER BY depth, u.dataset_urn"
        );
        let mut statement = connection.prepare_cached(&sql).map_err(|err| db_err(&err))?;
        let rows = statement
            .query_map(
                params![job_run_id.as_str(), dataset_urn.as_str(), depth_cap],
                |row| {
                    Ok(UpstreamRow {
                        dataset_urn: DatasetUrn::new(row.get::<_, String>(0)?),
                        name: row.get(1)?,
                        depth: row.get(2)?,
                        child_urn: DatasetUrn::new(row.get::<_, String>(3)?),
                        producer: row.get(4)?,
                    })
                },
            )
            .map_err(|err| db_err(&err))?;
        rows.collect::<Result<Vec<_>, _>>().map_err(|err| db_err(&err))
    }

    fn downstream_counts(
        &self,
        job_run_ids: &[JobRunId],
    ) -> Result<BTreeMap<String, u64>, StoreError> {
        if job_run_ids.is_empty() {
            return Ok(BTreeMap::new());
        }
        let connection = self.read_connection().map_err(StoreError::from)?;
        let placeholders =
            std::iter::repeat_n("?", job_run_ids.len()).collect::<Vec<_>>().join(", ");
        let sql = format!(
            "SELECT job_run_id, COUNT(DISTINCT dataset_urn)
             FROM lineage_impact_analysis
             WHERE depth >= 1 AND job_run_id IN ({placeholders})
             GROUP BY job_run_id"
        );
        let mut statement = connection.prepare(&sql).map_err(|err| db_err(&err))?;
        let rows = statement
            .query_map(params_from_iter(job_run_ids.iter().map(JobRunId::as_str)), |row| {
                let count: i64 = row.get(1)?;
                Ok((row.get::<_, String>(0)?, u64::try_from(count).unwrap_or(0)))
            })
            .map_err(|err| db_err(&err))?;
        rows.collect::<Result<BTreeMap<_, _>, _>>().map_err(|err| db_err(&err))
    }

    fn recent_incidents(&self, limit: u32) -> Result<Vec<RecentIncidentRow>, StoreError> {
        let connection = self.read_connection().map_err(StoreError::from)?;
        let mut statement = connection
            .prepare_cached(
                "SELECT job_run_id, job_name, job_namespace, producer_name,
                        failed_tests, error_tests, datasets_affected, last_failure_at_ns
                 FROM recent_incidents_summary
                 ORDER BY last_failure_at_ns DESC
                 LIMIT ?1",
            )
            .map_err(|err| db_err(&err))?;
        let rows = statement
            .query_map(params![i64::from(limit)], |row| {
                let failed: i64 = row.get(4)?;
                let errors: i64 = row.get(5)?;
                let affected: i64 = row.get(6)?;
                let last_failure_ns: i64 = row.get(7)?;
                Ok(RecentIncidentRow {
                    job_run_id: JobRunId::new(row.get::<_, String>(0)?),
                    job_name: row.get(1)?,
                    job_namespace: row.get(2)?,
                    producer_name: row.get(3)?,
                    failed_tests: u64::try_from(failed).unwrap_or(0),
                    error_tests: u64::try_from(errors).unwrap_or(0),
                    datasets_affected: u64::try_from(affected).unwrap_or(0),
                    last_failure_at: from_ns(last_failure_ns)
                        .map_err(|_| rusqlite::Error::InvalidQuery)?,
                })
            })
            .map_err(|err| db_err(&err))?;
        rows.collect::<Result<Vec<_>, _>>().map_err(|err| db_err(&err))
    }

    fn orphan_datasets(&self) -> Result<Vec<OrphanDataset>, StoreError> {
        let (tested, produced) = self.tested_and_produced()?;
        Ok(find_orphans(&tested, &produced))
    }

    fn correlation_health(&self) -> Result<CorrelationHealth, StoreError> {
        let (tested, produced) = self.tested_and_produced()?;
        Ok(analyze_correlation(&tested, &produced))
    }

    fn run_detail(&self, job_run_id: &JobRunId) -> Result<Option<RunDetail>, StoreError> {
        let connection = self.read_connection().map_err(StoreError::from)?;
        let Some(run) = load_run(&connection, job_run_id.as_str())? else {
            return Ok(None);
        };
        let mut statement = connection
            .prepare_cached(
                "SELECT dataset_urn, edge_type FROM lineage_edges
                 WHERE job_run_id = ?1 ORDER BY dataset_urn",
            )
            .map_err(|err| db_err(&err))?;
        let rows = statement
            .query_map(params![job_run_id.as_str()], |row| {
                Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
            })
            .map_err(|err| db_err(&err))?;
        let mut inputs = Vec::new();
        let mut outputs = Vec::new();
        for row in rows {
            let (urn, edge_type) = row.map_err(|err| db_err(&err))?;
            if edge_type == "output" {
                outputs.push(DatasetUrn::new(urn));
            } else {
                inputs.push(DatasetUrn::new(urn));
            }
        }
        Ok(Some(RunDetail {
            run,
            inputs,
            outputs,
        }))
    }
}

// ============================================================================
// SECTION: Health Inputs
// ============================================================================

impl SqliteLineageStore {
    /// Reads the distinct tested datasets and produced URNs used by orphan
    /// and health analysis.
    fn tested_and_produced(
        &self,
    ) -> Result<(Vec<TestedDataset>, Vec<DatasetUrn>), StoreError> {
        let connection = self.read_connection().map_err(StoreError::from)?;
        let mut tested_statement = connection
            .prepare_cached(
                "SELECT dataset_urn, COUNT(*), MAX(executed_at_ns)
                 FROM test_results GROUP BY dataset_urn ORDER BY dataset_urn",
            )
            .map_err(|err| db_err(&err))?;
        let tested_rows = tested_statement
            .query_map(params![], |row| {
                let count: i64 = row.get(1)?;
                let last_ns: Option<i64> = row.get(2)?;
                Ok(TestedDataset {
                    urn: DatasetUrn::new(row.get::<_, String>(0)?),
                    test_count: u64::try_from(count).unwrap_or(0),
                    last_tested_at: match last_ns {
                        Some(ns) => {
                            Some(from_ns(ns).map_err(|_| rusqlite::Error::InvalidQuery)?)
                        }
                        None => None,
                    },
                })
            })
            .map_err(|err| db_err(&err))?;
        let tested =
            tested_rows.collect::<Result<Vec<_>, _>>().map_err(|err| db_err(&err))?;

        let mut produced_statement = connection
            .prepare_cached(
                "SELECT DISTINCT dataset_urn FROM lineage_edges
                 WHERE edge_type = 'output' ORDER BY dataset_urn",
            )
            .map_err(|err| db_err(&err))?;
        let produced_rows = produced_statement
            .query_map(params![], |row| Ok(DatasetUrn::new(row.get::<_, String>(0)?)))
            .map_err(|err| db_err(&err))?;
        let produced =
            produced_rows.collect::<Result<Vec<_>, _>>().map_err(|err| db_err(&err))?;
        Ok((tested, produced))
    }
}
