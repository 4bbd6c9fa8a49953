//! Persisted code graph rows. The graph is derived state: the builder drops
//! and rewrites a repo's rows wholesale.

use rusqlite::params;

use crate::errors::StoreResult;
use crate::models::{GraphEdgeRow, GraphNodeRow, GraphNodeType};
use crate::queries::decode_err;
use crate::Store;

/// Node shape produced by the graph builder before ids are assigned.
#[derive(Debug, Clone)]
pub struct NewGraphNode {
    pub node_type: GraphNodeType,
    pub key: String,
    pub file_id: Option<i64>,
    pub symbol_id: Option<i64>,
    pub data: serde_json::Value,
}

/// Edge shape, referencing builder-local node indices.
#[derive(Debug, Clone)]
pub struct NewGraphEdge {
    pub from_index: usize,
    pub to_index: usize,
    pub edge_type: String,
    pub weight: i64,
    pub examples: Vec<String>,
    pub source: Option<String>,
}

impl Store {
    /// Drop the repo's prior graph and write the new one in one transaction.
    pub fn replace_graph(
        &self,
        repo_id: i64,
        nodes: &[NewGraphNode],
        edges: &[NewGraphEdge],
    ) -> StoreResult<()> {
        let mut conn = self.lock();
        let tx = conn.transaction()?;

        tx.execute("DELETE FROM graph_edges WHERE repo_id = ?1", params![repo_id])?;
        tx.execute("DELETE FROM graph_nodes WHERE repo_id = ?1", params![repo_id])?;

        let mut ids = Vec::with_capacity(nodes.len());
        for n in nodes {
            tx.execute(
                "INSERT INTO graph_nodes (repo_id, node_type, key, file_id, symbol_id, data)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                params![
                    repo_id,
                    n.node_type.as_str(),
                    n.key,
                    n.file_id,
                    n.symbol_id,
                    n.data.to_string()
                ],
            )?;
            ids.push(tx.last_insert_rowid());
        }

        for e in edges {
            tx.execute(
                "INSERT INTO graph_edges
                    (repo_id, from_node_id, to_node_id, edge_type, weight, examples, source)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                params![
                    repo_id,
                    ids[e.from_index],
                    ids[e.to_index],
                    e.edge_type,
                    e.weight,
                    serde_json::to_string(&e.examples)?,
                    e.source
                ],
            )?;
        }

        tx.commit()?;
        Ok(())
    }

    pub fn load_graph_nodes(&self, repo_id: i64) -> StoreResult<Vec<GraphNodeRow>> {
        let conn = self.lock();
        let mut stmt = conn.prepare(
            "SELECT id, repo_id, node_type, key, file_id, symbol_id, data
             FROM graph_nodes WHERE repo_id = ?1 ORDER BY id",
        )?;
        let rows = stmt.query_map(params![repo_id], |row| {
            let t: String = row.get(2)?;
            let data: String = row.get(6)?;
            Ok(GraphNodeRow {
                id: row.get(0)?,
                repo_id: row.get(1)?,
                node_type: GraphNodeType::parse(&t).map_err(decode_err)?,
                key: row.get(3)?,
                file_id: row.get(4)?,
                symbol_id: row.get(5)?,
                data: serde_json::from_str(&data)
                    .map_err(|e| decode_err(crate::StoreError::Serde(e)))?,
            })
        })?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }

    pub fn load_graph_edges(&self, repo_id: i64) -> StoreResult<Vec<GraphEdgeRow>> {
        let conn = self.lock();
        let mut stmt = conn.prepare(
            "SELECT id, repo_id, from_node_id, to_node_id, edge_type, weight, examples, source
             FROM graph_edges WHERE repo_id = ?1 ORDER BY id",
        )?;
        let rows = stmt.query_map(params![repo_id], |row| {
            let examples: String = row.get(6)?;
            Ok(GraphEdgeRow {
                id: row.get(0)?,
                repo_id: row.get(1)?,
                from_node_id: row.get(2)?,
                to_node_id: row.get(3)?,
                edge_type: row.get(4)?,
                weight: row.get(5)?,
                examples: serde_json::from_str(&examples)
                    .map_err(|e| decode_err(crate::StoreError::Serde(e)))?,
                source: row.get(7)?,
            })
        })?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }
}
