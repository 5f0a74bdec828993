// src/store/rankings.rs

use duckdb::Connection;
use serde::Serialize;
use tracing::{debug, info};

use crate::error::StoreError;
use crate::extract::TableKind;

/// Categories that get a `ranking_<slug>` view.
pub const RANKED: [TableKind; 6] = [
    TableKind::FastestGrowing,
    TableKind::MostJobGrowth,
    TableKind::FastestDeclining,
    TableKind::LargestDeclines,
    TableKind::MostOpenings,
    TableKind::HighestPaying,
];

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RankedEntry {
    pub occupation_code: String,
    pub value: f64,
    pub data_year: i32,
    pub rank_order: i64,
}

pub fn view_name(kind: TableKind) -> String {
    format!("ranking_{}", kind.slug())
}

fn view_sql(kind: TableKind) -> Option<String> {
    let order = kind.rank_order()?;
    let slug = kind.slug();
    // newest data year only; NULL values (suppressed, unparseable) are not ranked
    Some(format!(
        "CREATE OR REPLACE VIEW {view} AS
         SELECT occupation_code, value, data_year,
                ROW_NUMBER() OVER (ORDER BY value {dir}, occupation_code ASC) AS rank_order
         FROM bls_special_tables
         WHERE value_type = '{slug}'
           AND value IS NOT NULL
           AND data_year = (
               SELECT MAX(data_year) FROM bls_special_tables
               WHERE value_type = '{slug}' AND value IS NOT NULL
           )",
        view = view_name(kind),
        dir = order.sql(),
        slug = slug,
    ))
}

/// (Re)create every ranking view. Returns the view names.
pub fn refresh_rankings(conn: &Connection) -> Result<Vec<String>, StoreError> {
    let mut views = Vec::with_capacity(RANKED.len());
    for kind in RANKED {
        if let Some(sql) = view_sql(kind) {
            conn.execute_batch(&sql)?;
            debug!(view = %view_name(kind), "refreshed ranking view");
            views.push(view_name(kind));
        }
    }
    info!(views = views.len(), "rankings refreshed");
    Ok(views)
}

/// Rows of one ranking view, best first.
pub fn read_ranking(
    conn: &Connection,
    kind: TableKind,
    limit: usize,
) -> Result<Vec<RankedEntry>, StoreError> {
    let sql = format!(
        "SELECT occupation_code, value, data_year, rank_order FROM {} ORDER BY rank_order LIMIT {}",
        view_name(kind),
        limit
    );
    let mut stmt = conn.prepare(&sql)?;
    let entries = stmt
        .query_map([], |r| {
            Ok(RankedEntry {
                occupation_code: r.get(0)?,
                value: r.get(1)?,
                data_year: r.get(2)?,
                rank_order: r.get(3)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(entries)
}
