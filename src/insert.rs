//! Batched, bounded-parallel `RowBinary` insert engine.
//!
//! Rows are pulled lazily, grouped into batches of `batch_size`, and each
//! batch is serialized into an in-memory buffer and POSTed as
//! `INSERT INTO <table> (<columns>) FORMAT RowBinary[WithDefaults]`. At most
//! `max_parallelism` POSTs are in flight, gated by a semaphore. Batch
//! completion order is irrelevant; the engine returns the total rows
//! written. The first failure aborts outstanding batches (best effort),
//! stops pulling rows, and is returned as-is - the operation is not
//! transactional across batches.

use crate::client::ClientCore;
use crate::codec::write_value;
use crate::io::ByteWriter;
use crate::options::QueryOptions;
use crate::request::{
    build_query_request,
    QueryBody,
    QueryRequest,
};
use crate::response::dispatch;
use crate::types::{
    Type,
    TypeRef,
};
use crate::value::Value;
use crate::{
    Error,
    Result,
};
use bytes::Bytes;
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::debug;
use uuid::Uuid;

/// The binary insert wire format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum InsertFormat {
    /// Plain `RowBinary`: every listed column gets a value.
    #[default]
    RowBinary,
    /// `RowBinaryWithDefaults`: the server fills unlisted columns with
    /// their defaults.
    RowBinaryWithDefaults,
}

impl InsertFormat {
    fn as_sql(&self) -> &'static str {
        match self {
            InsertFormat::RowBinary => "RowBinary",
            InsertFormat::RowBinaryWithDefaults => "RowBinaryWithDefaults",
        }
    }
}

/// A bulk insert plan.
#[derive(Debug, Clone)]
pub struct InsertPlan {
    /// Target table.
    pub table: String,
    /// Database override; the client default applies when absent.
    pub database: Option<String>,
    /// Target column names, non-empty.
    pub columns: Vec<String>,
    /// Optional explicit wire types, one per column. When present they
    /// drive the codecs (including nullability); when absent, each value is
    /// encoded by host-type inference and NULL is rejected, since the
    /// target's nullability cannot be known without a schema round-trip.
    pub column_types: Option<Vec<String>>,
    /// Wire format.
    pub format: InsertFormat,
    /// Rows per POST, strictly positive.
    pub batch_size: usize,
    /// Maximum in-flight POSTs, strictly positive.
    pub max_parallelism: usize,
    /// Base query id; each batch appends its index.
    pub query_id: Option<String>,
    /// Extra server settings for every batch.
    pub custom_settings: Vec<(String, String)>,
}

impl InsertPlan {
    /// Creates a plan for a table and its target columns.
    pub fn new(
        table: impl Into<String>,
        columns: Vec<String>,
    ) -> Self {
        Self {
            table: table.into(),
            database: None,
            columns,
            column_types: None,
            format: InsertFormat::RowBinary,
            batch_size: 65_536,
            max_parallelism: 4,
            query_id: None,
            custom_settings: Vec::new(),
        }
    }

    /// Sets the database override.
    pub fn database(mut self, database: impl Into<String>) -> Self {
        self.database = Some(database.into());
        self
    }

    /// Sets explicit wire types for the columns.
    pub fn column_types(mut self, types: Vec<String>) -> Self {
        self.column_types = Some(types);
        self
    }

    /// Sets the wire format.
    pub fn format(mut self, format: InsertFormat) -> Self {
        self.format = format;
        self
    }

    /// Sets the rows-per-POST batch size.
    pub fn batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size;
        self
    }

    /// Sets the maximum number of in-flight POSTs.
    pub fn max_parallelism(mut self, max_parallelism: usize) -> Self {
        self.max_parallelism = max_parallelism;
        self
    }

    fn validate(&self) -> Result<()> {
        if self.columns.is_empty() {
            return Err(Error::Config(
                "insert plan has no target columns".to_string(),
            ));
        }
        if self.batch_size == 0 {
            return Err(Error::Config(
                "insert batch size must be positive".to_string(),
            ));
        }
        if self.max_parallelism == 0 {
            return Err(Error::Config(
                "insert parallelism must be positive".to_string(),
            ));
        }
        if let Some(types) = &self.column_types {
            if types.len() != self.columns.len() {
                return Err(Error::Config(format!(
                    "{} column types for {} columns",
                    types.len(),
                    self.columns.len()
                )));
            }
        }
        Ok(())
    }

    fn insert_sql(&self, default_database: Option<&str>) -> String {
        let columns = self
            .columns
            .iter()
            .map(|c| format!("`{}`", c.replace('`', "``")))
            .collect::<Vec<_>>()
            .join(", ");
        let table = match self.database.as_deref().or(default_database) {
            Some(db) => format!(
                "`{}`.`{}`",
                db.replace('`', "``"),
                self.table.replace('`', "``")
            ),
            None => format!("`{}`", self.table.replace('`', "``")),
        };
        format!(
            "INSERT INTO {} ({}) FORMAT {}",
            table,
            columns,
            self.format.as_sql()
        )
    }
}

/// Shared per-run state handed to every batch task.
struct InsertRun {
    core: Arc<ClientCore>,
    sql: String,
    column_types: Option<Vec<TypeRef>>,
    column_count: usize,
    query_id_base: String,
    custom_settings: Vec<(String, String)>,
    cancel: Option<CancellationToken>,
}

/// Drives a bulk insert; see the module docs for the algorithm.
pub(crate) async fn run_insert<I>(
    core: Arc<ClientCore>,
    plan: &InsertPlan,
    rows: I,
    cancel: Option<CancellationToken>,
) -> Result<u64>
where
    I: IntoIterator<Item = Vec<Value>>,
{
    plan.validate()?;

    let column_types = match &plan.column_types {
        Some(types) => {
            let mut parsed = Vec::with_capacity(types.len());
            for type_str in types {
                parsed.push(Type::parse(type_str)?);
            }
            Some(parsed)
        }
        None => None,
    };

    let run = Arc::new(InsertRun {
        sql: plan.insert_sql(core.settings.database.as_deref()),
        core,
        column_types,
        column_count: plan.columns.len(),
        query_id_base: plan
            .query_id
            .clone()
            .unwrap_or_else(|| Uuid::new_v4().to_string()),
        custom_settings: plan.custom_settings.clone(),
        cancel: cancel.clone(),
    });
    debug!(sql = %run.sql, batch_size = plan.batch_size, "starting bulk insert");

    let semaphore = Arc::new(Semaphore::new(plan.max_parallelism));
    let mut tasks: JoinSet<Result<u64>> = JoinSet::new();
    let mut rows_written: u64 = 0;
    let mut batch_index: usize = 0;
    let mut batch: Vec<Vec<Value>> = Vec::with_capacity(plan.batch_size);

    let mut rows = rows.into_iter();
    loop {
        // Surface failures of already-completed batches before pulling
        // further rows; the first error stops the whole run.
        while let Some(joined) = tasks.try_join_next() {
            match flatten_join(joined) {
                Ok(written) => rows_written += written,
                Err(e) => {
                    tasks.abort_all();
                    return Err(e);
                }
            }
        }
        if let Some(token) = &cancel {
            if token.is_cancelled() {
                tasks.abort_all();
                return Err(Error::Cancelled);
            }
        }

        match rows.next() {
            Some(row) => {
                batch.push(row);
                if batch.len() == plan.batch_size {
                    let full =
                        std::mem::replace(&mut batch, Vec::with_capacity(plan.batch_size));
                    spawn_batch(
                        &mut tasks,
                        &semaphore,
                        Arc::clone(&run),
                        full,
                        batch_index,
                    )
                    .await?;
                    batch_index += 1;
                }
            }
            None => break,
        }
    }
    if !batch.is_empty() {
        spawn_batch(&mut tasks, &semaphore, Arc::clone(&run), batch, batch_index)
            .await?;
    }

    while let Some(joined) = tasks.join_next().await {
        match flatten_join(joined) {
            Ok(written) => rows_written += written,
            Err(e) => {
                tasks.abort_all();
                return Err(e);
            }
        }
    }

    debug!(rows_written, "bulk insert finished");
    Ok(rows_written)
}

async fn spawn_batch(
    tasks: &mut JoinSet<Result<u64>>,
    semaphore: &Arc<Semaphore>,
    run: Arc<InsertRun>,
    batch: Vec<Vec<Value>>,
    batch_index: usize,
) -> Result<()> {
    let permit = match &run.cancel {
        Some(token) => {
            tokio::select! {
                _ = token.cancelled() => return Err(Error::Cancelled),
                permit = Arc::clone(semaphore).acquire_owned() => permit,
            }
        }
        None => Arc::clone(semaphore).acquire_owned().await,
    }
    .expect("insert semaphore closed");

    tasks.spawn(async move {
        let _permit = permit;
        send_batch(run, batch, batch_index).await
    });
    Ok(())
}

async fn send_batch(
    run: Arc<InsertRun>,
    batch: Vec<Vec<Value>>,
    batch_index: usize,
) -> Result<u64> {
    let row_count = batch.len() as u64;
    let body = serialize_batch(&run, batch)?;
    debug!(batch_index, rows = row_count, bytes = body.len(), "posting batch");

    let query = QueryRequest {
        sql: run.sql.clone(),
        parameters: Vec::new(),
        options: QueryOptions {
            query_id: Some(format!(
                "{}-{}",
                run.query_id_base, batch_index
            )),
            custom_settings: run.custom_settings.clone(),
            ..Default::default()
        },
    };
    let prepared = build_query_request(
        &run.core.settings,
        &query,
        QueryBody::Data(body),
    )?;
    let (_, mut response_body) = dispatch(
        run.core.transport.as_ref(),
        prepared,
        run.cancel.clone(),
    )
    .await?;
    // Drain so the transport can reclaim the connection.
    while response_body.next_chunk().await?.is_some() {}
    Ok(row_count)
}

fn serialize_batch(run: &InsertRun, batch: Vec<Vec<Value>>) -> Result<Bytes> {
    let mut writer = ByteWriter::with_capacity(batch.len() * 32);
    for row in &batch {
        if row.len() != run.column_count {
            return Err(Error::ValueOutOfRange(format!(
                "row has {} values, {} columns expected",
                row.len(),
                run.column_count
            )));
        }
        for (index, value) in row.iter().enumerate() {
            match &run.column_types {
                Some(types) => {
                    write_value(&mut writer, &types[index], value)?
                }
                None => {
                    let inferred = value.infer_type()?;
                    write_value(&mut writer, &inferred, value)?
                }
            }
        }
    }
    Ok(writer.into_bytes())
}

fn flatten_join(
    joined: std::result::Result<Result<u64>, tokio::task::JoinError>,
) -> Result<u64> {
    match joined {
        Ok(result) => result,
        Err(e) if e.is_cancelled() => Err(Error::Cancelled),
        Err(e) => Err(Error::InvalidState(format!(
            "insert batch task failed: {}",
            e
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plan_validation() {
        let plan = InsertPlan::new("t", vec!["a".to_string()]);
        assert!(plan.validate().is_ok());

        assert!(InsertPlan::new("t", vec![]).validate().is_err());
        assert!(InsertPlan::new("t", vec!["a".to_string()])
            .batch_size(0)
            .validate()
            .is_err());
        assert!(InsertPlan::new("t", vec!["a".to_string()])
            .max_parallelism(0)
            .validate()
            .is_err());
        assert!(InsertPlan::new("t", vec!["a".to_string()])
            .column_types(vec!["UInt8".to_string(), "UInt8".to_string()])
            .validate()
            .is_err());
    }

    #[test]
    fn test_insert_sql_escaping() {
        let plan = InsertPlan::new(
            "weird`table",
            vec!["a".to_string(), "b`c".to_string()],
        )
        .database("db");
        assert_eq!(
            plan.insert_sql(None),
            "INSERT INTO `db`.`weird``table` (`a`, `b``c`) FORMAT RowBinary"
        );
    }

    #[test]
    fn test_insert_sql_with_defaults_format() {
        let plan = InsertPlan::new("t", vec!["a".to_string()])
            .format(InsertFormat::RowBinaryWithDefaults);
        assert_eq!(
            plan.insert_sql(Some("base")),
            "INSERT INTO `base`.`t` (`a`) FORMAT RowBinaryWithDefaults"
        );
    }
}
