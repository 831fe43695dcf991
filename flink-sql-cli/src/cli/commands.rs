use crate::cli::output::{ColumnJson, CommandData, ExecData, QueryData, RowJson};
use crate::cli::{Cli, Commands};

use flink_sql_gateway::{ConnConfig, Connector, Context, FlinkError, Row, Rows};
use std::time::Duration;
use tracing::{debug, info};


/// Build the connector described by the command line.
pub fn connector(args: &Cli) -> Result<Connector, FlinkError> {
    let config = ConnConfig::default()
        .with_gateway_url(args.gateway.clone())
        .with_api_version(args.api_version.clone())
        .with_properties(args.properties.iter().cloned());

    Connector::new(config)
}

/// Root context: bounded by `--timeout` and cancelled on Ctrl-C.
pub fn root_context(timeout: Option<u64>) -> Context {
    let ctx = match timeout {
        Some(seconds) => Context::background().with_timeout(Duration::from_secs(seconds)),
        None => Context::background(),
    };

    let on_interrupt = ctx.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Interrupted, cancelling");
            on_interrupt.cancel();
        }
    });

    ctx
}

pub async fn run(args: &Cli) -> Result<CommandData, FlinkError> {
    let connector = connector(args)?;
    let ctx = root_context(args.timeout);

    let result = match &args.command {
        Commands::Query { statement, limit } => query(&connector, &ctx, statement, *limit).await,
        Commands::Exec { statement } => exec(&connector, &ctx, statement).await,
        Commands::Info {} => connector.info(&ctx).await.map(CommandData::Info),
    };

    connector.close().await;
    result
}

async fn query(
    connector: &Connector,
    ctx: &Context,
    statement: &str,
    limit: Option<usize>,
) -> Result<CommandData, FlinkError> {
    let conn = connector.connect(ctx).await?;
    let mut rows = conn.query(ctx, statement).await?;

    let columns = rows
        .columns()
        .iter()
        .map(|c| ColumnJson {
            name: c.name.clone(),
            type_name: c.remote_type.to_string(),
        })
        .collect();

    let taken = take_rows(&mut rows, ctx, limit).await;
    rows.close().await;
    let (collected, truncated) = taken?;
    debug!("Fetched {} row(s)", collected.len());

    Ok(CommandData::Query(QueryData {
        columns,
        rows: collected.into_iter().map(RowJson::from).collect(),
        truncated,
    }))
}

/// Anything rows can be pulled from one at a time.
trait RowSource {
    type Item;

    async fn next_row(&mut self, ctx: &Context) -> Result<Option<Self::Item>, FlinkError>;
}

impl RowSource for Rows {
    type Item = Row;

    async fn next_row(&mut self, ctx: &Context) -> Result<Option<Row>, FlinkError> {
        self.next(ctx).await
    }
}

/// Pull at most `limit` rows. The second value is true only when a row
/// past the limit exists.
async fn take_rows<S: RowSource>(
    source: &mut S,
    ctx: &Context,
    limit: Option<usize>,
) -> Result<(Vec<S::Item>, bool), FlinkError> {
    let mut taken = vec![];
    while let Some(item) = source.next_row(ctx).await? {
        if limit.is_some_and(|limit| taken.len() >= limit) {
            return Ok((taken, true));
        }
        taken.push(item);
    }
    Ok((taken, false))
}

async fn exec(connector: &Connector, ctx: &Context, statement: &str) -> Result<CommandData, FlinkError> {
    let conn = connector.connect(ctx).await?;
    let result = conn.exec(ctx, statement).await?;

    Ok(CommandData::Exec(ExecData {
        operation_handle: result.operation_handle,
        job_id: result.job_id,
        result_kind: result.result_kind,
    }))
}
