/*!
# flink-sql-gateway

<b>An asynchronous Rust client driver for the Apache Flink SQL Gateway.</b>

The SQL Gateway runs statements asynchronously: submitting one returns an
operation handle, the client polls that operation until it finishes and
then pages through its results with continuation tokens. This crate hides
that protocol behind a plain "query, then iterate rows" interface.

## ✨ Features

- ⚙️ **Connection strings** (`http://host:port?key=value`) with session properties;
- 🪶 **Async execution** using `tokio` and `reqwest`;
- ⏱️ **Cancellation and deadlines** on every network call and poll wait;
- 🧾 **Lazy row decoding**, one page in memory at a time;
- 🧩 **Typed values** for every Flink logical type.

## Getting Started

```no_run
use flink_sql_gateway::{Context, Driver, Value};
use std::time::Duration;

# tokio_test::block_on(async {
// 1️⃣ Create a connector; the session opens on the first connect
let connector = Driver.open_connector("http://localhost:8083?execution.runtime-mode=batch")?;
let ctx = Context::background().with_timeout(Duration::from_secs(30));
let conn = connector.connect(&ctx).await?;

// 2️⃣ Run a query and walk its rows
let mut rows = conn.query(&ctx, "SELECT 42 AS answer").await?;
while let Some(row) = rows.next(&ctx).await? {
    assert_eq!(row.get(0), Some(&Value::Int(42)));
}

// 3️⃣ Close the shared session
connector.close().await;
# Ok::<(), flink_sql_gateway::FlinkError>(())
# });
```

## 🧠 Concepts

- [`Connector`]: owns one gateway session, shared by all its connections;
- [`Connection`]: submits statements on that session;
- [`Rows`]: forward-only cursor, fetching pages as it goes;
- [`Context`]: cancellation token plus optional deadline, passed to every call;
- [`Gateway`]: the REST API seam, implemented over HTTP by [`GatewayClient`].
*/

pub mod client;
pub mod config;
mod connector;
mod context;
mod error;
pub mod operation;
mod pager;
pub mod result;
mod rows;
mod session;
pub mod value;

pub use client::{Gateway, GatewayClient, GatewayInfo};
pub use config::ConnConfig;
pub use connector::{Connection, Connector, Driver, ExecResult};
pub use context::Context;
pub use error::{FlinkError, Result};
pub use operation::{Operation, OperationPoller, OperationStatus, PollConfig};
pub use pager::ResultPager;
pub use result::{ColumnMeta, LogicalType, RawRow, ResultPage, ResultType, RowKind};
pub use rows::{Row, Rows};
pub use session::Session;
pub use value::{Value, decode_row, decode_value};

#[cfg(test)]
mod test_utils;
