//! Active and blocked session inventories.

use futures::future::BoxFuture;

use crate::error::ScrapeError;
use crate::fmt::{int_label, text_label, time_label};
use crate::scrape::queries;
use crate::scrape::{ScrapeContext, ScrapeUnit};
use crate::sink::{MetricKind, Sample};

const ACTIVE_SESSION_LABELS: &[&str] = &[
    "session_id",
    "client_net_address",
    "client_tcp_port",
    "login_time",
    "login_name",
    "host_name",
    "program_name",
    "status",
    "open_transaction_count",
    "transaction_isolation_level",
    "start_time",
    "command",
    "request_status",
    "wait_type",
    "text",
];

const BLOCKED_SESSION_LABELS: &[&str] = &[
    "blocking_session_id",
    "blocking_user",
    "blocking_login_time",
    "blocking_host_name",
    "blocking_program_name",
    "blocking_sql",
    "blocked_session_id",
    "blocked_user",
    "blocked_sql",
    "blocked_db_name",
    "wait_type",
];

pub struct SessionUnit;

impl SessionUnit {
    async fn collect_active(&self, ctx: &ScrapeContext) -> Result<(), ScrapeError> {
        let rows = ctx
            .source
            .execute(ctx.deadline, queries::ACTIVE_SESSIONS)
            .await?;
        let err = |e| ScrapeError::bad_row(queries::ACTIVE_SESSIONS, e);
        for row in &rows {
            // elapsed time is null for sessions with no running request
            let elapsed = row.opt_i64(15).map_err(err)?.unwrap_or(0);
            ctx.sink.emit(Sample {
                name: "mssql_session_active".to_string(),
                help: "MSSQL Active Session Info",
                label_names: ACTIVE_SESSION_LABELS,
                label_values: vec![
                    int_label(row.cell(0)),
                    text_label(row.cell(1)),
                    int_label(row.cell(2)),
                    time_label(row.cell(3)),
                    text_label(row.cell(4)),
                    text_label(row.cell(5)),
                    text_label(row.cell(6)),
                    text_label(row.cell(7)),
                    int_label(row.cell(8)),
                    int_label(row.cell(9)),
                    time_label(row.cell(10)),
                    text_label(row.cell(11)),
                    text_label(row.cell(12)),
                    text_label(row.cell(13)),
                    text_label(row.cell(14)),
                ],
                kind: MetricKind::Gauge,
                value: elapsed as f64,
            });
        }
        Ok(())
    }

    async fn collect_blocked(&self, ctx: &ScrapeContext) -> Result<(), ScrapeError> {
        let rows = ctx
            .source
            .execute(ctx.deadline, queries::BLOCKED_SESSIONS)
            .await?;
        let err = |e| ScrapeError::bad_row(queries::BLOCKED_SESSIONS, e);
        for row in &rows {
            ctx.sink.emit(Sample {
                name: "mssql_session_blocked".to_string(),
                help: "MSSQL Blocked Session Info",
                label_names: BLOCKED_SESSION_LABELS,
                label_values: vec![
                    int_label(row.cell(0)),
                    text_label(row.cell(1)),
                    time_label(row.cell(2)),
                    text_label(row.cell(3)),
                    text_label(row.cell(4)),
                    text_label(row.cell(5)),
                    int_label(row.cell(6)),
                    text_label(row.cell(7)),
                    text_label(row.cell(8)),
                    text_label(row.cell(9)),
                    text_label(row.cell(10)),
                ],
                kind: MetricKind::Gauge,
                value: row.i64(11).map_err(err)? as f64,
            });
        }
        Ok(())
    }
}

impl ScrapeUnit for SessionUnit {
    fn name(&self) -> &'static str {
        "mssql_active_session"
    }

    fn help(&self) -> &'static str {
        "collect active and blocked session info"
    }

    fn collect<'a>(&'a self, ctx: &'a ScrapeContext) -> BoxFuture<'a, Result<(), ScrapeError>> {
        Box::pin(async move {
            self.collect_active(ctx).await?;
            self.collect_blocked(ctx).await?;
            Ok(())
        })
    }
}
