//! SQL text issued against the monitored instance.
//!
//! All queries are plain parameterless text against the DMVs and system
//! catalogs; results are consumed positionally.

pub(crate) const INSTANCE_INFO: &str = r#"SELECT @@VERSION as version,
SERVERPROPERTY('MachineName') AS [MachineName],
SERVERPROPERTY('ServerName') AS [ServerName],
SERVERPROPERTY('InstanceName') AS [Instance],
SERVERPROPERTY('ComputerNamePhysicalNetBIOS') AS [ComputerNamePhysicalNetBIOS],
SERVERPROPERTY('Edition') AS [Edition],
SERVERPROPERTY('ProductLevel') AS [ProductLevel],
SERVERPROPERTY('ProductVersion') AS [ProductVersion],
SERVERPROPERTY('Collation') AS [Collation],
SERVERPROPERTY('IsClustered') AS [IsClustered],
SERVERPROPERTY('IsFullTextInstalled') AS [IsFullTextInstalled],
SERVERPROPERTY('IsIntegratedSecurityOnly') AS [IsIntegratedSecurityOnly],
SERVERPROPERTY('IsHadrEnabled') AS [IsHadrEnabled],
SERVERPROPERTY('HadrManagerStatus') AS [HadrManagerStatus]
"#;

pub(crate) const PERF_COUNTERS: &str = r#"select object_name, counter_name, instance_name, cntr_value, cntr_type
from sys.dm_os_performance_counters"#;

/// Completed waits merged with long-lived in-progress waits, minus the usual
/// idle/broker noise types.
pub(crate) const WAIT_STATS: &str = r#"SELECT wait_type,
    SUM (waiting_tasks_count) AS waiting_tasks_count,
    SUM (signal_wait_time_ms) AS signal_wait_time_ms,
    SUM (wait_time_ms) AS wait_time_ms,
    SUM (raw_wait_time_ms) AS raw_wait_time_ms
FROM
(
    -- global server wait stats (completed waits only)
    SELECT
        wait_type,
        waiting_tasks_count,
        (wait_time_ms - signal_wait_time_ms) AS wait_time_ms,
        signal_wait_time_ms,
        wait_time_ms AS raw_wait_time_ms
    FROM sys.dm_os_wait_stats
    WHERE waiting_tasks_count > 0 OR wait_time_ms > 0 OR signal_wait_time_ms > 0
    UNION ALL
    -- threads in an in-progress wait (not yet completed waits)
    SELECT
        wait_type,
        1 AS waiting_tasks_count,
        wait_duration_ms AS wait_time_ms,
        0 AS signal_wait_time_ms,
        wait_duration_ms AS raw_wait_time_ms
    FROM sys.dm_os_waiting_tasks
    -- Very brief waits quickly roll into dm_os_wait_stats; dm_os_waiting_tasks
    -- only matters for longer-lived waits.
    WHERE wait_duration_ms > 1000
) AS merged_wait_stats
where wait_type not in (
    'BROKER_EVENTHANDLER',
    'BROKER_RECEIVE_WAITFOR',
    'BROKER_TASK_STOP',
    'BROKER_TO_FLUSH',
    'BROKER_TRANSMITTER',
    'CHECKPOINT_QUEUE',
    'CHKPT',
    'CLR_AUTO_EVENT',
    'CLR_MANUAL_EVENT',
    'CLR_SEMAPHORE',
    'CXCONSUMER',
    'DBMIRROR_DBM_EVENT',
    'DBMIRROR_EVENTS_QUEUE',
    'DBMIRROR_WORKER_QUEUE',
    'DBMIRRORING_CMD',
    'DIRTY_PAGE_POLL',
    'DISPATCHER_QUEUE_SEMAPHORE',
    'EXECSYNC',
    'FSAGENT',
    'FT_IFTS_SCHEDULER_IDLE_WAIT',
    'FT_IFTSHC_MUTEX',
    'HADR_CLUSAPI_CALL',
    'HADR_FILESTREAM_IOMGR_IOCOMPLETION',
    'HADR_LOGCAPTURE_WAIT',
    'HADR_NOTIFICATION_DEQUEUE',
    'HADR_TIMER_TASK',
    'HADR_WORK_QUEUE',
    'KSOURCE_WAKEUP',
    'LAZYWRITER_SLEEP',
    'LOGMGR_QUEUE',
    'MEMORY_ALLOCATION_EXT',
    'ONDEMAND_TASK_QUEUE',
    'PARALLEL_REDO_DRAIN_WORKER',
    'PARALLEL_REDO_LOG_CACHE',
    'PARALLEL_REDO_TRAN_LIST',
    'PARALLEL_REDO_WORKER_SYNC',
    'PARALLEL_REDO_WORKER_WAIT_WORK',
    'PREEMPTIVE_OS_FLUSHFILEBUFFERS',
    'PREEMPTIVE_XE_GETTARGETSTATE',
    'PVS_PREALLOCATE',
    'PWAIT_ALL_COMPONENTS_INITIALIZED',
    'PWAIT_DIRECTLOGCONSUMER_GETNEXT',
    'PWAIT_EXTENSIBILITY_CLEANUP_TASK',
    'QDS_PERSIST_TASK_MAIN_LOOP_SLEEP',
    'QDS_ASYNC_QUEUE',
    'QDS_CLEANUP_STALE_QUERIES_TASK_MAIN_LOOP_SLEEP',
    'QDS_SHUTDOWN_QUEUE',
    'REDO_THREAD_PENDING_WORK',
    'REQUEST_FOR_DEADLOCK_SEARCH',
    'RESOURCE_QUEUE',
    'SERVER_IDLE_CHECK',
    'SLEEP_BPOOL_FLUSH',
    'SLEEP_DBSTARTUP',
    'SLEEP_DCOMSTARTUP',
    'SLEEP_MASTERDBREADY',
    'SLEEP_MASTERMDREADY',
    'SLEEP_MASTERUPGRADED',
    'SLEEP_MSDBSTARTUP',
    'SLEEP_SYSTEMTASK',
    'SLEEP_TASK',
    'SLEEP_TEMPDBSTARTUP',
    'SNI_HTTP_ACCEPT',
    'SOS_WORK_DISPATCHER',
    'SP_SERVER_DIAGNOSTICS_SLEEP',
    'SQLTRACE_BUFFER_FLUSH',
    'SQLTRACE_INCREMENTAL_FLUSH_SLEEP',
    'SQLTRACE_WAIT_ENTRIES',
    'VDI_CLIENT_OTHER',
    'WAIT_FOR_RESULTS',
    'WAITFOR',
    'WAITFOR_TASKSHUTDOWN',
    'WAIT_XTP_RECOVERY',
    'WAIT_XTP_HOST_WAIT',
    'WAIT_XTP_OFFLINE_CKPT_NEW_LOG',
    'WAIT_XTP_CKPT_CLOSE',
    'XE_DISPATCHER_JOIN',
    'XE_DISPATCHER_WAIT',
    'XE_TIMER_EVENT')
GROUP BY merged_wait_stats.wait_type"#;

pub(crate) const TOP_QUERY_STATS: &str = r#"SELECT TOP 500 query_hash, creation_time,
  qs.execution_count,
  (qs.total_logical_reads + qs.total_logical_writes) as total_logical_reads,
  qs.total_physical_reads,
  qs.total_elapsed_time,
  qs.total_worker_time,
  qs.total_clr_time,
  qs.total_rows,
  SUBSTRING (qt.text,(qs.statement_start_offset/2) + 1,
    ((CASE WHEN qs.statement_end_offset = -1
    THEN LEN(CONVERT(NVARCHAR(MAX), qt.text)) * 2
    ELSE qs.statement_end_offset
    END - qs.statement_start_offset)/2) + 1) AS query_text,
  ISNULL(DB_NAME(qt.dbid), '') AS DatabaseName
FROM sys.dm_exec_query_stats qs
CROSS APPLY sys.dm_exec_sql_text(qs.sql_handle) as qt
"#;

pub(crate) const DB_SPACE: &str = r#"select DB_NAME(database_id),
     SUM(case when type=0 then cast (size as bigint) else 0 end) * 8192  data_size,
     sum(case when type=1 then cast (size as bigint) else 0 end) * 8192  log_size,
     SUM(case when type > 1 then cast (size as bigint) else 0 end) * 8192 other_size
 from sys.master_files
 group by DB_NAME(database_id)"#;

pub(crate) const BACKUPS: &str = r#"select backup_set_id, backup_set_uuid, expiration_date, name,  user_name,
    first_lsn, last_lsn, checkpoint_lsn, database_backup_lsn, database_creation_date,
    backup_start_date, backup_finish_date, type, database_name, server_name,
    machine_name, recovery_model, is_damaged, differential_base_lsn, differential_base_guid,
    backup_size, compressed_backup_size
from msdb.dbo.backupset
where backup_finish_date >= dateadd(minute, -1440000, GETDATE())
"#;

pub(crate) const DB_META: &str = r#"select name, database_id, create_date, compatibility_level, collation_name, recovery_model_desc,
    snapshot_isolation_state, is_read_committed_snapshot_on, state, user_access
from sys.databases"#;

/// The marker comment keeps the exporter's own session out of the result.
pub(crate) const ACTIVE_SESSIONS: &str = r#"select /* mssql_exporter */ a.session_id,
    a.client_net_address,
    a.client_tcp_port,
    b.login_time,
    b.login_name,
    b.host_name,
    b.program_name,
    b.status,
    b.open_transaction_count,
    b.transaction_isolation_level,
    c.start_time,
    c.command,
    c.status as request_status,
    c.wait_type,
    s.text,
    c.total_elapsed_time
from sys.dm_exec_connections a
    cross apply sys.dm_exec_sql_text (a.most_recent_sql_handle) s,
    sys.dm_exec_sessions b
    left join sys.dm_exec_requests c
on b.session_id = c.session_id
where a.session_id = b.session_id
and b.session_id > 50
and b.status != 'sleeping'
and s.text not like 'select /* mssql_exporter%'
"#;

pub(crate) const BLOCKED_SESSIONS: &str = r#"SELECT
    Blocking.session_id as BlockingSessionId,
    Sess.login_name AS BlockingUser,
    Sess.login_time,
    sess.host_name,
    sess.program_name,
    BlockingSQL.text AS BlockingSQL,
    Blocked.session_id AS BlockedSessionId,
    USER_NAME(Blocked.user_id) AS BlockedUser,
    BlockedSQL.text AS BlockedSQL,
    DB_NAME(Blocked.database_id) AS DatabaseName,
    Waits.wait_type WhyBlocked,
    Waits.wait_duration_ms
FROM sys.dm_exec_connections AS Blocking
    INNER JOIN sys.dm_exec_requests AS Blocked ON Blocking.session_id = Blocked.blocking_session_id
    INNER JOIN sys.dm_os_waiting_tasks AS Waits ON Blocked.session_id = Waits.session_id
    RIGHT OUTER JOIN sys.dm_exec_sessions Sess ON Blocking.session_id = sess.session_id
    CROSS APPLY sys.dm_exec_sql_text(Blocking.most_recent_sql_handle) AS BlockingSQL
    CROSS APPLY sys.dm_exec_sql_text(Blocked.sql_handle) AS BlockedSQL
"#;

pub(crate) const MIRRORING: &str = r#"select  db_name(database_id),
    mirroring_role_desc,
    mirroring_safety_level_desc,
    mirroring_partner_name,
    mirroring_witness_name,
    mirroring_state,
    mirroring_witness_state
from sys.database_mirroring
where mirroring_partner_name is not null
"#;

pub(crate) const CONFIGURATIONS: &str = r#"select name, value_in_use from sys.configurations
where name in (
'cost threshold for parallelism',
'cursor threshold',
'fill factor',
'max degree of parallelism',
'max server memory',
'max worker threads',
'recovery interval',
'remote access',
'remote admin connections',
'user connections',
'locks',
'remote login timeout (s)',
'remote query timeout (s)',
'min server memory (MB)',
'max server memory (MB)'
)
"#;
