//! Property-based tests for the dispatch contract
//!
//! Each property runs against both backends through a MySQL-dialect
//! session, so the SQLite store and the in-memory store are held to the
//! same observable behavior.

use proptest::prelude::*;
use sqlfront::auth::{CommonNameAuthenticator, CertificateAuthenticator};
use sqlfront::config::{Config, PlainCredentialConfig, StoreEngine};
use sqlfront::conn::{ConnContext, PeerCertificate, TlsSession};
use sqlfront::core::{DataType, SqlFrontError, Value};
use sqlfront::executor::StatementExecutor;
use sqlfront::memstore::MemStore;
use sqlfront::query::Dialect;
use sqlfront::resultset::{Column, ResultSet, Schema};
use sqlfront::server::{Server, Service};
use sqlfront::session::Session;
use sqlfront::sqlite::SqliteExecutor;
use std::collections::BTreeMap;
use std::sync::Arc;

fn backends() -> Vec<Arc<dyn StatementExecutor>> {
    vec![
        Arc::new(SqliteExecutor::in_memory()),
        Arc::new(MemStore::new()),
    ]
}

fn fixture(executor: Arc<dyn StatementExecutor>) -> Session {
    let mut session = Session::new(executor, Dialect::MySql);
    session.execute("CREATE DATABASE p").unwrap();
    session
        .execute("CREATE TABLE t (id INTEGER, name TEXT)")
        .unwrap();
    session
}

fn ids(session: &mut Session, sql: &str) -> Vec<i64> {
    let mut responses = session.execute(sql).unwrap();
    let mut rs = responses.pop().unwrap().into_result_set().unwrap();
    rs.rows()
        .unwrap()
        .into_iter()
        .map(|r| match r.values()[0] {
            Value::Integer(i) => i,
            ref other => panic!("unexpected id {:?}", other),
        })
        .collect()
}

fn insert_all(session: &mut Session, rows: &BTreeMap<i64, String>) {
    for (id, name) in rows {
        session
            .execute(&format!("INSERT INTO t VALUES ({}, '{}')", id, name))
            .unwrap();
    }
}

fn arb_db_name() -> impl Strategy<Value = String> {
    "[a-z][a-z0-9_]{0,15}"
}

proptest! {
    #[test]
    fn prop_create_database_twice(name in arb_db_name()) {
        for executor in backends() {
            let mut session = Session::new(executor, Dialect::MySql);
            session.execute(&format!("CREATE DATABASE {}", name)).unwrap();
            let err = session.execute(&format!("CREATE DATABASE {}", name)).unwrap_err();
            prop_assert!(matches!(err, SqlFrontError::DatabaseExists(_)));
            let if_not_exists = format!("CREATE DATABASE IF NOT EXISTS {}", name);
            prop_assert!(session.execute(&if_not_exists).is_ok());
        }
    }

    #[test]
    fn prop_inserted_rows_read_back(
        rows in proptest::collection::btree_map(-1_000_000i64..1_000_000, "[a-z ]{0,12}", 0..20)
    ) {
        for executor in backends() {
            let mut session = fixture(executor);
            insert_all(&mut session, &rows);
            let mut responses = session.execute("SELECT * FROM t ORDER BY id").unwrap();
            let mut rs = responses.pop().unwrap().into_result_set().unwrap();
            let read: Vec<(i64, String)> = rs
                .rows()
                .unwrap()
                .into_iter()
                .map(|r| match r.values() {
                    [Value::Integer(id), Value::Text(name)] => (*id, name.clone()),
                    other => panic!("unexpected row {:?}", other),
                })
                .collect();
            let expected: Vec<(i64, String)> = rows.clone().into_iter().collect();
            prop_assert_eq!(read, expected);
        }
    }

    #[test]
    fn prop_update_count_matches(values in proptest::collection::vec(0i64..5, 0..25), k in 0i64..5) {
        for executor in backends() {
            let mut session = fixture(executor);
            for (i, v) in values.iter().enumerate() {
                session
                    .execute(&format!("INSERT INTO t VALUES ({}, 'v{}')", i, v))
                    .unwrap();
            }
            let expected = values.iter().filter(|v| **v == k).count() as u64;
            let responses = session
                .execute(&format!("UPDATE t SET name = 'hit' WHERE name = 'v{}'", k))
                .unwrap();
            prop_assert_eq!(responses[0].rows_affected(), expected);
        }
    }

    #[test]
    fn prop_limit_offset_window(n in 0usize..15, limit in 0usize..8, offset in 0usize..8) {
        for executor in backends() {
            let mut session = fixture(executor);
            let rows: BTreeMap<i64, String> =
                (1..=n as i64).map(|i| (i, format!("r{}", i))).collect();
            insert_all(&mut session, &rows);
            let got = ids(
                &mut session,
                &format!("SELECT id FROM t ORDER BY id LIMIT {} OFFSET {}", limit, offset),
            );
            let expected: Vec<i64> = (1..=n as i64).skip(offset).take(limit).collect();
            prop_assert_eq!(got, expected);
        }
    }

    #[test]
    fn prop_empty_pattern_set_accepts(cn in ".{0,24}") {
        let auth = CommonNameAuthenticator::new();
        let mut ctx = ConnContext::new();
        ctx.set_tls(TlsSession { peer_certificates: vec![PeerCertificate::new(&cn)] });
        prop_assert!(auth.verify_certificate(&ctx).unwrap());
    }

    #[test]
    fn prop_anchored_pattern_accepts_only_itself(cn in "[a-z]{1,10}", other in "[a-z]{1,10}") {
        let pattern = format!("^{}$", cn);
        let auth = CommonNameAuthenticator::with_patterns(&[pattern.as_str()]).unwrap();
        let mut ctx = ConnContext::new();
        ctx.set_tls(TlsSession { peer_certificates: vec![PeerCertificate::new(&other)] });
        prop_assert_eq!(auth.verify_certificate(&ctx).unwrap(), cn == other);
    }

    #[test]
    fn prop_close_is_idempotent(values in proptest::collection::vec(any::<i64>(), 0..10)) {
        let schema = Schema::new(vec![Column::new("v", DataType::Integer)]);
        let mut rs = ResultSet::from_rows(schema, values.into_iter().map(|v| vec![Value::Integer(v)]).collect());
        prop_assert!(rs.close().is_ok());
        prop_assert!(rs.close().is_ok());
        prop_assert!(matches!(rs.next(), Err(SqlFrontError::CursorClosed)));
    }
}

fn observe(server: &Server) -> (bool, Vec<bool>, bool, bool) {
    let frontends = ["mysql", "postgresql"]
        .iter()
        .map(|n| server.frontend(n).map(|fe| fe.is_running()).unwrap_or(false))
        .collect();
    (
        server.is_running(),
        frontends,
        server.exporter().is_running(),
        server.auth_manager().has_credential_store(),
    )
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(16))]

    #[test]
    fn prop_restart_equals_stop_then_start(metrics in any::<bool>(), creds in any::<bool>(), started in any::<bool>()) {
        let make = || {
            let mut config = Config::default();
            config.logger.enabled = false;
            config.store.engine = StoreEngine::Memory;
            config.metrics.prometheus.enabled = metrics;
            config.metrics.prometheus.port = 0;
            if creds {
                config.auth.plain = vec![PlainCredentialConfig {
                    username: "u".to_string(),
                    password: "p".to_string(),
                    enabled: true,
                }];
            }
            Server::new(config).unwrap()
        };

        let mut restarted = make();
        let mut cycled = make();
        if started {
            restarted.start().unwrap();
            cycled.start().unwrap();
        }
        restarted.restart().unwrap();
        cycled.stop().unwrap();
        cycled.start().unwrap();
        prop_assert_eq!(observe(&restarted), observe(&cycled));

        restarted.stop().unwrap();
        cycled.stop().unwrap();
    }
}
