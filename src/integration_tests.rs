/// # Integration Tests Module
///
/// Scenarios run against every backend through a `Session`, checking that
/// both stores answer the dispatch contract the same way.

#[cfg(test)]
mod tests {
    use crate::core::Value;
    use crate::test_utils::*;

    #[test]
    fn test_create_database_twice() {
        for (name, executor) in backends() {
            let mut session = session_over(executor);
            session.execute("CREATE DATABASE d").unwrap();
            assert_sqlfront_error!(session.execute("CREATE DATABASE d"), DatabaseExists, name);
            session.execute("CREATE DATABASE IF NOT EXISTS d").unwrap();
        }
    }

    #[test]
    fn test_drop_table_then_select() {
        for (name, executor) in backends() {
            let mut session = users_fixture(executor).unwrap();
            session.execute("DROP TABLE users").unwrap();
            assert_sqlfront_error!(session.execute("SELECT * FROM users"), TableNotExist, name);
            session.execute("DROP TABLE IF EXISTS users").unwrap();
        }
    }

    #[test]
    fn test_insert_select_round_trip() {
        for (name, executor) in backends() {
            let mut session = users_fixture(executor).unwrap();
            assert_eq!(
                affected(&mut session, "INSERT INTO users (id, name) VALUES (1, 'a')").unwrap(),
                1,
                "{}",
                name
            );
            let rows = query_values(&mut session, "SELECT * FROM users").unwrap();
            assert_eq!(
                rows,
                vec![vec![Value::Integer(1), Value::Text("a".into())]],
                "{}",
                name
            );
        }
    }

    #[test]
    fn test_update_counts() {
        for (name, executor) in backends() {
            let mut session = users_fixture(executor).unwrap();
            session
                .execute("INSERT INTO users VALUES (1, 'a'), (2, 'b'), (3, 'b')")
                .unwrap();
            let n = affected(&mut session, "UPDATE users SET name = 'c' WHERE name = 'b'").unwrap();
            assert_eq!(n, 2, "{}", name);
            let n = affected(&mut session, "UPDATE users SET name = 'c' WHERE id > 10").unwrap();
            assert_eq!(n, 0, "{}", name);
        }
    }

    #[test]
    fn test_limit_offset() {
        for (name, executor) in backends() {
            let mut session = users_fixture(executor).unwrap();
            session
                .execute("INSERT INTO users VALUES (1, 'a'), (2, 'b'), (3, 'c'), (4, 'd'), (5, 'e')")
                .unwrap();
            let rows =
                query_values(&mut session, "SELECT id FROM users ORDER BY id LIMIT 2 OFFSET 1")
                    .unwrap();
            assert_eq!(
                rows,
                vec![vec![Value::Integer(2)], vec![Value::Integer(3)]],
                "{}",
                name
            );
        }
    }

    #[test]
    fn test_no_database_selected() {
        for (name, executor) in backends() {
            let mut session = session_over(executor);
            assert_sqlfront_error!(
                session.execute("CREATE TABLE t (id INTEGER)"),
                NoDatabaseSelected,
                name
            );
        }
    }

    #[test]
    fn test_use_missing_database_fails_lazily() {
        for (name, executor) in backends() {
            let mut session = session_over(executor);
            session.execute("USE nowhere").unwrap();
            assert_eq!(session.database(), Some("nowhere"));
            assert_sqlfront_error!(
                session.execute("SELECT * FROM t"),
                DatabaseNotExist,
                name
            );
        }
    }

    #[test]
    fn test_drop_current_database_clears_selection() {
        for (name, executor) in backends() {
            let mut session = users_fixture(executor).unwrap();
            session.execute("DROP DATABASE shop").unwrap();
            assert_eq!(session.database(), None, "{}", name);
            session.execute("DROP DATABASE IF EXISTS shop").unwrap();
            assert_sqlfront_error!(session.execute("DROP DATABASE shop"), DatabaseNotExist, name);
        }
    }
}
