/// Database Registry
///
/// Concurrent mapping from database name to database handle, shared by
/// every connection. The map lock is held only for the map operation
/// itself; handles are returned as `Arc`s so backend work on one database
/// never blocks lookups or removals of another.
use crate::core::error::lock_error;
use crate::core::{Result, SqlFrontError};
use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use tracing::debug;

/// Anything that can be registered by name.
pub trait Named {
    fn name(&self) -> &str;
}

#[derive(Debug)]
pub struct Registry<D> {
    databases: RwLock<HashMap<String, Arc<D>>>,
}

impl<D: Named> Registry<D> {
    pub fn new() -> Self {
        Registry {
            databases: RwLock::new(HashMap::new()),
        }
    }

    /// Registers a database.
    ///
    /// # Returns
    ///
    /// The shared handle, or `DatabaseExists` if the name is taken. The
    /// check and the insertion happen under one write lock.
    pub fn add(&self, db: D) -> Result<Arc<D>> {
        let mut databases = self.databases.write().map_err(|_| lock_error("registry"))?;
        let name = db.name().to_string();
        if databases.contains_key(&name) {
            return Err(SqlFrontError::DatabaseExists(name));
        }
        let db = Arc::new(db);
        databases.insert(name.clone(), Arc::clone(&db));
        debug!(database = %name, "database registered");
        Ok(db)
    }

    /// Looks up a database by name.
    pub fn lookup(&self, name: &str) -> Result<Arc<D>> {
        let databases = self.databases.read().map_err(|_| lock_error("registry"))?;
        databases
            .get(name)
            .cloned()
            .ok_or_else(|| SqlFrontError::DatabaseNotExist(name.to_string()))
    }

    /// Removes a database; removing an absent name succeeds.
    ///
    /// Returns the removed handle so the caller can release backend
    /// resources outside the registry lock.
    pub fn drop(&self, name: &str) -> Result<Option<Arc<D>>> {
        let mut databases = self.databases.write().map_err(|_| lock_error("registry"))?;
        let removed = databases.remove(name);
        if removed.is_some() {
            debug!(database = %name, "database removed");
        }
        Ok(removed)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.databases
            .read()
            .map(|d| d.contains_key(name))
            .unwrap_or(false)
    }

    /// Registered names in sorted order.
    pub fn names(&self) -> Result<Vec<String>> {
        let databases = self.databases.read().map_err(|_| lock_error("registry"))?;
        let mut names: Vec<String> = databases.keys().cloned().collect();
        names.sort();
        Ok(names)
    }
}

impl<D: Named> Default for Registry<D> {
    fn default() -> Self {
        Registry::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[derive(Debug)]
    struct Dummy(String);

    impl Named for Dummy {
        fn name(&self) -> &str {
            &self.0
        }
    }

    #[test]
    fn test_add_lookup_drop() {
        let registry = Registry::new();
        registry.add(Dummy("shop".into())).unwrap();
        assert_eq!(registry.lookup("shop").unwrap().name(), "shop");
        assert!(registry.contains("shop"));

        assert!(registry.drop("shop").unwrap().is_some());
        assert!(matches!(
            registry.lookup("shop"),
            Err(SqlFrontError::DatabaseNotExist(_))
        ));
        // already gone
        assert!(registry.drop("shop").unwrap().is_none());
    }

    #[test]
    fn test_duplicate_add_fails() {
        let registry = Registry::new();
        registry.add(Dummy("shop".into())).unwrap();
        match registry.add(Dummy("shop".into())) {
            Err(SqlFrontError::DatabaseExists(name)) => assert_eq!(name, "shop"),
            other => panic!("Expected DatabaseExists, got {:?}", other),
        }
    }

    #[test]
    fn test_names_are_case_sensitive() {
        let registry = Registry::new();
        registry.add(Dummy("Shop".into())).unwrap();
        registry.add(Dummy("shop".into())).unwrap();
        assert_eq!(registry.names().unwrap(), vec!["Shop", "shop"]);
    }

    #[test]
    fn test_concurrent_add_has_one_winner() {
        let registry = Arc::new(Registry::new());
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let registry = Arc::clone(&registry);
                thread::spawn(move || registry.add(Dummy("race".into())).is_ok())
            })
            .collect();
        let winners = handles
            .into_iter()
            .map(|h| h.join().unwrap())
            .filter(|ok| *ok)
            .count();
        assert_eq!(winners, 1);
    }
}
