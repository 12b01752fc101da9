///
/// Handle registry: maps the i64 handles naml code holds to driver objects.
///
/// One registry per object kind, so a connection handle passed where a
/// cursor is expected is caught as an unknown handle. Entries stay registered
/// after the object is closed (so misuse reports "is closed") and leave on
/// release, which drops the object and reclaims whatever it still holds.
///

use std::collections::HashMap;
use std::rc::Rc;

use crate::error::{Result, SqlError};

struct Entry<T> {
    object: T,
    prefix: Rc<str>,
}

pub(crate) struct HandleRegistry<T> {
    kind: &'static str,
    entries: HashMap<i64, Entry<T>>,
    next_id: i64,
}

impl<T: Clone> HandleRegistry<T> {
    pub(crate) fn new(kind: &'static str) -> Self {
        Self {
            kind,
            entries: HashMap::new(),
            next_id: 1,
        }
    }

    /// Registers `object`; `prefix` is prepended to messages about it.
    pub(crate) fn insert(&mut self, object: T, prefix: Rc<str>) -> i64 {
        let id = self.next_id;
        self.next_id += 1;
        self.entries.insert(id, Entry { object, prefix });
        id
    }

    pub(crate) fn get(&self, handle: i64) -> Result<(T, Rc<str>)> {
        self.entries
            .get(&handle)
            .map(|entry| (entry.object.clone(), Rc::clone(&entry.prefix)))
            .ok_or(SqlError::InvalidHandle { kind: self.kind, handle })
    }

    pub(crate) fn remove(&mut self, handle: i64) -> Option<T> {
        self.entries.remove(&handle).map(|entry| entry.object)
    }

    pub(crate) fn len(&self) -> usize {
        self.entries.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_insert_get_remove() {
        let mut reg: HandleRegistry<String> = HandleRegistry::new("cursor");
        let a = reg.insert("first".to_string(), Rc::from("p: "));
        let b = reg.insert("second".to_string(), Rc::from("p: "));
        assert_ne!(a, b);
        assert_eq!(reg.len(), 2);

        let (object, prefix) = reg.get(b).unwrap();
        assert_eq!(object, "second");
        assert_eq!(&*prefix, "p: ");

        assert_eq!(reg.remove(a).as_deref(), Some("first"));
        assert!(reg.remove(a).is_none());
        assert_eq!(reg.len(), 1);
    }

    #[test]
    fn test_unknown_handle_names_kind() {
        let reg: HandleRegistry<String> = HandleRegistry::new("connection");
        let err = reg.get(99).unwrap_err();
        assert!(err.is_fatal());
        assert_eq!(err.to_string(), "connection expected");
    }

    #[test]
    fn test_ids_are_not_reused() {
        let mut reg: HandleRegistry<u8> = HandleRegistry::new("environment");
        let first = reg.insert(1, Rc::from(""));
        reg.remove(first);
        let second = reg.insert(2, Rc::from(""));
        assert!(second > first);
    }
}
