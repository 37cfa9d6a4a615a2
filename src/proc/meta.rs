//! Process-wide configuration table.
//!
//! Processor options may declare a named global as their default. The
//! table is reached through a thread-local handle, initialized lazily per
//! thread; `set_meta` replaces it for the current thread only.

use std::cell::RefCell;
use std::sync::Arc;

use indexmap::IndexMap;
use lazy_static::lazy_static;

use crate::proc::options::OptValue;

#[derive(Debug, Clone)]
pub struct Meta {
    globals: IndexMap<String, OptValue>,
}

impl Default for Meta {
    fn default() -> Self {
        let mut globals = IndexMap::new();
        let mut put = |name: &str, value: OptValue| {
            globals.insert(name.to_owned(), value);
        };
        put("MIN_LENGTH", OptValue::Int(100));
        put("MIN_IDENTITY", OptValue::Dec(0.9));
        put("MAX_GAPS", OptValue::Dec(0.2));
        put("MAX_SPREADING", OptValue::Dec(0.2));
        put("ANCHOR_SIZE", OptValue::Int(20));
        put("ANCHOR_FP_RATE", OptValue::Dec(0.001));
        put("EXPANDER_MAX_OVERLAP", OptValue::Int(200));
        put("MIN_DISTANCE", OptValue::Int(0));
        Meta { globals }
    }
}

impl Meta {
    pub fn get(&self, name: &str) -> Option<&OptValue> {
        self.globals.get(name)
    }

    pub fn set(&mut self, name: &str, value: OptValue) {
        self.globals.insert(name.to_owned(), value);
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.globals.keys().map(|k| k.as_str())
    }
}

lazy_static! {
    static ref DEFAULT_META: Arc<Meta> = Arc::new(Meta::default());
}

thread_local! {
    static TSS_META: RefCell<Option<Arc<Meta>>> = const { RefCell::new(None) };
}

/// The current thread's configuration, falling back to the defaults.
pub fn meta() -> Arc<Meta> {
    TSS_META.with(|cell| {
        cell.borrow_mut()
            .get_or_insert_with(|| DEFAULT_META.clone())
            .clone()
    })
}

pub fn set_meta(new_meta: Arc<Meta>) {
    TSS_META.with(|cell| {
        *cell.borrow_mut() = Some(new_meta);
    });
}
